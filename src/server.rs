//! The local HTTP boundary in front of the Ark client.

use crate::{
    ark::{normalize, ArkClient},
    config::Config,
    error::{MagicError, Result},
    models::{GenerationRequest, ImageInput, ResponseFormat, SequentialMode},
};
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;
use serde_json::json;

/// Prepared photos arrive as data URLs of up to ~13MB.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub struct AppState {
    pub client: ArkClient,
}

impl AppState {
    pub fn new(client: ArkClient) -> Self {
        Self { client }
    }
}

/// Body accepted by `POST /api/ai/i2i`.
///
/// `image` stays untyped until the size has been checked, so a bad size is
/// reported ahead of a malformed image.
#[derive(Debug, Deserialize)]
pub struct I2iPayload {
    pub image: Option<serde_json::Value>,
    #[serde(default)]
    pub prompt: Option<String>,
    pub size: Option<String>,
    pub model: Option<String>,
    pub sequential: Option<SequentialMode>,
    pub response_format: Option<ResponseFormat>,
    pub watermark: Option<bool>,
    pub n: Option<u32>,
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
}

impl I2iPayload {
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| MagicError::RequestError(format!("invalid request body: {}", e)))
    }

    fn into_parts(self) -> Result<(GenerationRequest, Option<String>)> {
        normalize(self.size.as_deref())?;
        let image = match self.image {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(
                serde_json::from_value::<ImageInput>(value).map_err(|_| MagicError::InvalidImage)?,
            ),
        };

        let request = GenerationRequest {
            prompt: self.prompt.unwrap_or_default(),
            size: self.size,
            model: self.model,
            sequential: self.sequential,
            response_format: self.response_format,
            watermark: self.watermark,
            n: self.n,
            image,
        };
        Ok((request, self.api_key))
    }
}

pub fn error_response(err: &MagicError) -> HttpResponse {
    let body = json!({ "error": err.to_string() });
    if err.is_client_error() {
        HttpResponse::BadRequest().json(body)
    } else {
        HttpResponse::InternalServerError().json(body)
    }
}

async fn handle_image_to_image(state: &AppState, body: &[u8]) -> Result<serde_json::Value> {
    let (request, api_key) = I2iPayload::decode(body)?.into_parts()?;
    state
        .client
        .generate_image_to_image_raw(&request, api_key.as_deref())
        .await
}

#[post("/api/ai/i2i")]
async fn image_to_image(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    match handle_image_to_image(&state, &body).await {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => {
            log::error!("i2i request failed: {}", e);
            error_response(&e)
        }
    }
}

#[get("/healthz")]
async fn healthz() -> impl Responder {
    HttpResponse::Ok().body("ok")
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(MAX_BODY_BYTES))
        .service(image_to_image)
        .service(healthz);
}

pub async fn run(config: Config) -> std::io::Result<()> {
    let port = config.port_or_default();
    let state = web::Data::new(AppState::new(ArkClient::new(config.ark.clone())));

    crate::logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), port);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes))
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
