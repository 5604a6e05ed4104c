use crate::{
    ark::request::{build_image_to_image_body, build_text_to_image_body},
    config::ArkConfig,
    error::{MagicError, Result},
    models::{ArkRequestBody, ArkResponse, GenerationRequest},
};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// Status and raw body of a finished HTTP exchange.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn build_headers(bearer: &str) -> Result<reqwest::header::HeaderMap> {
        let mut headers = reqwest::header::HeaderMap::new();
        let auth: reqwest::header::HeaderValue = format!("Bearer {}", bearer)
            .parse()
            .map_err(|_| {
                MagicError::RequestError("invalid api key: not a valid header value".into())
            })?;
        headers.insert(reqwest::header::AUTHORIZATION, auth);
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        Ok(headers)
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse> {
        let response = self
            .client
            .post(url)
            .headers(Self::build_headers(bearer)?)
            .json(body)
            .send()
            .await
            .map_err(|e| MagicError::RequestError(format!("Ark request failed: {}", e)))?;

        let status = response.status().as_u16();
        // An unreadable body must not hide the status.
        let body = response.text().await.unwrap_or_default();

        Ok(TransportResponse { status, body })
    }
}

#[derive(Clone)]
pub struct ArkClient {
    transport: Arc<dyn Transport>,
    config: ArkConfig,
}

impl ArkClient {
    pub fn new(config: ArkConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(config: ArkConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ArkConfig {
        &self.config
    }

    /// Explicit key first, then the configured one.
    pub fn resolve_credential(&self, api_key: Option<&str>) -> Result<String> {
        api_key
            .filter(|k| !k.is_empty())
            .or(self.config.api_key.as_deref().filter(|k| !k.is_empty()))
            .map(str::to_string)
            .ok_or(MagicError::MissingCredential)
    }

    /// Post a body and hand back the response JSON exactly as received.
    pub async fn invoke_raw(
        &self,
        body: &ArkRequestBody,
        api_key: Option<&str>,
    ) -> Result<serde_json::Value> {
        let key = self.resolve_credential(api_key)?;
        let payload = serde_json::to_value(body)
            .map_err(|e| MagicError::SerializationError(e.to_string()))?;

        log::info!(
            "Calling Ark images endpoint with model: {} size: {}",
            body.model,
            body.size
        );
        log::debug!("Ark api key length: {}", key.len());

        let response = self
            .transport
            .post_json(self.config.endpoint(), &key, &payload)
            .await?;

        if !response.is_success() {
            log::warn!("Ark returned HTTP {}", response.status);
            return Err(MagicError::RemoteHttp {
                status: response.status,
                body: response.body,
            });
        }

        serde_json::from_str(&response.body)
            .map_err(|e| MagicError::SerializationError(format!("Ark response: {}", e)))
    }

    pub async fn invoke(&self, body: &ArkRequestBody, api_key: Option<&str>) -> Result<ArkResponse> {
        let raw = self.invoke_raw(body, api_key).await?;
        serde_json::from_value(raw)
            .map_err(|e| MagicError::SerializationError(format!("Ark response: {}", e)))
    }

    pub async fn generate_text_to_image(
        &self,
        request: &GenerationRequest,
        api_key: Option<&str>,
    ) -> Result<ArkResponse> {
        let body = build_text_to_image_body(&self.with_default_model(request))?;
        self.invoke(&body, api_key).await
    }

    pub async fn generate_image_to_image(
        &self,
        request: &GenerationRequest,
        api_key: Option<&str>,
    ) -> Result<ArkResponse> {
        let body = build_image_to_image_body(&self.with_default_model(request))?;
        self.invoke(&body, api_key).await
    }

    pub async fn generate_image_to_image_raw(
        &self,
        request: &GenerationRequest,
        api_key: Option<&str>,
    ) -> Result<serde_json::Value> {
        let body = build_image_to_image_body(&self.with_default_model(request))?;
        self.invoke_raw(&body, api_key).await
    }

    // A model configured through ARK_MODEL replaces the built-in default but
    // never a model named on the request itself.
    fn with_default_model(&self, request: &GenerationRequest) -> GenerationRequest {
        let mut request = request.clone();
        if request.model.as_deref().map_or(true, str::is_empty) {
            request.model = self.config.model.clone();
        }
        request
    }
}
