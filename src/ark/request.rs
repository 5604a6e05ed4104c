use crate::{
    ark::size::normalize,
    config::DEFAULT_MODEL,
    error::{MagicError, Result},
    models::{ArkRequestBody, GenerationRequest},
};

/// Body for a prompt-only generation. Any `image` on the request is ignored.
pub fn build_text_to_image_body(request: &GenerationRequest) -> Result<ArkRequestBody> {
    let size = normalize(request.size.as_deref())?;

    Ok(ArkRequestBody {
        model: model_or_default(request),
        prompt: request.prompt.clone(),
        image: None,
        size,
        sequential_image_generation: request.sequential.unwrap_or_default(),
        response_format: request.response_format.unwrap_or_default(),
        watermark: request.watermark.unwrap_or(false),
        n: request.n,
    })
}

/// Body for an image-guided generation. Size is validated before the image.
pub fn build_image_to_image_body(request: &GenerationRequest) -> Result<ArkRequestBody> {
    let size = normalize(request.size.as_deref())?;

    let image = match &request.image {
        Some(image) if !image.is_empty() => image.clone(),
        _ => return Err(MagicError::InvalidImage),
    };

    Ok(ArkRequestBody {
        model: model_or_default(request),
        prompt: request.prompt.clone(),
        image: Some(image),
        size,
        sequential_image_generation: request.sequential.unwrap_or_default(),
        response_format: request.response_format.unwrap_or_default(),
        watermark: request.watermark.unwrap_or(false),
        n: request.n,
    })
}

fn model_or_default(request: &GenerationRequest) -> String {
    request
        .model
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MODEL)
        .to_string()
}
