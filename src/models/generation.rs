use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequentialMode {
    #[default]
    Disabled,
    Auto,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    #[default]
    Url,
    B64Json,
}

/// One reference image or a list of them, each a data URL or a plain URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageInput {
    Single(String),
    Many(Vec<String>),
}

impl ImageInput {
    pub fn is_empty(&self) -> bool {
        match self {
            ImageInput::Single(s) => s.is_empty(),
            ImageInput::Many(list) => list.is_empty(),
        }
    }
}

impl From<String> for ImageInput {
    fn from(value: String) -> Self {
        ImageInput::Single(value)
    }
}

impl From<&str> for ImageInput {
    fn from(value: &str) -> Self {
        ImageInput::Single(value.to_string())
    }
}

impl From<Vec<String>> for ImageInput {
    fn from(value: Vec<String>) -> Self {
        ImageInput::Many(value)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub size: Option<String>,
    pub model: Option<String>,
    pub sequential: Option<SequentialMode>,
    pub response_format: Option<ResponseFormat>,
    pub watermark: Option<bool>,
    pub n: Option<u32>,
    pub image: Option<ImageInput>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: impl Into<ImageInput>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }
}

/// Canonical `WxH` accepted by the Ark service. Only `ark::size::normalize`
/// produces one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NormalizedSize(pub(crate) String);

impl NormalizedSize {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NormalizedSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body posted to the images/generations endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ArkRequestBody {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageInput>,
    pub size: NormalizedSize,
    pub sequential_image_generation: SequentialMode,
    pub response_format: ResponseFormat,
    pub watermark: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArkImageItem {
    pub url: Option<String>,
    pub b64_json: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArkServiceError {
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArkResponse {
    pub model: Option<String>,
    pub created: Option<i64>,
    pub data: Option<Vec<ArkImageItem>>,
    pub images: Option<Vec<ArkImageItem>>,
    pub usage: Option<serde_json::Value>,
    pub error: Option<ArkServiceError>,
}
