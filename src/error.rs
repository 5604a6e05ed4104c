use thiserror::Error;

#[derive(Debug, Error)]
pub enum MagicError {
    #[error("invalid size: {0}")]
    InvalidSize(String),
    #[error("invalid image input")]
    InvalidImage,
    #[error("missing api key")]
    MissingCredential,
    #[error("ark http {status} {body}")]
    RemoteHttp { status: u16, body: String },
    #[error("failed to load image: {0}")]
    ImageLoad(String),
    #[error("rendering surface not available")]
    NoRenderingContext,
    #[error("no image returned")]
    NoImageReturned,
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(String),
}

impl MagicError {
    /// Caller-side mistakes are recognised by their message: anything
    /// mentioning "invalid" or "missing". Remote failures and undecodable
    /// images are always server-side, whatever text they carry.
    pub fn is_client_error(&self) -> bool {
        match self {
            MagicError::RemoteHttp { .. } | MagicError::ImageLoad(_) => false,
            other => is_client_error_message(&other.to_string()),
        }
    }
}

pub fn is_client_error_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("invalid") || lower.contains("missing")
}

pub type Result<T> = std::result::Result<T, MagicError>;
