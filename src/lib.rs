pub mod ark;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod output;
pub mod preprocess;
pub mod prompt;
#[cfg(feature = "server")]
pub mod server;
pub mod tasks;

pub use ark::{ArkClient, ReqwestTransport, Transport};
pub use config::{ArkConfig, Config};
pub use error::{MagicError, Result};
pub use models::*;
pub use prompt::{build_prompt, Intensity, PromptOptions};
pub use tasks::{BatchSummary, GenerationSettings, ImageGenerator, SourceImage, TaskTracker};
