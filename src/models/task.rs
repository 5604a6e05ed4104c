use serde::{Deserialize, Serialize};

pub type TaskId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Generating,
    Success,
    Error,
}

impl TaskStatus {
    /// Pending and failed tasks are both picked up by the next batch.
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Pending | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Generating => "generating",
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationTask {
    pub id: TaskId,
    pub source_name: String,
    pub preview_data_url: String,
    pub status: TaskStatus,
    pub result_url: Option<String>,
    pub error_message: Option<String>,
}

impl GenerationTask {
    pub fn new(source_name: impl Into<String>, preview_data_url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_name: source_name.into(),
            preview_data_url: preview_data_url.into(),
            status: TaskStatus::Pending,
            result_url: None,
            error_message: None,
        }
    }
}
