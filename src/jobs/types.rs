//! Server-side job status.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle of a long-running server job (audio analysis, CSV import).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum JobStatus {
    Pending,
    Uploaded,
    Transcribing,
    Analyzing,
    Processing,
    Completed,
    Failed,
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        JobStatus::parse(&value)
    }
}

impl JobStatus {
    /// Parse a status string. Unknown values count as still processing.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => JobStatus::Pending,
            "uploaded" => JobStatus::Uploaded,
            "transcribing" => JobStatus::Transcribing,
            "analyzing" | "analysing" => JobStatus::Analyzing,
            "completed" | "complete" | "done" => JobStatus::Completed,
            "failed" | "error" => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }

    /// Progress shown to the operator for this stage.
    pub fn progress_percent(&self) -> u8 {
        match self {
            JobStatus::Pending => 10,
            JobStatus::Processing => 50,
            JobStatus::Uploaded => 60,
            JobStatus::Transcribing => 80,
            JobStatus::Analyzing => 95,
            JobStatus::Completed | JobStatus::Failed => 100,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Uploaded => "uploaded",
            JobStatus::Transcribing => "transcribing",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Body returned by job status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusResponse {
    #[serde(default, alias = "job_id")]
    pub id: Option<String>,
    pub status: JobStatus,
    #[serde(default, alias = "error_message")]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Job output once completed (analysis result, import summary).
    #[serde(default)]
    pub result: Option<Value>,
}

impl JobStatusResponse {
    pub fn progress_percent(&self) -> u8 {
        self.status.progress_percent()
    }

    /// Failure text for a failed job, falling back to a generic message.
    pub fn failure_message(&self) -> String {
        self.error
            .clone()
            .or_else(|| self.message.clone())
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "Processing failed".to_string())
    }
}
