//! Long-running server job tracking.
//!
//! Uploads (call recordings, lead CSVs) return immediately and finish in the
//! background; the client polls a status endpoint and maps each stage to a
//! progress percentage.

pub mod poller;
pub mod types;

pub use poller::{JobPoller, JobProgress};
pub use types::{JobStatus, JobStatusResponse};

/// Status endpoint of a recording analysis job.
pub fn analysis_status_path(job_id: &str) -> String {
    format!("/api/calliq/jobs/{job_id}")
}

/// Status endpoint of a bulk lead import.
pub fn import_status_path(job_id: &str) -> String {
    format!("/api/leads/import/{job_id}/status")
}
