//! Poll a job status endpoint until it settles.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::http::client::{ApiClient, RequestOptions};
use crate::http::types::{ApiError, ApiResult};
use crate::jobs::types::{JobStatus, JobStatusResponse};

/// One observed status, passed to the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProgress {
    pub status: JobStatus,
    pub percent: u8,
    /// 1-based poll number.
    pub poll: u32,
}

/// Repeatedly GETs a status path through the full client stack.
#[derive(Debug, Clone)]
pub struct JobPoller {
    client: ApiClient,
    interval: Duration,
    max_polls: u32,
    cancellation: Option<CancellationToken>,
}

impl JobPoller {
    /// Poller with the client's configured interval and budget.
    pub fn new(client: ApiClient) -> Self {
        let interval = Duration::from_millis(client.polling().interval_ms);
        let max_polls = client.polling().max_polls;
        Self {
            client,
            interval,
            max_polls,
            cancellation: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Poll `path` until the job completes, fails or the budget runs out.
    ///
    /// `on_progress` sees every status observed, terminal ones included.
    pub async fn poll<F>(&self, path: &str, mut on_progress: F) -> ApiResult<JobStatusResponse>
    where
        F: FnMut(JobProgress),
    {
        let max_polls = self.max_polls.max(1);
        let mut opts = RequestOptions::new();
        if let Some(token) = &self.cancellation {
            opts = opts.cancellation(token.clone());
        }

        for poll in 1..=max_polls {
            if self.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let response: JobStatusResponse = self.client.get(path, &opts).await?;
            on_progress(JobProgress {
                status: response.status,
                percent: response.progress_percent(),
                poll,
            });

            match response.status {
                JobStatus::Completed => {
                    tracing::info!(path, polls = poll, "Job completed");
                    return Ok(response);
                }
                JobStatus::Failed => {
                    let message = response.failure_message();
                    tracing::warn!(path, polls = poll, error = %message, "Job failed");
                    return Err(ApiError::JobFailed(message));
                }
                status => {
                    tracing::debug!(path, poll, status = status.as_str(), "Job still running");
                }
            }

            if poll < max_polls {
                self.wait().await?;
            }
        }

        tracing::warn!(path, polls = max_polls, "Job did not finish within poll budget");
        Err(ApiError::PollExhausted {
            attempts: max_polls,
        })
    }

    async fn wait(&self) -> ApiResult<()> {
        match &self.cancellation {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(ApiError::Cancelled),
                    _ = tokio::time::sleep(self.interval) => Ok(()),
                }
            }
            None => {
                tokio::time::sleep(self.interval).await;
                Ok(())
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }
}
