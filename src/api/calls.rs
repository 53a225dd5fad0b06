//! Call history and CallIQ endpoints.

use serde_json::{json, Value};

use crate::api::types::{Call, CallInsights, Page, UploadSlot};
use crate::http::client::{ApiClient, MultipartUpload, RequestOptions};
use crate::http::types::ApiResult;
use crate::jobs::{analysis_status_path, JobPoller, JobProgress, JobStatusResponse};

const CALLS_PATH: &str = "/api/calls";
const UPLOADS_PATH: &str = "/api/calliq/uploads";

#[derive(Debug, Clone)]
pub struct CallsApi {
    client: ApiClient,
}

impl CallsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// One page of call history, served from cache while fresh.
    pub async fn history(&self, page: u32, page_size: u32) -> ApiResult<Page<Call>> {
        let opts = RequestOptions::new()
            .query("page", page)
            .query("page_size", page_size);
        self.client.get_cached(CALLS_PATH, &opts).await
    }

    /// Every call, walking pages until the server reports no more.
    pub async fn all_history(&self, page_size: u32) -> ApiResult<Vec<Call>> {
        let mut calls = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.history(page, page_size).await?;
            let more = batch.has_more() && !batch.items.is_empty();
            calls.extend(batch.items);
            if !more {
                return Ok(calls);
            }
            page += 1;
        }
    }

    pub async fn get(&self, id: &str) -> ApiResult<Call> {
        self.client
            .get_cached(&format!("{CALLS_PATH}/{id}"), &RequestOptions::new())
            .await
    }

    pub async fn insights(&self, call_id: &str) -> ApiResult<CallInsights> {
        self.client
            .get_cached(
                &format!("/api/calliq/calls/{call_id}/insights"),
                &RequestOptions::new(),
            )
            .await
    }

    /// Upload a recording for analysis and wait for the result.
    ///
    /// The bytes go straight to object storage through a presigned URL; the
    /// API only sees the confirmation.
    pub async fn upload_recording<F>(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        on_progress: F,
    ) -> ApiResult<JobStatusResponse>
    where
        F: FnMut(JobProgress),
    {
        let content_type = MultipartUpload::file("file", file_name, Vec::new()).mime_type();
        let opts = RequestOptions::new();

        let slot: UploadSlot = self
            .client
            .post(
                UPLOADS_PATH,
                &json!({ "file_name": file_name, "content_type": content_type }),
                &opts,
            )
            .await?;
        self.client
            .put_presigned(&slot.upload_url, bytes, &content_type, &opts)
            .await?;
        self.client
            .post::<_, Value>(
                &format!("{UPLOADS_PATH}/{}/confirm", slot.job_id),
                &json!({}),
                &opts,
            )
            .await?;
        tracing::info!(job_id = %slot.job_id, file_name, "Recording uploaded, awaiting analysis");

        JobPoller::new(self.client.clone())
            .poll(&analysis_status_path(&slot.job_id), on_progress)
            .await
    }
}
