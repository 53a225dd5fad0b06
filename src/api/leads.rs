//! Lead management endpoints.

use serde::Serialize;
use serde_json::Value;

use crate::api::types::{JobAccepted, Lead, LeadUpdate, Page};
use crate::cache::cache_key;
use crate::http::client::{ApiClient, MultipartUpload, RequestOptions};
use crate::http::types::ApiResult;
use crate::jobs::{import_status_path, JobPoller, JobProgress, JobStatusResponse};

const LEADS_PATH: &str = "/api/leads";

/// Fields accepted when creating a lead.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewLead {
    pub name: String,
    pub phone_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LeadsApi {
    client: ApiClient,
}

impl LeadsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// One page of leads, served from cache while fresh.
    pub async fn list(&self, page: u32, page_size: u32) -> ApiResult<Page<Lead>> {
        let opts = RequestOptions::new()
            .query("page", page)
            .query("page_size", page_size);
        self.client.get_cached(LEADS_PATH, &opts).await
    }

    pub async fn get(&self, id: &str) -> ApiResult<Lead> {
        self.client
            .get_cached(&lead_path(id), &RequestOptions::new())
            .await
    }

    pub async fn create(&self, lead: &NewLead) -> ApiResult<Lead> {
        let created: Lead = self
            .client
            .post(LEADS_PATH, lead, &RequestOptions::new())
            .await?;
        self.invalidate_lists();
        Ok(created)
    }

    /// Update a lead optimistically.
    ///
    /// A cached copy of the lead is patched before the request goes out and
    /// restored if the request fails.
    pub async fn update(&self, id: &str, update: &LeadUpdate) -> ApiResult<Lead> {
        let path = lead_path(id);
        let key = cache_key("GET", &path, &[]);
        let cache = self.client.cache();
        let previous = cache.peek(&key);

        if let Some(Ok(mut lead)) = previous.clone().map(serde_json::from_value::<Lead>) {
            update.apply_to(&mut lead);
            cache.insert(key.clone(), serde_json::to_value(&lead)?);
        }

        match self
            .client
            .patch::<_, Lead>(&path, update, &RequestOptions::new())
            .await
        {
            Ok(lead) => {
                cache.insert(key, serde_json::to_value(&lead)?);
                self.invalidate_lists();
                Ok(lead)
            }
            Err(err) => {
                tracing::debug!(lead_id = id, error = %err, "Rolling back optimistic lead update");
                match previous {
                    Some(value) => cache.insert(key, value),
                    None => cache.invalidate(&key),
                }
                Err(err)
            }
        }
    }

    pub async fn delete(&self, id: &str) -> ApiResult<()> {
        let path = lead_path(id);
        self.client
            .delete::<Value>(&path, &RequestOptions::new())
            .await?;
        self.client.cache().invalidate(&cache_key("GET", &path, &[]));
        self.invalidate_lists();
        Ok(())
    }

    /// Upload a CSV of leads and wait for the import job to finish.
    pub async fn import_csv<F>(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        on_progress: F,
    ) -> ApiResult<JobStatusResponse>
    where
        F: FnMut(JobProgress),
    {
        let upload = MultipartUpload::file("file", file_name, bytes);
        let accepted: JobAccepted = self
            .client
            .upload_multipart(&format!("{LEADS_PATH}/import"), &upload, &RequestOptions::new())
            .await?;
        tracing::info!(job_id = %accepted.job_id, file_name, "Lead import started");

        let status = JobPoller::new(self.client.clone())
            .poll(&import_status_path(&accepted.job_id), on_progress)
            .await?;
        self.invalidate_lists();
        Ok(status)
    }

    fn invalidate_lists(&self) {
        let list_key = cache_key("GET", LEADS_PATH, &[]);
        let cache = self.client.cache();
        cache.invalidate(&list_key);
        cache.invalidate_prefix(&format!("{list_key}?"));
    }
}

fn lead_path(id: &str) -> String {
    format!("{LEADS_PATH}/{id}")
}
