//! Webhook configuration endpoints.

use serde_json::json;

use crate::api::types::{WebhookConfig, WebhookTestResult};
use crate::http::client::{ApiClient, RequestOptions};
use crate::http::types::ApiResult;

const CONFIG_PATH: &str = "/api/webhooks/config";

#[derive(Debug, Clone)]
pub struct WebhooksApi {
    client: ApiClient,
}

impl WebhooksApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get_config(&self) -> ApiResult<WebhookConfig> {
        self.client.get(CONFIG_PATH, &RequestOptions::new()).await
    }

    pub async fn update_config(&self, config: &WebhookConfig) -> ApiResult<WebhookConfig> {
        self.client
            .put(CONFIG_PATH, config, &RequestOptions::new())
            .await
    }

    /// Ask the backend to send a test event. Not retried: each attempt would
    /// deliver another event.
    pub async fn test(&self, event: &str) -> ApiResult<WebhookTestResult> {
        self.client
            .post(
                "/api/webhooks/test",
                &json!({ "event": event }),
                &RequestOptions::new().max_attempts(1),
            )
            .await
    }
}
