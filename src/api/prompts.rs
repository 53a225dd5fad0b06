//! Agent prompt versions.

use serde_json::json;

use crate::api::diff::{prompt_diff, PromptDiff};
use crate::api::types::{PromptImprovement, PromptVersion};
use crate::http::client::{ApiClient, RequestOptions};
use crate::http::types::{ApiError, ApiResult};

#[derive(Debug, Clone)]
pub struct PromptsApi {
    client: ApiClient,
}

impl PromptsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn versions(&self, agent_id: &str) -> ApiResult<Vec<PromptVersion>> {
        self.client
            .get_cached(&versions_path(agent_id), &RequestOptions::new())
            .await
    }

    /// Request an improved prompt. Generation is slow, so this call gets a
    /// longer timeout than the default.
    pub async fn improve(
        &self,
        agent_id: &str,
        prompt: &str,
        feedback: &str,
    ) -> ApiResult<PromptImprovement> {
        let opts = RequestOptions::new().timeout(std::time::Duration::from_secs(90));
        self.client
            .post(
                &format!("{}/improve", versions_path(agent_id)),
                &json!({ "prompt": prompt, "feedback": feedback }),
                &opts,
            )
            .await
    }

    /// Diff two stored versions of an agent's prompt.
    pub async fn diff(&self, agent_id: &str, from: u32, to: u32) -> ApiResult<PromptDiff> {
        let versions = self.versions(agent_id).await?;
        let find = |version: u32| {
            versions
                .iter()
                .find(|v| v.version == version)
                .ok_or_else(|| ApiError::ClientError {
                    status: 404,
                    message: format!("Prompt version {version} not found"),
                })
        };
        let old = find(from)?;
        let new = find(to)?;
        Ok(prompt_diff(&old.content, &new.content))
    }
}

fn versions_path(agent_id: &str) -> String {
    format!("/api/agents/{agent_id}/prompts")
}
