//! Deployment collaborator.
//!
//! The actual build-and-deploy pipeline lives outside this service; the agent
//! only posts a trigger and records the outcome. Failures become a
//! `DeployResult` with `success = false`, never an error that breaks the
//! surrounding flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

/// Outcome of one deployment trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeployResult {
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait DeployClient: Send + Sync {
    async fn deploy(&self, project: &str, platform: &str) -> DeployResult;
}

/// Posts deployment triggers to a configured webhook endpoint.
pub struct HttpDeployClient {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl HttpDeployClient {
    pub fn new(endpoint: Option<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self { client, endpoint }
    }
}

#[async_trait]
impl DeployClient for HttpDeployClient {
    async fn deploy(&self, project: &str, platform: &str) -> DeployResult {
        let Some(endpoint) = &self.endpoint else {
            return DeployResult::failure("no deployment endpoint configured");
        };
        let body = json!({ "project": project, "platform": platform });
        let response = match self.client.post(endpoint).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "deployment trigger failed");
                return DeployResult::failure(format!("deployment service unreachable: {e}"));
            }
        };
        if !response.status().is_success() {
            return DeployResult::failure(format!(
                "deployment service returned {}",
                response.status()
            ));
        }
        match response.json::<DeployResult>().await {
            Ok(result) => result,
            Err(e) => DeployResult::failure(format!("unreadable deployment response: {e}")),
        }
    }
}

/// Canned client for tests.
#[cfg(test)]
pub struct FixedDeploy(pub DeployResult);

#[cfg(test)]
#[async_trait]
impl DeployClient for FixedDeploy {
    async fn deploy(&self, _project: &str, _platform: &str) -> DeployResult {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_endpoint_degrades_to_failure_result() {
        let client = HttpDeployClient::new(None, 5);
        let result = tokio_test::block_on(client.deploy("demo", "vercel"));
        assert!(!result.success);
        assert!(result.error.unwrap().contains("no deployment endpoint"));
    }
}
