//! API request and response types.

use serde::{Deserialize, Serialize};

use crate::agent::batch::BatchReport;
use crate::agent::followup::FollowUpRun;
use crate::deploy::DeployResult;
use crate::types::Task;

/// Uniform envelope: every component error is caught at the request
/// boundary and converted into `success = false` plus a message.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Initialize a project repository.
#[derive(Debug, Clone, Deserialize)]
pub struct InitProjectRequest {
    /// Deployment platform recorded in the marker document.
    pub platform: Option<String>,
}

/// Generate a task backlog from a description.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanTasksRequest {
    pub description: String,
    pub framework: Option<String>,
}

/// Manually create one task.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Option<crate::types::TaskPriority>,
    #[serde(default)]
    pub estimated_time: Option<String>,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Chat with the agent.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// When false, the reply is not inspected for follow-up intentions.
    #[serde(default = "default_true")]
    pub autonomous: bool,
}

fn default_true() -> bool {
    true
}

/// Trigger a deployment.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployRequest {
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponseBody {
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<FollowUpRun>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTasksResponse {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementAllResponse {
    pub report: BatchReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployResponseBody {
    pub result: DeployResult,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
