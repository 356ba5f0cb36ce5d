//! Request handlers.
//!
//! Every handler builds its collaborators fresh from the configuration.
//! Nothing outlives the request: the path cache, the codebase index, and
//! every HTTP client are constructed here and dropped when the handler
//! returns, so concurrent requests share no mutable state.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use tracing::error;

use crate::agent::batch::{BatchRunner, BULK_BATCH_CAP};
use crate::agent::chat::ConversationEngine;
use crate::agent::followup::AutonomousFollowUp;
use crate::agent::implementer::TaskImplementer;
use crate::agent::planner::TaskPlanner;
use crate::deploy::{DeployClient, HttpDeployClient};
use crate::indexer::CodebaseIndexer;
use crate::llm::{HttpModelClient, ModelClient};
use crate::remote::github::GitHubHost;
use crate::search::{SearchProvider, WebSearch};
use crate::store::RepoStateStore;
use crate::types::{Task, TaskOrigin, TaskPatch, TaskPriority, TaskStatus};

use super::types::{
    ApiResponse, ChatRequest, ChatResponseBody, CreateTaskRequest, DeployRequest,
    DeployResponseBody, HealthResponse, ImplementAllResponse, InitProjectRequest,
    PlanTasksRequest, PlanTasksResponse,
};
use super::AppState;

/// Per-request collaborator set.
struct Components {
    store: Arc<RepoStateStore>,
    llm: Arc<dyn ModelClient>,
    search: Arc<dyn SearchProvider>,
    deploy: Arc<dyn DeployClient>,
}

fn components(state: &AppState, project: &str) -> Components {
    let config = &state.config;
    let host = Arc::new(GitHubHost::new(config));
    Components {
        store: Arc::new(RepoStateStore::new(host, project)),
        llm: Arc::new(HttpModelClient::new(
            config.model_api_key.clone(),
            config.model.clone(),
            config.model_api_base.clone(),
            config.request_timeout_secs,
        )),
        search: Arc::new(WebSearch::new()),
        deploy: Arc::new(HttpDeployClient::new(
            config.deploy_endpoint.clone(),
            config.request_timeout_secs,
        )),
    }
}

fn failed<T>(context: &str, e: impl std::fmt::Display) -> Json<ApiResponse<T>> {
    error!("{context}: {e}");
    Json(ApiResponse::err(format!("{context}: {e}")))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn init_project(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(request): Json<InitProjectRequest>,
) -> Json<ApiResponse<serde_json::Value>> {
    let c = components(&state, &project);
    let platform = request.platform.as_deref().unwrap_or("vercel");
    match c.store.ensure_repository(platform).await {
        Ok(()) => Json(ApiResponse::ok(
            serde_json::json!({ "project": project, "platform": platform }),
        )),
        Err(e) => failed("failed to initialize project", e),
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> Json<ApiResponse<Vec<Task>>> {
    let c = components(&state, &project);
    match c.store.get_tasks().await {
        Ok(tasks) => Json(ApiResponse::ok(tasks)),
        Err(e) => failed("failed to list tasks", e),
    }
}

pub async fn create_task(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(request): Json<CreateTaskRequest>,
) -> Json<ApiResponse<Task>> {
    let c = components(&state, &project);
    let now = chrono::Utc::now();
    let task = Task {
        id: format!("task_manual_{}", uuid::Uuid::new_v4().simple()),
        title: request.title,
        description: request.description,
        status: TaskStatus::Pending,
        priority: request.priority.unwrap_or(TaskPriority::Medium),
        origin: TaskOrigin::Manual,
        estimated_time: request.estimated_time.unwrap_or_else(|| "1 hour".into()),
        created_at: now,
        updated_at: now,
        files: request.files,
        dependencies: request.dependencies,
        acceptance_criteria: vec![],
        technical_notes: None,
    };
    match c.store.create_task(task.clone()).await {
        Ok(()) => Json(ApiResponse::ok(task)),
        Err(e) => failed("failed to create task", e),
    }
}

/// Patch a task. A failed task may be reset to pending through this route.
pub async fn update_task(
    State(state): State<AppState>,
    Path((project, task_id)): Path<(String, String)>,
    Json(patch): Json<TaskPatch>,
) -> Json<ApiResponse<Task>> {
    let c = components(&state, &project);
    match c.store.update_task(&task_id, patch).await {
        Ok(Some(task)) => Json(ApiResponse::ok(task)),
        Ok(None) => Json(ApiResponse::err(format!("unknown task: {task_id}"))),
        Err(e) => failed("failed to update task", e),
    }
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path((project, task_id)): Path<(String, String)>,
) -> Json<ApiResponse<serde_json::Value>> {
    let c = components(&state, &project);
    match c.store.delete_task(&task_id).await {
        Ok(true) => Json(ApiResponse::ok(serde_json::json!({ "deleted": task_id }))),
        Ok(false) => Json(ApiResponse::err(format!("unknown task: {task_id}"))),
        Err(e) => failed("failed to delete task", e),
    }
}

pub async fn plan_tasks(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(request): Json<PlanTasksRequest>,
) -> Json<ApiResponse<PlanTasksResponse>> {
    let c = components(&state, &project);
    let framework = request.framework.as_deref().unwrap_or("nextjs");

    let existing_context = match c.store.get_memory().await {
        Ok(memory) => CodebaseIndexer::from_memory(&memory).summary(),
        Err(e) => return failed("failed to load project context", e),
    };

    let planner = TaskPlanner::new(c.llm.clone());
    let planned = match planner
        .generate_tasks(&request.description, framework, &existing_context)
        .await
    {
        Ok(tasks) => tasks,
        Err(e) => return failed("task planning failed", e),
    };

    let mut tasks = match c.store.get_tasks().await {
        Ok(tasks) => tasks,
        Err(e) => return failed("failed to load tasks", e),
    };
    tasks.extend(planned.iter().cloned());
    if let Err(e) = c.store.save_tasks(&tasks, "Plan task backlog").await {
        return failed("failed to save planned tasks", e);
    }
    Json(ApiResponse::ok(PlanTasksResponse { tasks: planned }))
}

pub async fn implement_task(
    State(state): State<AppState>,
    Path((project, task_id)): Path<(String, String)>,
) -> Json<ApiResponse<ImplementAllResponse>> {
    let c = components(&state, &project);
    let runner = BatchRunner::new(
        TaskImplementer::new(c.llm.clone(), c.store.clone()),
        c.store.clone(),
    );
    let mut indexer = match c.store.get_memory().await {
        Ok(memory) => CodebaseIndexer::from_memory(&memory),
        Err(e) => return failed("failed to load project context", e),
    };
    match runner.implement_one(&task_id, &mut indexer).await {
        Ok(Some(outcome)) => {
            let report = crate::agent::batch::BatchReport {
                completed: usize::from(outcome.success),
                failed: usize::from(!outcome.success),
                results: vec![outcome],
                remaining_pending: 0,
            };
            Json(ApiResponse::ok(ImplementAllResponse { report }))
        }
        Ok(None) => Json(ApiResponse::err(format!("unknown task: {task_id}"))),
        Err(e) => failed("task implementation failed", e),
    }
}

pub async fn implement_all(
    State(state): State<AppState>,
    Path(project): Path<String>,
) -> Json<ApiResponse<ImplementAllResponse>> {
    let c = components(&state, &project);
    let runner = BatchRunner::new(
        TaskImplementer::new(c.llm.clone(), c.store.clone()),
        c.store.clone(),
    );
    let mut indexer = match c.store.get_memory().await {
        Ok(memory) => CodebaseIndexer::from_memory(&memory),
        Err(e) => return failed("failed to load project context", e),
    };
    match runner.implement_all(BULK_BATCH_CAP, &mut indexer).await {
        Ok(report) => Json(ApiResponse::ok(ImplementAllResponse { report })),
        Err(e) => failed("batch implementation failed", e),
    }
}

pub async fn chat(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Json<ApiResponse<ChatResponseBody>> {
    let c = components(&state, &project);
    let engine = ConversationEngine::new(c.llm.clone(), c.store.clone(), c.search.clone());

    let reply = match engine.chat_response(&request.message).await {
        Ok(reply) => reply,
        Err(e) => return failed("chat failed", e),
    };

    let follow_up = if request.autonomous {
        let runner = BatchRunner::new(
            TaskImplementer::new(c.llm.clone(), c.store.clone()),
            c.store.clone(),
        );
        let followup = AutonomousFollowUp::new(
            c.store.clone(),
            runner,
            c.search.clone(),
            c.deploy.clone(),
        );
        let mut indexer = match c.store.get_memory().await {
            Ok(memory) => CodebaseIndexer::from_memory(&memory),
            Err(e) => return failed("failed to load project context", e),
        };
        match followup.run(&reply, &mut indexer).await {
            Ok(run) => Some(run),
            Err(e) => return failed("follow-up failed", e),
        }
    } else {
        None
    };

    Json(ApiResponse::ok(ChatResponseBody { reply, follow_up }))
}

pub async fn deploy(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Json(request): Json<DeployRequest>,
) -> Json<ApiResponse<DeployResponseBody>> {
    let c = components(&state, &project);
    let platform = request.platform.as_deref().unwrap_or("vercel");
    let result = c.deploy.deploy(&project, platform).await;

    let log_entry = crate::types::DeploymentLogEntry {
        platform: platform.to_string(),
        success: result.success,
        url: result.url.clone(),
        error: result.error.clone(),
        timestamp: chrono::Utc::now(),
    };
    if let Err(e) = c.store.append_deployment_log(log_entry).await {
        return failed("failed to record deployment", e);
    }
    Json(ApiResponse::ok(DeployResponseBody { result }))
}
