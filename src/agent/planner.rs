//! Task planning: one model call turns a project description into a backlog.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::error::{AgentError, Result};
use crate::llm::{json::extract_json_as, ModelClient};
use crate::types::{Task, TaskOrigin, TaskPriority, TaskStatus};

use super::prompt;

pub struct TaskPlanner {
    llm: Arc<dyn ModelClient>,
}

/// Raw task shape as the model emits it; normalized into [`Task`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlannedTask {
    title: String,
    description: String,
    #[serde(default)]
    priority: Option<TaskPriority>,
    #[serde(default)]
    estimated_time: Option<String>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    acceptance_criteria: Vec<String>,
    #[serde(default)]
    technical_notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlanReply {
    tasks: Vec<PlannedTask>,
}

impl TaskPlanner {
    pub fn new(llm: Arc<dyn ModelClient>) -> Self {
        Self { llm }
    }

    /// Ask the model for a task backlog and normalize it. The reply may wrap
    /// JSON in prose or fences; anything unparseable is a
    /// `ModelResponseFormat` error with no partial acceptance.
    pub async fn generate_tasks(
        &self,
        description: &str,
        framework: &str,
        existing_context: &str,
    ) -> Result<Vec<Task>> {
        let prompt = prompt::plan_prompt(description, framework, existing_context);
        let raw = self.llm.generate(&prompt).await?;
        let reply: PlanReply = extract_json_as(&raw)?;

        if reply.tasks.is_empty() {
            return Err(AgentError::bad_model_response("model produced zero tasks", raw));
        }

        let now = Utc::now();
        let stamp = now.timestamp_millis();
        let tasks: Vec<Task> = reply
            .tasks
            .into_iter()
            .enumerate()
            .map(|(i, planned)| Task {
                id: format!("task_{stamp}_{i}"),
                title: planned.title,
                description: planned.description,
                status: TaskStatus::Pending,
                priority: planned.priority.unwrap_or(TaskPriority::Medium),
                origin: TaskOrigin::AiGenerated,
                estimated_time: planned
                    .estimated_time
                    .unwrap_or_else(|| "1 hour".to_string()),
                created_at: now,
                updated_at: now,
                files: planned.files,
                dependencies: planned.dependencies,
                acceptance_criteria: planned.acceptance_criteria,
                technical_notes: planned.technical_notes,
            })
            .collect();

        info!(count = tasks.len(), "planned task backlog");
        Ok(tasks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockModel;

    fn planner_with(reply: &str) -> TaskPlanner {
        TaskPlanner::new(Arc::new(MockModel::new([reply])))
    }

    #[tokio::test]
    async fn ids_are_unique_and_status_pending() {
        let reply = r#"Here is the plan:
```json
{"tasks": [
  {"title": "Set up routing", "description": "Add pages"},
  {"title": "Add login", "description": "Auth flow", "priority": "high"},
  {"title": "Style header", "description": "CSS work", "estimatedTime": "30 minutes"}
]}
```"#;
        let tasks = planner_with(reply)
            .generate_tasks("demo", "nextjs", "")
            .await
            .unwrap();
        assert_eq!(tasks.len(), 3);
        let mut ids: Vec<&String> = tasks.iter().map(|t| &t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
        assert!(tasks.iter().all(|t| t.status == TaskStatus::Pending));
        assert!(tasks.iter().all(|t| t.origin == TaskOrigin::AiGenerated));
        assert_eq!(tasks[1].priority, TaskPriority::High);
        assert_eq!(tasks[0].priority, TaskPriority::Medium);
        assert_eq!(tasks[2].estimated_time, "30 minutes");
        assert!(tasks[0].files.is_empty());
    }

    #[tokio::test]
    async fn prose_without_json_is_a_format_error() {
        let err = planner_with("I could not come up with tasks, sorry.")
            .generate_tasks("demo", "nextjs", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelResponseFormat { .. }));
    }

    #[tokio::test]
    async fn empty_task_list_is_rejected() {
        let err = planner_with(r#"{"tasks": []}"#)
            .generate_tasks("demo", "nextjs", "")
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelResponseFormat { .. }));
    }
}
