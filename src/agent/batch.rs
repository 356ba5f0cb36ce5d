//! Bounded batch execution of pending tasks.
//!
//! One invocation processes at most `cap` pending tasks sequentially and
//! leaves the rest for a future invocation, keeping a single request inside
//! its time budget. Task outcomes are independent: one failure does not stop
//! the batch.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::Result;
use crate::indexer::CodebaseIndexer;
use crate::store::RepoStateStore;
use crate::types::{Task, TaskPatch, TaskStatus};

use super::implementer::TaskImplementer;

/// Cap for an explicit bulk request.
pub const BULK_BATCH_CAP: usize = 5;
/// Cap when triggered from an autonomous follow-up.
pub const FOLLOW_UP_BATCH_CAP: usize = 2;

/// Per-task result within a batch.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub task_id: String,
    pub title: String,
    pub success: bool,
    pub detail: String,
}

/// Aggregate result of one batch invocation.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub results: Vec<TaskOutcome>,
    pub completed: usize,
    pub failed: usize,
    /// Pending tasks left for a future invocation.
    pub remaining_pending: usize,
}

pub struct BatchRunner {
    implementer: TaskImplementer,
    store: Arc<RepoStateStore>,
}

impl BatchRunner {
    pub fn new(implementer: TaskImplementer, store: Arc<RepoStateStore>) -> Self {
        Self { implementer, store }
    }

    /// Implement one task by id, with the full status-transition contract:
    /// `in-progress` is persisted before the model call, a terminal status
    /// after.
    pub async fn implement_one(
        &self,
        task_id: &str,
        indexer: &mut CodebaseIndexer,
    ) -> Result<Option<TaskOutcome>> {
        let tasks = self.store.get_tasks().await?;
        let Some(task) = tasks.into_iter().find(|t| t.id == task_id) else {
            return Ok(None);
        };
        Ok(Some(self.run_with_transitions(task, indexer).await?))
    }

    /// Process at most `cap` pending tasks. Remaining pending tasks are left
    /// untouched in storage.
    pub async fn implement_all(
        &self,
        cap: usize,
        indexer: &mut CodebaseIndexer,
    ) -> Result<BatchReport> {
        let tasks = self.store.get_tasks().await?;
        let pending: Vec<Task> = tasks
            .into_iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect();
        let total_pending = pending.len();
        let batch: Vec<Task> = pending.into_iter().take(cap).collect();

        let mut report = BatchReport::default();
        for task in batch {
            let outcome = self.run_with_transitions(task, indexer).await?;
            if outcome.success {
                report.completed += 1;
            } else {
                report.failed += 1;
            }
            report.results.push(outcome);
        }
        report.remaining_pending = total_pending - report.results.len();
        info!(
            completed = report.completed,
            failed = report.failed,
            remaining = report.remaining_pending,
            "batch finished"
        );
        Ok(report)
    }

    async fn run_with_transitions(
        &self,
        task: Task,
        indexer: &mut CodebaseIndexer,
    ) -> Result<TaskOutcome> {
        self.store
            .update_task(
                &task.id,
                TaskPatch {
                    status: Some(TaskStatus::InProgress),
                    ..Default::default()
                },
            )
            .await?;

        let (success, detail) = match self.implementer.implement_task(&task, indexer).await {
            Ok(outcome) => (true, outcome.message),
            Err(e) => {
                error!(task = %task.id, error = %e, "task implementation failed");
                (false, e.to_string())
            }
        };

        self.store
            .update_task(
                &task.id,
                TaskPatch {
                    status: Some(if success {
                        TaskStatus::Completed
                    } else {
                        TaskStatus::Failed
                    }),
                    ..Default::default()
                },
            )
            .await?;

        Ok(TaskOutcome {
            task_id: task.id,
            title: task.title,
            success,
            detail,
        })
    }
}
