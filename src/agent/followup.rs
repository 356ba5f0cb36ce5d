//! Autonomous follow-up: a bounded chain of concrete actions executed
//! because a prior reply stated an unfulfilled intention.
//!
//! The loop is an explicit state machine with a hard iteration ceiling.
//! Each round inspects the last message for a trigger phrase, executes the
//! matched action, and feeds the action's result back in as the new last
//! message while the action reports more work.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info};

use crate::deploy::DeployClient;
use crate::error::Result;
use crate::indexer::CodebaseIndexer;
use crate::jsonfix;
use crate::search::SearchProvider;
use crate::store::{RepoStateStore, CONFIG_DOC};
use crate::types::{ProjectConfigDoc, TaskStatus};

use super::batch::{BatchRunner, FOLLOW_UP_BATCH_CAP};

/// Hard ceiling on chained follow-up rounds per invocation.
pub const MAX_FOLLOW_UP_ROUNDS: usize = 5;

/// Recently-touched files scanned by the fix action.
const FIX_SCAN_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUpState {
    Idle,
    AwaitingAction,
    Done,
}

/// Result of one follow-up action.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpOutcome {
    pub result_text: String,
    pub needs_more_follow_up: bool,
}

/// Everything one invocation of the loop did.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRun {
    pub outcomes: Vec<FollowUpOutcome>,
    /// True when the iteration ceiling cut the chain short.
    pub hit_ceiling: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum FollowUpAction {
    CheckFile(String),
    ImplementPending,
    FixRecentFiles,
    Deploy,
    Search(String),
    StatusSummary,
}

pub struct AutonomousFollowUp {
    store: Arc<RepoStateStore>,
    batch: BatchRunner,
    search: Arc<dyn SearchProvider>,
    deploy: Arc<dyn DeployClient>,
}

impl AutonomousFollowUp {
    pub fn new(
        store: Arc<RepoStateStore>,
        batch: BatchRunner,
        search: Arc<dyn SearchProvider>,
        deploy: Arc<dyn DeployClient>,
    ) -> Self {
        Self {
            store,
            batch,
            search,
            deploy,
        }
    }

    /// Run the follow-up chain starting from `last_reply`.
    pub async fn run(&self, last_reply: &str, indexer: &mut CodebaseIndexer) -> Result<FollowUpRun> {
        let mut state = FollowUpState::Idle;
        let mut last = last_reply.to_string();
        let mut outcomes = Vec::new();

        for round in 0..MAX_FOLLOW_UP_ROUNDS {
            let action = detect_action(&last);
            debug!(round, ?action, "follow-up round");
            let outcome = self.execute(&action, indexer).await?;
            last = outcome.result_text.clone();
            let more = outcome.needs_more_follow_up;
            outcomes.push(outcome);
            state = if more {
                FollowUpState::AwaitingAction
            } else {
                FollowUpState::Done
            };
            if state == FollowUpState::Done {
                break;
            }
        }

        let hit_ceiling = state != FollowUpState::Done;
        if hit_ceiling {
            info!("follow-up chain stopped at the iteration ceiling");
        }
        Ok(FollowUpRun {
            outcomes,
            hit_ceiling,
        })
    }

    async fn execute(
        &self,
        action: &FollowUpAction,
        indexer: &mut CodebaseIndexer,
    ) -> Result<FollowUpOutcome> {
        match action {
            FollowUpAction::CheckFile(path) => self.check_file(path).await,
            FollowUpAction::ImplementPending => self.implement_pending(indexer).await,
            FollowUpAction::FixRecentFiles => self.fix_recent_files().await,
            FollowUpAction::Deploy => self.trigger_deploy().await,
            FollowUpAction::Search(query) => Ok(FollowUpOutcome {
                result_text: self.search.search(query).await,
                needs_more_follow_up: false,
            }),
            FollowUpAction::StatusSummary => self.status_summary().await,
        }
    }

    async fn check_file(&self, path: &str) -> Result<FollowUpOutcome> {
        let Some(content) = self.store.get_file_content(path).await? else {
            return Ok(FollowUpOutcome {
                result_text: format!("'{path}' does not exist in the repository."),
                needs_more_follow_up: false,
            });
        };
        if !path.ends_with(".json") {
            return Ok(FollowUpOutcome {
                result_text: format!("'{path}' exists ({} bytes).", content.len()),
                needs_more_follow_up: false,
            });
        }
        match jsonfix::validate(&content) {
            Ok(()) => Ok(FollowUpOutcome {
                result_text: format!("'{path}' is valid JSON."),
                needs_more_follow_up: false,
            }),
            Err(issue) => Ok(FollowUpOutcome {
                result_text: format!(
                    "Found a JSON parsing issue in '{path}': {issue}. I'll fix it."
                ),
                needs_more_follow_up: true,
            }),
        }
    }

    async fn implement_pending(&self, indexer: &mut CodebaseIndexer) -> Result<FollowUpOutcome> {
        let report = self.batch.implement_all(FOLLOW_UP_BATCH_CAP, indexer).await?;
        let mut text = format!(
            "Implemented {} task(s): {} completed, {} failed.",
            report.results.len(),
            report.completed,
            report.failed
        );
        let needs_more = report.remaining_pending > 0;
        if needs_more {
            text.push_str(&format!(
                " {} task(s) still pending. I'll implement the next batch.",
                report.remaining_pending
            ));
        }
        Ok(FollowUpOutcome {
            result_text: text,
            needs_more_follow_up: needs_more,
        })
    }

    async fn fix_recent_files(&self) -> Result<FollowUpOutcome> {
        let recent = self.store.recently_touched(FIX_SCAN_LIMIT).await;
        let mut fixed = Vec::new();
        let mut unfixable = Vec::new();

        for path in recent.iter().filter(|p| p.ends_with(".json")) {
            let Some(content) = self.store.get_file_content(path).await? else {
                continue;
            };
            if jsonfix::validate(&content).is_ok() {
                continue;
            }
            let repaired = jsonfix::repair(&content);
            if jsonfix::validate(&repaired).is_ok() {
                self.store
                    .save_file_content(path, &repaired, &format!("Fix JSON syntax in {path}"))
                    .await?;
                fixed.push(path.clone());
            } else {
                unfixable.push(path.clone());
            }
        }

        let result_text = if fixed.is_empty() && unfixable.is_empty() {
            "No JSON issues found in recently touched files.".to_string()
        } else if unfixable.is_empty() {
            format!("Repaired JSON syntax in: {}.", fixed.join(", "))
        } else {
            format!(
                "Repaired: {}. Could not auto-repair: {}.",
                if fixed.is_empty() {
                    "none".to_string()
                } else {
                    fixed.join(", ")
                },
                unfixable.join(", ")
            )
        };
        Ok(FollowUpOutcome {
            result_text,
            needs_more_follow_up: false,
        })
    }

    async fn trigger_deploy(&self) -> Result<FollowUpOutcome> {
        let platform = self
            .store
            .get_document_as::<ProjectConfigDoc>(CONFIG_DOC)
            .await?
            .map(|c| c.platform)
            .unwrap_or_else(|| "vercel".to_string());

        let result = self.deploy.deploy(self.store.repo(), &platform).await;
        self.store
            .append_deployment_log(crate::types::DeploymentLogEntry {
                platform: platform.clone(),
                success: result.success,
                url: result.url.clone(),
                error: result.error.clone(),
                timestamp: chrono::Utc::now(),
            })
            .await?;

        let result_text = if result.success {
            format!(
                "Deployment to {platform} triggered: {}",
                result.url.unwrap_or_else(|| "(no url reported)".to_string())
            )
        } else {
            format!(
                "Deployment to {platform} failed: {}",
                result.error.unwrap_or_else(|| "unknown error".to_string())
            )
        };
        Ok(FollowUpOutcome {
            result_text,
            needs_more_follow_up: false,
        })
    }

    async fn status_summary(&self) -> Result<FollowUpOutcome> {
        let tasks = self.store.get_tasks().await?;
        let pending = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .count();
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        Ok(FollowUpOutcome {
            result_text: format!(
                "Status: {pending} task(s) pending, {completed} completed. No further action queued."
            ),
            needs_more_follow_up: false,
        })
    }
}

/// Map a reply to the action its stated intention implies. Triggers are
/// checked in fixed priority order.
fn detect_action(reply: &str) -> FollowUpAction {
    let lowered = reply.to_lowercase();

    if lowered.contains("i'll check") || lowered.contains("i'll examine") {
        if let Some(path) = extract_filename(reply) {
            return FollowUpAction::CheckFile(path);
        }
    }
    if lowered.contains("i'll implement") || lowered.contains("implement all") {
        return FollowUpAction::ImplementPending;
    }
    if lowered.contains("i'll fix") || lowered.contains("i'll validate") {
        return FollowUpAction::FixRecentFiles;
    }
    if lowered.contains("i'll deploy") || lowered.contains("i'll redeploy") {
        return FollowUpAction::Deploy;
    }
    for phrase in ["i'll search", "i'll look up"] {
        if let Some(at) = lowered.find(phrase) {
            let query = lowered[at + phrase.len()..]
                .trim()
                .trim_start_matches("for ")
                .trim_end_matches(['.', '!'])
                .to_string();
            if !query.is_empty() {
                return FollowUpAction::Search(query);
            }
        }
    }
    FollowUpAction::StatusSummary
}

/// First filename-looking token in the reply.
fn extract_filename(reply: &str) -> Option<String> {
    // Pattern is literal; unwrap cannot fail.
    let re = Regex::new(r"[\w@./-]+\.(?:json|tsx?|jsx?|md|ya?ml|txt|css|html)").unwrap();
    re.find(reply).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::implementer::TaskImplementer;
    use crate::deploy::{DeployResult, FixedDeploy};
    use crate::llm::MockModel;
    use crate::remote::memory::InMemoryHost;
    use crate::search::FixedSearch;
    use crate::types::{Task, TaskOrigin, TaskPriority};
    use chrono::Utc;

    fn pending_task(i: usize) -> Task {
        let now = Utc::now();
        Task {
            id: format!("task_{i}"),
            title: format!("Task {i}"),
            description: "work".into(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            origin: TaskOrigin::AiGenerated,
            estimated_time: "1 hour".into(),
            created_at: now,
            updated_at: now,
            files: vec![],
            dependencies: vec![],
            acceptance_criteria: vec![],
            technical_notes: None,
        }
    }

    async fn setup(model_replies: Vec<String>) -> (AutonomousFollowUp, Arc<RepoStateStore>) {
        let host = Arc::new(InMemoryHost::new());
        let store = Arc::new(RepoStateStore::new(host, "demo"));
        store.ensure_repository("vercel").await.unwrap();
        let llm = Arc::new(MockModel::new(model_replies));
        let implementer = TaskImplementer::new(llm, store.clone());
        let batch = BatchRunner::new(implementer, store.clone());
        let followup = AutonomousFollowUp::new(
            store.clone(),
            batch,
            Arc::new(FixedSearch("search results".into())),
            Arc::new(FixedDeploy(DeployResult {
                success: true,
                url: Some("https://demo.vercel.app".into()),
                error: None,
            })),
        );
        (followup, store)
    }

    #[test]
    fn detects_trigger_phrases() {
        assert_eq!(
            detect_action("I'll check package.json for errors"),
            FollowUpAction::CheckFile("package.json".into())
        );
        assert_eq!(
            detect_action("Next, I'll implement the remaining tasks"),
            FollowUpAction::ImplementPending
        );
        assert_eq!(detect_action("I'll fix those files"), FollowUpAction::FixRecentFiles);
        assert_eq!(detect_action("I'll deploy the site now"), FollowUpAction::Deploy);
        assert_eq!(
            detect_action("I'll search for axum examples."),
            FollowUpAction::Search("axum examples".into())
        );
        assert_eq!(
            detect_action("All done, nothing else to report"),
            FollowUpAction::StatusSummary
        );
    }

    #[tokio::test]
    async fn broken_json_check_reports_issue_and_continues() {
        let (followup, store) = setup(vec![]).await;
        store
            .save_file_content("package.json", "{\"name\": \"demo\",}", "seed")
            .await
            .unwrap();
        let mut indexer = CodebaseIndexer::default();

        let run = followup
            .run("I'll check package.json for errors", &mut indexer)
            .await
            .unwrap();

        assert!(run.outcomes[0].result_text.contains("JSON parsing issue"));
        assert!(run.outcomes[0].needs_more_follow_up);
        // The chain continues into the fix action and repairs the file.
        assert!(run.outcomes.len() >= 2);
        let repaired = store.get_file_content("package.json").await.unwrap().unwrap();
        assert!(crate::jsonfix::validate(&repaired).is_ok());
    }

    #[tokio::test]
    async fn valid_json_check_ends_the_chain() {
        let (followup, store) = setup(vec![]).await;
        store
            .save_file_content("package.json", "{\"name\": \"demo\"}", "seed")
            .await
            .unwrap();
        let mut indexer = CodebaseIndexer::default();
        let run = followup
            .run("I'll check package.json now", &mut indexer)
            .await
            .unwrap();
        assert_eq!(run.outcomes.len(), 1);
        assert!(run.outcomes[0].result_text.contains("valid JSON"));
        assert!(!run.hit_ceiling);
    }

    #[tokio::test]
    async fn implement_chain_is_bounded_by_the_ceiling() {
        // 30 pending tasks and a model that always answers with a valid
        // plan: each round implements 2 and announces more, so only the
        // ceiling stops the chain.
        let replies: Vec<String> = (0..(MAX_FOLLOW_UP_ROUNDS * FOLLOW_UP_BATCH_CAP))
            .map(|i| {
                format!(
                    r#"{{"files": [{{"path": "src/f{i}.ts", "content": "export function f{i}(){{}}", "operation": "create"}}], "message": "done"}}"#
                )
            })
            .collect();
        let (followup, store) = setup(replies).await;
        let tasks: Vec<Task> = (0..30).map(pending_task).collect();
        store.save_tasks(&tasks, "seed").await.unwrap();
        let mut indexer = CodebaseIndexer::default();

        let run = followup
            .run("I'll implement all pending tasks", &mut indexer)
            .await
            .unwrap();

        assert_eq!(run.outcomes.len(), MAX_FOLLOW_UP_ROUNDS);
        assert!(run.hit_ceiling);
        let completed = store
            .get_tasks()
            .await
            .unwrap()
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        assert_eq!(completed, MAX_FOLLOW_UP_ROUNDS * FOLLOW_UP_BATCH_CAP);
    }

    #[tokio::test]
    async fn deploy_action_appends_to_the_log() {
        let (followup, store) = setup(vec![]).await;
        let mut indexer = CodebaseIndexer::default();
        let run = followup
            .run("Everything is ready, I'll deploy now.", &mut indexer)
            .await
            .unwrap();
        assert!(run.outcomes[0].result_text.contains("https://demo.vercel.app"));

        let log: Vec<crate::types::DeploymentLogEntry> = store
            .get_document_as(crate::store::DEPLOY_LOG_DOC)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].success);
    }

    #[tokio::test]
    async fn unmatched_reply_gets_a_status_summary() {
        let (followup, store) = setup(vec![]).await;
        store
            .save_tasks(&[pending_task(0), pending_task(1)], "seed")
            .await
            .unwrap();
        let mut indexer = CodebaseIndexer::default();
        let run = followup
            .run("The feature is complete.", &mut indexer)
            .await
            .unwrap();
        assert_eq!(run.outcomes.len(), 1);
        assert!(run.outcomes[0].result_text.contains("2 task(s) pending"));
    }
}
