//! Task implementation: one model call produces file operations, which are
//! applied to the repository one file at a time.
//!
//! The underlying host commits one file per write, so a task is only a
//! *logical* transaction: a failure mid-task aborts the remaining files and
//! leaves earlier writes committed. That partial state is surfaced through
//! `FileOperationError`, never hidden.
//!
//! Status-transition contract: the caller persists `in-progress` before
//! calling [`TaskImplementer::implement_task`] and a terminal status after
//! it returns, so a crash mid-call shows up as a stuck in-progress task.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AgentError, Result};
use crate::indexer::{language_for_path, CodebaseIndexer};
use crate::llm::{json::extract_json_as, ModelClient};
use crate::store::RepoStateStore;
use crate::types::{FileStamp, Task, TaskRecord};

use super::prompt;

/// Files whose content is inlined into the implementation prompt.
const MAX_CONTEXT_FILES: usize = 5;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum FileAction {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Deserialize)]
struct PlannedFile {
    path: String,
    #[serde(default)]
    content: String,
    operation: FileAction,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImplementPlan {
    files: Vec<PlannedFile>,
    message: String,
    #[serde(default)]
    commit_message: Option<String>,
}

/// What a successful implementation did.
#[derive(Debug, Clone)]
pub struct ImplementOutcome {
    pub message: String,
    pub files_changed: Vec<String>,
}

pub struct TaskImplementer {
    llm: Arc<dyn ModelClient>,
    store: Arc<RepoStateStore>,
}

impl TaskImplementer {
    pub fn new(llm: Arc<dyn ModelClient>, store: Arc<RepoStateStore>) -> Self {
        Self { llm, store }
    }

    /// Implement one task: one model call, then sequential file application.
    /// On success the agent memory gains a task record, a learning entry,
    /// and an updated focus.
    pub async fn implement_task(
        &self,
        task: &Task,
        indexer: &mut CodebaseIndexer,
    ) -> Result<ImplementOutcome> {
        let metadata = self.store.get_metadata().await?;
        let mut memory = self.store.get_memory().await?;

        // Pull a bounded slice of the files the task names for context.
        let mut excerpts = Vec::new();
        for path in task.files.iter().take(MAX_CONTEXT_FILES) {
            if let Some(content) = self.store.get_file_content(path).await? {
                excerpts.push((path.clone(), content));
            }
        }

        let prompt = prompt::implement_prompt(
            task,
            metadata.as_ref(),
            &indexer.summary(),
            &excerpts,
            &memory,
        );
        let raw = self.llm.generate(&prompt).await?;
        let plan: ImplementPlan = extract_json_as(&raw)?;

        if plan.files.is_empty() {
            return Err(AgentError::bad_model_response("plan contains no files", raw));
        }
        for file in &plan.files {
            validate_path(&file.path)?;
        }

        let commit_base = plan
            .commit_message
            .clone()
            .unwrap_or_else(|| format!("Implement: {}", task.title));

        // Sequential application; later writes may depend on revision tokens
        // produced by earlier reads of the same evolving state.
        let mut files_changed = Vec::new();
        for file in &plan.files {
            self.apply_file(file, &commit_base, indexer).await?;
            files_changed.push(file.path.clone());
        }

        for path in &files_changed {
            memory.file_cache.insert(
                path.clone(),
                FileStamp {
                    revision: String::new(),
                    last_modified: Utc::now(),
                },
            );
        }
        memory.task_history.push(TaskRecord {
            id: task.id.clone(),
            title: task.title.clone(),
            completed_at: Utc::now(),
        });
        memory
            .learnings
            .insert(task.id.clone(), summarize_patterns(&plan.files));
        memory.current_focus = Some(task.title.clone());
        indexer.persist_into(&mut memory);
        self.store.save_memory(&memory).await?;

        info!(task = %task.id, files = files_changed.len(), "task implemented");
        Ok(ImplementOutcome {
            message: plan.message,
            files_changed,
        })
    }

    async fn apply_file(
        &self,
        file: &PlannedFile,
        commit_base: &str,
        indexer: &mut CodebaseIndexer,
    ) -> Result<()> {
        let message = format!("{commit_base} ({})", file.path);
        match file.operation {
            // An update to an absent file degrades to a create inside
            // save_file_content (no cached revision, host read finds none).
            FileAction::Create | FileAction::Update => {
                self.store
                    .save_file_content(&file.path, &file.content, &message)
                    .await
                    .map_err(|e| AgentError::file_op(&file.path, e.to_string()))?;
                indexer.index_file(&file.path, &file.content);
            }
            FileAction::Delete => {
                let deleted = self
                    .store
                    .delete_file(&file.path, &message)
                    .await
                    .map_err(|e| AgentError::file_op(&file.path, e.to_string()))?;
                if !deleted {
                    warn!(path = %file.path, "delete skipped; file already absent");
                }
                indexer.remove_file(&file.path);
            }
        }
        Ok(())
    }
}

fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(AgentError::file_op(path, "empty path"));
    }
    if path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
        return Err(AgentError::file_op(path, "path escapes the repository"));
    }
    Ok(())
}

/// Lightweight pattern summary of the files a task produced, stored as a
/// learning keyed by task id.
fn summarize_patterns(files: &[PlannedFile]) -> String {
    let mut languages: Vec<&str> = files
        .iter()
        .filter_map(|f| language_for_path(&f.path))
        .collect();
    languages.sort_unstable();
    languages.dedup();

    let mut notes = Vec::new();
    if files.iter().any(|f| f.content.contains("async ")) {
        notes.push("uses async");
    }
    if files
        .iter()
        .any(|f| f.content.contains("export default function") || f.content.contains("React"))
    {
        notes.push("defines React components");
    }
    if files.iter().any(|f| f.content.contains("interface ")) {
        notes.push("declares interfaces");
    }

    let mut summary = format!(
        "{} file(s) touched ({})",
        files.len(),
        if languages.is_empty() {
            "mixed".to_string()
        } else {
            languages.join(", ")
        }
    );
    if !notes.is_empty() {
        summary.push_str("; ");
        summary.push_str(&notes.join("; "));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockModel;
    use crate::remote::memory::InMemoryHost;
    use crate::types::{TaskOrigin, TaskPriority, TaskStatus};

    fn sample_task() -> Task {
        let now = Utc::now();
        Task {
            id: "task_1".into(),
            title: "Add login page".into(),
            description: "Create the login form".into(),
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
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

    async fn setup(replies: Vec<&str>) -> (TaskImplementer, Arc<RepoStateStore>, Arc<InMemoryHost>) {
        let host = Arc::new(InMemoryHost::new());
        let store = Arc::new(RepoStateStore::new(host.clone(), "demo"));
        store.ensure_repository("vercel").await.unwrap();
        let implementer = TaskImplementer::new(Arc::new(MockModel::new(replies)), store.clone());
        (implementer, store, host)
    }

    #[tokio::test]
    async fn applies_files_and_updates_memory() {
        let reply = r#"```json
{"files": [
  {"path": "src/login.ts", "content": "export function login(){}", "operation": "create"},
  {"path": "src/index.ts", "content": "import {login} from './login'", "operation": "update"}
], "message": "Added login", "commitMessage": "Add login page"}
```"#;
        let (implementer, store, host) = setup(vec![reply]).await;
        let mut indexer = CodebaseIndexer::default();

        let outcome = implementer
            .implement_task(&sample_task(), &mut indexer)
            .await
            .unwrap();

        assert_eq!(outcome.files_changed, vec!["src/login.ts", "src/index.ts"]);
        assert_eq!(
            host.raw_content("demo", "src/login.ts").await.as_deref(),
            Some("export function login(){}")
        );

        let memory = store.get_memory().await.unwrap();
        assert_eq!(memory.current_focus.as_deref(), Some("Add login page"));
        assert_eq!(memory.task_history.len(), 1);
        assert!(memory.learnings.contains_key("task_1"));
        assert!(memory.codebase_index.contains_key("src/login.ts"));
        assert!(indexer.get("src/login.ts").is_some());
    }

    #[tokio::test]
    async fn invalid_model_json_mutates_nothing() {
        let (implementer, store, host) = setup(vec!["sorry, I cannot help with that"]).await;
        let files_before = host.file_count("demo").await;
        let mut indexer = CodebaseIndexer::default();

        let err = implementer
            .implement_task(&sample_task(), &mut indexer)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::ModelResponseFormat { .. }));
        assert_eq!(host.file_count("demo").await, files_before);
        assert!(store.get_memory().await.unwrap().task_history.is_empty());
    }

    #[tokio::test]
    async fn escaping_path_is_rejected_before_any_write() {
        let reply = r#"{"files": [
  {"path": "../outside.txt", "content": "x", "operation": "create"},
  {"path": "src/ok.ts", "content": "y", "operation": "create"}
], "message": "bad"}"#;
        let (implementer, _store, host) = setup(vec![reply]).await;
        let before = host.file_count("demo").await;
        let mut indexer = CodebaseIndexer::default();

        let err = implementer
            .implement_task(&sample_task(), &mut indexer)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::FileOperation { .. }));
        assert_eq!(host.file_count("demo").await, before);
    }

    #[tokio::test]
    async fn delete_of_absent_file_is_skipped() {
        let reply = r#"{"files": [
  {"path": "src/old.ts", "operation": "delete"}
], "message": "Removed dead code"}"#;
        let (implementer, _store, _host) = setup(vec![reply]).await;
        let mut indexer = CodebaseIndexer::default();
        let outcome = implementer
            .implement_task(&sample_task(), &mut indexer)
            .await
            .unwrap();
        assert_eq!(outcome.files_changed, vec!["src/old.ts"]);
    }

    #[tokio::test]
    async fn summarize_patterns_names_language_and_traits() {
        let files = vec![PlannedFile {
            path: "src/app.tsx".into(),
            content: "export default function App(){ return <div/> }".into(),
            operation: FileAction::Create,
        }];
        let summary = summarize_patterns(&files);
        assert!(summary.contains("typescript"));
        assert!(summary.contains("React"));
    }
}
