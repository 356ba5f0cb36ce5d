//! Repository-backed state storage.
//!
//! Every piece of durable agent state (tasks, metadata, memory, logs) is one
//! JSON document at a fixed path inside the target repository. Consistency
//! is whole-document: concurrent writers are last-writer-wins, with no lock
//! and no merge. The path/revision cache is instance-scoped; each stateless
//! invocation starts cold and re-populates it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::Result;
use crate::remote::RemoteFileHost;
use crate::types::{
    AgentMemory, DeploymentLogEntry, ProjectConfigDoc, ProjectMetadata, Task, TaskPatch,
    MAX_DEPLOY_LOG_ENTRIES,
};

/// Fixed document paths inside the target repository.
pub const CONFIG_DOC: &str = ".prodev/config.json";
pub const TASKS_DOC: &str = ".prodev/tasks.json";
pub const METADATA_DOC: &str = ".prodev/metadata.json";
pub const MEMORY_DOC: &str = ".prodev/agent-memory.json";
pub const DEPLOY_LOG_DOC: &str = ".prodev/deployment-logs.json";

#[derive(Debug, Clone)]
struct CachedFile {
    /// `None` when only the revision token is known (lazy content load).
    content: Option<String>,
    revision: String,
    last_modified: DateTime<Utc>,
}

/// Durable JSON-document storage layered over the remote file host.
pub struct RepoStateStore {
    host: Arc<dyn RemoteFileHost>,
    repo: String,
    cache: RwLock<HashMap<String, CachedFile>>,
}

impl RepoStateStore {
    pub fn new(host: Arc<dyn RemoteFileHost>, repo: impl Into<String>) -> Self {
        Self {
            host,
            repo: repo.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Create the repository if it does not exist, and write the initial
    /// marker document. Idempotent.
    pub async fn ensure_repository(&self, platform: &str) -> Result<()> {
        if self.host.repository_exists(&self.repo).await? {
            return Ok(());
        }
        debug!(repo = %self.repo, "creating repository");
        self.host
            .create_repository(&self.repo, "Managed by prodev-agent")
            .await?;
        let marker = ProjectConfigDoc {
            version: "1.0".to_string(),
            platform: platform.to_string(),
            created_at: Utc::now(),
        };
        self.save_document(CONFIG_DOC, &marker, "Initialize agent state")
            .await
    }

    /// Read a JSON document. Absent or invalid content is `Ok(None)` — a
    /// fresh repository simply has no state yet.
    pub async fn get_document(&self, path: &str) -> Result<Option<Value>> {
        let Some(content) = self.get_file_content(path).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&content) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(path, error = %e, "state document is not valid JSON; treating as absent");
                Ok(None)
            }
        }
    }

    /// Typed variant of [`RepoStateStore::get_document`].
    pub async fn get_document_as<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(value) = self.get_document(path).await? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(e) => {
                warn!(path, error = %e, "state document has unexpected shape; treating as absent");
                Ok(None)
            }
        }
    }

    /// Serialize and write a JSON document, updating in place when a
    /// revision token is known and creating otherwise.
    pub async fn save_document<T: Serialize>(
        &self,
        path: &str,
        value: &T,
        message: &str,
    ) -> Result<()> {
        let content = serde_json::to_string_pretty(value)?;
        self.save_file_content(path, &content, message).await
    }

    /// Read raw file text, via the cache when the content was seen in this
    /// process lifetime.
    pub async fn get_file_content(&self, path: &str) -> Result<Option<String>> {
        if let Some(cached) = self.cache.read().await.get(path) {
            if let Some(content) = &cached.content {
                return Ok(Some(content.clone()));
            }
        }
        match self.host.get_file(&self.repo, path).await? {
            Some(file) => {
                self.cache.write().await.insert(
                    path.to_string(),
                    CachedFile {
                        content: Some(file.content.clone()),
                        revision: file.revision,
                        last_modified: Utc::now(),
                    },
                );
                Ok(Some(file.content))
            }
            None => Ok(None),
        }
    }

    /// Write raw file text. Uses the cached revision token for an update and
    /// falls back to reading the host (then to create) when none is cached.
    pub async fn save_file_content(&self, path: &str, content: &str, message: &str) -> Result<()> {
        let cached_revision = self
            .cache
            .read()
            .await
            .get(path)
            .map(|c| c.revision.clone());

        let revision = match cached_revision {
            Some(rev) => Some(rev),
            None => self
                .host
                .get_file(&self.repo, path)
                .await?
                .map(|f| f.revision),
        };

        let new_revision = self
            .host
            .put_file(&self.repo, path, content, message, revision.as_deref())
            .await?;

        self.cache.write().await.insert(
            path.to_string(),
            CachedFile {
                content: Some(content.to_string()),
                revision: new_revision,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    /// Delete a file. Deleting an absent file is a no-op (idempotent).
    pub async fn delete_file(&self, path: &str, message: &str) -> Result<bool> {
        let cached_revision = self
            .cache
            .read()
            .await
            .get(path)
            .map(|c| c.revision.clone());
        let revision = match cached_revision {
            Some(rev) => Some(rev),
            None => self
                .host
                .get_file(&self.repo, path)
                .await?
                .map(|f| f.revision),
        };
        let Some(revision) = revision else {
            return Ok(false);
        };
        self.host
            .delete_file(&self.repo, path, message, &revision)
            .await?;
        self.cache.write().await.remove(path);
        Ok(true)
    }

    /// List all file paths, populating the cache with revision tokens but
    /// not content (content is lazy-loaded on read).
    pub async fn list_all_files(&self, recursive: bool) -> Result<Vec<String>> {
        let entries = self.host.list_contents(&self.repo, "", recursive).await?;
        let mut cache = self.cache.write().await;
        let mut paths = Vec::new();
        for entry in entries {
            if entry.is_dir {
                continue;
            }
            cache
                .entry(entry.path.clone())
                .and_modify(|c| c.revision = entry.revision.clone())
                .or_insert(CachedFile {
                    content: None,
                    revision: entry.revision,
                    last_modified: Utc::now(),
                });
            paths.push(entry.path);
        }
        Ok(paths)
    }

    // ---- Typed accessors over the fixed documents ----

    /// The task backlog; `[]` when no document exists yet.
    pub async fn get_tasks(&self) -> Result<Vec<Task>> {
        Ok(self
            .get_document_as::<Vec<Task>>(TASKS_DOC)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_tasks(&self, tasks: &[Task], message: &str) -> Result<()> {
        self.save_document(TASKS_DOC, &tasks, message).await
    }

    pub async fn create_task(&self, task: Task) -> Result<()> {
        let mut tasks = self.get_tasks().await?;
        let title = task.title.clone();
        tasks.push(task);
        self.save_tasks(&tasks, &format!("Add task: {title}")).await
    }

    /// Patch one task by id, bumping its `updatedAt`. Returns the updated
    /// task, or `None` when the id is unknown.
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> Result<Option<Task>> {
        let mut tasks = self.get_tasks().await?;
        let Some(task) = tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };
        task.apply_patch(patch);
        let updated = task.clone();
        self.save_tasks(&tasks, &format!("Update task {id}")).await?;
        Ok(Some(updated))
    }

    /// Remove one task by id, rewriting the whole list (no soft delete).
    pub async fn delete_task(&self, id: &str) -> Result<bool> {
        let mut tasks = self.get_tasks().await?;
        let before = tasks.len();
        tasks.retain(|t| t.id != id);
        if tasks.len() == before {
            return Ok(false);
        }
        self.save_tasks(&tasks, &format!("Delete task {id}")).await?;
        Ok(true)
    }

    pub async fn get_metadata(&self) -> Result<Option<ProjectMetadata>> {
        self.get_document_as(METADATA_DOC).await
    }

    pub async fn save_metadata(&self, metadata: &ProjectMetadata) -> Result<()> {
        self.save_document(METADATA_DOC, metadata, "Update project metadata")
            .await
    }

    /// Agent memory; a default (empty) memory when none is stored yet.
    pub async fn get_memory(&self) -> Result<AgentMemory> {
        Ok(self
            .get_document_as::<AgentMemory>(MEMORY_DOC)
            .await?
            .unwrap_or_default())
    }

    pub async fn save_memory(&self, memory: &AgentMemory) -> Result<()> {
        self.save_document(MEMORY_DOC, memory, "Update agent memory")
            .await
    }

    /// Append to the deployment log, trimming oldest-first past the cap.
    pub async fn append_deployment_log(&self, entry: DeploymentLogEntry) -> Result<()> {
        let mut log = self
            .get_document_as::<Vec<DeploymentLogEntry>>(DEPLOY_LOG_DOC)
            .await?
            .unwrap_or_default();
        log.push(entry);
        if log.len() > MAX_DEPLOY_LOG_ENTRIES {
            let excess = log.len() - MAX_DEPLOY_LOG_ENTRIES;
            log.drain(..excess);
        }
        self.save_document(DEPLOY_LOG_DOC, &log, "Record deployment")
            .await
    }

    /// Paths touched most recently in this process, newest first. Feeds the
    /// autonomous fix action.
    pub async fn recently_touched(&self, limit: usize) -> Vec<String> {
        let cache = self.cache.read().await;
        let mut entries: Vec<(&String, DateTime<Utc>)> = cache
            .iter()
            .map(|(path, c)| (path, c.last_modified))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
            .into_iter()
            .take(limit)
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::InMemoryHost;
    use crate::types::{TaskOrigin, TaskPriority, TaskStatus};

    fn sample_task(id: &str, title: &str) -> Task {
        let created = Utc::now() - chrono::Duration::minutes(5);
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: "desc".to_string(),
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            origin: TaskOrigin::Manual,
            estimated_time: "1 hour".to_string(),
            created_at: created,
            updated_at: created,
            files: vec![],
            dependencies: vec![],
            acceptance_criteria: vec![],
            technical_notes: None,
        }
    }

    async fn fresh_store() -> RepoStateStore {
        let host = Arc::new(InMemoryHost::new());
        let store = RepoStateStore::new(host, "demo-project");
        store.ensure_repository("vercel").await.unwrap();
        store
    }

    #[tokio::test]
    async fn ensure_repository_is_idempotent_and_writes_marker() {
        let store = fresh_store().await;
        store.ensure_repository("vercel").await.unwrap();
        let marker: ProjectConfigDoc = store
            .get_document_as(CONFIG_DOC)
            .await
            .unwrap()
            .expect("marker document");
        assert_eq!(marker.platform, "vercel");
        assert_eq!(marker.version, "1.0");
    }

    #[tokio::test]
    async fn document_round_trips_structurally_equal() {
        let store = fresh_store().await;
        let value = serde_json::json!({"nested": {"a": [1, 2, 3]}, "flag": true});
        store
            .save_document(".prodev/custom.json", &value, "save")
            .await
            .unwrap();
        let loaded = store.get_document(".prodev/custom.json").await.unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[tokio::test]
    async fn invalid_document_reads_as_absent() {
        let store = fresh_store().await;
        store
            .save_file_content(".prodev/bad.json", "{not json", "save")
            .await
            .unwrap();
        assert!(store.get_document(".prodev/bad.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tasks_absent_then_create_then_list() {
        // Scenario: no tasks document yet.
        let store = fresh_store().await;
        assert!(store.get_tasks().await.unwrap().is_empty());

        store
            .create_task(sample_task("task_1", "Add login"))
            .await
            .unwrap();
        let tasks = store.get_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "task_1");
        assert_eq!(tasks[0].title, "Add login");
    }

    #[tokio::test]
    async fn update_task_changes_only_patched_fields() {
        let store = fresh_store().await;
        store
            .create_task(sample_task("task_1", "Add login"))
            .await
            .unwrap();
        let before = store.get_tasks().await.unwrap()[0].clone();

        let updated = store
            .update_task(
                "task_1",
                TaskPatch {
                    status: Some(TaskStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .expect("task exists");

        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.title, before.title);
        assert_eq!(updated.description, before.description);
        assert!(updated.updated_at > before.updated_at);

        let stored = store.get_tasks().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn delete_task_rewrites_whole_list() {
        let store = fresh_store().await;
        store.create_task(sample_task("task_1", "a")).await.unwrap();
        store.create_task(sample_task("task_2", "b")).await.unwrap();
        assert!(store.delete_task("task_1").await.unwrap());
        assert!(!store.delete_task("task_1").await.unwrap());
        let tasks = store.get_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "task_2");
    }

    #[tokio::test]
    async fn delete_absent_file_is_a_noop() {
        let store = fresh_store().await;
        assert!(!store.delete_file("nope.txt", "remove").await.unwrap());
    }

    #[tokio::test]
    async fn deployment_log_is_capped_oldest_first() {
        let store = fresh_store().await;
        for i in 0..105 {
            store
                .append_deployment_log(DeploymentLogEntry {
                    platform: "vercel".into(),
                    success: true,
                    url: Some(format!("https://demo-{i}.vercel.app")),
                    error: None,
                    timestamp: Utc::now(),
                })
                .await
                .unwrap();
        }
        let log: Vec<DeploymentLogEntry> = store
            .get_document_as(DEPLOY_LOG_DOC)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(log.len(), MAX_DEPLOY_LOG_ENTRIES);
        assert_eq!(log[0].url.as_deref(), Some("https://demo-5.vercel.app"));
    }

    #[tokio::test]
    async fn list_all_files_populates_revisions_without_content() {
        let store = fresh_store().await;
        store
            .save_file_content("src/a.ts", "const a = 1;", "add")
            .await
            .unwrap();
        let paths = store.list_all_files(true).await.unwrap();
        assert!(paths.contains(&"src/a.ts".to_string()));
    }

    #[tokio::test]
    async fn memory_defaults_when_absent_and_round_trips() {
        let store = fresh_store().await;
        let mut memory = store.get_memory().await.unwrap();
        assert!(memory.conversation_history.is_empty());
        memory.record_exchange("hi", "hello");
        memory
            .learnings
            .insert("task_1".into(), "uses react components".into());
        store.save_memory(&memory).await.unwrap();
        let loaded = store.get_memory().await.unwrap();
        assert_eq!(loaded, memory);
    }
}
