//! Persisted data model.
//!
//! Every document lives as one JSON blob at a fixed path inside the target
//! repository (see `store`). Field names serialize in camelCase so documents
//! round-trip against repositories written by earlier agent versions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation history is FIFO-trimmed to this many entries.
pub const MAX_CONVERSATION_ENTRIES: usize = 50;

/// Deployment log is trimmed oldest-first past this many entries.
pub const MAX_DEPLOY_LOG_ENTRIES: usize = 100;

/// Lifecycle of a task. A crash mid-implementation is observable as a task
/// stuck in `InProgress` rather than silently pending.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// Where a task came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskOrigin {
    AiGenerated,
    Manual,
}

/// One unit of planned work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(rename = "type")]
    pub origin: TaskOrigin,
    /// Free-form estimate, e.g. "2 hours".
    pub estimated_time: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub files: Vec<String>,
    /// Ids of tasks this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acceptance_criteria: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_notes: Option<String>,
}

/// Partial update for a task; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub estimated_time: Option<String>,
    pub files: Option<Vec<String>>,
    pub dependencies: Option<Vec<String>>,
    pub acceptance_criteria: Option<Vec<String>>,
    pub technical_notes: Option<String>,
}

impl Task {
    /// Apply a patch in place, bumping `updated_at`.
    pub fn apply_patch(&mut self, patch: TaskPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(estimated_time) = patch.estimated_time {
            self.estimated_time = estimated_time;
        }
        if let Some(files) = patch.files {
            self.files = files;
        }
        if let Some(dependencies) = patch.dependencies {
            self.dependencies = dependencies;
        }
        if let Some(acceptance_criteria) = patch.acceptance_criteria {
            self.acceptance_criteria = acceptance_criteria;
        }
        if let Some(technical_notes) = patch.technical_notes {
            self.technical_notes = Some(technical_notes);
        }
        self.updated_at = Utc::now();
    }
}

/// One project-level metadata document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    pub name: String,
    pub description: String,
    pub framework: String,
    /// Percentage 0-100.
    pub progress: u8,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One turn of conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A completed task as remembered by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub completed_at: DateTime<Utc>,
}

/// Per-file lexical metadata produced by the indexer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    pub language: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub exports: Vec<String>,
    #[serde(default)]
    pub functions: Vec<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    pub last_modified: DateTime<Utc>,
}

/// Revision stamp kept per file in agent memory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileStamp {
    pub revision: String,
    pub last_modified: DateTime<Utc>,
}

/// The durable per-project record of conversation, learnings, and derived
/// context. Read-modify-written as a whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentMemory {
    pub conversation_history: Vec<ChatEntry>,
    pub task_history: Vec<TaskRecord>,
    /// Short per-path notes the agent keeps about the codebase.
    pub code_context: HashMap<String, String>,
    /// Lightweight pattern summaries keyed by task id.
    pub learnings: HashMap<String, String>,
    pub current_focus: Option<String>,
    pub file_cache: HashMap<String, FileStamp>,
    pub codebase_index: HashMap<String, IndexEntry>,
    pub user_preferences: HashMap<String, String>,
    pub project_insights: Vec<String>,
}

impl AgentMemory {
    /// Append one history entry, trimming to the most recent
    /// [`MAX_CONVERSATION_ENTRIES`] in original order.
    pub fn push_history(&mut self, role: &str, content: &str) {
        self.conversation_history.push(ChatEntry {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        if self.conversation_history.len() > MAX_CONVERSATION_ENTRIES {
            let excess = self.conversation_history.len() - MAX_CONVERSATION_ENTRIES;
            self.conversation_history.drain(..excess);
        }
    }

    /// Record one user/assistant exchange.
    pub fn record_exchange(&mut self, user: &str, assistant: &str) {
        self.push_history("user", user);
        self.push_history("assistant", assistant);
    }
}

/// Marker document written when the repository is initialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfigDoc {
    pub version: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

/// One deployment attempt, kept in the capped deployment log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentLogEntry {
    pub platform: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}
