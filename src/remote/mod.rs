//! Remote file host collaborator.
//!
//! The agent keeps all of its state inside a version-controlled repository on
//! a remote host. This module defines the host contract; `github` implements
//! it over the GitHub contents API and `memory` provides an in-process fake
//! for tests and local development.

pub mod github;
pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

/// A file fetched from the host: its content plus the revision token the
/// host requires to safely update or delete it.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: String,
    pub revision: String,
}

/// One entry from a directory/tree listing. Content is not included;
/// callers lazy-load it via `get_file`.
#[derive(Debug, Clone)]
pub struct RemoteEntry {
    pub path: String,
    pub revision: String,
    pub is_dir: bool,
}

/// Contract for the version-controlled file host.
///
/// All operations are whole-file; there are no multi-file transactions.
#[async_trait]
pub trait RemoteFileHost: Send + Sync {
    /// Create a repository. Not idempotent at this layer; callers check
    /// [`RemoteFileHost::repository_exists`] first.
    async fn create_repository(&self, repo: &str, description: &str) -> Result<()>;

    async fn repository_exists(&self, repo: &str) -> Result<bool>;

    /// Fetch a file. Absent files are `Ok(None)`, never an error.
    async fn get_file(&self, repo: &str, path: &str) -> Result<Option<RemoteFile>>;

    /// Create (`revision = None`) or update (`revision = Some(..)`) a file.
    /// Returns the new revision token.
    async fn put_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
        revision: Option<&str>,
    ) -> Result<String>;

    async fn delete_file(&self, repo: &str, path: &str, message: &str, revision: &str)
        -> Result<()>;

    /// List entries under `path` ("" for the root), optionally recursively.
    async fn list_contents(&self, repo: &str, path: &str, recursive: bool)
        -> Result<Vec<RemoteEntry>>;
}
