//! In-memory file host (non-persistent).
//!
//! Mirrors the GitHub contract closely enough for tests: creating over an
//! existing file without a revision token is rejected (422), and updating
//! with a stale token is rejected (409).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AgentError, Result};

use super::{RemoteEntry, RemoteFile, RemoteFileHost};

#[derive(Debug, Clone)]
struct StoredFile {
    content: String,
    revision: String,
}

#[derive(Clone, Default)]
pub struct InMemoryHost {
    repos: Arc<RwLock<HashMap<String, HashMap<String, StoredFile>>>>,
    counter: Arc<AtomicU64>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_revision(&self) -> String {
        format!("rev-{}", self.counter.fetch_add(1, Ordering::Relaxed))
    }

    /// Test helper: read a file's content directly.
    pub async fn raw_content(&self, repo: &str, path: &str) -> Option<String> {
        self.repos
            .read()
            .await
            .get(repo)
            .and_then(|files| files.get(path))
            .map(|f| f.content.clone())
    }

    /// Test helper: number of files in a repository.
    pub async fn file_count(&self, repo: &str) -> usize {
        self.repos
            .read()
            .await
            .get(repo)
            .map(|files| files.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RemoteFileHost for InMemoryHost {
    async fn create_repository(&self, repo: &str, _description: &str) -> Result<()> {
        let mut repos = self.repos.write().await;
        if repos.contains_key(repo) {
            return Err(AgentError::Host {
                status: 422,
                message: format!("repository '{repo}' already exists"),
            });
        }
        repos.insert(repo.to_string(), HashMap::new());
        Ok(())
    }

    async fn repository_exists(&self, repo: &str) -> Result<bool> {
        Ok(self.repos.read().await.contains_key(repo))
    }

    async fn get_file(&self, repo: &str, path: &str) -> Result<Option<RemoteFile>> {
        Ok(self
            .repos
            .read()
            .await
            .get(repo)
            .and_then(|files| files.get(path))
            .map(|f| RemoteFile {
                content: f.content.clone(),
                revision: f.revision.clone(),
            }))
    }

    async fn put_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        _message: &str,
        revision: Option<&str>,
    ) -> Result<String> {
        let new_revision = self.next_revision();
        let mut repos = self.repos.write().await;
        let files = repos.entry(repo.to_string()).or_default();

        match (files.get(path), revision) {
            (Some(_), None) => {
                return Err(AgentError::Host {
                    status: 422,
                    message: format!("'{path}' already exists; revision token required"),
                });
            }
            (Some(existing), Some(token)) if existing.revision != token => {
                return Err(AgentError::Host {
                    status: 409,
                    message: format!("'{path}' is at {}, not {token}", existing.revision),
                });
            }
            _ => {}
        }

        files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_string(),
                revision: new_revision.clone(),
            },
        );
        Ok(new_revision)
    }

    async fn delete_file(
        &self,
        repo: &str,
        path: &str,
        _message: &str,
        revision: &str,
    ) -> Result<()> {
        let mut repos = self.repos.write().await;
        let files = repos.get_mut(repo).ok_or(AgentError::Host {
            status: 404,
            message: format!("repository '{repo}' not found"),
        })?;
        match files.get(path) {
            None => Err(AgentError::Host {
                status: 404,
                message: format!("'{path}' not found"),
            }),
            Some(existing) if existing.revision != revision => Err(AgentError::Host {
                status: 409,
                message: format!("'{path}' is at {}, not {revision}", existing.revision),
            }),
            Some(_) => {
                files.remove(path);
                Ok(())
            }
        }
    }

    async fn list_contents(
        &self,
        repo: &str,
        path: &str,
        _recursive: bool,
    ) -> Result<Vec<RemoteEntry>> {
        let prefix = path.trim_end_matches('/');
        Ok(self
            .repos
            .read()
            .await
            .get(repo)
            .map(|files| {
                files
                    .iter()
                    .filter(|(p, _)| prefix.is_empty() || p.starts_with(&format!("{prefix}/")))
                    .map(|(p, f)| RemoteEntry {
                        path: p.clone(),
                        revision: f.revision.clone(),
                        is_dir: false,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_without_token_over_existing_file_is_rejected() {
        let host = InMemoryHost::new();
        host.create_repository("demo", "").await.unwrap();
        host.put_file("demo", "a.txt", "one", "add", None)
            .await
            .unwrap();
        let err = host
            .put_file("demo", "a.txt", "two", "clobber", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Host { status: 422, .. }));
    }

    #[tokio::test]
    async fn stale_revision_token_is_rejected() {
        let host = InMemoryHost::new();
        host.create_repository("demo", "").await.unwrap();
        let rev = host
            .put_file("demo", "a.txt", "one", "add", None)
            .await
            .unwrap();
        host.put_file("demo", "a.txt", "two", "update", Some(&rev))
            .await
            .unwrap();
        let err = host
            .put_file("demo", "a.txt", "three", "stale", Some(&rev))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Host { status: 409, .. }));
    }

    #[tokio::test]
    async fn absent_file_reads_as_none() {
        let host = InMemoryHost::new();
        host.create_repository("demo", "").await.unwrap();
        assert!(host.get_file("demo", "missing.txt").await.unwrap().is_none());
    }
}
