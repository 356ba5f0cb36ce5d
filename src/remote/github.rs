//! GitHub implementation of the remote file host.
//!
//! Uses the REST contents API: file bodies travel base64-encoded and every
//! update/delete must present the blob sha as the revision token. A 404
//! anywhere reads as "absent", not as a failure.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::json;

use crate::config::Config;
use crate::error::{AgentError, Result};

use super::{RemoteEntry, RemoteFile, RemoteFileHost};

const USER_AGENT: &str = "prodev-agent/0.3";

pub struct GitHubHost {
    client: reqwest::Client,
    token: String,
    owner: String,
    api_base: String,
}

#[derive(Deserialize)]
struct ContentsFile {
    #[serde(default)]
    content: Option<String>,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
    path: String,
}

#[derive(Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Deserialize)]
struct TreeEntry {
    path: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GitHubHost {
    pub fn new(config: &Config) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            token: config.github_token.clone(),
            owner: config.github_owner.clone(),
            api_base: config.github_api_base.trim_end_matches('/').to_string(),
        }
    }

    fn contents_url(&self, repo: &str, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, self.owner, repo, path
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
    }

    async fn host_error(response: reqwest::Response) -> AgentError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        AgentError::Host { status, message }
    }
}

fn decode_content(encoded: &str) -> Result<String> {
    // GitHub inserts newlines into the base64 payload.
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| AgentError::Host {
            status: 0,
            message: format!("undecodable file content: {e}"),
        })?;
    String::from_utf8(bytes).map_err(|e| AgentError::Host {
        status: 0,
        message: format!("file content is not UTF-8: {e}"),
    })
}

#[async_trait]
impl RemoteFileHost for GitHubHost {
    async fn create_repository(&self, repo: &str, description: &str) -> Result<()> {
        let url = format!("{}/user/repos", self.api_base);
        let body = json!({
            "name": repo,
            "description": description,
            "private": true,
            "auto_init": true,
        });
        let response = self
            .request(reqwest::Method::POST, &url)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::host_error(response).await);
        }
        Ok(())
    }

    async fn repository_exists(&self, repo: &str) -> Result<bool> {
        let url = format!("{}/repos/{}/{}", self.api_base, self.owner, repo);
        let response = self.request(reqwest::Method::GET, &url).send().await?;
        match response.status() {
            s if s.is_success() => Ok(true),
            reqwest::StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::host_error(response).await),
        }
    }

    async fn get_file(&self, repo: &str, path: &str) -> Result<Option<RemoteFile>> {
        let url = self.contents_url(repo, path);
        let response = self.request(reqwest::Method::GET, &url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::host_error(response).await);
        }
        let file: ContentsFile = response.json().await?;
        if file.kind != "file" {
            return Ok(None);
        }
        let content = decode_content(file.content.as_deref().unwrap_or_default())?;
        Ok(Some(RemoteFile {
            content,
            revision: file.sha,
        }))
    }

    async fn put_file(
        &self,
        repo: &str,
        path: &str,
        content: &str,
        message: &str,
        revision: Option<&str>,
    ) -> Result<String> {
        let url = self.contents_url(repo, path);
        let encoded = base64::engine::general_purpose::STANDARD.encode(content.as_bytes());
        let mut body = json!({
            "message": message,
            "content": encoded,
        });
        if let Some(sha) = revision {
            body["sha"] = json!(sha);
        }
        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::host_error(response).await);
        }
        let parsed: PutResponse = response.json().await?;
        Ok(parsed.content.sha)
    }

    async fn delete_file(
        &self,
        repo: &str,
        path: &str,
        message: &str,
        revision: &str,
    ) -> Result<()> {
        let url = self.contents_url(repo, path);
        let body = json!({ "message": message, "sha": revision });
        let response = self
            .request(reqwest::Method::DELETE, &url)
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::host_error(response).await);
        }
        Ok(())
    }

    async fn list_contents(
        &self,
        repo: &str,
        path: &str,
        recursive: bool,
    ) -> Result<Vec<RemoteEntry>> {
        if recursive {
            let url = format!(
                "{}/repos/{}/{}/git/trees/HEAD?recursive=1",
                self.api_base, self.owner, repo
            );
            let response = self.request(reqwest::Method::GET, &url).send().await?;
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(Vec::new());
            }
            if !response.status().is_success() {
                return Err(Self::host_error(response).await);
            }
            let parsed: TreeResponse = response.json().await?;
            let prefix = path.trim_end_matches('/');
            return Ok(parsed
                .tree
                .into_iter()
                .filter(|e| prefix.is_empty() || e.path.starts_with(&format!("{prefix}/")))
                .map(|e| RemoteEntry {
                    is_dir: e.kind == "tree",
                    path: e.path,
                    revision: e.sha,
                })
                .collect());
        }

        let url = self.contents_url(repo, path);
        let response = self.request(reqwest::Method::GET, &url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(Self::host_error(response).await);
        }
        let entries: Vec<ContentsFile> = response.json().await?;
        Ok(entries
            .into_iter()
            .map(|e| RemoteEntry {
                is_dir: e.kind == "dir",
                path: e.path,
                revision: e.sha,
            })
            .collect())
    }
}
