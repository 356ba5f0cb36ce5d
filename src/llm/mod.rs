//! Generative-model client.
//!
//! One trait, one HTTP implementation against an OpenAI-compatible
//! chat-completions endpoint. Callers that expect JSON go through
//! [`json::extract_json`] and treat malformed output as
//! `ModelResponseFormat`, never guessing.

pub mod json;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AgentError, Result};

/// A client that turns one prompt into one text reply.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// HTTP model client (OpenRouter-style chat completions).
pub struct HttpModelClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpModelClient {
    pub fn new(api_key: String, model: String, base_url: String, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            model,
            base_url,
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AgentError::Host {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(AgentError::bad_model_response("empty model reply", ""));
        }
        Ok(content)
    }
}

/// Scripted model for tests: pops replies front-to-back.
#[cfg(test)]
pub struct MockModel {
    replies: std::sync::Mutex<std::collections::VecDeque<String>>,
}

#[cfg(test)]
impl MockModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: std::sync::Mutex::new(replies.into_iter().map(Into::into).collect()),
        }
    }
}

#[cfg(test)]
#[async_trait]
impl ModelClient for MockModel {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        self.replies
            .lock()
            .expect("mock lock")
            .pop_front()
            .ok_or_else(|| AgentError::ServiceUnavailable("mock model exhausted".into()))
    }
}
