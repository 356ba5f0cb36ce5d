//! Web-search collaborator.
//!
//! Search is strictly best-effort: any failure degrades to a fixed
//! "unavailable" string so the surrounding conversation flow never breaks on
//! a search outage.

use async_trait::async_trait;
use tracing::warn;

/// Fixed degradation notice; callers and tests rely on this exact text.
pub const SEARCH_UNAVAILABLE: &str = "Web search is currently unavailable.";

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search the web. Never fails; degrades to [`SEARCH_UNAVAILABLE`].
    async fn search(&self, query: &str) -> String;
}

/// DuckDuckGo HTML search (no API key required).
pub struct WebSearch {
    client: reqwest::Client,
}

impl Default for WebSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSearch {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; ProdevAgent/0.3)")
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    async fn try_search(&self, query: &str) -> Result<String, reqwest::Error> {
        let encoded = urlencoding::encode(query);
        let url = format!("https://html.duckduckgo.com/html/?q={encoded}");
        let html = self.client.get(&url).send().await?.text().await?;
        let results = extract_results(&html);
        if results.is_empty() {
            Ok(format!("No results found for: {query}"))
        } else {
            Ok(results.join("\n\n"))
        }
    }
}

#[async_trait]
impl SearchProvider for WebSearch {
    async fn search(&self, query: &str) -> String {
        match self.try_search(query).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "web search failed; degrading");
                SEARCH_UNAVAILABLE.to_string()
            }
        }
    }
}

/// Extract result titles/snippets/urls from the DuckDuckGo HTML page.
fn extract_results(html: &str) -> Vec<String> {
    let mut results = Vec::new();
    for (i, chunk) in html.split("class=\"result__body\"").enumerate().skip(1) {
        if i > 5 {
            break;
        }
        let title = chunk
            .split("class=\"result__a\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .unwrap_or("");
        let snippet = chunk
            .split("class=\"result__snippet\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .unwrap_or("");
        let url = chunk
            .split("class=\"result__url\"")
            .nth(1)
            .and_then(|s| s.split('>').nth(1))
            .and_then(|s| s.split('<').next())
            .map(str::trim)
            .unwrap_or("");
        if !title.is_empty() {
            results.push(format!(
                "**{}**\n{}\nURL: {}",
                html_decode(title),
                html_decode(snippet),
                url
            ));
        }
    }
    results
}

fn html_decode(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

/// Canned provider for tests.
#[cfg(test)]
pub struct FixedSearch(pub String);

#[cfg(test)]
#[async_trait]
impl SearchProvider for FixedSearch {
    async fn search(&self, _query: &str) -> String {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_results_from_markup() {
        let html = r#"
            <div class="result__body">
              <a class="result__a" href="x">Rust async book</a>
              <a class="result__snippet" href="x">Learn async Rust.</a>
              <a class="result__url" href="x"> rust-lang.org </a>
            </div>"#;
        let results = extract_results(html);
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("Rust async book"));
        assert!(results[0].contains("rust-lang.org"));
    }

    #[test]
    fn no_result_blocks_yield_empty() {
        assert!(extract_results("<html><body>nope</body></html>").is_empty());
    }
}
