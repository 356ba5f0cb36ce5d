//! Typed tool-call channel between the model and the conversation engine.
//!
//! The model is instructed to ask for a tool by emitting a fenced
//! ` ```tool_code ` block whose body is one JSON object, e.g.
//! `{"tool": "read_file", "args": {"path": "package.json"}}`. The block is
//! parsed into a typed [`ToolRequest`] and dispatched over a fixed table;
//! free-text prose never triggers a tool.

use serde::Deserialize;
use tracing::debug;

use crate::jsonfix;
use crate::search::SearchProvider;
use crate::store::RepoStateStore;

/// Files the read/validate tools may touch. Anything else is refused.
pub const WELL_KNOWN_FILES: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "next.config.js",
    "vite.config.ts",
    "README.md",
];

/// One tool invocation requested by the model.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum ToolRequest {
    WebSearch { query: String },
    ReadFile { path: String },
    ValidateJson { path: String },
}

/// Find a fenced `tool_code` block in a reply and parse its body. Returns
/// `None` when there is no block or the body is not a valid request; a
/// malformed tool request is ignored, not fatal to the chat turn.
pub fn parse_tool_request(reply: &str) -> Option<ToolRequest> {
    let start = reply.find("```tool_code")?;
    let body = &reply[start + "```tool_code".len()..];
    let body = body.strip_prefix('\n').unwrap_or(body);
    let end = body.find("```")?;
    match serde_json::from_str(body[..end].trim()) {
        Ok(request) => Some(request),
        Err(e) => {
            debug!(error = %e, "ignoring malformed tool_code block");
            None
        }
    }
}

fn well_known(path: &str) -> bool {
    WELL_KNOWN_FILES.contains(&path)
}

/// Execute a tool request and render its result as text for the follow-up
/// model call.
pub async fn dispatch(
    request: &ToolRequest,
    store: &RepoStateStore,
    search: &dyn SearchProvider,
) -> String {
    match request {
        ToolRequest::WebSearch { query } => search.search(query).await,
        ToolRequest::ReadFile { path } => {
            if !well_known(path) {
                return format!("'{path}' is not readable through this tool.");
            }
            match store.get_file_content(path).await {
                Ok(Some(content)) => content,
                Ok(None) => format!("'{path}' does not exist in the repository."),
                Err(e) => format!("Could not read '{path}': {e}"),
            }
        }
        ToolRequest::ValidateJson { path } => {
            if !well_known(path) {
                return format!("'{path}' is not readable through this tool.");
            }
            match store.get_file_content(path).await {
                Ok(Some(content)) => match jsonfix::validate(&content) {
                    Ok(()) => format!("'{path}' is valid JSON."),
                    Err(issue) => format!("JSON parsing issue in '{path}': {issue}"),
                },
                Ok(None) => format!("'{path}' does not exist in the repository."),
                Err(e) => format!("Could not read '{path}': {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_tool_block() {
        let reply = "Let me look that up.\n```tool_code\n{\"tool\": \"web_search\", \"args\": {\"query\": \"axum routing\"}}\n```";
        assert_eq!(
            parse_tool_request(reply),
            Some(ToolRequest::WebSearch {
                query: "axum routing".into()
            })
        );
    }

    #[test]
    fn parses_read_file_request() {
        let reply = "```tool_code\n{\"tool\": \"read_file\", \"args\": {\"path\": \"package.json\"}}\n```";
        assert_eq!(
            parse_tool_request(reply),
            Some(ToolRequest::ReadFile {
                path: "package.json".into()
            })
        );
    }

    #[test]
    fn prose_mentioning_tools_is_not_a_request() {
        assert_eq!(parse_tool_request("I could use web_search here."), None);
    }

    #[test]
    fn malformed_block_is_ignored() {
        assert_eq!(
            parse_tool_request("```tool_code\nsearch for axum\n```"),
            None
        );
    }
}
