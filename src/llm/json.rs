//! Locating JSON inside a model reply.
//!
//! Models wrap JSON in prose and code fences, and sometimes truncate it.
//! `extract_json` strips fences, finds the first balanced top-level object or
//! array, and parses it. Anything short of that is a
//! [`AgentError::ModelResponseFormat`] — callers never guess at malformed
//! JSON.

use serde_json::Value;

use crate::error::{AgentError, Result};

/// Extract and parse the first balanced top-level JSON value from `raw`.
pub fn extract_json(raw: &str) -> Result<Value> {
    let stripped = strip_code_fences(raw);
    let candidate = balanced_slice(stripped).ok_or_else(|| {
        AgentError::bad_model_response("no balanced JSON object or array found", raw)
    })?;
    serde_json::from_str(candidate)
        .map_err(|e| AgentError::bad_model_response(format!("invalid JSON: {e}"), raw))
}

/// Extract, parse, and deserialize into a concrete type.
pub fn extract_json_as<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    let value = extract_json(raw)?;
    serde_json::from_value(value)
        .map_err(|e| AgentError::bad_model_response(format!("unexpected JSON shape: {e}"), raw))
}

/// If the text contains a fenced block, return its interior; otherwise the
/// text unchanged. The fence language tag (```json) is ignored.
fn strip_code_fences(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after_open = &text[open + 3..];
    // Skip the language tag up to the first newline.
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => &body[..close],
        // Unterminated fence: take everything after the opening fence and
        // let balanced-slice detection decide.
        None => body,
    }
}

/// Find the first balanced `{...}` or `[...]`, respecting strings and
/// escapes. Returns `None` when no opener exists or the value is truncated.
fn balanced_slice(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let bytes = text.as_bytes();
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
