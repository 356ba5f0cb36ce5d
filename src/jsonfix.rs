//! Auto-repair for common JSON syntax slips in model-written files.
//!
//! Handles the two failure modes that show up constantly in generated JSON:
//! trailing commas before a closing bracket, and single-quoted strings. This
//! is a character-level pass, not a parser; anything it cannot fix is left
//! for the caller to surface.

/// Validate `text` as JSON, returning a short human-readable problem
/// description on failure.
pub fn validate(text: &str) -> Result<(), String> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(_) => Ok(()),
        Err(e) => Err(format!("{e}")),
    }
}

/// Attempt to repair common JSON errors. The output is not guaranteed valid;
/// callers should re-validate.
pub fn repair(text: &str) -> String {
    strip_trailing_commas(&requote_single_quotes(text))
}

/// Convert single-quoted strings to double-quoted, escaping any embedded
/// double quotes. Quotes inside existing double-quoted strings are left
/// alone.
fn requote_single_quotes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_double = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if in_double {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_double = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_double = true;
                out.push(c);
            }
            '\'' => {
                out.push('"');
                let mut inner_escaped = false;
                for inner in chars.by_ref() {
                    if inner_escaped {
                        out.push(inner);
                        inner_escaped = false;
                    } else if inner == '\\' {
                        out.push(inner);
                        inner_escaped = true;
                    } else if inner == '\'' {
                        out.push('"');
                        break;
                    } else if inner == '"' {
                        out.push('\\');
                        out.push('"');
                    } else {
                        out.push(inner);
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Remove commas that directly precede a closing `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '}' | ']' => {
                // Drop a comma left dangling before this bracket.
                let trailing_ws: String = out
                    .chars()
                    .rev()
                    .take_while(|ch| ch.is_whitespace())
                    .collect();
                let trimmed_len = out.len() - trailing_ws.len();
                if out[..trimmed_len].ends_with(',') {
                    out.truncate(trimmed_len - 1);
                    out.push_str(&trailing_ws.chars().rev().collect::<String>());
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repairs_trailing_comma_in_object() {
        let broken = r#"{"name": "demo", "version": "1.0",}"#;
        assert!(validate(broken).is_err());
        let fixed = repair(broken);
        assert!(validate(&fixed).is_ok(), "still broken: {fixed}");
    }

    #[test]
    fn repairs_trailing_comma_in_nested_array() {
        let broken = r#"{"deps": ["a", "b",], "x": 1}"#;
        let fixed = repair(broken);
        assert!(validate(&fixed).is_ok(), "still broken: {fixed}");
    }

    #[test]
    fn repairs_single_quoted_strings() {
        let broken = r#"{'name': 'demo'}"#;
        let fixed = repair(broken);
        assert_eq!(fixed, r#"{"name": "demo"}"#);
        assert!(validate(&fixed).is_ok());
    }

    #[test]
    fn leaves_valid_json_untouched() {
        let ok = r#"{"a": [1, 2], "b": "it's fine, really"}"#;
        assert_eq!(repair(ok), ok);
    }

    #[test]
    fn comma_inside_string_survives() {
        let ok = r#"{"a": "x,}"}"#;
        assert_eq!(repair(ok), ok);
        assert!(validate(ok).is_ok());
    }
}
