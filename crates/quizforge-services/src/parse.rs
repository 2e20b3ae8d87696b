//! Validation of language-model output.
//!
//! Models wrap JSON in prose, code fences, or both. These helpers locate
//! the first complete JSON value in a completion and deserialize it;
//! anything that fails to parse is a [`ServiceError::Malformed`], never a
//! panic.

use crate::error::ServiceError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\[{][\s\S]*?[\]}])\s*```").expect("static regex"));

/// Deserialize the first JSON object found in `text`.
pub fn first_object<T: DeserializeOwned>(text: &str) -> Result<T, ServiceError> {
    let candidate = first_balanced(text, '{', '}')
        .ok_or_else(|| ServiceError::Malformed("no JSON object in completion".to_string()))?;
    serde_json::from_str(&candidate).map_err(|e| ServiceError::Malformed(e.to_string()))
}

/// Deserialize the first JSON array found in `text`.
pub fn first_array<T: DeserializeOwned>(text: &str) -> Result<T, ServiceError> {
    let candidate = first_balanced(text, '[', ']')
        .ok_or_else(|| ServiceError::Malformed("no JSON array in completion".to_string()))?;
    serde_json::from_str(&candidate).map_err(|e| ServiceError::Malformed(e.to_string()))
}

/// Extract the first balanced `open..close` span, preferring fenced blocks.
/// String literals and escapes are respected so braces inside values do not
/// unbalance the scan.
fn first_balanced(text: &str, open: char, close: char) -> Option<String> {
    if let Some(caps) = CODE_FENCE.captures(text) {
        let fenced = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        if fenced.starts_with(open) {
            return Some(fenced.to_string());
        }
    }

    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + ch.len_utf8()].to_string());
                }
            }
            _ => {}
        }
    }
    None
}
