//! Best-effort recovery of a JSON object from free-form model output.
//!
//! Candidates, tried in order until one parses as a JSON object:
//! 1. non-empty content of the first triple-backtick fence (tag such as `json` optional)
//! 2. the span from the first `{` to the last `}`
//! 3. the trimmed reply as-is

use serde_json::Value;
use thiserror::Error;

const FENCE: &str = "```";

/// Why a reply could not be turned into an analysis object.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("reply is not valid JSON: {0}")]
    NotJson(#[from] serde_json::Error),

    #[error("reply is JSON but not an object (got {0})")]
    NotAnObject(&'static str),
}

/// Narrow a model reply down to the text most likely to hold the JSON object.
pub fn extract_json_text(reply: &str) -> &str {
    candidates(reply)[0]
}

/// Distinct candidate slices of `reply`, most specific first. Never empty.
fn candidates(reply: &str) -> Vec<&str> {
    let trimmed = reply.trim();
    let mut out = Vec::with_capacity(3);

    if let Some(inner) = fenced_content(trimmed) {
        if !inner.is_empty() {
            out.push(inner);
        }
    }

    if let Some(span) = brace_span(trimmed) {
        if !out.contains(&span) {
            out.push(span);
        }
    }

    if !out.contains(&trimmed) {
        out.push(trimmed);
    }

    out
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Content of the first fenced block, without the fences or a language tag.
fn fenced_content(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let after_open = &text[open + FENCE.len()..];

    // A language tag runs to the end of the opening line.
    let body = match after_open.find('\n') {
        Some(newline) if is_fence_tag(&after_open[..newline]) => &after_open[newline + 1..],
        _ => after_open
            .strip_prefix("json")
            .or_else(|| after_open.strip_prefix("JSON"))
            .unwrap_or(after_open),
    };

    let inner = match body.find(FENCE) {
        Some(close) => &body[..close],
        None => body,
    };

    Some(inner.trim())
}

fn is_fence_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null => "null",
    }
}

/// Extract and parse a model reply; the top level must be a JSON object.
///
/// When no candidate yields an object, a candidate that parsed as some other
/// JSON value is reported ahead of a syntax error from the first candidate.
pub fn parse_reply(reply: &str) -> Result<Value, ExtractError> {
    let mut first_error = None;
    let mut non_object = None;

    for candidate in candidates(reply) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(value) if value.is_object() => return Ok(value),
            Ok(value) => {
                non_object.get_or_insert(kind(&value));
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match (non_object, first_error) {
        (Some(kind), _) => Err(ExtractError::NotAnObject(kind)),
        (None, Some(e)) => Err(ExtractError::NotJson(e)),
        (None, None) => unreachable!("candidates() always yields at least one slice"),
    }
}
