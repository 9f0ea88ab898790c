//! Response decoding: HTTP body → usage + schema-shaped value.
//!
//! Decoding happens in two layers. The outer transport envelope is ordinary
//! chat-completions JSON; the model's message content is itself a JSON
//! document (the system instruction demanded it). The two layers fail for
//! different reasons, so they map to different [`ExtractionFailure`] kinds:
//!
//! ```text
//! body ──parse_envelope──▶ Reply { total_tokens, content } ──parse_content──▶ Map
//!        (Envelope error)                                    (Content error)
//! ```
//!
//! [`parse_content`] is the single place where the model reply becomes a
//! value, so stricter schema validation can be added there later without
//! touching request construction.

use crate::error::ExtractionFailure;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    usage: Option<Usage>,
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

/// The outer layer of a successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// `usage.total_tokens`, or 0 when the endpoint did not report usage.
    pub total_tokens: u64,
    /// `choices[0].message.content`, still JSON-encoded.
    pub content: String,
}

/// Decode the transport envelope.
pub fn parse_envelope(body: &[u8]) -> Result<Reply, ExtractionFailure> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| ExtractionFailure::Envelope(e.to_string()))?;

    let total_tokens = envelope
        .usage
        .and_then(|u| u.total_tokens)
        .unwrap_or(0);

    let content = envelope
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ExtractionFailure::Envelope("response has no choices".into()))?
        .message
        .content
        .ok_or_else(|| ExtractionFailure::Envelope("choices[0].message.content is missing".into()))?;

    Ok(Reply {
        total_tokens,
        content,
    })
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*(.*?)\s*```$").unwrap());

/// Strip a single outer ```` ```json ```` fence, which some models add even
/// in JSON mode.
fn strip_json_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match RE_JSON_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

/// Decode the model's reply into a JSON object.
pub fn parse_content(content: &str) -> Result<Map<String, Value>, ExtractionFailure> {
    let value: Value = serde_json::from_str(strip_json_fence(content))
        .map_err(|e| ExtractionFailure::Content(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ExtractionFailure::Content(format!(
            "expected a JSON object, got {}",
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
