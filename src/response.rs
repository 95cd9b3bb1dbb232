//! Response extraction and the normalized result handed back to callers.

pub mod path;
pub mod usage;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::provider::ResponseFormat;

pub use path::{PathError, PathStep, ResponsePath};
pub use usage::{Usage, UsageNormalizer, UsageRule};

/// Result of a generation request.
///
/// Exactly one of a content/usage result or `error` is meaningful. `raw`
/// holds the provider's JSON untouched whenever a body was received.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedResponse {
    /// Generated text; empty on error.
    pub content: String,
    /// Normalized token usage, when the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Error description for failed calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unmodified provider response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl NormalizedResponse {
    /// Creates an error result with empty content.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Returns true when the call failed.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Evaluates a path expression against `value`.
///
/// Malformed expressions and missing steps both yield `None`.
pub fn extract<'v>(value: &'v Value, expr: &str) -> Option<&'v Value> {
    match ResponsePath::parse(expr) {
        Ok(path) => path.resolve(value),
        Err(e) => {
            debug!(path = expr, error = %e, "Ignoring malformed response path");
            None
        }
    }
}

/// Values pulled from a provider response by its [`ResponseFormat`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted<'v> {
    /// Content text, empty when the content path misses.
    pub content: String,
    /// Raw usage block, when the usage path is configured and resolves.
    pub usage: Option<&'v Value>,
    /// In-band error, when the error path is configured and resolves to a truthy value.
    pub error: Option<String>,
}

/// Evaluates the content, usage and error paths independently.
pub fn extract_fields<'v>(body: &'v Value, format: &ResponseFormat) -> Extracted<'v> {
    let content = content_text(extract(body, &format.content_path));
    let usage = format
        .usage_path()
        .and_then(|p| extract(body, p))
        .filter(|v| !v.is_null());
    let error = format
        .error_path()
        .and_then(|p| extract(body, p))
        .filter(|v| is_truthy(v))
        .map(error_text);

    Extracted {
        content,
        usage,
        error,
    }
}

/// Renders an extracted content value as text.
///
/// Strings pass through; absent and `null` become empty; other values are
/// serialized as JSON.
pub fn content_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn error_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| value.to_string(), str::to_string),
        other => other.to_string(),
    }
}
