//! Placeholder substitution over request templates.
//!
//! Two token grammars coexist: wire placeholders (`{model}`, `{temperature}`)
//! filled from request settings, and user variables (`{{name}}`) filled from
//! the prompt's own variables before any wire substitution happens. The two
//! never match each other's tokens.

pub mod coercion;
pub mod variables;

use std::collections::HashMap;

use serde_json::{Map, Value};

pub use coercion::{Coercion, CoercionTable};
pub use variables::{extract_prompt_variables, extract_variables, substitute_variables};

/// Wire-namespace bindings: placeholder name (without braces) to its value.
pub type Bindings = HashMap<String, String>;

/// Key whose array value is replaced by multimodal content blocks.
const CONTENT_KEY: &str = "content";

/// Replaces `{name}` placeholders in `template` in a single left-to-right pass.
///
/// Unbound placeholders and `{{user}}` variables are copied through verbatim.
/// Substituted values are never rescanned, so prompt text containing
/// something like `{temperature}` reaches the provider untouched.
pub fn render(template: &str, bindings: &Bindings) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if tail.starts_with("{{") {
            match tail.find("}}") {
                Some(end) => {
                    out.push_str(&tail[..end + 2]);
                    rest = &tail[end + 2..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
            continue;
        }

        match tail[1..].find(['{', '}']) {
            Some(offset) if tail.as_bytes()[offset + 1] == b'}' => {
                let name = &tail[1..=offset];
                match bindings.get(name) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&tail[..offset + 2]),
                }
                rest = &tail[offset + 2..];
            }
            _ => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Substitutes `bindings` into every string of `tree` and coerces values
/// under the built-in numeric and array keys.
pub fn substitute(tree: &Value, bindings: &Bindings) -> Value {
    TemplateEngine::new(bindings).apply(tree)
}

/// Configurable depth-first template rewriter.
///
/// # Example
///
/// ```rust
/// use promptkit::template::{Bindings, TemplateEngine};
/// use serde_json::json;
///
/// let bindings = Bindings::from([("temperature".to_string(), "0.7".to_string())]);
/// let body = TemplateEngine::new(&bindings).apply(&json!({"temperature": "{temperature}"}));
/// assert_eq!(body, json!({"temperature": 0.7}));
/// ```
#[derive(Debug, Clone)]
pub struct TemplateEngine<'a> {
    bindings: &'a Bindings,
    coercions: CoercionTable,
    injected_content: Option<&'a [Value]>,
}

impl<'a> TemplateEngine<'a> {
    /// Creates an engine using the built-in coercion table.
    pub fn new(bindings: &'a Bindings) -> Self {
        Self {
            bindings,
            coercions: CoercionTable::builtin(),
            injected_content: None,
        }
    }

    /// Replaces the coercion table.
    #[must_use]
    pub fn with_coercions(mut self, coercions: CoercionTable) -> Self {
        self.coercions = coercions;
        self
    }

    /// Injects `blocks` in place of every array found under a `content` key.
    #[must_use]
    pub fn with_content(mut self, blocks: &'a [Value]) -> Self {
        self.injected_content = Some(blocks);
        self
    }

    /// Returns a rewritten copy of `tree`.
    pub fn apply(&self, tree: &Value) -> Value {
        match tree {
            Value::String(s) => Value::String(render(s, self.bindings)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.apply(v)).collect()),
            Value::Object(map) => Value::Object(self.apply_object(map)),
            other => other.clone(),
        }
    }

    fn apply_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(key, value)| {
                if let (Some(blocks), Value::Array(_)) = (self.injected_content, value) {
                    if key == CONTENT_KEY {
                        return (key.clone(), Value::Array(blocks.to_vec()));
                    }
                }

                let rewritten = self.apply(value);
                let coerced = match (&rewritten, self.coercions.get(key)) {
                    (Value::String(s), Some(coercion)) => coercion.apply(s),
                    _ => rewritten,
                };
                (key.clone(), coerced)
            })
            .collect()
    }
}
