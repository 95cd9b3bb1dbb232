//! Key-driven type coercion applied after placeholder substitution.
//!
//! Request templates are stored as JSON where every placeholder sits inside a
//! string literal. Once substituted, values under known keys are converted to
//! the JSON type the provider actually expects.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Target type for a coerced key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Coercion {
    /// Integer when the text is integral, float otherwise.
    Number,
    /// Integer, truncating a fractional value.
    Integer,
    /// Integer, or `null` for the literal `"null"` and for anything unparseable.
    Seed,
    /// Parsed as a JSON document (arrays of stop sequences, for example).
    Json,
}

impl Coercion {
    /// Converts a substituted string, falling back to the original string
    /// (or `null` for [`Coercion::Seed`]) when it cannot be parsed.
    pub fn apply(self, raw: &str) -> Value {
        let fallback = || Value::String(raw.to_string());
        match self {
            Self::Number => parse_number(raw).unwrap_or_else(fallback),
            Self::Integer => parse_integer(raw).map_or_else(fallback, Value::from),
            Self::Seed => {
                if raw.trim() == "null" {
                    Value::Null
                } else {
                    parse_integer(raw).map_or(Value::Null, Value::from)
                }
            }
            Self::Json => serde_json::from_str(raw).unwrap_or_else(|_| fallback()),
        }
    }
}

fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Value::from(int));
    }
    let float = trimmed.parse::<f64>().ok().filter(|f| f.is_finite())?;
    Number::from_f64(float).map(Value::Number)
}

fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    trimmed.parse::<i64>().ok().or_else(|| {
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

/// Mapping from object key name to the coercion applied to its string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionTable {
    rules: HashMap<String, Coercion>,
}

impl Default for CoercionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CoercionTable {
    /// Creates a table with no rules.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Returns the table covering the sampling parameters of the common
    /// OpenAI, Gemini, Anthropic and Cohere request shapes.
    pub fn builtin() -> Self {
        let rules = [
            ("max_tokens", Coercion::Integer),
            ("maxOutputTokens", Coercion::Integer),
            ("temperature", Coercion::Number),
            ("top_p", Coercion::Number),
            ("p", Coercion::Number),
            ("frequency_penalty", Coercion::Number),
            ("presence_penalty", Coercion::Number),
            ("top_k", Coercion::Number),
            ("k", Coercion::Number),
            ("seed", Coercion::Seed),
            ("stop_sequences", Coercion::Json),
            ("stopSequences", Coercion::Json),
        ]
        .into_iter()
        .map(|(key, coercion)| (key.to_string(), coercion))
        .collect();

        Self { rules }
    }

    /// Returns a copy of this table with `overrides` layered on top.
    #[must_use]
    pub fn with_overrides(&self, overrides: &BTreeMap<String, Coercion>) -> Self {
        let mut rules = self.rules.clone();
        rules.extend(overrides.iter().map(|(k, v)| (k.clone(), *v)));
        Self { rules }
    }

    /// Adds or replaces the rule for `key`.
    pub fn insert(&mut self, key: impl Into<String>, coercion: Coercion) {
        self.rules.insert(key.into(), coercion);
    }

    /// Returns the rule for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Coercion> {
        self.rules.get(key).copied()
    }
}
