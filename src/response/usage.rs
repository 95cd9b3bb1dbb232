//! Normalization of provider token-usage blocks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Canonical token usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced by the model.
    pub completion_tokens: u64,
    /// Total tokens billed.
    pub total_tokens: u64,
}

/// How a provider's total token count is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalRule {
    /// Read from the first present field.
    Fields(Vec<String>),
    /// Computed as prompt + completion (`"sum"` in config).
    Computed(SumMarker),
}

/// Marker for [`TotalRule::Computed`]; only the literal `"sum"` deserializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SumMarker {
    /// `prompt + completion`.
    Sum,
}

/// Field mapping from one provider's usage block to [`Usage`].
///
/// Each counter lists candidate field names; the first one holding a number wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRule {
    /// Candidates for the prompt counter.
    pub prompt: Vec<String>,
    /// Candidates for the completion counter.
    pub completion: Vec<String>,
    /// Total counter source.
    pub total: TotalRule,
}

impl UsageRule {
    /// Builds a rule from field-name candidates.
    pub fn fields(prompt: &[&str], completion: &[&str], total: &[&str]) -> Self {
        Self {
            prompt: owned(prompt),
            completion: owned(completion),
            total: TotalRule::Fields(owned(total)),
        }
    }

    /// Builds a rule whose total is prompt + completion.
    pub fn summed(prompt: &[&str], completion: &[&str]) -> Self {
        Self {
            prompt: owned(prompt),
            completion: owned(completion),
            total: TotalRule::Computed(SumMarker::Sum),
        }
    }

    /// Applies the rule to a usage block. Missing counters default to 0.
    pub fn apply(&self, block: &Value) -> Usage {
        let prompt_tokens = first_count(block, &self.prompt);
        let completion_tokens = first_count(block, &self.completion);
        let total_tokens = match &self.total {
            TotalRule::Fields(names) => first_count(block, names),
            TotalRule::Computed(SumMarker::Sum) => prompt_tokens.saturating_add(completion_tokens),
        };

        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_string()).collect()
}

fn first_count(block: &Value, names: &[String]) -> u64 {
    names
        .iter()
        .find_map(|name| {
            let value = block.get(name)?;
            value
                .as_u64()
                .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        })
        .unwrap_or(0)
}

/// Provider id to [`UsageRule`] lookup with a generic fallback.
#[derive(Debug, Clone)]
pub struct UsageNormalizer {
    rules: HashMap<String, UsageRule>,
    fallback: UsageRule,
}

impl Default for UsageNormalizer {
    fn default() -> Self {
        Self::builtin()
    }
}

impl UsageNormalizer {
    /// Creates a normalizer with the OpenAI, Gemini and Anthropic mappings.
    pub fn builtin() -> Self {
        let mut normalizer = Self {
            rules: HashMap::new(),
            fallback: UsageRule::fields(
                &["promptTokens", "prompt_tokens", "input_tokens", "promptTokenCount"],
                &[
                    "completionTokens",
                    "completion_tokens",
                    "output_tokens",
                    "candidatesTokenCount",
                ],
                &["totalTokens", "total_tokens", "totalTokenCount"],
            ),
        };

        normalizer.register(
            "openai",
            UsageRule::fields(&["prompt_tokens"], &["completion_tokens"], &["total_tokens"]),
        );
        normalizer.register(
            "gemini",
            UsageRule::fields(
                &["promptTokenCount"],
                &["candidatesTokenCount"],
                &["totalTokenCount"],
            ),
        );
        normalizer.register(
            "anthropic",
            UsageRule::summed(&["input_tokens"], &["output_tokens"]),
        );
        normalizer
    }

    /// Registers (or replaces) the rule for `provider_id`.
    pub fn register(&mut self, provider_id: impl Into<String>, rule: UsageRule) {
        self.rules.insert(provider_id.into(), rule);
    }

    /// Returns the rule used for `provider_id`.
    pub fn rule_for(&self, provider_id: &str) -> &UsageRule {
        self.rules.get(provider_id).unwrap_or(&self.fallback)
    }

    /// Maps a provider usage block onto [`Usage`].
    pub fn normalize(&self, block: &Value, provider_id: &str) -> Usage {
        self.rule_for(provider_id).apply(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn usage(prompt: u64, completion: u64, total: u64) -> Usage {
        Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            total_tokens: total,
        }
    }

    #[test]
    fn openai_mapping() {
        let n = UsageNormalizer::builtin();
        let block = json!({"prompt_tokens": 10, "completion_tokens": 20, "total_tokens": 30});
        assert_eq!(n.normalize(&block, "openai"), usage(10, 20, 30));
    }

    #[test]
    fn gemini_mapping() {
        let n = UsageNormalizer::builtin();
        let block = json!({"promptTokenCount": 4, "candidatesTokenCount": 6, "totalTokenCount": 10});
        assert_eq!(n.normalize(&block, "gemini"), usage(4, 6, 10));
    }

    #[test]
    fn anthropic_total_is_computed() {
        let n = UsageNormalizer::builtin();
        let block = json!({"input_tokens": 5, "output_tokens": 7, "total_tokens": 999});
        assert_eq!(n.normalize(&block, "anthropic"), usage(5, 7, 12));
    }

    #[test]
    fn computed_total_saturates() {
        let n = UsageNormalizer::builtin();
        let block = json!({"input_tokens": u64::MAX, "output_tokens": 1});
        assert_eq!(n.normalize(&block, "anthropic"), usage(u64::MAX, 1, u64::MAX));
    }

    #[test]
    fn unknown_provider_uses_fallback_candidates() {
        let n = UsageNormalizer::builtin();
        let block = json!({"input_tokens": 3, "completionTokens": 4, "totalTokenCount": 7});
        assert_eq!(n.normalize(&block, "mistral"), usage(3, 4, 7));
    }

    #[test]
    fn missing_fields_default_to_zero() {
        let n = UsageNormalizer::builtin();
        assert_eq!(n.normalize(&json!({}), "openai"), usage(0, 0, 0));
        assert_eq!(n.normalize(&json!({"prompt_tokens": "x"}), "openai"), usage(0, 0, 0));
        assert_eq!(n.normalize(&json!(null), "anthropic"), usage(0, 0, 0));
    }

    #[test]
    fn registered_rules_extend_the_table() {
        let mut n = UsageNormalizer::builtin();
        n.register(
            "cohere",
            UsageRule::summed(&["billed_input"], &["billed_output"]),
        );
        let block = json!({"billed_input": 2, "billed_output": 3});
        assert_eq!(n.normalize(&block, "cohere"), usage(2, 3, 5));
    }

    #[test]
    fn rule_deserializes_from_config() {
        let summed: UsageRule = serde_json::from_value(json!({
            "prompt": ["in"], "completion": ["out"], "total": "sum"
        }))
        .unwrap();
        assert_eq!(summed, UsageRule::summed(&["in"], &["out"]));

        let fields: UsageRule = serde_json::from_value(json!({
            "prompt": ["in"], "completion": ["out"], "total": ["all"]
        }))
        .unwrap();
        assert_eq!(fields, UsageRule::fields(&["in"], &["out"], &["all"]));
    }

    #[test]
    fn usage_serializes_camel_case() {
        let value = serde_json::to_value(usage(1, 2, 3)).unwrap();
        assert_eq!(
            value,
            json!({"promptTokens": 1, "completionTokens": 2, "totalTokens": 3})
        );
    }
}
