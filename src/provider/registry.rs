//! Read-only lookup over the configured providers.

use std::collections::HashMap;

use anyhow::Result;
use tracing::debug;

use super::{ModelDefinition, ProviderDefinition};
use crate::config::{DefaultSettings, ProvidersConfig};
use crate::error::AiError;
use crate::response::UsageNormalizer;
use crate::template::CoercionTable;

/// Provider registry built once from a [`ProvidersConfig`].
///
/// Per-provider coercion tables and usage rules are resolved at construction
/// so request handling only performs lookups.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    config: ProvidersConfig,
    by_id: HashMap<String, usize>,
    coercions: HashMap<String, CoercionTable>,
    default_coercions: CoercionTable,
    usage: UsageNormalizer,
}

impl ProviderRegistry {
    /// Validates `config` and builds the lookup tables.
    pub fn new(config: ProvidersConfig) -> Result<Self> {
        config.validate()?;

        let default_coercions = CoercionTable::builtin();
        let mut usage = UsageNormalizer::builtin();
        let mut by_id = HashMap::new();
        let mut coercions = HashMap::new();

        for (index, provider) in config.providers.iter().enumerate() {
            by_id.insert(provider.id.clone(), index);
            if !provider.coercions.is_empty() {
                coercions.insert(
                    provider.id.clone(),
                    default_coercions.with_overrides(&provider.coercions),
                );
            }
            if let Some(rule) = &provider.usage {
                usage.register(provider.id.clone(), rule.clone());
            }
        }

        debug!(
            providers = config.providers.len(),
            custom_coercions = coercions.len(),
            "Built provider registry"
        );

        Ok(Self {
            config,
            by_id,
            coercions,
            default_coercions,
            usage,
        })
    }

    /// Builds a registry from the embedded configuration.
    pub fn embedded() -> Result<Self> {
        Self::new(ProvidersConfig::embedded()?)
    }

    /// All providers, in configuration order.
    pub fn providers(&self) -> &[ProviderDefinition] {
        &self.config.providers
    }

    /// Looks up a provider by id.
    pub fn provider(&self, provider_id: &str) -> Option<&ProviderDefinition> {
        self.by_id
            .get(provider_id)
            .map(|&index| &self.config.providers[index])
    }

    /// Looks up a model within a provider.
    pub fn model(&self, provider_id: &str, model_id: &str) -> Option<&ModelDefinition> {
        self.provider(provider_id)?.model(model_id)
    }

    /// Resolves a provider/model pair or reports which one is missing.
    pub fn resolve(
        &self,
        provider_id: &str,
        model_id: &str,
    ) -> Result<(&ProviderDefinition, &ModelDefinition), AiError> {
        let provider = self
            .provider(provider_id)
            .ok_or_else(|| AiError::ProviderNotFound(provider_id.to_string()))?;
        let model = provider
            .model(model_id)
            .ok_or_else(|| AiError::ModelNotFound {
                model: model_id.to_string(),
                provider: provider_id.to_string(),
            })?;
        Ok((provider, model))
    }

    /// Default provider, falling back to the first configured one.
    pub fn default_provider(&self) -> &ProviderDefinition {
        self.provider(&self.config.default_provider)
            .unwrap_or(&self.config.providers[0])
    }

    /// Default model of the default provider, falling back to its first model.
    pub fn default_model(&self) -> Option<&ModelDefinition> {
        let provider = self.default_provider();
        provider
            .model(&self.config.default_model)
            .or_else(|| provider.models.first())
    }

    /// Default model for a specific provider.
    ///
    /// Only the default provider honours `defaultModel`; others use their
    /// first model.
    pub fn default_model_for(&self, provider_id: &str) -> Option<&ModelDefinition> {
        let provider = self.provider(provider_id)?;
        if provider_id == self.config.default_provider {
            provider
                .model(&self.config.default_model)
                .or_else(|| provider.models.first())
        } else {
            provider.models.first()
        }
    }

    /// Sampling defaults from the configuration.
    pub fn default_settings(&self) -> &DefaultSettings {
        &self.config.default_settings
    }

    /// Coercion table for a provider's request bodies.
    pub fn coercions_for(&self, provider_id: &str) -> &CoercionTable {
        self.coercions
            .get(provider_id)
            .unwrap_or(&self.default_coercions)
    }

    /// Usage normalizer with every provider-declared rule registered.
    pub fn usage_normalizer(&self) -> &UsageNormalizer {
        &self.usage
    }

    /// The configuration this registry was built from.
    pub fn config(&self) -> &ProvidersConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::UsageRule;
    use crate::template::Coercion;
    use serde_json::json;

    fn registry() -> ProviderRegistry {
        ProviderRegistry::embedded().unwrap()
    }

    #[test]
    fn resolves_provider_and_model() {
        let registry = registry();
        let (provider, model) = registry.resolve("anthropic", "claude-sonnet").unwrap();
        assert_eq!(provider.display_name, "Anthropic");
        assert_eq!(model.name, "claude-3-5-sonnet-20241022");
    }

    #[test]
    fn reports_missing_provider_and_model() {
        let registry = registry();
        assert_eq!(
            registry.resolve("cohere", "command").unwrap_err(),
            AiError::ProviderNotFound("cohere".to_string())
        );
        assert_eq!(
            registry.resolve("openai", "gpt-9").unwrap_err(),
            AiError::ModelNotFound {
                model: "gpt-9".to_string(),
                provider: "openai".to_string()
            }
        );
    }

    #[test]
    fn default_resolution() {
        let registry = registry();
        assert_eq!(registry.default_provider().id, "openai");
        assert_eq!(registry.default_model().unwrap().id, "gpt-4o-mini");
        assert_eq!(registry.default_model_for("openai").unwrap().id, "gpt-4o-mini");
        assert_eq!(
            registry.default_model_for("gemini").unwrap().id,
            "gemini-1.5-flash"
        );
        assert!(registry.default_model_for("nope").is_none());
    }

    #[test]
    fn provider_coercions_are_merged() {
        let registry = registry();
        let gemini = registry.coercions_for("gemini");
        assert_eq!(gemini.get("topK"), Some(Coercion::Integer));
        assert_eq!(gemini.get("maxOutputTokens"), Some(Coercion::Integer));
        assert_eq!(registry.coercions_for("openai").get("topK"), None);
    }

    #[test]
    fn provider_usage_rules_are_registered() {
        let mut config = ProvidersConfig::embedded().unwrap();
        config.providers[0].usage = Some(UsageRule::summed(&["in"], &["out"]));
        let registry = ProviderRegistry::new(config).unwrap();
        let usage = registry
            .usage_normalizer()
            .normalize(&json!({"in": 1, "out": 2}), "openai");
        assert_eq!(usage.total_tokens, 3);
    }
}
