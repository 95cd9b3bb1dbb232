//! Provider configuration file: loading, validation and saving.
//!
//! The document has the shape
//! `{providers: [...], defaultProvider, defaultModel, defaultSettings}`.
//! A default configuration is embedded in the binary.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::provider::ProviderDefinition;

/// Embedded default provider configuration.
pub const PROVIDERS_JSON: &str = include_str!("templates/providers.json");

/// Sampling defaults applied to new settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultSettings {
    /// Sampling temperature.
    pub temperature: f64,
    /// Output token limit.
    pub max_tokens: u32,
    /// Nucleus sampling.
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    /// Frequency penalty.
    #[serde(default)]
    pub frequency_penalty: f64,
    /// Presence penalty.
    #[serde(default)]
    pub presence_penalty: f64,
}

fn default_top_p() -> f64 {
    1.0
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1000,
            top_p: default_top_p(),
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        }
    }
}

/// Parsed provider configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvidersConfig {
    /// Configured providers.
    pub providers: Vec<ProviderDefinition>,
    /// Provider selected for new settings.
    pub default_provider: String,
    /// Model selected for new settings.
    pub default_model: String,
    /// Sampling defaults.
    #[serde(default)]
    pub default_settings: DefaultSettings,
}

impl ProvidersConfig {
    /// Parses and validates the embedded configuration.
    pub fn embedded() -> Result<Self> {
        Self::from_json(PROVIDERS_JSON).context("Embedded providers.json is invalid")
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).context("Failed to parse providers configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read providers config: {}", path.display()))?;
        let config = Self::from_json(&content)
            .with_context(|| format!("Invalid providers config: {}", path.display()))?;

        debug!(
            path = %path.display(),
            providers = config.providers.len(),
            "Loaded providers configuration"
        );
        Ok(config)
    }

    /// Loads `path` when given, otherwise the embedded configuration.
    pub fn load_or_embedded(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::embedded(),
        }
    }

    /// Validates and writes the configuration, keeping the previous file as
    /// `<path>.backup`. Returns the backup path when one was written.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<Option<PathBuf>> {
        let path = path.as_ref();
        self.validate().context("Refusing to save invalid configuration")?;

        let backup = if path.exists() {
            let mut backup_name = path.as_os_str().to_os_string();
            backup_name.push(".backup");
            let backup = PathBuf::from(backup_name);
            fs::copy(path, &backup)
                .with_context(|| format!("Failed to back up {}", path.display()))?;
            Some(backup)
        } else {
            None
        };

        let content = serde_json::to_string_pretty(self)
            .context("Failed to serialize providers configuration")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write providers config: {}", path.display()))?;

        info!(path = %path.display(), "Saved providers configuration");
        Ok(backup)
    }

    /// Checks structural invariants: required fields, unique ids, and that the
    /// defaults point at a configured provider and model.
    pub fn validate(&self) -> Result<()> {
        if self.providers.is_empty() {
            bail!("Configuration must declare at least one provider");
        }
        if self.default_provider.trim().is_empty() {
            bail!("defaultProvider must not be empty");
        }
        if self.default_model.trim().is_empty() {
            bail!("defaultModel must not be empty");
        }

        let mut provider_ids = HashSet::new();
        for provider in &self.providers {
            validate_provider(provider)?;
            if !provider_ids.insert(provider.id.as_str()) {
                bail!("Duplicate provider id '{}'", provider.id);
            }
        }

        let default_provider = self
            .providers
            .iter()
            .find(|p| p.id == self.default_provider)
            .with_context(|| {
                format!(
                    "defaultProvider '{}' is not a configured provider",
                    self.default_provider
                )
            })?;
        if default_provider.model(&self.default_model).is_none() {
            bail!(
                "defaultModel '{}' is not offered by provider '{}'",
                self.default_model,
                self.default_provider
            );
        }

        Ok(())
    }
}

fn validate_provider(provider: &ProviderDefinition) -> Result<()> {
    if provider.id.is_empty() || provider.name.is_empty() || provider.display_name.is_empty() {
        bail!("Provider entries need id, name and displayName");
    }
    if provider.models.is_empty() {
        bail!("Provider '{}' declares no models", provider.id);
    }
    if provider.response_format.content_path.trim().is_empty() {
        bail!("Provider '{}' has an empty contentPath", provider.id);
    }

    let mut model_ids = HashSet::new();
    for model in &provider.models {
        if model.id.is_empty() || model.name.is_empty() || model.display_name.is_empty() {
            bail!(
                "Models of provider '{}' need id, name and displayName",
                provider.id
            );
        }
        if !model_ids.insert(model.id.as_str()) {
            bail!(
                "Duplicate model id '{}' in provider '{}'",
                model.id,
                provider.id
            );
        }
    }

    Ok(())
}
