//! Model settings and per-call request context.
//!
//! Settings are persisted as JSON in `$HOME/.promptkit/settings.json`. API
//! keys can also come from `<PROVIDER>_API_KEY` environment variables, which
//! take precedence over the file.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::attachment::AttachedFile;
use crate::provider::{ProviderDefinition, ProviderRegistry};

/// Sampling parameters, provider/model selection and API keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSettings {
    /// Selected provider id.
    pub provider: String,
    /// Selected model id.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Output token limit.
    pub max_tokens: u32,
    /// Nucleus sampling.
    pub top_p: f64,
    /// Frequency penalty.
    pub frequency_penalty: f64,
    /// Presence penalty.
    pub presence_penalty: f64,
    /// Top-k sampling; templates default to 1 when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Stop sequences; templates default to `[]` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    /// Sampling seed; templates receive `null` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    /// API keys by provider id.
    #[serde(default)]
    pub api_keys: HashMap<String, String>,
}

impl ModelSettings {
    /// Builds settings from the registry's defaults.
    pub fn from_registry(registry: &ProviderRegistry) -> Self {
        let defaults = registry.default_settings();
        let provider = registry.default_provider();
        let model = registry
            .default_model()
            .map(|m| m.id.clone())
            .unwrap_or_default();

        Self {
            provider: provider.id.clone(),
            model,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens,
            top_p: defaults.top_p,
            frequency_penalty: defaults.frequency_penalty,
            presence_penalty: defaults.presence_penalty,
            top_k: None,
            stop_sequences: None,
            seed: None,
            api_keys: HashMap::new(),
        }
    }

    /// API key for the selected provider, if configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_keys
            .get(&self.provider)
            .map(String::as_str)
            .filter(|k| !k.trim().is_empty())
    }

    /// Sets the API key for `provider_id`.
    pub fn set_api_key(&mut self, provider_id: impl Into<String>, key: impl Into<String>) {
        self.api_keys.insert(provider_id.into(), key.into());
    }

    /// Selects a provider and model.
    ///
    /// When `model` is `None` the provider's default model is used.
    pub fn select(&mut self, registry: &ProviderRegistry, provider: &str, model: Option<&str>) {
        self.provider = provider.to_string();
        self.model = match model {
            Some(m) => m.to_string(),
            None => registry
                .default_model_for(provider)
                .map(|m| m.id.clone())
                .unwrap_or_default(),
        };
    }

    /// Overrides API keys with `<PROVIDER_ID>_API_KEY` environment variables.
    pub fn apply_env_api_keys(&mut self, providers: &[ProviderDefinition]) {
        for provider in providers {
            let var = api_key_env_var(&provider.id);
            if let Ok(key) = env::var(&var) {
                if !key.trim().is_empty() {
                    debug!(provider = %provider.id, env_var = %var, "Using API key from environment");
                    self.api_keys.insert(provider.id.clone(), key);
                }
            }
        }
    }
}

/// Environment variable consulted for a provider's API key.
pub fn api_key_env_var(provider_id: &str) -> String {
    let normalized: String = provider_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{normalized}_API_KEY")
}

/// Persistent settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Store at the default location.
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(Self::default_path()?))
    }

    /// Store at a specific path.
    pub fn at<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Returns the default settings path.
    pub fn default_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home_dir.join(".promptkit").join("settings.json"))
    }

    /// Path of the settings file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads settings, falling back to the registry defaults when the file
    /// does not exist.
    pub fn load(&self, registry: &ProviderRegistry) -> Result<ModelSettings> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No settings file, using defaults");
            return Ok(ModelSettings::from_registry(registry));
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings file: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", self.path.display()))
    }

    /// Writes settings, creating the parent directory if needed.
    pub fn save(&self, settings: &ModelSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write settings file: {}", self.path.display()))
    }
}

/// Everything a single generation call needs.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// User prompt text.
    pub prompt: String,
    /// System prompt text; may be empty.
    pub system_prompt: String,
    /// Provider, model, sampling parameters and keys.
    pub settings: ModelSettings,
    /// Values for `{{name}}` variables in the prompts.
    pub variables: HashMap<String, String>,
    /// Optional attachment.
    pub attached_file: Option<AttachedFile>,
}

impl RequestContext {
    /// Creates a context without variables or attachment.
    pub fn new(
        prompt: impl Into<String>,
        system_prompt: impl Into<String>,
        settings: ModelSettings,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: system_prompt.into(),
            settings,
            variables: HashMap::new(),
            attached_file: None,
        }
    }

    /// Sets the prompt variables.
    #[must_use]
    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Attaches a file.
    #[must_use]
    pub fn with_file(mut self, file: AttachedFile) -> Self {
        self.attached_file = Some(file);
        self
    }
}
