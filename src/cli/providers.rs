//! Provider configuration commands.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use termcolor::Color;

use super::{print_status, print_structured, OutputFormat};
use crate::config::ProvidersConfig;
use crate::provider::{ProviderDefinition, ProviderRegistry};
use crate::settings::api_key_env_var;

/// Provider configuration operations.
#[derive(Parser)]
pub struct ProvidersCommand {
    /// Providers subcommand to execute.
    #[command(subcommand)]
    pub command: ProvidersSubcommands,
}

/// Providers subcommands.
#[derive(Subcommand)]
pub enum ProvidersSubcommands {
    /// Lists providers and their models.
    List(ListCommand),
    /// Shows one provider definition.
    Show(ShowCommand),
    /// Validates a providers JSON file.
    Validate(ValidateCommand),
    /// Writes the active configuration to a file, keeping a backup.
    Export(ExportCommand),
}

impl ProvidersCommand {
    /// Executes the providers command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ProvidersSubcommands::List(cmd) => cmd.execute(),
            ProvidersSubcommands::Show(cmd) => cmd.execute(),
            ProvidersSubcommands::Validate(cmd) => cmd.execute(),
            ProvidersSubcommands::Export(cmd) => cmd.execute(),
        }
    }
}

/// List command options.
#[derive(Parser)]
pub struct ListCommand {
    /// Path to a providers JSON file.
    #[arg(long, value_name = "PATH")]
    pub providers_config: Option<PathBuf>,
}

impl ListCommand {
    /// Executes the list command.
    pub fn execute(self) -> Result<()> {
        let registry = load_registry(self.providers_config)?;
        let default_provider = registry.default_provider().id.clone();
        for provider in registry.providers() {
            let marker = if provider.id == default_provider { "*" } else { " " };
            println!("{marker} {} ({})", provider.id, provider.display_name);
            for line in model_lines(&registry, provider) {
                println!("    {line}");
            }
        }
        Ok(())
    }
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {
    /// Provider id.
    pub id: String,

    /// Path to a providers JSON file.
    #[arg(long, value_name = "PATH")]
    pub providers_config: Option<PathBuf>,

    /// Output format: yaml (default), json.
    #[arg(long, default_value = "yaml")]
    pub output: String,
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self) -> Result<()> {
        let format: OutputFormat = self.output.parse()?;
        let registry = load_registry(self.providers_config)?;
        let Some(provider) = registry.provider(&self.id) else {
            bail!("Provider '{}' not found", self.id);
        };

        match format {
            OutputFormat::Text => {
                println!("{} ({})", provider.id, provider.display_name);
                println!("  base URL: {}", provider.base_url);
                println!("  endpoint: {} {}", provider.request_format.method, provider.request_format.endpoint);
                println!("  API key env var: {}", api_key_env_var(&provider.id));
                for line in model_lines(&registry, provider) {
                    println!("  {line}");
                }
                Ok(())
            }
            structured => print_structured(provider, structured),
        }
    }
}

/// Validate command options.
#[derive(Parser)]
pub struct ValidateCommand {
    /// Providers JSON file to check.
    pub path: PathBuf,
}

impl ValidateCommand {
    /// Executes the validate command.
    pub fn execute(self) -> Result<()> {
        let config = ProvidersConfig::load_from_path(&self.path)?;
        config
            .validate()
            .with_context(|| format!("{} is not a valid providers configuration", self.path.display()))?;

        let models: usize = config.providers.iter().map(|p| p.models.len()).sum();
        print_status(
            Color::Green,
            &format!(
                "{} is valid: {} providers, {} models",
                self.path.display(),
                config.providers.len(),
                models
            ),
        )
    }
}

/// Export command options.
#[derive(Parser)]
pub struct ExportCommand {
    /// Destination file.
    pub path: PathBuf,

    /// Providers JSON file to export instead of the built-in providers.
    #[arg(long, value_name = "PATH")]
    pub providers_config: Option<PathBuf>,
}

impl ExportCommand {
    /// Executes the export command.
    pub fn execute(self) -> Result<()> {
        let config = ProvidersConfig::load_or_embedded(self.providers_config.as_deref())?;
        let backup = config.save_to_path(&self.path)?;
        if let Some(backup) = backup {
            print_status(Color::Yellow, &format!("Previous file kept at {}", backup.display()))?;
        }
        print_status(Color::Green, &format!("Wrote {}", self.path.display()))
    }
}

fn load_registry(path: Option<PathBuf>) -> Result<ProviderRegistry> {
    ProviderRegistry::new(ProvidersConfig::load_or_embedded(path.as_deref())?)
}

fn model_lines(registry: &ProviderRegistry, provider: &ProviderDefinition) -> Vec<String> {
    let default_model = registry.default_model_for(&provider.id).map(|m| m.id.as_str());
    provider
        .models
        .iter()
        .map(|model| {
            let marker = if Some(model.id.as_str()) == default_model { "*" } else { "-" };
            let files = if model.accepts_files() { ", files" } else { "" };
            format!(
                "{marker} {} ({}, {} context tokens{files})",
                model.id, model.display_name, model.max_tokens
            )
        })
        .collect()
}
