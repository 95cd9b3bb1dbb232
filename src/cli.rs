//! CLI interface for promptkit.

use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::debug;

use crate::config::ProvidersConfig;
use crate::provider::ProviderRegistry;
use crate::service::{AiService, ReqwestTransport};
use crate::settings::{ModelSettings, SettingsStore};

pub mod connection;
pub mod generate;
pub mod providers;
pub mod tokens;

/// How long the CLI waits for a provider before giving up.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// promptkit: declarative, provider-agnostic AI prompting.
#[derive(Parser)]
#[command(name = "promptkit")]
#[command(about = "Send prompts to any configured AI provider", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Generates a response for a prompt.
    Generate(generate::GenerateCommand),
    /// Sends a small probe request to check credentials.
    #[command(name = "test-connection")]
    TestConnection(connection::TestConnectionCommand),
    /// Inspects and validates provider configurations.
    Providers(providers::ProvidersCommand),
    /// Estimates prompt tokens and lists prompt variables.
    Tokens(tokens::TokensCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Generate(cmd) => cmd.execute().await,
            Commands::TestConnection(cmd) => cmd.execute().await,
            Commands::Providers(cmd) => cmd.execute(),
            Commands::Tokens(cmd) => cmd.execute(),
        }
    }
}

/// Provider/model selection shared by commands that talk to a provider.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Provider id (defaults to the saved or configured default).
    #[arg(long)]
    pub provider: Option<String>,

    /// Model id (defaults to the provider's default model).
    #[arg(long)]
    pub model: Option<String>,

    /// Path to a providers JSON file (defaults to the built-in providers).
    #[arg(long, value_name = "PATH")]
    pub providers_config: Option<PathBuf>,
}

impl TargetArgs {
    /// Builds the provider registry.
    pub fn registry(&self) -> Result<ProviderRegistry> {
        let config = ProvidersConfig::load_or_embedded(self.providers_config.as_deref())?;
        ProviderRegistry::new(config).context("Invalid providers configuration")
    }

    /// Loads saved settings and applies the selection and environment keys.
    pub fn settings(&self, registry: &ProviderRegistry) -> Result<ModelSettings> {
        let mut settings = match SettingsStore::open_default() {
            Ok(store) => store.load(registry)?,
            Err(e) => {
                debug!(error = %e, "Settings store unavailable, using defaults");
                ModelSettings::from_registry(registry)
            }
        };

        match (&self.provider, &self.model) {
            (Some(provider), model) => settings.select(registry, provider, model.as_deref()),
            (None, Some(model)) => settings.model.clone_from(model),
            (None, None) => {}
        }

        settings.apply_env_api_keys(registry.providers());
        Ok(settings)
    }
}

/// Builds a service whose HTTP client identifies as promptkit.
pub(crate) fn build_service(registry: ProviderRegistry) -> Result<AiService> {
    let client = reqwest::Client::builder()
        .user_agent(format!("promptkit/{}", crate::VERSION))
        .build()
        .context("Failed to build HTTP client")?;
    Ok(AiService::with_transport(
        registry,
        Box::new(ReqwestTransport::with_client(client)),
    ))
}

/// Output format for structured results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// JSON.
    Json,
    /// YAML.
    Yaml,
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            other => Err(anyhow!("Unknown output format '{other}' (expected text, json or yaml)")),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
            Self::Yaml => write!(f, "yaml"),
        }
    }
}

/// Prints `value` as JSON or YAML. Text output is left to the caller.
pub(crate) fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
            println!("{json}");
        }
        OutputFormat::Yaml => {
            let yaml = serde_yaml::to_string(value).context("Failed to serialize to YAML")?;
            print!("{yaml}");
        }
        OutputFormat::Text => {}
    }
    Ok(())
}

/// Writes a colored line to stderr.
pub(crate) fn print_status(color: Color, text: &str) -> Result<()> {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    stderr.set_color(ColorSpec::new().set_fg(Some(color)))?;
    writeln!(stderr, "{text}")?;
    stderr.reset()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yaml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!("xml".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::default().to_string(), "text");
    }

    #[test]
    fn parses_generate_arguments() {
        let cli = Cli::try_parse_from([
            "promptkit",
            "generate",
            "-p",
            "Hi {{name}}",
            "--var",
            "name=Ana",
            "--var",
            "tone=warm = kind",
            "--provider",
            "gemini",
            "--max-tokens",
            "64",
        ])
        .unwrap();

        let Commands::Generate(cmd) = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(cmd.prompt, "Hi {{name}}");
        assert_eq!(
            cmd.vars,
            vec![
                ("name".to_string(), "Ana".to_string()),
                ("tone".to_string(), "warm = kind".to_string())
            ]
        );
        assert_eq!(cmd.target.provider.as_deref(), Some("gemini"));
        assert_eq!(cmd.max_tokens, Some(64));
    }

    #[test]
    fn rejects_malformed_variable() {
        assert!(Cli::try_parse_from(["promptkit", "generate", "-p", "x", "--var", "novalue"]).is_err());
    }

    #[test]
    fn service_uses_given_registry() {
        let service = build_service(ProviderRegistry::embedded().unwrap()).unwrap();
        assert_eq!(service.registry().default_provider().id, "openai");
    }

    #[test]
    fn target_registry_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("providers.json");
        std::fs::write(&path, crate::config::PROVIDERS_JSON).unwrap();

        let target = TargetArgs {
            providers_config: Some(path),
            ..TargetArgs::default()
        };
        assert_eq!(target.registry().unwrap().providers().len(), 3);
    }
}
