//! The `generate` command.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use termcolor::Color;
use tracing::debug;

use super::{build_service, print_status, print_structured, OutputFormat, TargetArgs, REQUEST_TIMEOUT};
use crate::attachment::AttachedFile;
use crate::response::NormalizedResponse;
use crate::settings::RequestContext;
use crate::template::extract_prompt_variables;
use crate::tokens::format_token_count;

/// Generates a response for a prompt.
#[derive(Parser)]
pub struct GenerateCommand {
    /// User prompt; may contain `{{name}}` variables.
    #[arg(short, long)]
    pub prompt: String,

    /// System prompt; may contain `{{name}}` variables.
    #[arg(short, long, default_value = "")]
    pub system: String,

    /// Variable binding, repeatable.
    #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_variable)]
    pub vars: Vec<(String, String)>,

    /// File to attach.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Provider and model selection.
    #[command(flatten)]
    pub target: TargetArgs,

    /// Sampling temperature override.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Output token limit override.
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// Output format: text (default), json, yaml.
    #[arg(long, default_value = "text")]
    pub output: String,
}

impl GenerateCommand {
    /// Executes the generate command.
    pub async fn execute(self) -> Result<()> {
        let format: OutputFormat = self.output.parse()?;
        let registry = self.target.registry()?;
        let mut settings = self.target.settings(&registry)?;
        if let Some(temperature) = self.temperature {
            settings.temperature = temperature;
        }
        if let Some(max_tokens) = self.max_tokens {
            settings.max_tokens = max_tokens;
        }

        let variables: HashMap<String, String> = self.vars.into_iter().collect();
        let unbound: Vec<String> = extract_prompt_variables(&self.system, &self.prompt)
            .into_iter()
            .filter(|name| !variables.contains_key(name))
            .collect();
        if !unbound.is_empty() {
            print_status(
                Color::Yellow,
                &format!("Warning: unbound variables left as-is: {}", unbound.join(", ")),
            )?;
        }

        let mut ctx = RequestContext::new(self.prompt, self.system, settings).with_variables(variables);
        if let Some(path) = &self.file {
            let file = AttachedFile::from_path(path)
                .with_context(|| format!("Failed to attach {}", path.display()))?;
            ctx = ctx.with_file(file);
        }

        debug!(provider = %ctx.settings.provider, model = %ctx.settings.model, "Generating response");
        let service = build_service(registry)?;
        let response = tokio::time::timeout(REQUEST_TIMEOUT, service.generate_response(&ctx))
            .await
            .unwrap_or_else(|_| {
                NormalizedResponse::failure(format!(
                    "Request timed out after {}s",
                    REQUEST_TIMEOUT.as_secs()
                ))
            });

        match format {
            OutputFormat::Text => print_text(&response)?,
            structured => print_structured(&response, structured)?,
        }

        match response.error {
            Some(error) => Err(anyhow!(error)),
            None => Ok(()),
        }
    }
}

fn print_text(response: &NormalizedResponse) -> Result<()> {
    if response.is_error() {
        return Ok(());
    }
    println!("{}", response.content);
    if let Some(usage) = &response.usage {
        print_status(
            Color::Cyan,
            &format!(
                "Usage: {} prompt, {} completion, {} total",
                format_token_count(usage.prompt_tokens as usize),
                format_token_count(usage.completion_tokens as usize),
                format_token_count(usage.total_tokens as usize),
            ),
        )?;
    }
    Ok(())
}

/// Parses `NAME=VALUE`, splitting at the first `=`.
fn parse_variable(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected NAME=VALUE, got '{raw}'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("variable name must not be empty");
    }
    Ok((name.to_string(), value.to_string()))
}
