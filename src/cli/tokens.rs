//! The `tokens` command.

use anyhow::Result;
use clap::Parser;

use crate::template::{extract_prompt_variables, extract_variables};
use crate::tokens::{count_prompt_tokens, estimate_token_count, format_token_count};

/// Estimates prompt tokens and lists prompt variables.
#[derive(Parser)]
pub struct TokensCommand {
    /// User prompt.
    #[arg(short, long, default_value = "")]
    pub prompt: String,

    /// System prompt.
    #[arg(short, long, default_value = "")]
    pub system: String,
}

impl TokensCommand {
    /// Executes the tokens command.
    pub fn execute(self) -> Result<()> {
        println!("System: {}", format_token_count(estimate_token_count(&self.system)));
        println!("User:   {}", format_token_count(estimate_token_count(&self.prompt)));
        println!(
            "Total:  {}",
            format_token_count(count_prompt_tokens(&self.system, &self.prompt))
        );

        let variables = extract_prompt_variables(&self.system, &self.prompt);
        if !variables.is_empty() {
            println!("Variables:");
            for name in variables {
                let origin = if extract_variables(&self.system).contains(&name) {
                    "system"
                } else {
                    "user"
                };
                println!("  {{{{{name}}}}} ({origin})");
            }
        }
        Ok(())
    }
}
