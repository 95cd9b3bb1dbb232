//! Heuristic token estimation for prompts.
//!
//! Counts one token per run of word characters and one per punctuation
//! symbol. Whitespace never counts. This is an approximation for display,
//! not a provider tokenizer.

use std::sync::LazyLock;

use regex::Regex;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+|[^\w\s]").unwrap());

/// Formatting overhead added when both system and user prompts are present.
pub const PROMPT_OVERHEAD: usize = 10;

/// Estimates the number of tokens in `text`.
pub fn estimate_token_count(text: &str) -> usize {
    TOKEN_PATTERN.find_iter(text).count()
}

/// Estimates tokens for a system/user prompt pair.
pub fn count_prompt_tokens(system_prompt: &str, user_prompt: &str) -> usize {
    let overhead = if !system_prompt.is_empty() && !user_prompt.is_empty() {
        PROMPT_OVERHEAD
    } else {
        0
    };
    estimate_token_count(system_prompt) + estimate_token_count(user_prompt) + overhead
}

/// Formats a token count for display, e.g. `1 token` or `12 tokens`.
pub fn format_token_count(count: usize) -> String {
    match count {
        1 => "1 token".to_string(),
        n => format!("{n} tokens"),
    }
}
