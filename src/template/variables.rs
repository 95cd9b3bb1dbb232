//! User-namespace `{{name}}` variables in prompt text.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static VARIABLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").unwrap());

/// Replaces every `{{name}}` in `text` whose trimmed name is bound in
/// `variables`. Unbound variables stay in place verbatim.
///
/// Single-brace `{token}` placeholders are never touched.
pub fn substitute_variables(text: &str, variables: &HashMap<String, String>) -> String {
    if variables.is_empty() {
        return text.to_string();
    }

    VARIABLE_PATTERN
        .replace_all(text, |caps: &Captures<'_>| {
            let name = caps[1].trim();
            variables
                .get(name)
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Returns the distinct variable names in `text`, in order of first appearance.
pub fn extract_variables(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in VARIABLE_PATTERN.captures_iter(text) {
        let name = caps[1].trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Collects the variables of a system and user prompt pair, system first.
pub fn extract_prompt_variables(system_prompt: &str, user_prompt: &str) -> Vec<String> {
    let mut names = extract_variables(system_prompt);
    for name in extract_variables(user_prompt) {
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn substitutes_bound_variables() {
        let out = substitute_variables("Hello {{name}}", &vars(&[("name", "Ana")]));
        assert_eq!(out, "Hello Ana");
    }

    #[test]
    fn substitutes_every_occurrence() {
        let out = substitute_variables("{{x}} and {{x}}", &vars(&[("x", "1")]));
        assert_eq!(out, "1 and 1");
    }

    #[test]
    fn unbound_variables_stay_literal() {
        let out = substitute_variables("Hi {{name}}, {{missing}}", &vars(&[("name", "Ana")]));
        assert_eq!(out, "Hi Ana, {{missing}}");
    }

    #[test]
    fn wire_placeholders_are_untouched() {
        let out = substitute_variables(
            "Use {model} for {{model}}",
            &vars(&[("model", "the essay")]),
        );
        assert_eq!(out, "Use {model} for the essay");
    }

    #[test]
    fn whitespace_inside_braces_is_trimmed() {
        let out = substitute_variables("Dear {{ name }}", &vars(&[("name", "Ana")]));
        assert_eq!(out, "Dear Ana");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let out = substitute_variables("{{a}}", &vars(&[("a", "{{b}}"), ("b", "nope")]));
        assert_eq!(out, "{{b}}");
    }

    #[test]
    fn extracts_distinct_names_in_order() {
        let names = extract_variables("{{topic}} for {{ audience }} about {{topic}}");
        assert_eq!(names, vec!["topic", "audience"]);
    }

    #[test]
    fn extract_ignores_single_braces() {
        assert!(extract_variables("{model} {temperature}").is_empty());
    }

    #[test]
    fn merges_system_and_user_variables() {
        let names = extract_prompt_variables("You are {{role}}", "Explain {{topic}} as {{role}}");
        assert_eq!(names, vec!["role", "topic"]);
    }
}
