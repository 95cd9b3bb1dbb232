//! Builds provider content arrays for requests that carry an attachment.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::FileData;

const USER_PROMPT_TOKEN: &str = "{userPrompt}";

/// One entry of a provider's declared content structure.
///
/// `kind` selects the block shape; `content` (for `text`) and `text` (for
/// `input_text`) hold a template where `{userPrompt}` is replaced by the
/// processed prompt. A missing template falls back to the bare prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSpec {
    /// Block type: `text`, `image_url`, `image`, `input_file` or `input_text`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Template for `text` blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Template for `input_text` blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentSpec {
    /// Creates a spec of the given kind with no template.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            content: None,
            text: None,
        }
    }
}

/// Emits one content block per spec, in declared order.
///
/// Media blocks are skipped when `file_data` is absent, and unknown kinds are
/// ignored.
pub fn build_content(
    prompt: &str,
    file_data: Option<&FileData>,
    structure: &[ContentSpec],
) -> Vec<Value> {
    structure
        .iter()
        .filter_map(|spec| match (spec.kind.as_str(), file_data) {
            ("text", _) => Some(json!({
                "type": "text",
                "text": fill_prompt(spec.content.as_deref(), prompt),
            })),
            ("input_text", _) => Some(json!({
                "type": "input_text",
                "text": fill_prompt(spec.text.as_deref(), prompt),
            })),
            ("image_url", Some(file)) => Some(json!({
                "type": "image_url",
                "image_url": { "url": file.data_uri() },
            })),
            ("image", Some(file)) => Some(json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": file.mime_type,
                    "data": file.data,
                },
            })),
            ("input_file", Some(file)) => Some(json!({
                "type": "input_file",
                "filename": file.file_name,
                "file_data": file.data_uri(),
            })),
            _ => None,
        })
        .collect()
}

fn fill_prompt(template: Option<&str>, prompt: &str) -> String {
    match template {
        Some(t) if !t.is_empty() => t.replace(USER_PROMPT_TOKEN, prompt),
        _ => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> FileData {
        FileData {
            mime_type: "image/png".to_string(),
            data: "QUJD".to_string(),
            file_name: "a.png".to_string(),
            file_size: "0.00".to_string(),
        }
    }

    fn text_spec(template: &str) -> ContentSpec {
        ContentSpec {
            content: Some(template.to_string()),
            ..ContentSpec::new("text")
        }
    }

    #[test]
    fn preserves_declared_order() {
        let structure = vec![ContentSpec::new("image_url"), text_spec("Q: {userPrompt}")];
        let blocks = build_content("why?", Some(&file()), &structure);
        assert_eq!(
            blocks,
            vec![
                json!({"type": "image_url", "image_url": {"url": "data:image/png;base64,QUJD"}}),
                json!({"type": "text", "text": "Q: why?"}),
            ]
        );
    }

    #[test]
    fn anthropic_image_block() {
        let blocks = build_content("p", Some(&file()), &[ContentSpec::new("image")]);
        assert_eq!(
            blocks,
            vec![json!({
                "type": "image",
                "source": {"type": "base64", "media_type": "image/png", "data": "QUJD"}
            })]
        );
    }

    #[test]
    fn responses_api_blocks() {
        let structure = vec![
            ContentSpec::new("input_file"),
            ContentSpec {
                text: Some("{userPrompt}".to_string()),
                ..ContentSpec::new("input_text")
            },
        ];
        let blocks = build_content("read it", Some(&file()), &structure);
        assert_eq!(
            blocks,
            vec![
                json!({
                    "type": "input_file",
                    "filename": "a.png",
                    "file_data": "data:image/png;base64,QUJD"
                }),
                json!({"type": "input_text", "text": "read it"}),
            ]
        );
    }

    #[test]
    fn media_blocks_skipped_without_file() {
        let structure = vec![
            ContentSpec::new("image_url"),
            ContentSpec::new("image"),
            ContentSpec::new("input_file"),
            ContentSpec::new("text"),
        ];
        let blocks = build_content("only text", None, &structure);
        assert_eq!(blocks, vec![json!({"type": "text", "text": "only text"})]);
    }

    #[test]
    fn unknown_kinds_are_ignored() {
        let blocks = build_content("p", Some(&file()), &[ContentSpec::new("audio")]);
        assert!(blocks.is_empty());
    }

    #[test]
    fn deserializes_config_shape() {
        let spec: ContentSpec =
            serde_json::from_value(json!({"type": "text", "content": "{userPrompt}"})).unwrap();
        assert_eq!(spec, text_spec("{userPrompt}"));
    }
}
