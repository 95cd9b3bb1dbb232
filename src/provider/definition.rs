//! Declarative provider and model definitions, as stored in `providers.json`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attachment::ContentSpec;
use crate::response::UsageRule;
use crate::template::Coercion;

/// One configured AI HTTP API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDefinition {
    /// Stable identifier, also the key into `apiKeys`.
    pub id: String,
    /// Short name.
    pub name: String,
    /// Name shown to users.
    pub display_name: String,
    /// URL prefix the endpoint is appended to.
    pub base_url: String,
    /// Header templates; `{apiKey}` and `{model}` are substituted.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// How requests are built.
    pub request_format: RequestFormat,
    /// Where results live in the response.
    pub response_format: ResponseFormat,
    /// Available models, in display order.
    #[serde(default)]
    pub models: Vec<ModelDefinition>,
    /// Extra key coercions layered over the built-in table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub coercions: BTreeMap<String, Coercion>,
    /// Usage field mapping; overrides the built-in mapping for this id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageRule>,
}

impl ProviderDefinition {
    /// Looks up a model by id.
    pub fn model(&self, model_id: &str) -> Option<&ModelDefinition> {
        self.models.iter().find(|m| m.id == model_id)
    }

    /// Returns the multimodal settings when file processing is enabled.
    pub fn file_processing(&self) -> Option<&FileProcessing> {
        self.request_format
            .file_processing
            .as_ref()
            .filter(|fp| fp.enabled)
    }
}

/// Request template for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFormat {
    /// HTTP method.
    #[serde(default = "default_method")]
    pub method: String,
    /// Endpoint template appended to the base URL.
    pub endpoint: String,
    /// Body template; any JSON tree with `{placeholder}` strings.
    pub body: Value,
    /// Multimodal attachment handling.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_processing: Option<FileProcessing>,
}

fn default_method() -> String {
    "POST".to_string()
}

/// How attachments are embedded into the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProcessing {
    /// Whether multimodal content is built for this provider.
    pub enabled: bool,
    /// Request family the content structure targets.
    #[serde(default)]
    pub strategy: FileStrategy,
    /// Ordered content block specs.
    #[serde(default)]
    pub content_structure: Vec<ContentSpec>,
}

/// Multimodal request family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStrategy {
    /// Chat-style `content` arrays (`image_url`, `image`, `text`).
    #[default]
    Multimodal,
    /// Responses-style inputs (`input_file`, `input_text`).
    ResponsesApi,
}

/// Response locations for a provider, as path expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFormat {
    /// Path to the generated text.
    pub content_path: String,
    /// Path to the usage block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_path: Option<String>,
    /// Path to an in-band error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_path: Option<String>,
}

impl ResponseFormat {
    /// Usage path, treating an empty string as unset.
    pub fn usage_path(&self) -> Option<&str> {
        non_empty(self.usage_path.as_deref())
    }

    /// Error path, treating an empty string as unset.
    pub fn error_path(&self) -> Option<&str> {
        non_empty(self.error_path.as_deref())
    }
}

fn non_empty(path: Option<&str>) -> Option<&str> {
    path.map(str::trim).filter(|p| !p.is_empty())
}

/// One model offered by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    /// Identifier used in settings; unique within the provider.
    pub id: String,
    /// Wire-level model name substituted for `{model}`.
    pub name: String,
    /// Name shown to users.
    pub display_name: String,
    /// Context limit.
    pub max_tokens: u32,
    /// Suggested temperature.
    pub default_temperature: f64,
    /// Suggested output limit.
    pub default_max_tokens: u32,
    /// Attachment capabilities.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_support: Option<FileSupport>,
}

impl ModelDefinition {
    /// Returns true when the model accepts attachments.
    pub fn accepts_files(&self) -> bool {
        self.file_support.as_ref().is_some_and(|s| s.enabled)
    }
}

/// Attachment capabilities of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSupport {
    /// Whether attachments are accepted.
    pub enabled: bool,
    /// Maximum size in bytes.
    pub max_size: u64,
    /// Accepted MIME types.
    #[serde(default)]
    pub allowed_types: Vec<String>,
    /// How accepted files are converted.
    pub processing: AttachmentProcessing,
}

/// Attachment conversion settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentProcessing {
    /// `context` or `base64`; anything else is rejected at request time.
    pub method: String,
    /// Informational payload format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Text appended to the prompt by the `context` method.
    #[serde(default)]
    pub context_template: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_provider_definition() {
        let provider: ProviderDefinition = serde_json::from_value(json!({
            "id": "openai",
            "name": "OpenAI",
            "displayName": "OpenAI",
            "baseUrl": "https://api.openai.com/v1",
            "headers": {"Authorization": "Bearer {apiKey}"},
            "requestFormat": {
                "endpoint": "/chat/completions",
                "body": {"model": "{model}"},
                "fileProcessing": {
                    "enabled": true,
                    "strategy": "responses_api",
                    "contentStructure": [{"type": "input_file"}]
                }
            },
            "responseFormat": {"contentPath": "choices[0].message.content", "usagePath": "usage"},
            "models": [{
                "id": "gpt-4o",
                "name": "gpt-4o-2024-08-06",
                "displayName": "GPT-4o",
                "maxTokens": 128000,
                "defaultTemperature": 0.7,
                "defaultMaxTokens": 4096
            }],
            "coercions": {"topK": "integer"}
        }))
        .unwrap();

        assert_eq!(provider.request_format.method, "POST");
        assert_eq!(
            provider.file_processing().map(|fp| fp.strategy),
            Some(FileStrategy::ResponsesApi)
        );
        assert_eq!(provider.model("gpt-4o").unwrap().name, "gpt-4o-2024-08-06");
        assert!(provider.model("gpt-5").is_none());
        assert!(!provider.models[0].accepts_files());
        assert_eq!(provider.coercions["topK"], Coercion::Integer);
        assert_eq!(provider.response_format.error_path(), None);
    }

    #[test]
    fn disabled_file_processing_is_hidden() {
        let format: RequestFormat = serde_json::from_value(json!({
            "method": "POST",
            "endpoint": "/x",
            "body": {},
            "fileProcessing": {"enabled": false}
        }))
        .unwrap();
        let provider = ProviderDefinition {
            id: "p".to_string(),
            name: "p".to_string(),
            display_name: "P".to_string(),
            base_url: "http://localhost".to_string(),
            headers: BTreeMap::new(),
            request_format: format,
            response_format: ResponseFormat {
                content_path: "text".to_string(),
                usage_path: None,
                error_path: Some("  ".to_string()),
            },
            models: Vec::new(),
            coercions: BTreeMap::new(),
            usage: None,
        };
        assert!(provider.file_processing().is_none());
        assert_eq!(provider.response_format.error_path(), None);
    }
}
