//! File attachments: validation against a model's capabilities and
//! conversion into prompt context or a base64 payload.

pub mod multimodal;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use tracing::debug;

use crate::error::AiError;
use crate::provider::ModelDefinition;
use crate::template::{render, Bindings};

pub use multimodal::{build_content, ContentSpec};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Name used when an attachment arrives without one.
const DEFAULT_FILE_NAME: &str = "file";

/// A file the user attached to a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedFile {
    /// Raw file contents.
    pub bytes: Vec<u8>,
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// File name shown to the model.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

impl AttachedFile {
    /// Creates an attachment from in-memory bytes.
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>, name: impl Into<String>) -> Self {
        let size = bytes.len() as u64;
        Self {
            bytes,
            mime_type: mime_type.into(),
            name: name.into(),
            size,
        }
    }

    /// Reads a file from disk, inferring its MIME type from the extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read attachment: {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime_type = mime_type_for_path(path);

        debug!(file = %path.display(), mime_type, size = bytes.len(), "Loaded attachment");
        Ok(Self::new(bytes, mime_type, name))
    }

    /// Decodes a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str, name: impl Into<String>) -> Result<Self> {
        let rest = uri
            .strip_prefix("data:")
            .context("Attachment is not a data URI")?;
        let (header, payload) = rest
            .split_once(',')
            .context("Data URI is missing its payload")?;
        let mime_type = header
            .strip_suffix(";base64")
            .context("Only base64 data URIs are supported")?;
        let bytes = STANDARD
            .decode(payload)
            .context("Failed to decode base64 payload")?;

        Ok(Self::new(bytes, mime_type, name))
    }

    /// Size in megabytes, rendered with two decimals.
    pub fn size_mb(&self) -> String {
        format!("{:.2}", self.size as f64 / BYTES_PER_MB)
    }

    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_FILE_NAME
        } else {
            &self.name
        }
    }
}

/// Base64 payload produced for models that receive files inline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    /// MIME type.
    #[serde(rename = "type")]
    pub mime_type: String,
    /// Base64 file contents, without any data-URI prefix.
    pub data: String,
    /// File name.
    pub file_name: String,
    /// Size in megabytes, two decimals.
    pub file_size: String,
}

impl FileData {
    /// Renders the payload as a `data:` URI.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Outcome of attachment processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedAttachment {
    /// Prompt text, with file context appended for the `context` method.
    pub prompt: String,
    /// Base64 payload for the `base64` method.
    pub file_data: Option<FileData>,
}

/// Validates `file` against `model` and converts it per the model's
/// processing method.
pub fn process(
    file: &AttachedFile,
    model: &ModelDefinition,
    prompt: &str,
) -> Result<ProcessedAttachment, AiError> {
    let support = model
        .file_support
        .as_ref()
        .filter(|s| s.enabled)
        .ok_or_else(|| AiError::UnsupportedFileType {
            mime_type: file.mime_type.clone(),
            allowed: Vec::new(),
        })?;

    if !support.allowed_types.iter().any(|t| t == &file.mime_type) {
        return Err(AiError::UnsupportedFileType {
            mime_type: file.mime_type.clone(),
            allowed: support.allowed_types.clone(),
        });
    }

    if file.size > support.max_size {
        return Err(AiError::FileTooLarge {
            max_size_mb: format!("{:.0}", support.max_size as f64 / BYTES_PER_MB),
        });
    }

    let file_name = file.display_name().to_string();
    let file_size = file.size_mb();

    match support.processing.method.as_str() {
        "context" => {
            let bindings = Bindings::from([
                ("fileName".to_string(), file_name),
                ("fileSize".to_string(), file_size),
            ]);
            let context = render(&support.processing.context_template, &bindings);
            Ok(ProcessedAttachment {
                prompt: format!("{prompt}{context}"),
                file_data: None,
            })
        }
        "base64" => Ok(ProcessedAttachment {
            prompt: prompt.to_string(),
            file_data: Some(FileData {
                mime_type: file.mime_type.clone(),
                data: STANDARD.encode(&file.bytes),
                file_name,
                file_size,
            }),
        }),
        other => Err(AiError::UnsupportedProcessingMethod(other.to_string())),
    }
}

/// Best-effort MIME type for the attachment formats providers accept.
fn mime_type_for_path(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{AttachmentProcessing, FileSupport};

    fn model_with(method: &str, max_size: u64) -> ModelDefinition {
        ModelDefinition {
            id: "vision".to_string(),
            name: "vision-1".to_string(),
            display_name: "Vision".to_string(),
            max_tokens: 4096,
            default_temperature: 0.7,
            default_max_tokens: 1024,
            file_support: Some(FileSupport {
                enabled: true,
                max_size,
                allowed_types: vec!["image/png".to_string(), "application/pdf".to_string()],
                processing: AttachmentProcessing {
                    method: method.to_string(),
                    format: None,
                    context_template: "\n\n[Attached: {fileName} ({fileSize} MB)]".to_string(),
                },
            }),
        }
    }

    fn png(size: usize) -> AttachedFile {
        AttachedFile::new(vec![7u8; size], "image/png", "chart.png")
    }

    #[test]
    fn size_gate_is_inclusive() {
        let model = model_with("base64", 1024);
        assert!(process(&png(1024), &model, "p").is_ok());
        assert_eq!(
            process(&png(1025), &model, "p"),
            Err(AiError::FileTooLarge {
                max_size_mb: "0".to_string()
            })
        );
    }

    #[test]
    fn rejects_disallowed_type() {
        let model = model_with("base64", 1024);
        let file = AttachedFile::new(vec![1, 2], "text/csv", "data.csv");
        assert!(matches!(
            process(&file, &model, "p"),
            Err(AiError::UnsupportedFileType { allowed, .. }) if allowed.len() == 2
        ));
    }

    #[test]
    fn rejects_models_without_file_support() {
        let mut model = model_with("base64", 1024);
        model.file_support = None;
        assert!(matches!(
            process(&png(1), &model, "p"),
            Err(AiError::UnsupportedFileType { .. })
        ));

        let mut disabled = model_with("base64", 1024);
        if let Some(support) = disabled.file_support.as_mut() {
            support.enabled = false;
        }
        assert!(matches!(
            process(&png(1), &disabled, "p"),
            Err(AiError::UnsupportedFileType { .. })
        ));
    }

    #[test]
    fn context_method_appends_to_prompt() {
        let model = model_with("context", 10 * 1024 * 1024);
        let file = AttachedFile::new(vec![0u8; 1_572_864], "application/pdf", "report.pdf");
        let out = process(&file, &model, "Summarize").unwrap();
        assert_eq!(out.prompt, "Summarize\n\n[Attached: report.pdf (1.50 MB)]");
        assert!(out.file_data.is_none());
    }

    #[test]
    fn base64_method_encodes_bytes() {
        let model = model_with("base64", 1024);
        let file = AttachedFile::new(b"hello".to_vec(), "image/png", "");
        let out = process(&file, &model, "Describe").unwrap();
        assert_eq!(out.prompt, "Describe");
        let data = out.file_data.unwrap();
        assert_eq!(data.data, "aGVsbG8=");
        assert_eq!(data.file_name, "file");
        assert_eq!(data.file_size, "0.00");
        assert_eq!(data.data_uri(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn unknown_method_is_rejected() {
        let model = model_with("upload", 1024);
        assert_eq!(
            process(&png(1), &model, "p"),
            Err(AiError::UnsupportedProcessingMethod("upload".to_string()))
        );
    }

    #[test]
    fn data_uri_prefix_is_detached() {
        let file = AttachedFile::from_data_uri("data:image/png;base64,aGVsbG8=", "x.png").unwrap();
        assert_eq!(file.bytes, b"hello");
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.size, 5);
        assert!(AttachedFile::from_data_uri("aGVsbG8=", "x").is_err());
    }

    #[test]
    fn from_path_infers_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Scan.PDF");
        fs::write(&path, b"%PDF-1.4").unwrap();
        let file = AttachedFile::from_path(&path).unwrap();
        assert_eq!(file.mime_type, "application/pdf");
        assert_eq!(file.name, "Scan.PDF");
        assert_eq!(file.size, 8);
    }
}
