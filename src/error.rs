//! Error taxonomy for request translation and dispatch.

use thiserror::Error;

/// Errors raised while resolving, building, dispatching, or parsing an AI request.
///
/// None of these escape [`AiService`](crate::service::AiService): its public
/// operations fold them into the `error` field of the returned value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AiError {
    /// No provider with the requested id is registered.
    #[error("Provider '{0}' not found")]
    ProviderNotFound(String),

    /// The provider exists but has no model with the requested id.
    #[error("Model '{model}' not found for provider '{provider}'")]
    ModelNotFound {
        /// Requested model id.
        model: String,
        /// Provider that was searched.
        provider: String,
    },

    /// No API key is configured for the provider.
    #[error("API key missing for provider '{0}'. Configure it in the model settings")]
    MissingApiKey(String),

    /// The model does not accept the attachment's MIME type (or no attachments at all).
    #[error("Unsupported file type '{mime_type}'. Allowed types: {}", allowed.join(", "))]
    UnsupportedFileType {
        /// MIME type of the rejected file.
        mime_type: String,
        /// MIME types the model accepts; empty when attachments are disabled.
        allowed: Vec<String>,
    },

    /// The attachment exceeds the model's size limit.
    #[error("File too large. Maximum size: {max_size_mb}MB")]
    FileTooLarge {
        /// Size limit rendered in whole megabytes.
        max_size_mb: String,
    },

    /// The model declares an attachment processing method that is not understood.
    #[error("Unsupported processing method: {0}")]
    UnsupportedProcessingMethod(String),

    /// The provider answered with a non-2xx status.
    #[error("{message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Provider error message, or `HTTP <status>: <reason>`.
        message: String,
    },

    /// The provider answered 2xx but reported a failure in the body.
    #[error("{0}")]
    Provider(String),

    /// The request could not be built or sent.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body could not be parsed.
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl AiError {
    /// Returns true for errors detected before any network I/O.
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotFound(_)
                | Self::ModelNotFound { .. }
                | Self::MissingApiKey(_)
                | Self::UnsupportedFileType { .. }
                | Self::FileTooLarge { .. }
                | Self::UnsupportedProcessingMethod(_)
        )
    }
}
