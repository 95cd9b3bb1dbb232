//! Provider registry and definitions.

pub mod definition;
pub mod registry;

pub use definition::{
    AttachmentProcessing, FileProcessing, FileStrategy, FileSupport, ModelDefinition,
    ProviderDefinition, RequestFormat, ResponseFormat,
};
pub use registry::ProviderRegistry;
