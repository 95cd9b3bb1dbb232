//! # promptkit
//!
//! Declarative, provider-agnostic AI request translation.
//!
//! Providers are described as data: a base URL, header templates, a JSON
//! request body full of `{placeholder}` tokens and the paths where the
//! answer lives. [`AiService`] turns a prompt plus settings into that
//! provider's wire format and the answer back into a [`NormalizedResponse`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use promptkit::{AiService, ModelSettings, ProviderRegistry, RequestContext};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let registry = ProviderRegistry::embedded()?;
//! let mut settings = ModelSettings::from_registry(&registry);
//! settings.set_api_key("openai", "sk-...");
//!
//! let service = AiService::new(registry);
//! let ctx = RequestContext::new("Say hello to {{name}}", "", settings)
//!     .with_variables([("name".to_string(), "Ana".to_string())].into());
//! let response = service.generate_response(&ctx).await;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod attachment;
pub mod cli;
pub mod config;
pub mod error;
pub mod provider;
pub mod response;
pub mod service;
pub mod settings;
pub mod template;
pub mod tokens;

#[cfg(test)]
mod test_utils;

pub use crate::attachment::AttachedFile;
pub use crate::cli::Cli;
pub use crate::error::AiError;
pub use crate::provider::ProviderRegistry;
pub use crate::response::{NormalizedResponse, Usage};
pub use crate::service::{AiService, ConnectionStatus};
pub use crate::settings::{ModelSettings, RequestContext};

/// The current version of promptkit.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
