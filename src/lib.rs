#![warn(missing_docs)]
//! flux-schnell - FLUX.1 Schnell image generation for chat hosts.
//!
//! Sends a prompt to one of several hosted FLUX.1 endpoints and normalizes
//! the answer into an image reference a chat window can render.
//!
//! # Quick Start
//!
//! ```no_run
//! use flux_schnell::{generate, Configuration};
//!
//! #[tokio::main]
//! async fn main() -> flux_schnell::Result<()> {
//!     // Reads FLUX_SCHNELL_API_BASE_URL and FLUX_SCHNELL_API_KEY.
//!     let config = Configuration::from_env()?;
//!     let image = generate("A golden retriever puppy", &config).await?;
//!     println!("{}", image.to_markdown());
//!     Ok(())
//! }
//! ```
//!
//! # As a manifold function
//!
//! ```no_run
//! use flux_schnell::{ChatBody, Pipe};
//!
//! # async fn run(body: ChatBody) {
//! let reply = Pipe::new().pipe(&body).await;
//! # }
//! ```
//!
//! # Providers
//!
//! - Hugging Face inference endpoints (raw image bytes, returned inline)
//! - Replicate predictions (image URL, pending predictions are polled)
//! - Together images API (image URL or base64)
//! - Hyperbolic image generation (base64)
//!
//! The provider is chosen with `FLUX_SCHNELL_PROVIDER`, or inferred from the
//! base URL host when that is unset.
//!
//! # Feature Flags
//!
//! - `huggingface`, `replicate`, `together`, `hyperbolic`: one provider each
//! - `providers`: all of the above (default)
//! - `cli`: the `flux-schnell` binary (default)

pub mod config;
mod error;
pub mod image;
pub mod pipe;

// Re-export error types at crate root
pub use error::{ErrorKind, FluxError, Result};

pub use config::{Configuration, ConfigurationBuilder};
pub use image::{
    generate, provider_for, GenerationRequest, GenerationResult, ImageFormat, ImageProvider,
    ProviderKind,
};
pub use pipe::{ChatBody, ChatMessage, MessageContent, Pipe, PipeInfo};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::Configuration;
    pub use crate::error::{FluxError, Result};
    pub use crate::image::{generate, GenerationRequest, GenerationResult, ImageProvider};
    pub use crate::pipe::Pipe;
}
