//! Image generation module.

mod http;
mod provider;
pub mod providers;
mod types;

pub use provider::{generate, provider_for, ImageProvider};
pub use types::{GenerationRequest, GenerationResult, ImageFormat, ProviderKind};
