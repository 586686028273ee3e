//! Image provider trait and the adapter entry point.

use crate::config::Configuration;
use crate::error::{FluxError, Result};
use crate::image::http;
#[cfg(feature = "huggingface")]
use crate::image::providers::HuggingFaceProvider;
#[cfg(feature = "hyperbolic")]
use crate::image::providers::HyperbolicProvider;
#[cfg(feature = "replicate")]
use crate::image::providers::ReplicateProvider;
#[cfg(feature = "together")]
use crate::image::providers::TogetherProvider;
use crate::image::types::{GenerationRequest, GenerationResult, ProviderKind};
use async_trait::async_trait;
use std::time::Instant;

/// Trait for image generation providers.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image from the given request.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &str {
        self.kind().name()
    }
}

/// Builds the provider selected by `config`.
///
/// Fails with a configuration error when that provider's feature is not
/// compiled in.
pub fn provider_for(config: &Configuration) -> Result<Box<dyn ImageProvider>> {
    let provider: Box<dyn ImageProvider> = match config.provider() {
        #[cfg(feature = "huggingface")]
        ProviderKind::HuggingFace => Box::new(HuggingFaceProvider::from_config(config)?),
        #[cfg(feature = "replicate")]
        ProviderKind::Replicate => Box::new(ReplicateProvider::from_config(config)?),
        #[cfg(feature = "together")]
        ProviderKind::Together => Box::new(TogetherProvider::from_config(config)?),
        #[cfg(feature = "hyperbolic")]
        ProviderKind::Hyperbolic => Box::new(HyperbolicProvider::from_config(config)?),
        #[allow(unreachable_patterns)]
        kind => {
            return Err(FluxError::Config(format!(
                "{kind} support not compiled in (enable the `{kind}` feature)"
            )));
        }
    };
    Ok(provider)
}

/// Generates one image for `prompt` with the configured provider.
///
/// The prompt is validated before a client is built, so configuration and
/// input problems never reach the network. The whole call, including
/// Replicate polling and the inline download, is bounded by
/// [`Configuration::timeout`]. No retry is attempted.
pub async fn generate(prompt: &str, config: &Configuration) -> Result<GenerationResult> {
    let request = GenerationRequest::new(prompt);
    request.validate()?;

    let provider = provider_for(config)?;
    let start = Instant::now();
    tracing::debug!(
        provider = %provider.kind(),
        url = %config.api_base_url(),
        "sending generation request"
    );

    let result = tokio::time::timeout(config.timeout(), async {
        match provider.generate(&request).await? {
            GenerationResult::ImageUrl { image_url } if config.inline_images() => {
                let client = http::build_client(config)?;
                http::fetch_inline(&client, &image_url, config).await
            }
            other => Ok(other),
        }
    })
    .await
    .map_err(|_| FluxError::Timeout(config.timeout()))??;

    tracing::debug!(
        provider = %provider.kind(),
        duration_ms = start.elapsed().as_millis() as u64,
        inline = result.image_base64().is_some(),
        "generation complete"
    );
    Ok(result)
}
