//! Hugging Face inference endpoint provider.
//!
//! The inference API answers with the raw image bytes, which are returned
//! inline as base64.

use crate::config::Configuration;
use crate::error::{sanitize_error_message, FluxError, Result};
use crate::image::http;
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerationRequest, GenerationResult, ProviderKind};
use async_trait::async_trait;
use serde::Serialize;

/// Hugging Face inference API provider.
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl HuggingFaceProvider {
    /// Creates the provider from a resolved configuration.
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            url: config.api_base_url().to_string(),
            api_key: config.api_key().to_string(),
        })
    }
}

#[async_trait]
impl ImageProvider for HuggingFaceProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let body = HuggingFaceRequest {
            inputs: &request.prompt,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            // Block until a cold model is loaded instead of getting a 503.
            .header("x-wait-for-model", "true")
            .json(&body)
            .send()
            .await?;
        let response = http::ensure_success(response).await?;

        let content_type = http::content_type(&response);
        if content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"))
        {
            let text = response.text().await.unwrap_or_default();
            return Err(FluxError::UnexpectedResponse(format!(
                "expected image bytes, got JSON: {}",
                sanitize_error_message(&text)
            )));
        }

        let data = response.bytes().await?;
        tracing::debug!(
            bytes = data.len(),
            content_type = content_type.as_deref().unwrap_or(""),
            "received image"
        );
        GenerationResult::from_bytes(&data, content_type.as_deref())
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }
}

#[derive(Debug, Serialize)]
struct HuggingFaceRequest<'a> {
    inputs: &'a str,
}
