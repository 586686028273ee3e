//! Hyperbolic image generation provider.

use crate::config::Configuration;
use crate::error::{FluxError, Result};
use crate::image::http;
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerationRequest, GenerationResult, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Model requested when none is configured.
pub const DEFAULT_HYPERBOLIC_MODEL: &str = "FLUX.1-dev";

/// Hyperbolic image generation API provider.
pub struct HyperbolicProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl HyperbolicProvider {
    /// Creates the provider from a resolved configuration.
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            url: config.api_base_url().to_string(),
            api_key: config.api_key().to_string(),
            model: config
                .model()
                .unwrap_or(DEFAULT_HYPERBOLIC_MODEL)
                .to_string(),
        })
    }
}

#[async_trait]
impl ImageProvider for HyperbolicProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let body = HyperbolicRequest::new(&self.model, &request.prompt);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = http::ensure_success(response).await?;

        let hyperbolic_response: HyperbolicResponse = http::read_json(response).await?;
        let image = hyperbolic_response
            .images
            .into_iter()
            .next()
            .and_then(|img| img.image)
            .ok_or_else(|| {
                FluxError::UnexpectedResponse("no images in Hyperbolic response".into())
            })?;

        GenerationResult::from_base64(&image)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Hyperbolic
    }
}

#[derive(Debug, Serialize)]
struct HyperbolicRequest<'a> {
    model_name: &'a str,
    prompt: &'a str,
    steps: u32,
    cfg_scale: f32,
    enable_refiner: bool,
    height: u32,
    width: u32,
    backend: &'a str,
}

impl<'a> HyperbolicRequest<'a> {
    fn new(model_name: &'a str, prompt: &'a str) -> Self {
        Self {
            model_name,
            prompt,
            steps: 25,
            cfg_scale: 5.0,
            enable_refiner: false,
            height: 1024,
            width: 1024,
            backend: "auto",
        }
    }
}

#[derive(Debug, Deserialize)]
struct HyperbolicResponse {
    #[serde(default)]
    images: Vec<HyperbolicImage>,
}

#[derive(Debug, Deserialize)]
struct HyperbolicImage {
    #[serde(default)]
    image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageFormat;
    use httpmock::{Method::POST, MockServer};

    // 1x1 PNG header bytes, base64.
    const PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAAB";

    fn provider(server: &MockServer) -> HyperbolicProvider {
        let config = Configuration::builder()
            .api_key("hyp-key")
            .api_base_url(server.url("/v1/image/generation"))
            .provider(ProviderKind::Hyperbolic)
            .build_with(|_| None)
            .unwrap();
        HyperbolicProvider::from_config(&config).unwrap()
    }

    #[test]
    fn test_request_defaults() {
        let json = serde_json::to_value(HyperbolicRequest::new("FLUX.1-dev", "a fox")).unwrap();
        assert_eq!(json["model_name"], "FLUX.1-dev");
        assert_eq!(json["prompt"], "a fox");
        assert_eq!(json["steps"], 25);
        assert_eq!(json["width"], 1024);
        assert_eq!(json["enable_refiner"], false);
    }

    #[tokio::test]
    async fn test_generate_decodes_first_image() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/image/generation")
                    .header("authorization", "Bearer hyp-key")
                    .body_includes("\"model_name\":\"FLUX.1-dev\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(format!(
                        r#"{{"images":[{{"index":0,"image":"{PNG_B64}"}}],"inference_time":1.2}}"#
                    ));
            })
            .await;

        let result = provider(&server)
            .generate(&GenerationRequest::new("a fox"))
            .await?;

        mock.assert_async().await;
        assert_eq!(result.image_base64(), Some(PNG_B64));
        assert_eq!(result.format(), Some(ImageFormat::Png));
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_images_is_response_format_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"images":[]}"#);
            })
            .await;

        let err = provider(&server)
            .generate(&GenerationRequest::new("a fox"))
            .await
            .unwrap_err();
        assert!(err.is_response_format());
    }
}
