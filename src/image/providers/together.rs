//! Together AI image generation provider.

use crate::config::Configuration;
use crate::error::{FluxError, Result};
use crate::image::http;
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerationRequest, GenerationResult, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Model requested when none is configured.
pub const DEFAULT_TOGETHER_MODEL: &str = "black-forest-labs/FLUX.1-schnell";

/// Together images API provider.
pub struct TogetherProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl TogetherProvider {
    /// Creates the provider from a resolved configuration.
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            url: config.api_base_url().to_string(),
            api_key: config.api_key().to_string(),
            model: config
                .model()
                .unwrap_or(DEFAULT_TOGETHER_MODEL)
                .to_string(),
        })
    }
}

#[async_trait]
impl ImageProvider for TogetherProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        let body = TogetherRequest {
            model: &self.model,
            prompt: &request.prompt,
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let response = http::ensure_success(response).await?;

        let together_response: TogetherResponse = http::read_json(response).await?;
        together_response.into_result()
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Together
    }
}

#[derive(Debug, Serialize)]
struct TogetherRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct TogetherResponse {
    #[serde(default)]
    data: Vec<TogetherImage>,
}

#[derive(Debug, Deserialize)]
struct TogetherImage {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

impl TogetherResponse {
    fn into_result(self) -> Result<GenerationResult> {
        let image = self.data.into_iter().next().ok_or_else(|| {
            FluxError::UnexpectedResponse("no images in Together response".into())
        })?;

        match (image.url, image.b64_json) {
            (Some(url), _) => Ok(GenerationResult::url(url)),
            (None, Some(b64)) => GenerationResult::from_base64(&b64),
            (None, None) => Err(FluxError::UnexpectedResponse(
                "Together image entry has neither url nor b64_json".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn provider(server: &MockServer) -> TogetherProvider {
        let config = Configuration::builder()
            .api_key("tg-key")
            .api_base_url(server.url("/v1/images/generations"))
            .provider(ProviderKind::Together)
            .build_with(|_| None)
            .unwrap();
        TogetherProvider::from_config(&config).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let body = TogetherRequest {
            model: DEFAULT_TOGETHER_MODEL,
            prompt: "a cat",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "black-forest-labs/FLUX.1-schnell", "prompt": "a cat"})
        );
    }

    #[test]
    fn test_response_prefers_url() {
        let resp: TogetherResponse =
            serde_json::from_str(r#"{"data": [{"url": "http://x/cat.png"}]}"#).unwrap();
        assert_eq!(
            resp.into_result().unwrap(),
            GenerationResult::url("http://x/cat.png")
        );
    }

    #[test]
    fn test_response_without_images() {
        let resp: TogetherResponse = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert!(resp.into_result().unwrap_err().is_response_format());

        let resp: TogetherResponse = serde_json::from_str(r#"{"data": [{}]}"#).unwrap();
        assert!(resp.into_result().unwrap_err().is_response_format());
    }

    #[tokio::test]
    async fn test_generate_posts_prompt_and_model() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/images/generations")
                    .header("authorization", "Bearer tg-key")
                    .body_includes("\"prompt\":\"a cat\"")
                    .body_includes("\"model\":\"black-forest-labs/FLUX.1-schnell\"");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"data":[{"url":"http://x/cat.png"}]}"#);
            })
            .await;

        let result = provider(&server)
            .generate(&GenerationRequest::new("a cat"))
            .await?;

        mock.assert_async().await;
        assert_eq!(result.image_url(), Some("http://x/cat.png"));
        assert!(result.image_base64().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_generate_non_2xx_is_request_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/images/generations");
                then.status(429).body(r#"{"error":"rate limited"}"#);
            })
            .await;

        let err = provider(&server)
            .generate(&GenerationRequest::new("a cat"))
            .await
            .unwrap_err();
        assert!(err.is_request());
        assert!(matches!(err, FluxError::Api { status: 429, .. }));
    }
}
