//! Replicate predictions provider.
//!
//! The prediction is created with `Prefer: wait`, so Replicate usually holds
//! the connection until the image is ready. When it answers early with a
//! pending prediction, its `urls.get` status URL is polled until the
//! prediction settles or the configured timeout elapses.

use crate::config::Configuration;
use crate::error::{FluxError, Result};
use crate::image::http;
use crate::image::provider::ImageProvider;
use crate::image::types::{GenerationRequest, GenerationResult, ProviderKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Replicate predictions API provider.
pub struct ReplicateProvider {
    client: reqwest::Client,
    url: String,
    api_key: String,
    version: Option<String>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ReplicateProvider {
    /// Creates the provider from a resolved configuration.
    pub fn from_config(config: &Configuration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(config)?,
            url: config.api_base_url().to_string(),
            api_key: config.api_key().to_string(),
            version: config.replicate_version().map(str::to_string),
            poll_interval: config.poll_interval(),
            timeout: config.timeout(),
        })
    }

    async fn submit(&self, request: &GenerationRequest) -> Result<Prediction> {
        let body = ReplicateRequest {
            version: self.version.as_deref(),
            input: ReplicateInput {
                prompt: &request.prompt,
            },
        };

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;
        let response = http::ensure_success(response).await?;
        http::read_json(response).await
    }

    async fn fetch(&self, url: &str) -> Result<Prediction> {
        let response = self
            .client
            .get(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;
        let response = http::ensure_success(response).await?;
        http::read_json(response).await
    }

    async fn wait_until_settled(
        &self,
        mut prediction: Prediction,
        deadline: Instant,
    ) -> Result<Prediction> {
        loop {
            match prediction.status {
                PredictionStatus::Succeeded => return Ok(prediction),
                PredictionStatus::Failed => {
                    return Err(FluxError::GenerationFailed(
                        prediction
                            .error_message()
                            .unwrap_or_else(|| "prediction failed".into()),
                    ));
                }
                PredictionStatus::Canceled => {
                    return Err(FluxError::GenerationFailed(
                        "prediction was canceled".into(),
                    ));
                }
                PredictionStatus::Starting | PredictionStatus::Processing => {
                    let status_url = prediction
                        .urls
                        .as_ref()
                        .and_then(|urls| urls.get.clone())
                        .ok_or_else(|| {
                            FluxError::UnexpectedResponse(
                                "pending prediction without a status URL".into(),
                            )
                        })?;

                    if Instant::now() + self.poll_interval > deadline {
                        return Err(FluxError::Timeout(self.timeout));
                    }
                    tracing::debug!(
                        id = prediction.id.as_deref().unwrap_or(""),
                        status = ?prediction.status,
                        "prediction pending, polling"
                    );
                    tokio::time::sleep(self.poll_interval).await;
                    prediction = self.fetch(&status_url).await?;
                }
                PredictionStatus::Unknown => {
                    return Err(FluxError::UnexpectedResponse(
                        "unknown prediction status".into(),
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl ImageProvider for ReplicateProvider {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult> {
        // Submission and polling share one budget.
        let deadline = Instant::now() + self.timeout;
        let prediction = self.submit(request).await?;
        tracing::debug!(
            id = prediction.id.as_deref().unwrap_or(""),
            status = ?prediction.status,
            "submitted prediction"
        );

        let prediction = self.wait_until_settled(prediction, deadline).await?;
        let url = prediction.first_output().ok_or_else(|| {
            FluxError::UnexpectedResponse("succeeded prediction has no output".into())
        })?;

        Ok(GenerationResult::url(url))
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Replicate
    }
}

#[derive(Debug, Serialize)]
struct ReplicateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
    input: ReplicateInput<'a>,
}

#[derive(Debug, Serialize)]
struct ReplicateInput<'a> {
    prompt: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: Option<String>,
    status: PredictionStatus,
    #[serde(default)]
    output: Option<PredictionOutput>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

/// Image models return either a single file URL or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PredictionOutput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl Prediction {
    fn first_output(self) -> Option<String> {
        match self.output? {
            PredictionOutput::One(url) => Some(url),
            PredictionOutput::Many(urls) => urls.into_iter().next(),
        }
    }

    fn error_message(&self) -> Option<String> {
        match self.error.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };

    fn provider(server: &MockServer, timeout: Duration) -> ReplicateProvider {
        let config = Configuration::builder()
            .api_key("r8_key")
            .api_base_url(server.url("/v1/models/black-forest-labs/flux-schnell/predictions"))
            .provider(ProviderKind::Replicate)
            .poll_interval(Duration::from_millis(10))
            .timeout(timeout)
            .build_with(|_| None)
            .unwrap();
        ReplicateProvider::from_config(&config).unwrap()
    }

    #[test]
    fn test_request_serialization() {
        let body = ReplicateRequest {
            version: None,
            input: ReplicateInput { prompt: "a cat" },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"input": {"prompt": "a cat"}})
        );

        let pinned = ReplicateRequest {
            version: Some("5599ed30"),
            input: ReplicateInput { prompt: "a cat" },
        };
        assert_eq!(serde_json::to_value(&pinned).unwrap()["version"], "5599ed30");
    }

    #[test]
    fn test_output_shapes() {
        let many: Prediction = serde_json::from_str(
            r#"{"status":"succeeded","output":["https://replicate.delivery/a.webp"]}"#,
        )
        .unwrap();
        assert_eq!(
            many.first_output().as_deref(),
            Some("https://replicate.delivery/a.webp")
        );

        let one: Prediction = serde_json::from_str(
            r#"{"status":"succeeded","output":"https://replicate.delivery/b.png"}"#,
        )
        .unwrap();
        assert_eq!(
            one.first_output().as_deref(),
            Some("https://replicate.delivery/b.png")
        );

        let odd: Prediction = serde_json::from_str(r#"{"status":"queued"}"#).unwrap();
        assert_eq!(odd.status, PredictionStatus::Unknown);
    }

    #[tokio::test]
    async fn test_synchronous_success() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/models/black-forest-labs/flux-schnell/predictions")
                    .header("authorization", "Bearer r8_key")
                    .header("prefer", "wait")
                    .body_includes("\"input\":{\"prompt\":\"a cat\"}");
                then.status(201)
                    .header("content-type", "application/json")
                    .body(
                        r#"{"id":"p1","status":"succeeded","output":["https://replicate.delivery/cat.webp"]}"#,
                    );
            })
            .await;

        let result = provider(&server, Duration::from_secs(5))
            .generate(&GenerationRequest::new("a cat"))
            .await?;

        mock.assert_async().await;
        assert_eq!(result.image_url(), Some("https://replicate.delivery/cat.webp"));
        Ok(())
    }

    #[tokio::test]
    async fn test_pending_prediction_is_polled() -> Result<()> {
        let server = MockServer::start_async().await;
        let status_url = server.url("/v1/predictions/p2");
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(201)
                    .header("content-type", "application/json")
                    .body(format!(
                        r#"{{"id":"p2","status":"starting","output":null,"urls":{{"get":"{status_url}"}}}}"#
                    ));
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/predictions/p2")
                    .header("authorization", "Bearer r8_key");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"id":"p2","status":"succeeded","output":["https://replicate.delivery/dog.webp"]}"#);
            })
            .await;

        let result = provider(&server, Duration::from_secs(5))
            .generate(&GenerationRequest::new("a dog"))
            .await?;

        poll.assert_async().await;
        assert_eq!(result.image_url(), Some("https://replicate.delivery/dog.webp"));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_prediction_is_request_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(201)
                    .header("content-type", "application/json")
                    .body(r#"{"id":"p3","status":"failed","error":"NSFW content detected"}"#);
            })
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .generate(&GenerationRequest::new("a cat"))
            .await
            .unwrap_err();
        assert!(err.is_request());
        assert_eq!(err.to_string(), "generation failed: NSFW content detected");
    }

    #[tokio::test]
    async fn test_polling_times_out() {
        let server = MockServer::start_async().await;
        let status_url = server.url("/v1/predictions/p4");
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(201)
                    .header("content-type", "application/json")
                    .body(format!(
                        r#"{{"id":"p4","status":"processing","urls":{{"get":"{status_url}"}}}}"#
                    ));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/predictions/p4");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(format!(
                        r#"{{"id":"p4","status":"processing","urls":{{"get":"{status_url}"}}}}"#
                    ));
            })
            .await;

        let err = provider(&server, Duration::from_millis(50))
            .generate(&GenerationRequest::new("a cat"))
            .await
            .unwrap_err();
        assert!(err.is_request(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn test_slow_submission_counts_toward_timeout() {
        let server = MockServer::start_async().await;
        let status_url = server.url("/v1/predictions/p5");
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(201)
                    .delay(Duration::from_millis(350))
                    .header("content-type", "application/json")
                    .body(format!(
                        r#"{{"id":"p5","status":"starting","urls":{{"get":"{status_url}"}}}}"#
                    ));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/predictions/p5");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(format!(
                        r#"{{"id":"p5","status":"processing","urls":{{"get":"{status_url}"}}}}"#
                    ));
            })
            .await;

        let started = Instant::now();
        let err = provider(&server, Duration::from_millis(400))
            .generate(&GenerationRequest::new("a cat"))
            .await
            .unwrap_err();

        assert!(matches!(err, FluxError::Timeout(_)), "unexpected error: {err}");
        assert!(
            started.elapsed() < Duration::from_millis(650),
            "took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn test_unauthorized_is_request_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(401)
                    .header("content-type", "application/problem+json")
                    .body(r#"{"title":"Unauthenticated","status":401}"#);
            })
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .generate(&GenerationRequest::new("a cat"))
            .await
            .unwrap_err();
        assert!(matches!(err, FluxError::Api { status: 401, .. }));
    }
}
