//! HTTP plumbing shared by all providers.

use crate::config::Configuration;
use crate::error::{FluxError, Result};
use crate::image::types::GenerationResult;
use serde::de::DeserializeOwned;

/// Builds a client bounded by the configured timeouts.
pub(crate) fn build_client(config: &Configuration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .connect_timeout(config.connect_timeout())
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()?;
    Ok(client)
}

/// Turns a non-2xx response into [`FluxError::Api`].
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(FluxError::api(status.as_u16(), &text))
}

/// Reads a JSON body.
///
/// The body is read as text first so that a malformed body surfaces as a
/// response-format error rather than a transport error.
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(FluxError::from)
}

/// Returns the response's `Content-Type`, if any.
pub(crate) fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Downloads a hosted image and returns it inline.
///
/// The bearer token is only attached when the image lives on the same host
/// as the configured endpoint.
pub(crate) async fn fetch_inline(
    client: &reqwest::Client,
    url: &str,
    config: &Configuration,
) -> Result<GenerationResult> {
    let authorize = same_origin(url, config.api_base_url());
    tracing::debug!(url = %url, authorize, "downloading generated image");

    let mut request = client.get(url);
    if authorize {
        request = request.header("Authorization", format!("Bearer {}", config.api_key()));
    }
    let response = ensure_success(request.send().await?).await?;

    let content_type = content_type(&response);
    let data = response.bytes().await?;
    GenerationResult::from_bytes(&data, content_type.as_deref())
}

/// Whether two URLs share scheme, host and port.
fn same_origin(a: &str, b: &str) -> bool {
    match (reqwest::Url::parse(a), reqwest::Url::parse(b)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_origin() {
        assert!(same_origin(
            "https://api.together.xyz/files/a.png",
            "https://api.together.xyz/v1/images/generations"
        ));
        assert!(same_origin(
            "http://127.0.0.1:8080/f.png",
            "http://127.0.0.1:8080/generate"
        ));
        assert!(!same_origin(
            "https://replicate.delivery/a.webp",
            "https://api.replicate.com/v1/predictions"
        ));
        assert!(!same_origin(
            "http://127.0.0.1:8081/f.png",
            "http://127.0.0.1:8080/generate"
        ));
        assert!(!same_origin(
            "http://api.together.xyz/f.png",
            "https://api.together.xyz/v1/images/generations"
        ));
        assert!(!same_origin("not a url", "https://api.together.xyz/"));
    }
}
