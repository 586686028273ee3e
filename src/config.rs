//! Invocation configuration.
//!
//! Values come from explicit builder setters first and from `FLUX_SCHNELL_*`
//! environment variables second. Everything is resolved and validated in
//! [`ConfigurationBuilder::build`], so a bad setup fails before any request
//! is sent.

use crate::error::{FluxError, Result};
use crate::image::ProviderKind;
use std::time::Duration;

/// Base URL of the generation endpoint.
pub const ENV_API_BASE_URL: &str = "FLUX_SCHNELL_API_BASE_URL";
/// API key sent as a bearer token.
pub const ENV_API_KEY: &str = "FLUX_SCHNELL_API_KEY";
/// Explicit provider (`huggingface`, `replicate`, `together`, `hyperbolic`).
pub const ENV_PROVIDER: &str = "FLUX_SCHNELL_PROVIDER";
/// Model id override for Together and Hyperbolic.
pub const ENV_MODEL: &str = "FLUX_SCHNELL_MODEL";
/// Replicate model version hash, for version-pinned prediction endpoints.
pub const ENV_REPLICATE_VERSION: &str = "FLUX_SCHNELL_REPLICATE_VERSION";
/// Download URL results and return them inline.
pub const ENV_INLINE_IMAGES: &str = "FLUX_SCHNELL_INLINE_IMAGES";
/// Overall request timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "FLUX_SCHNELL_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Resolved settings for one generation call.
#[derive(Clone)]
pub struct Configuration {
    api_base_url: String,
    api_key: String,
    provider: ProviderKind,
    model: Option<String>,
    replicate_version: Option<String>,
    inline_images: bool,
    timeout: Duration,
    connect_timeout: Duration,
    poll_interval: Duration,
}

impl Configuration {
    /// Creates a new [`ConfigurationBuilder`].
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Reads the configuration from `FLUX_SCHNELL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        ConfigurationBuilder::new().build()
    }

    /// Endpoint the generation request is posted to.
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Bearer token for the provider.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Provider whose request/response shape is used.
    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    /// Model id override, if any.
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Replicate model version, if any.
    pub fn replicate_version(&self) -> Option<&str> {
        self.replicate_version.as_deref()
    }

    /// Whether URL results are downloaded and returned inline.
    pub fn inline_images(&self) -> bool {
        self.inline_images
    }

    /// Upper bound on the whole call, including Replicate polling.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Upper bound on establishing the connection.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Delay between Replicate status polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("api_base_url", &self.api_base_url)
            .field("api_key", &"***")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("replicate_version", &self.replicate_version)
            .field("inline_images", &self.inline_images)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Builder for [`Configuration`].
#[derive(Clone, Default)]
pub struct ConfigurationBuilder {
    api_base_url: Option<String>,
    api_key: Option<String>,
    provider: Option<ProviderKind>,
    model: Option<String>,
    replicate_version: Option<String>,
    inline_images: Option<bool>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    poll_interval: Option<Duration>,
}

impl ConfigurationBuilder {
    /// Creates a new builder with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the endpoint. Falls back to `FLUX_SCHNELL_API_BASE_URL`.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the API key. Falls back to `FLUX_SCHNELL_API_KEY`.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Selects the provider explicitly. Falls back to `FLUX_SCHNELL_PROVIDER`,
    /// then to inference from the base URL host.
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Overrides the model id sent to Together or Hyperbolic.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Pins a Replicate model version.
    pub fn replicate_version(mut self, version: impl Into<String>) -> Self {
        self.replicate_version = Some(version.into());
        self
    }

    /// Downloads URL results and returns them as inline data.
    pub fn inline_images(mut self, inline: bool) -> Self {
        self.inline_images = Some(inline);
        self
    }

    /// Sets the overall timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the Replicate polling interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Builds the configuration, filling gaps from the process environment.
    pub fn build(self) -> Result<Configuration> {
        self.build_with(|key| std::env::var(key).ok())
    }

    /// Builds the configuration, filling gaps from `lookup` instead of the
    /// process environment.
    pub fn build_with<F>(self, lookup: F) -> Result<Configuration>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| non_empty(lookup(key));

        let api_key = non_empty(self.api_key)
            .or_else(|| var(ENV_API_KEY))
            .ok_or_else(|| {
                FluxError::Config(format!("{ENV_API_KEY} not set and no API key provided"))
            })?;

        let explicit_provider = match self.provider {
            Some(provider) => Some(provider),
            None => var(ENV_PROVIDER)
                .map(|p| p.parse::<ProviderKind>())
                .transpose()?,
        };

        let api_base_url = non_empty(self.api_base_url)
            .or_else(|| var(ENV_API_BASE_URL))
            .ok_or_else(|| {
                FluxError::Config(format!("{ENV_API_BASE_URL} not set and no base URL provided"))
            })?;
        validate_base_url(&api_base_url)?;

        let provider = explicit_provider.unwrap_or_else(|| {
            let inferred = ProviderKind::from_base_url(&api_base_url);
            tracing::debug!(provider = %inferred, "inferred provider from base URL");
            inferred
        });

        let timeout = match self.timeout {
            Some(timeout) => timeout,
            None => match var(ENV_TIMEOUT_SECS) {
                Some(secs) => Duration::from_secs(secs.parse().map_err(|_| {
                    FluxError::Config(format!(
                        "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got '{secs}'"
                    ))
                })?),
                None => DEFAULT_TIMEOUT,
            },
        };
        if timeout.is_zero() {
            return Err(FluxError::Config("timeout must be greater than zero".into()));
        }

        let inline_images = match self.inline_images {
            Some(inline) => inline,
            None => match var(ENV_INLINE_IMAGES) {
                Some(value) => parse_bool(ENV_INLINE_IMAGES, &value)?,
                None => false,
            },
        };

        Ok(Configuration {
            api_base_url,
            api_key,
            provider,
            model: non_empty(self.model).or_else(|| var(ENV_MODEL)),
            replicate_version: non_empty(self.replicate_version)
                .or_else(|| var(ENV_REPLICATE_VERSION)),
            inline_images,
            timeout,
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate_base_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| FluxError::Config(format!("invalid base URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(FluxError::Config(format!(
            "base URL must use http or https, got '{scheme}'"
        ))),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(FluxError::Config(format!(
            "{key} must be true or false, got '{value}'"
        ))),
    }
}
