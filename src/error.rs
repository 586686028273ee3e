//! Error types for image generation.

use std::time::Duration;

/// Maximum number of characters of an upstream body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Errors that can occur while generating an image.
#[derive(Debug, thiserror::Error)]
pub enum FluxError {
    /// Required configuration missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The request itself is unusable (e.g. empty prompt).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Sanitized response body.
        message: String,
    },

    /// Network or HTTP transport error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Operation timed out (e.g., Replicate polling).
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The provider accepted the request but reported a failed generation.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// Response body did not contain a recognizable image.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Image data is in a format the chat cannot render.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (e.g., saving file, reading stdin).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of a [`FluxError`], used to decide how a failure
/// is reported back to the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid setup; reported as a setup instruction.
    Configuration,
    /// The HTTP exchange failed (network, timeout, non-2xx, failed prediction).
    Request,
    /// The provider answered, but not with an image we understand.
    ResponseFormat,
}

impl FluxError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::InvalidRequest(_) => ErrorKind::Configuration,
            Self::Api { .. }
            | Self::Network(_)
            | Self::Timeout(_)
            | Self::GenerationFailed(_)
            | Self::Io(_) => ErrorKind::Request,
            Self::UnexpectedResponse(_)
            | Self::UnsupportedFormat(_)
            | Self::Decode(_)
            | Self::Json(_) => ErrorKind::ResponseFormat,
        }
    }

    /// Returns true if this error was raised before any network activity.
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }

    /// Returns true for transport, status and timeout failures.
    pub fn is_request(&self) -> bool {
        self.kind() == ErrorKind::Request
    }

    /// Returns true when the response shape was not understood.
    pub fn is_response_format(&self) -> bool {
        self.kind() == ErrorKind::ResponseFormat
    }

    /// Builds an [`FluxError::Api`] from a status and raw body, sanitizing the body.
    pub(crate) fn api(status: u16, body: &str) -> Self {
        let message = sanitize_error_message(body);
        Self::Api {
            status,
            message: if message.is_empty() {
                "empty response body".into()
            } else {
                message
            },
        }
    }
}

/// Strips credentials from an upstream error body and bounds its length.
///
/// Providers sometimes echo request headers back; anything following a
/// `Bearer ` marker is masked up to the next whitespace or quote.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let mut out = String::with_capacity(text.len().min(MAX_ERROR_BODY_CHARS));
    let mut rest = text.trim();

    while let Some(pos) = rest.find("Bearer ") {
        out.push_str(&rest[..pos]);
        out.push_str("Bearer ***");
        let after = &rest[pos + "Bearer ".len()..];
        let end = after
            .find(|c: char| c.is_whitespace() || c == '"' || c == '\'')
            .unwrap_or(after.len());
        rest = &after[end..];
    }
    out.push_str(rest);

    if out.chars().count() > MAX_ERROR_BODY_CHARS {
        let truncated: String = out.chars().take(MAX_ERROR_BODY_CHARS).collect();
        return format!("{truncated}...");
    }
    out
}

/// Result type alias for image generation operations.
pub type Result<T> = std::result::Result<T, FluxError>;
