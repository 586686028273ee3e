//! Manifold entry point for the chat host.
//!
//! The host hands over its chat payload; the pipe picks the last user
//! message as the prompt and answers with markdown the chat window can
//! render directly. Failures are answered with an `Error: ...` message
//! rather than propagated, since the host shows whatever text it gets.

use crate::config::{Configuration, ENV_API_BASE_URL, ENV_API_KEY, ENV_PROVIDER};
use crate::error::{FluxError, Result};
use crate::image::{generate, GenerationResult};
use serde::{Deserialize, Serialize};

/// Kind of function the host registers this as.
pub const PIPE_TYPE: &str = "manifold";
/// Function id.
pub const PIPE_ID: &str = "FLUX_Schnell";
/// Prefix the host puts in front of each model name.
pub const PIPE_NAME: &str = "FLUX.1: ";

/// A model exposed by the manifold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeInfo {
    /// Model id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Chat payload sent by the host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatBody {
    /// Conversation so far, oldest first.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Whether the host asked for a streamed answer.
    #[serde(default)]
    pub stream: bool,
}

/// One chat message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    /// `user`, `assistant` or `system`.
    pub role: String,
    /// Message text, plain or split into parts.
    #[serde(default)]
    pub content: MessageContent,
}

/// Message content: a plain string, or a list of typed parts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Plain text.
    Text(String),
    /// Multi-part content (text, images, ...).
    Parts(Vec<ContentPart>),
    /// `null` content, as sent for some tool and assistant turns.
    #[default]
    Empty,
}

/// One part of a multi-part message.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPart {
    /// Part type, e.g. `text` or `image_url`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Text of a `text` part.
    #[serde(default)]
    pub text: Option<String>,
}

impl MessageContent {
    /// Returns the textual content; non-text parts are skipped.
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter(|p| p.kind == "text")
                .filter_map(|p| p.text.as_deref())
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Empty => String::new(),
        }
    }
}

impl ChatBody {
    /// Returns the text of the most recent user message.
    pub fn last_user_message(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.text())
    }
}

/// The manifold function.
#[derive(Debug, Clone, Default)]
pub struct Pipe {
    config: Option<Configuration>,
}

impl Pipe {
    /// Creates a pipe that reads its configuration from the environment on
    /// every invocation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a pipe with a fixed configuration.
    pub fn with_config(config: Configuration) -> Self {
        Self {
            config: Some(config),
        }
    }

    /// Function type the host loads this as.
    pub fn pipe_type(&self) -> &'static str {
        PIPE_TYPE
    }

    /// Function id.
    pub fn id(&self) -> &'static str {
        PIPE_ID
    }

    /// Function display name prefix.
    pub fn name(&self) -> &'static str {
        PIPE_NAME
    }

    /// Models this manifold offers.
    pub fn pipes(&self) -> Vec<PipeInfo> {
        vec![PipeInfo {
            id: "flux_schnell".into(),
            name: "Schnell".into(),
        }]
    }

    /// Runs one chat turn and renders the answer as markdown.
    pub async fn pipe(&self, body: &ChatBody) -> String {
        match self.run(body).await {
            Ok(result) => result.to_markdown(),
            Err(e) => {
                tracing::warn!(error = %e, "image generation failed");
                render_error(&e)
            }
        }
    }

    /// Runs one chat turn, returning the structured result.
    pub async fn run(&self, body: &ChatBody) -> Result<GenerationResult> {
        let config = match &self.config {
            Some(config) => config.clone(),
            None => Configuration::from_env()?,
        };

        if body.stream {
            tracing::debug!("streaming requested; answering with a single message");
        }

        let prompt = body
            .last_user_message()
            .ok_or_else(|| FluxError::InvalidRequest("no user message in chat".into()))?;

        generate(&prompt, &config).await
    }
}

/// Formats an error for display in the chat.
pub fn render_error(error: &FluxError) -> String {
    match error {
        FluxError::Config(_) => format!(
            "Error: {error}\n\nSet {ENV_API_KEY} and {ENV_API_BASE_URL} \
             (and optionally {ENV_PROVIDER}) in the server environment and try again."
        ),
        _ => format!("Error: {error}"),
    }
}
