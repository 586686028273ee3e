//! Core types for image generation.

use crate::error::{FluxError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Image formats the chat window can render inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// GIF format.
    Gif,
    /// WebP format (Replicate's default output).
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Parses a `Content-Type` header value such as `image/png; charset=binary`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type.split(';').next()?.trim();
        let subtype = essence.strip_prefix("image/")?;
        Self::from_extension(subtype)
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // GIF: GIF87a / GIF89a
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }

    /// Detects image format from the leading characters of base64 data,
    /// without decoding it.
    pub fn from_base64_prefix(b64: &str) -> Option<Self> {
        if b64.starts_with("iVBOR") {
            Some(Self::Png)
        } else if b64.starts_with("/9j/") {
            Some(Self::Jpeg)
        } else if b64.starts_with("R0lG") {
            Some(Self::Gif)
        } else if b64.starts_with("UklGR") {
            Some(Self::WebP)
        } else {
            None
        }
    }
}

/// Image generation backend.
///
/// Selected explicitly through configuration; inference from the base URL
/// host is only a fallback when no provider was named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Hugging Face inference endpoints (raw image bytes).
    HuggingFace,
    /// Replicate predictions API.
    Replicate,
    /// Together images API.
    Together,
    /// Hyperbolic image generation API.
    Hyperbolic,
}

impl ProviderKind {
    /// All supported providers, in display order.
    pub const ALL: [ProviderKind; 4] = [
        Self::HuggingFace,
        Self::Replicate,
        Self::Together,
        Self::Hyperbolic,
    ];

    /// Returns the provider's human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::HuggingFace => "Hugging Face Inference",
            Self::Replicate => "Replicate",
            Self::Together => "Together AI",
            Self::Hyperbolic => "Hyperbolic",
        }
    }

    /// Returns the canonical FLUX.1 endpoint of this provider.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::HuggingFace => {
                "https://api-inference.huggingface.co/models/black-forest-labs/FLUX.1-schnell"
            }
            Self::Replicate => {
                "https://api.replicate.com/v1/models/black-forest-labs/flux-schnell/predictions"
            }
            Self::Together => "https://api.together.xyz/v1/images/generations",
            Self::Hyperbolic => "https://api.hyperbolic.xyz/v1/image/generation",
        }
    }

    /// Returns the host domain that identifies this provider.
    fn domain(&self) -> &'static str {
        match self {
            Self::HuggingFace => "huggingface.co",
            Self::Replicate => "replicate.com",
            Self::Together => "together.xyz",
            Self::Hyperbolic => "hyperbolic.xyz",
        }
    }

    /// Infers the provider from a base URL's host, defaulting to Hugging Face.
    ///
    /// Matches on the parsed host (`api.replicate.com` matches `replicate.com`),
    /// so a provider name appearing in a path or query does not count.
    pub fn from_base_url(url: &str) -> Self {
        let Some(host) = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return Self::HuggingFace;
        };

        Self::ALL
            .into_iter()
            .find(|kind| {
                let domain = kind.domain();
                host == domain || host.ends_with(&format!(".{domain}"))
            })
            .unwrap_or(Self::HuggingFace)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HuggingFace => write!(f, "huggingface"),
            Self::Replicate => write!(f, "replicate"),
            Self::Together => write!(f, "together"),
            Self::Hyperbolic => write!(f, "hyperbolic"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = FluxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "huggingface" | "hugging-face" | "hf" => Ok(Self::HuggingFace),
            "replicate" => Ok(Self::Replicate),
            "together" | "togetherai" => Ok(Self::Together),
            "hyperbolic" => Ok(Self::Hyperbolic),
            other => Err(FluxError::Config(format!(
                "unknown provider '{other}', expected one of: huggingface, replicate, together, hyperbolic"
            ))),
        }
    }
}

/// A request to generate an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image.
    pub prompt: String,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }

    /// Rejects blank prompts before anything is sent upstream.
    pub fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(FluxError::InvalidRequest("prompt is empty".into()));
        }
        Ok(())
    }
}

/// A generated image reference, ready to be rendered in a chat turn.
///
/// Exactly one of a URL or inline base64 data is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
#[must_use = "generated image should be rendered or saved"]
pub enum GenerationResult {
    /// The provider hosts the image; the chat loads it from this URL.
    ImageUrl {
        /// Location of the generated image.
        image_url: String,
    },
    /// Inline image data.
    ImageBase64 {
        /// Standard base64 without a data URI prefix.
        image_base64: String,
        /// Format of the decoded bytes.
        format: ImageFormat,
    },
}

impl GenerationResult {
    /// Creates a URL result.
    pub fn url(url: impl Into<String>) -> Self {
        Self::ImageUrl {
            image_url: url.into(),
        }
    }

    /// Encodes raw image bytes, detecting the format from magic bytes or,
    /// failing that, from the content type.
    pub fn from_bytes(data: &[u8], content_type: Option<&str>) -> Result<Self> {
        let format = ImageFormat::from_magic_bytes(data)
            .or_else(|| content_type.and_then(ImageFormat::from_content_type))
            .ok_or_else(|| {
                FluxError::UnsupportedFormat(format!(
                    "{} byte body with content type {}",
                    data.len(),
                    content_type.unwrap_or("<none>")
                ))
            })?;

        Ok(Self::ImageBase64 {
            image_base64: base64::engine::general_purpose::STANDARD.encode(data),
            format,
        })
    }

    /// Wraps base64 data from a JSON response.
    ///
    /// Accepts an optional `data:<mime>;base64,` prefix. The payload must be
    /// valid base64 of a recognized image format.
    pub fn from_base64(input: &str) -> Result<Self> {
        let b64 = match input.find(";base64,") {
            Some(pos) => &input[pos + ";base64,".len()..],
            None => input,
        };
        let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&cleaned)
            .map_err(|e| FluxError::Decode(e.to_string()))?;

        let format = ImageFormat::from_magic_bytes(&bytes)
            .or_else(|| ImageFormat::from_base64_prefix(&cleaned))
            .ok_or_else(|| {
                let head: String = cleaned.chars().take(9).collect();
                FluxError::UnsupportedFormat(format!("base64 data starting with '{head}'"))
            })?;

        Ok(Self::ImageBase64 {
            image_base64: cleaned,
            format,
        })
    }

    /// Returns the image URL, if this is a URL result.
    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::ImageUrl { image_url } => Some(image_url),
            Self::ImageBase64 { .. } => None,
        }
    }

    /// Returns the base64 payload, if this is an inline result.
    pub fn image_base64(&self) -> Option<&str> {
        match self {
            Self::ImageUrl { .. } => None,
            Self::ImageBase64 { image_base64, .. } => Some(image_base64),
        }
    }

    /// Returns the image format, when known.
    pub fn format(&self) -> Option<ImageFormat> {
        match self {
            Self::ImageUrl { image_url } => image_url
                .rsplit('/')
                .next()
                .and_then(|name| name.split('?').next())
                .and_then(|name| name.rsplit_once('.'))
                .and_then(|(_, ext)| ImageFormat::from_extension(ext)),
            Self::ImageBase64 { format, .. } => Some(*format),
        }
    }

    /// Returns the image as a `data:` URL, if inline.
    pub fn to_data_url(&self) -> Option<String> {
        match self {
            Self::ImageUrl { .. } => None,
            Self::ImageBase64 {
                image_base64,
                format,
            } => Some(format!(
                "data:{};base64,{}",
                format.mime_type(),
                image_base64
            )),
        }
    }

    /// Renders the image as chat markdown.
    pub fn to_markdown(&self) -> String {
        match self {
            Self::ImageUrl { image_url } => format!("![Image]({image_url})"),
            Self::ImageBase64 { format, .. } => format!(
                "![Image]({})\n`GeneratedImage.{}`",
                self.to_data_url().unwrap_or_default(),
                format.extension()
            ),
        }
    }

    /// Decodes inline data to raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        match self {
            Self::ImageUrl { image_url } => Err(FluxError::InvalidRequest(format!(
                "image is hosted at {image_url}, not inline"
            ))),
            Self::ImageBase64 { image_base64, .. } => base64::engine::general_purpose::STANDARD
                .decode(image_base64)
                .map_err(|e| FluxError::Decode(e.to_string())),
        }
    }

    /// Saves inline image data to the specified path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.decode()?)?;
        Ok(())
    }
}
