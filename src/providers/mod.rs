//! Background image providers.
//!
//! Every provider offers the same capability, turning a [`ProviderRequest`]
//! into encoded image bytes, so the fallback chain is just an ordered list.

use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::cli::ProviderOptions;
use crate::constants::{CARD_ASPECT_RATIO, PROMPT_SUFFIX};
use crate::credentials::CredentialError;

mod imagen;
mod predict;
mod stock;
mod vertex;

pub use imagen::ImagenProvider;
pub use stock::StockPhotoProvider;
pub use vertex::VertexProvider;

/// What a provider is asked to produce.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProviderRequest {
    /// Destination as the user typed it.
    pub destination: String,
    /// Natural-language prompt built from the destination.
    pub prompt: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Target aspect ratio, eg `16:9`.
    pub aspect_ratio: &'static str,
}

impl ProviderRequest {
    /// Builds the request for a destination at the given size.
    pub fn for_destination(destination: &str, width: u32, height: u32) -> Self {
        let destination = destination.trim().to_string();
        Self {
            prompt: format!("{destination}{PROMPT_SUFFIX}"),
            destination,
            width,
            height,
            aspect_ratio: CARD_ASPECT_RATIO,
        }
    }
}

/// Reasons a provider couldn't supply an image.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ProviderError {
    /// No credential is configured for this provider.
    AuthMissing(String),
    /// The configured credential can't be parsed or used.
    CredentialMalformed(String),
    /// Upstream answered with a non-success status.
    RequestRejected {
        /// HTTP status code.
        status: u16,
        /// Error text from the response body.
        message: String,
    },
    /// Success status, but no usable image in the payload.
    MalformedResponse(String),
    /// No answer within the bound. The bound is unknown when the HTTP client
    /// gave up on its own.
    Timeout(Option<Duration>),
    /// The request never completed.
    Network(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthMissing(what) => write!(f, "authentication missing: {what}"),
            Self::CredentialMalformed(err) => write!(f, "credential malformed: {err}"),
            Self::RequestRejected { status, message } => {
                write!(f, "request rejected with {status}: {message}")
            }
            Self::MalformedResponse(err) => write!(f, "malformed response: {err}"),
            Self::Timeout(Some(after)) => write!(f, "timed out after {after:?}"),
            Self::Timeout(None) => write!(f, "timed out"),
            Self::Network(err) => write!(f, "network error: {err}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(None)
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<CredentialError> for ProviderError {
    fn from(err: CredentialError) -> Self {
        ProviderError::CredentialMalformed(err.to_string())
    }
}

/// Something that can supply a background image for a destination.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short name used in logs and response headers.
    fn name(&self) -> &str;

    /// Produces encoded image bytes for the request.
    async fn generate(&self, request: &ProviderRequest) -> Result<Vec<u8>, ProviderError>;
}

/// Builds the provider chain in priority order: Imagen with an API key,
/// Imagen on Vertex AI with a service account, the alternate Imagen model,
/// then stock photos.
pub fn build_chain(
    options: &ProviderOptions,
    client: &reqwest::Client,
) -> Vec<Box<dyn ImageProvider>> {
    let api_key = options.google_api_key.clone().filter(|key| !key.trim().is_empty());

    let mut chain: Vec<Box<dyn ImageProvider>> = vec![
        Box::new(ImagenProvider::new(
            client.clone(),
            api_key.clone(),
            &options.imagen_model,
        )),
        Box::new(VertexProvider::new(
            client.clone(),
            options.google_credentials_json.as_deref(),
            options.google_project_id.clone(),
            &options.google_location,
            &options.imagen_model,
        )),
    ];

    match options.imagen_fallback_model.as_deref().map(str::trim) {
        Some(model) if !model.is_empty() && model != options.imagen_model => {
            chain.push(Box::new(ImagenProvider::new(client.clone(), api_key, model)));
        }
        _ => {}
    }

    if options.no_stock_photos {
        warn!("Stock photo fallback disabled");
    } else {
        chain.push(Box::new(StockPhotoProvider::new(
            client.clone(),
            &options.stock_photo_url,
        )));
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        providers: ProviderOptions,
    }

    fn options(args: &[&str]) -> ProviderOptions {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        Wrapper::parse_from(argv).providers
    }

    fn names(chain: &[Box<dyn ImageProvider>]) -> Vec<String> {
        chain.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn prompt_embeds_destination() {
        let request = ProviderRequest::for_destination("  Lisboa ", 1200, 630);
        assert_eq!(request.destination, "Lisboa");
        assert!(request.prompt.starts_with("Lisboa, realistic"));
        assert_eq!(request.aspect_ratio, "16:9");
    }

    #[test]
    fn default_chain_order() {
        let chain = build_chain(
            &options(&["--google-api-key", "k"]),
            &reqwest::Client::new(),
        );
        assert_eq!(
            names(&chain),
            vec![
                "imagen:imagen-3.0-generate-001",
                "vertex:imagen-3.0-generate-001",
                "imagen:imagen-3.0-fast-generate-001",
                "stock-photo",
            ]
        );
    }

    #[test]
    fn stock_photos_can_be_disabled() {
        let chain = build_chain(
            &options(&["--no-stock-photos", "--imagen-fallback-model", ""]),
            &reqwest::Client::new(),
        );
        assert_eq!(
            names(&chain),
            vec![
                "imagen:imagen-3.0-generate-001",
                "vertex:imagen-3.0-generate-001",
            ]
        );
    }

    #[test]
    fn error_display() {
        let err = ProviderError::RequestRejected {
            status: 429,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "request rejected with 429: quota exceeded");
        assert_eq!(
            ProviderError::Timeout(Some(Duration::from_secs(10))).to_string(),
            "timed out after 10s"
        );
        assert_eq!(ProviderError::Timeout(None).to_string(), "timed out");
    }
}
