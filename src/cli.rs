//! CLI parser
use clap::{Args, Parser};
use std::num::NonZeroU16;

use crate::constants::{
    DEFAULT_APP_URL, DEFAULT_BRAND, DEFAULT_CACHE_NAMESPACE, DEFAULT_FOOTER,
};

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "TRIPCARD_DEBUG")]
    /// Enable debug logging. Env: TRIPCARD_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "3000", env = "PORT")]
    /// http listener, defaults to `3000`.
    /// Env: PORT
    pub port: NonZeroU16,
    #[clap(long, short, default_value = "0.0.0.0", env = "TRIPCARD_LISTEN_ADDRESS")]
    /// Listen address, defaults to `0.0.0.0`.
    /// Env: TRIPCARD_LISTEN_ADDRESS
    pub listen_address: String,
    #[clap(long, default_value = DEFAULT_APP_URL, env = "TRIPCARD_APP_URL")]
    /// Front-end app the share page redirects to.
    /// Env: TRIPCARD_APP_URL
    pub app_url: String,
    #[clap(long, default_value = DEFAULT_CACHE_NAMESPACE, env = "TRIPCARD_CACHE_NAMESPACE")]
    /// Prefix for background cache keys, bump it to ignore old entries.
    /// Env: TRIPCARD_CACHE_NAMESPACE
    pub cache_namespace: String,

    #[command(flatten)]
    /// Card text
    pub card: CardOptions,

    #[command(flatten)]
    /// Background providers
    pub providers: ProviderOptions,
}

#[derive(Args, Debug, Clone)]
/// Options controlling what's drawn on the card.
pub struct CardOptions {
    #[clap(long, default_value = DEFAULT_BRAND, env = "TRIPCARD_BRAND")]
    /// Brand drawn top left, defaults to `ddripp`.
    /// Env: TRIPCARD_BRAND
    pub brand: String,
    #[clap(long, default_value = DEFAULT_FOOTER, env = "TRIPCARD_FOOTER")]
    /// Footer line.
    /// Env: TRIPCARD_FOOTER
    pub footer: String,
    #[clap(long, env = "TRIPCARD_DIAGNOSTICS")]
    /// Draw an error banner on cards whose background is the placeholder.
    /// Env: TRIPCARD_DIAGNOSTICS
    pub diagnostics: bool,
}

#[derive(Args, Debug, Clone)]
/// Options for the background provider chain.
pub struct ProviderOptions {
    #[clap(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    /// API key for Imagen on the Generative Language API.
    /// Env: GOOGLE_API_KEY
    pub google_api_key: Option<String>,
    #[clap(long, default_value = "imagen-3.0-generate-001", env = "TRIPCARD_IMAGEN_MODEL")]
    /// Primary Imagen model.
    /// Env: TRIPCARD_IMAGEN_MODEL
    pub imagen_model: String,
    #[clap(
        long,
        default_value = "imagen-3.0-fast-generate-001",
        env = "TRIPCARD_IMAGEN_FALLBACK_MODEL"
    )]
    /// Alternate Imagen model tried after the primary, empty to skip.
    /// Env: TRIPCARD_IMAGEN_FALLBACK_MODEL
    pub imagen_fallback_model: Option<String>,
    #[clap(long, env = "GOOGLE_PROJECT_ID")]
    /// Vertex AI project, defaults to the credentials' `project_id`.
    /// Env: GOOGLE_PROJECT_ID
    pub google_project_id: Option<String>,
    #[clap(long, default_value = "us-central1", env = "GOOGLE_LOCATION")]
    /// Vertex AI region.
    /// Env: GOOGLE_LOCATION
    pub google_location: String,
    #[clap(long, env = "GOOGLE_CREDENTIALS_JSON", hide_env_values = true)]
    /// Service account key JSON for Vertex AI.
    /// Env: GOOGLE_CREDENTIALS_JSON
    pub google_credentials_json: Option<String>,
    #[clap(
        long,
        default_value = "https://source.unsplash.com",
        env = "TRIPCARD_STOCK_PHOTO_URL"
    )]
    /// Stock photo search endpoint.
    /// Env: TRIPCARD_STOCK_PHOTO_URL
    pub stock_photo_url: String,
    #[clap(long, env = "TRIPCARD_NO_STOCK_PHOTOS")]
    /// Skip the stock photo fallback.
    /// Env: TRIPCARD_NO_STOCK_PHOTOS
    pub no_stock_photos: bool,
    #[clap(long, default_value = "10", env = "TRIPCARD_PROVIDER_TIMEOUT")]
    /// Seconds to wait on each provider before moving on.
    /// Env: TRIPCARD_PROVIDER_TIMEOUT
    pub provider_timeout_secs: NonZeroU16,
}
