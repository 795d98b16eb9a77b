//! Config handling

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing::log::LevelFilter;

use crate::cache::ImageCache;
use crate::card::{CardBranding, CardRenderer};
use crate::cli::{CardOptions, ProviderOptions};
use crate::error::CardError;
use crate::pipeline::ImagePipeline;
use crate::providers::build_chain;

/// Connect timeout for outbound provider requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Builds the background pipeline described by `options`.
pub fn build_pipeline(
    options: &ProviderOptions,
    cache: Arc<dyn ImageCache>,
) -> Result<ImagePipeline, reqwest::Error> {
    let timeout = Duration::from_secs(u64::from(options.provider_timeout_secs.get()));
    let client = reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    let pipeline = ImagePipeline::new(build_chain(options, &client), cache).with_timeout(timeout);
    info!(
        "Background providers: {} (timeout {:?} each)",
        pipeline.provider_names().join(" -> "),
        timeout
    );
    Ok(pipeline)
}

/// Builds the card renderer described by `options`.
pub fn build_renderer(options: &CardOptions) -> Result<CardRenderer, CardError> {
    CardRenderer::new(CardBranding {
        brand: options.brand.clone(),
        footer: options.footer.clone(),
        diagnostics: options.diagnostics,
    })
}
