//! Render a single share card to disk, using the same provider chain as the
//! server.
//!
//!   render_card Paris --date 12/03/2026 --out paris.png

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tripcard::cache::MemoryCache;
use tripcard::cli::{CardOptions, ProviderOptions};
use tripcard::config::{build_pipeline, build_renderer, setup_logging};
use tripcard::constants::DEFAULT_CACHE_NAMESPACE;

#[derive(Parser, Debug)]
#[command(name = "render_card")]
#[command(about = "Render a travel share card to a PNG file")]
struct Args {
    /// Destination, eg Paris
    destination: String,

    /// Date line under the destination
    #[arg(long, default_value = "")]
    date: String,

    /// Where to write the PNG
    #[arg(long, default_value = "./card.png")]
    out: PathBuf,

    /// Also write the raw background next to the card
    #[arg(long)]
    keep_background: bool,

    #[arg(long, env = "TRIPCARD_DEBUG")]
    debug: bool,

    #[command(flatten)]
    card: CardOptions,

    #[command(flatten)]
    providers: ProviderOptions,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _ = setup_logging(args.debug);

    let pipeline = build_pipeline(&args.providers, Arc::new(MemoryCache::new()))
        .context("Failed to build provider chain")?;
    let renderer = build_renderer(&args.card)?;

    let background = pipeline
        .acquire_background(&args.destination, DEFAULT_CACHE_NAMESPACE)
        .await;
    eprintln!("Background from {}", background.source.label());

    if args.keep_background {
        let path = args.out.with_extension("background");
        fs::write(&path, &background.bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let destination = args.destination.clone();
    let date = args.date.clone();
    let png = tokio::task::spawn_blocking(move || renderer.render(&background, &destination, &date))
        .await
        .context("Render task failed")??;

    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&args.out, &png).with_context(|| format!("Failed to write {}", args.out.display()))?;

    eprintln!("Saved: {}", args.out.display());
    Ok(())
}
