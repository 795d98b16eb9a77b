//! HTTP surface: the card image, the share page, and a health check.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::cache::MemoryCache;
use crate::card::CardRenderer;
use crate::cli::CliOptions;
use crate::config::{build_pipeline, build_renderer};
use crate::constants::{DEFAULT_DESTINATION, IMAGE_CACHE_CONTROL, X_TRIPCARD_SOURCE};
use crate::error::CardError;
use crate::pipeline::ImagePipeline;

mod views;

use views::share_handler;

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    pipeline: Arc<ImagePipeline>,
    renderer: Arc<CardRenderer>,
    app_url: String,
    brand: String,
    cache_namespace: String,
}

impl AppState {
    fn new(
        pipeline: ImagePipeline,
        renderer: CardRenderer,
        app_url: &str,
        brand: &str,
        cache_namespace: &str,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            renderer: Arc::new(renderer),
            app_url: app_url.trim().to_string(),
            brand: brand.to_string(),
            cache_namespace: cache_namespace.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CoverQuery {
    dest: Option<String>,
    date: Option<String>,
}

impl CoverQuery {
    fn destination(&self) -> String {
        self.dest
            .as_deref()
            .map(str::trim)
            .filter(|dest| !dest.is_empty())
            .unwrap_or(DEFAULT_DESTINATION)
            .to_string()
    }
}

/// handles GET /dynamic-cover
async fn dynamic_cover_handler(
    State(state): State<AppState>,
    Query(query): Query<CoverQuery>,
) -> Result<Response, CardError> {
    let destination = query.destination();
    let date = query.date.unwrap_or_default();

    let background = state
        .pipeline
        .acquire_background(&destination, &state.cache_namespace)
        .await;
    let source = background.source.label().to_string();

    let renderer = state.renderer.clone();
    let png = tokio::task::spawn_blocking(move || renderer.render(&background, &destination, &date))
        .await??;

    Response::builder()
        .header(CONTENT_TYPE, "image/png")
        .header(CACHE_CONTROL, IMAGE_CACHE_CONTROL.as_str())
        .header(X_TRIPCARD_SOURCE, source)
        .body(Body::from(png))
        .map_err(CardError::from)
}

async fn healthz_handler() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain")], "ok")
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/dynamic-cover", axum::routing::get(dynamic_cover_handler))
        .route("/share", axum::routing::get(share_handler))
        .route("/healthz", axum::routing::get(healthz_handler))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

/// Builds the pipeline and renderer from `cli` and serves until interrupted.
pub async fn setup_server(cli: &CliOptions) -> Result<(), anyhow::Error> {
    let pipeline = build_pipeline(&cli.providers, Arc::new(MemoryCache::new()))?;
    let renderer = build_renderer(&cli.card)?;
    let state = AppState::new(
        pipeline,
        renderer,
        &cli.app_url,
        &cli.card.brand,
        &cli.cache_namespace,
    );
    let app = create_router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", cli.listen_address, cli.port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", err);
    }
    Ok(())
}
