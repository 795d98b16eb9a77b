//! Background acquisition: cache lookup, provider fallback chain, and the
//! procedural placeholder as the last resort.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cache::ImageCache;
use crate::constants::{CARD_HEIGHT, CARD_WIDTH, DEFAULT_PROVIDER_TIMEOUT};
use crate::placeholder::placeholder_png;
use crate::providers::{ImageProvider, ProviderError, ProviderRequest};

/// Where a background came from.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BackgroundSource {
    /// Served from the cache without calling any provider.
    Cache,
    /// Supplied by the named provider.
    Provider(String),
    /// Every provider failed; procedurally generated.
    Placeholder,
}

impl BackgroundSource {
    /// Short label for headers and logs.
    pub fn label(&self) -> &str {
        match self {
            Self::Cache => "cache",
            Self::Provider(name) => name,
            Self::Placeholder => "placeholder",
        }
    }
}

/// An acquired background image.
#[derive(Clone, Debug)]
pub struct Background {
    /// Encoded image bytes (PNG, JPEG, ...).
    pub bytes: Arc<[u8]>,
    /// Where they came from.
    pub source: BackgroundSource,
}

/// Tries providers in order and caches whatever it ends up with.
pub struct ImagePipeline {
    providers: Vec<Box<dyn ImageProvider>>,
    cache: Arc<dyn ImageCache>,
    timeout: Duration,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for ImagePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePipeline")
            .field("providers", &self.provider_names())
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl ImagePipeline {
    /// Creates a pipeline producing card-sized backgrounds.
    pub fn new(providers: Vec<Box<dyn ImageProvider>>, cache: Arc<dyn ImageCache>) -> Self {
        Self {
            providers,
            cache,
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
        }
    }

    /// Sets the bound on each provider call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the requested output size. Zero is raised to one pixel.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Provider names in the order they're tried.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// The bound on each provider call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cache key for a destination: trimmed, lower-cased, namespaced.
    pub fn cache_key(namespace: &str, destination: &str) -> String {
        format!("{}:{}", namespace, destination.trim().to_lowercase())
    }

    /// Returns a background for `destination`. Never fails: when every
    /// provider does, the deterministic placeholder is returned (and cached).
    pub async fn acquire_background(&self, destination: &str, namespace: &str) -> Background {
        let key = Self::cache_key(namespace, destination);
        if let Some(bytes) = self.cache.get(&key) {
            debug!("Cache hit for {}", key);
            return Background {
                bytes,
                source: BackgroundSource::Cache,
            };
        }

        info!("Cache miss for {}, trying {} providers", key, self.providers.len());
        let request = ProviderRequest::for_destination(destination, self.width, self.height);
        let (bytes, source) = match self.first_success(&request).await {
            Some((bytes, provider)) => (bytes, BackgroundSource::Provider(provider)),
            None => {
                warn!("All providers failed for {:?}, using placeholder", destination);
                (
                    placeholder_png(self.width, self.height),
                    BackgroundSource::Placeholder,
                )
            }
        };

        let bytes: Arc<[u8]> = Arc::from(bytes);
        if bytes.is_empty() {
            warn!("Not caching empty background for {}", key);
        } else {
            self.cache.set(&key, bytes.clone());
        }
        Background { bytes, source }
    }

    async fn first_success(&self, request: &ProviderRequest) -> Option<(Vec<u8>, String)> {
        for provider in &self.providers {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(self.timeout, provider.generate(request)).await
            {
                Ok(Ok(bytes)) if bytes.is_empty() => Err(ProviderError::MalformedResponse(
                    "empty image payload".to_string(),
                )),
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(Some(self.timeout))),
            };
            match outcome {
                Ok(bytes) => {
                    info!(
                        "{} supplied {} bytes for {:?} in {:?}",
                        provider.name(),
                        bytes.len(),
                        request.destination,
                        started.elapsed()
                    );
                    return Some((bytes, provider.name().to_string()));
                }
                Err(err) => {
                    warn!("{} failed for {:?}: {}", provider.name(), request.destination, err);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test provider with a canned outcome that counts its calls.
    struct Scripted {
        name: &'static str,
        outcome: Result<Vec<u8>, ProviderError>,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn ok(name: &'static str, bytes: &[u8]) -> (Self, Arc<AtomicUsize>) {
            Self::new(name, Ok(bytes.to_vec()), None)
        }

        fn failing(name: &'static str, err: ProviderError) -> (Self, Arc<AtomicUsize>) {
            Self::new(name, Err(err), None)
        }

        fn new(
            name: &'static str,
            outcome: Result<Vec<u8>, ProviderError>,
            delay: Option<Duration>,
        ) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    outcome,
                    delay,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl ImageProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(&self, _request: &ProviderRequest) -> Result<Vec<u8>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.outcome.clone()
        }
    }

    #[test]
    fn cache_key_is_normalized_and_namespaced() {
        assert_eq!(ImagePipeline::cache_key("v1", "  Paris "), "v1:paris");
        assert_eq!(
            ImagePipeline::cache_key("v1", "PARIS"),
            ImagePipeline::cache_key("v1", "paris")
        );
        assert_ne!(
            ImagePipeline::cache_key("v1", "paris"),
            ImagePipeline::cache_key("v2", "paris")
        );
    }

    #[tokio::test]
    async fn second_call_with_different_case_is_a_cache_hit() {
        let (provider, calls) = Scripted::ok("first", b"paris-bytes");
        let pipeline = ImagePipeline::new(vec![Box::new(provider)], Arc::new(MemoryCache::new()));

        let first = pipeline.acquire_background("Paris", "v1").await;
        assert_eq!(first.source, BackgroundSource::Provider("first".to_string()));
        let second = pipeline.acquire_background("PARIS", "v1").await;
        assert_eq!(second.source, BackgroundSource::Cache);
        assert_eq!(&*second.bytes, b"paris-bytes");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn falls_through_to_next_provider_and_caches_its_bytes() {
        let (broken, broken_calls) = Scripted::failing(
            "broken",
            ProviderError::RequestRejected {
                status: 500,
                message: "boom".to_string(),
            },
        );
        let (working, working_calls) = Scripted::ok("working", b"second");
        let (unused, unused_calls) = Scripted::ok("unused", b"third");
        let cache = Arc::new(MemoryCache::new());
        let pipeline = ImagePipeline::new(
            vec![Box::new(broken), Box::new(working), Box::new(unused)],
            cache.clone(),
        );

        let background = pipeline.acquire_background("Rome", "v1").await;
        assert_eq!(&*background.bytes, b"second");
        assert_eq!(background.source.label(), "working");
        assert_eq!(cache.get("v1:rome").as_deref(), Some(&b"second"[..]));
        assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
        assert_eq!(working_calls.load(Ordering::SeqCst), 1);
        assert_eq!(unused_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_failures_yield_cached_placeholder() {
        let (missing, _) = Scripted::failing("missing", ProviderError::AuthMissing("key".into()));
        let (empty, _) = Scripted::ok("empty", b"");
        let cache = Arc::new(MemoryCache::new());
        let pipeline =
            ImagePipeline::new(vec![Box::new(missing), Box::new(empty)], cache.clone());

        let background = pipeline.acquire_background("Paris", "v1").await;
        assert_eq!(background.source, BackgroundSource::Placeholder);
        assert_eq!(&*background.bytes, placeholder_png(1200, 630).as_slice());
        assert!(cache.get("v1:paris").is_some());

        let decoded = image::load_from_memory(&background.bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (1200, 630));
    }

    #[tokio::test]
    async fn no_providers_still_returns_placeholder() {
        let pipeline = ImagePipeline::new(Vec::new(), Arc::new(MemoryCache::new()))
            .with_dimensions(320, 168);
        let background = pipeline.acquire_background("Paris", "v1").await;
        assert_eq!(background.source, BackgroundSource::Placeholder);
        assert_eq!(&*background.bytes, placeholder_png(320, 168).as_slice());
    }

    #[tokio::test]
    async fn zero_dimensions_still_give_a_cached_placeholder() {
        let cache = Arc::new(MemoryCache::new());
        let pipeline = ImagePipeline::new(Vec::new(), cache.clone()).with_dimensions(0, 0);

        let background = pipeline.acquire_background("Quito", "v1").await;
        assert_eq!(background.source, BackgroundSource::Placeholder);
        let decoded = image::load_from_memory(&background.bytes).expect("decode");
        assert_eq!((decoded.width(), decoded.height()), (1, 1));
        assert_eq!(cache.get("v1:quito").as_deref(), Some(&*background.bytes));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out_and_chain_continues() {
        let (slow, slow_calls) = Scripted::new("slow", Ok(b"late".to_vec()), Some(Duration::from_secs(60)));
        let (fast, _) = Scripted::ok("fast", b"fast");
        let pipeline = ImagePipeline::new(
            vec![Box::new(slow), Box::new(fast)],
            Arc::new(MemoryCache::new()),
        )
        .with_timeout(Duration::from_secs(8));

        let started = tokio::time::Instant::now();
        let background = pipeline.acquire_background("Oslo", "v1").await;
        assert_eq!(&*background.bytes, b"fast");
        assert_eq!(slow_calls.load(Ordering::SeqCst), 1);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(8));
        assert!(elapsed < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn cache_is_consulted_before_providers() {
        let (provider, calls) = Scripted::ok("never", b"fresh");
        let cache = Arc::new(MemoryCache::new());
        cache.set("v1:lima", Arc::from(b"stale".to_vec()));
        let pipeline = ImagePipeline::new(vec![Box::new(provider)], cache);

        let background = pipeline.acquire_background("Lima", "v1").await;
        assert_eq!(&*background.bytes, b"stale");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
