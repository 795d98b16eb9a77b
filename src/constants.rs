//! Shared constants/setters for things
//!

use std::sync::LazyLock;
use std::time::Duration;

/// Width of a rendered card, in pixels.
pub const CARD_WIDTH: u32 = 1200;

/// Height of a rendered card, in pixels.
pub const CARD_HEIGHT: u32 = 630;

/// Aspect ratio requested from generative providers.
pub const CARD_ASPECT_RATIO: &str = "16:9";

/// Upper bound on a single provider call.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

/// Destination used when the request doesn't name one.
pub const DEFAULT_DESTINATION: &str = "Viagem";

/// Appended to the destination to build the image prompt.
pub const PROMPT_SUFFIX: &str =
    ", realistic, cinematic lighting, 8k, high quality travel photography";

/// Default cache namespace for generated backgrounds.
pub const DEFAULT_CACHE_NAMESPACE: &str = "ia_img";

/// Front-end application the share page sends people to.
pub const DEFAULT_APP_URL: &str = "https://eduardozbu-ddripp.github.io/ddripp-server/";

/// Brand drawn on every card.
pub const DEFAULT_BRAND: &str = "ddripp";

/// Footer line drawn on every card.
pub const DEFAULT_FOOTER: &str = "Roteiro Personalizado via Gemini AI";

/// Custom header naming where the card background came from
pub const X_TRIPCARD_SOURCE: &str = "x-tripcard-source";

/// Max age (in seconds) for card cache entries.
pub const IMAGE_CACHE_MAX_AGE_SECONDS: u64 = 60 * 60;

/// Shared cache max age (in seconds) for card cache entries.
pub const IMAGE_CACHE_S_MAXAGE_SECONDS: u64 = 60 * 60 * 24;

/// Stale-while-revalidate window (in seconds) for card cache entries.
pub const IMAGE_CACHE_STALE_WHILE_REVALIDATE_SECONDS: u64 = 60 * 60 * 24;

/// Cache-Control value for card responses.
pub static IMAGE_CACHE_CONTROL: LazyLock<String> = LazyLock::new(|| {
    format!(
        "public, max-age={}, s-maxage={}, stale-while-revalidate={}",
        IMAGE_CACHE_MAX_AGE_SECONDS,
        IMAGE_CACHE_S_MAXAGE_SECONDS,
        IMAGE_CACHE_STALE_WHILE_REVALIDATE_SECONDS
    )
});
