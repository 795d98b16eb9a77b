//! Card rendering: brand, destination and date composited over the
//! acquired background, encoded as PNG.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use rusttype::{Font, Scale, point};
use tracing::warn;

use crate::constants::{CARD_HEIGHT, CARD_WIDTH};
use crate::error::CardError;
use crate::pipeline::{Background, BackgroundSource};
use crate::placeholder::{blend_pixel, encode_png, render_placeholder};

const FONT_REGULAR: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/fonts/DejaVuSans.ttf"
));
const FONT_BOLD: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/assets/fonts/DejaVuSans-Bold.ttf"
));

const OVERLAY: Rgba<u8> = Rgba([0, 0, 0, 102]);
const BRAND_COLOR: Rgba<u8> = Rgba([59, 130, 246, 255]);
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);
const FOOTER_COLOR: Rgba<u8> = Rgba([255, 255, 255, 179]);
const BANNER_COLOR: Rgba<u8> = Rgba([220, 38, 38, 230]);

/// Largest destination font size, in pixels.
pub const DESTINATION_MAX_PX: f32 = 70.0;
/// Smallest destination font size, in pixels.
pub const DESTINATION_MIN_PX: f32 = 30.0;
const DESTINATION_STEP_PX: f32 = 5.0;
const DESTINATION_MARGIN: f32 = 100.0;

/// Text the renderer puts on every card.
#[derive(Clone, Debug)]
pub struct CardBranding {
    /// Brand drawn top left.
    pub brand: String,
    /// Small print along the bottom.
    pub footer: String,
    /// Draw an error banner over placeholder backgrounds.
    pub diagnostics: bool,
}

/// Draws share cards.
pub struct CardRenderer {
    regular: Font<'static>,
    bold: Font<'static>,
    branding: CardBranding,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for CardRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardRenderer")
            .field("branding", &self.branding)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl CardRenderer {
    /// Loads the bundled fonts.
    pub fn new(branding: CardBranding) -> Result<Self, CardError> {
        let regular = Font::try_from_bytes(FONT_REGULAR).ok_or_else(|| {
            CardError::InternalServerError("bundled regular font is invalid".to_string())
        })?;
        let bold = Font::try_from_bytes(FONT_BOLD).ok_or_else(|| {
            CardError::InternalServerError("bundled bold font is invalid".to_string())
        })?;
        Ok(Self {
            regular,
            bold,
            branding,
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
        })
    }

    /// Renders the card and returns PNG bytes.
    pub fn render(
        &self,
        background: &Background,
        destination: &str,
        date: &str,
    ) -> Result<Vec<u8>, CardError> {
        let canvas = self.compose(background, destination, date);
        Ok(encode_png(&canvas)?)
    }

    /// Renders the card onto an RGBA canvas.
    pub fn compose(&self, background: &Background, destination: &str, date: &str) -> RgbaImage {
        let mut canvas = self.background_canvas(background);
        let (width, height) = (self.width as f32, self.height as f32);

        fill_rect(&mut canvas, 0, 0, self.width, self.height, OVERLAY);

        draw_text(&mut canvas, &self.bold, 40.0, 50.0, 80.0, BRAND_COLOR, &self.branding.brand);

        let title = destination.to_uppercase();
        let title_px = self.fit_font_size(&title, width - DESTINATION_MARGIN);
        self.draw_centered(&mut canvas, &self.bold, title_px, height / 2.0, TEXT_COLOR, &title);

        if !date.trim().is_empty() {
            self.draw_centered(
                &mut canvas,
                &self.regular,
                30.0,
                height / 2.0 + 60.0,
                TEXT_COLOR,
                date.trim(),
            );
        }

        if self.branding.diagnostics && background.source == BackgroundSource::Placeholder {
            fill_rect(&mut canvas, 0, self.height.saturating_sub(110), self.width, 40, BANNER_COLOR);
            self.draw_centered(
                &mut canvas,
                &self.bold,
                20.0,
                height - 83.0,
                TEXT_COLOR,
                "image providers unavailable",
            );
        }

        self.draw_centered(
            &mut canvas,
            &self.regular,
            20.0,
            height - 40.0,
            FOOTER_COLOR,
            &self.branding.footer,
        );
        canvas
    }

    /// Destination font size: shrinks in 5px steps from 70px while the text
    /// is wider than `max_width`, stopping at 30px.
    pub fn fit_font_size(&self, text: &str, max_width: f32) -> f32 {
        let mut px = DESTINATION_MAX_PX;
        while text_width(&self.bold, px, text) > max_width && px > DESTINATION_MIN_PX {
            px -= DESTINATION_STEP_PX;
        }
        px
    }

    fn background_canvas(&self, background: &Background) -> RgbaImage {
        match image::load_from_memory(&background.bytes) {
            Ok(img) => img
                .resize_to_fill(self.width, self.height, FilterType::Triangle)
                .to_rgba8(),
            Err(err) => {
                warn!(
                    "Background from {} doesn't decode ({}), drawing placeholder",
                    background.source.label(),
                    err
                );
                render_placeholder(self.width, self.height)
            }
        }
    }

    fn draw_centered(
        &self,
        canvas: &mut RgbaImage,
        font: &Font<'static>,
        px: f32,
        baseline: f32,
        color: Rgba<u8>,
        text: &str,
    ) {
        let x = (self.width as f32 - text_width(font, px, text)) / 2.0;
        draw_text(canvas, font, px, x, baseline, color, text);
    }
}

/// Advance width of `text` at `px` pixels.
fn text_width(font: &Font<'static>, px: f32, text: &str) -> f32 {
    font.layout(text, Scale::uniform(px), point(0.0, 0.0))
        .last()
        .map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
}

/// Draws `text` with its left edge at `x` and its baseline at `baseline`.
fn draw_text(
    canvas: &mut RgbaImage,
    font: &Font<'static>,
    px: f32,
    x: f32,
    baseline: f32,
    color: Rgba<u8>,
    text: &str,
) {
    for glyph in font.layout(text, Scale::uniform(px), point(x, baseline)) {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|gx, gy, coverage| {
            blend_pixel(
                canvas,
                i64::from(bb.min.x) + i64::from(gx),
                i64::from(bb.min.y) + i64::from(gy),
                color,
                coverage,
            );
        });
    }
}

fn fill_rect(canvas: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    for py in y..y.saturating_add(height).min(canvas.height()) {
        for px in x..x.saturating_add(width).min(canvas.width()) {
            blend_pixel(canvas, i64::from(px), i64::from(py), color, 1.0);
        }
    }
}
