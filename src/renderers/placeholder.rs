//! Synthetic renderer that makes chunk and segment behaviour visible

use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle};
use fontdue::{Font, FontSettings};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{Rgb, RgbImage};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{trace, warn};
use vello_cpu::kurbo::{Circle, Rect, Shape};
use vello_cpu::peniko::Color;
use vello_cpu::peniko::color::{AlphaColor, Hwb, Srgb};
use vello_cpu::{Pixmap, RenderContext};

use crate::config::StreamConfig;
use crate::renderer::{FrameRenderer, RenderRequest};
use crate::types::{Frame, FrameFormat};
use crate::{Result, SessionError};

const PROGRESS_BAR_HEIGHT: f64 = 8.0;
const SWEEP_HALF_WIDTH: f64 = 1.5;
const MARKER_RADIUS: f64 = 6.0;

const TEXT_X: f32 = 12.0;
const TEXT_Y: f32 = 12.0;
const LINE_SPACING: f32 = 22.0;
const SHADOW_OFFSET: f32 = 2.0;
const MAX_PROMPT_CHARS: usize = 52;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const PROGRESS_GREEN: Rgb<u8> = Rgb([80, 200, 120]);

/// Placeholder renderer drawing progress visuals instead of inferred content.
///
/// Each frame carries:
/// - a background hue chosen by segment, so prompt switches are obvious
/// - a vertical sweep line with a leading marker moving left to right over the session
/// - a progress bar along the bottom edge
/// - a shadowed text overlay with the frame number, the segment and the active prompt
///
/// The overlay needs a TrueType font. Without one the frame is drawn without text.
/// Output is deterministic: the same request always encodes to the same bytes.
#[derive(Clone)]
pub struct PlaceholderRenderer {
    width: u32,
    height: u32,
    format: FrameFormat,
    jpeg_quality: u8,
    hues: Vec<f32>,
    font: Option<Arc<Font>>,
    font_size: f32,
}

impl fmt::Debug for PlaceholderRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceholderRenderer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("text_overlay", &self.font.is_some())
            .finish_non_exhaustive()
    }
}

impl PlaceholderRenderer {
    /// Create a JPEG renderer at the given resolution with the default palette and font
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_config(&StreamConfig { frame_width: width, frame_height: height, ..StreamConfig::default() })
    }

    /// Create a renderer matching the resolution, encoding, palette and font of `config`
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            width: config.frame_width,
            height: config.frame_height,
            format: config.output_format,
            jpeg_quality: config.jpeg_quality,
            hues: config.segment_hues.clone(),
            font: config.font_path.as_deref().and_then(load_font).map(Arc::new),
            font_size: config.font_size,
        }
    }

    /// Switch output encoding
    pub fn with_format(mut self, format: FrameFormat) -> Self {
        self.format = format;
        self
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Whether frames carry the text overlay
    pub fn has_text_overlay(&self) -> bool {
        self.font.is_some()
    }

    /// Text lines drawn in the top-left corner of a frame
    pub fn overlay_lines(request: &RenderRequest<'_>) -> [String; 3] {
        let mut prompt: String = request.prompt.chars().take(MAX_PROMPT_CHARS).collect();
        if request.prompt.chars().count() > MAX_PROMPT_CHARS {
            prompt.push('…');
        }
        [
            format!("frame {:03} / {}", request.frame_index, request.total_frames),
            format!("seg {}/{}", request.segment_index + 1, request.segment_count),
            prompt,
        ]
    }

    /// Draw the frame without encoding it
    pub fn draw(&self, request: &RenderRequest<'_>) -> Result<RgbImage> {
        let (width, height) = match (u16::try_from(self.width), u16::try_from(self.height)) {
            (Ok(width), Ok(height)) => (width, height),
            _ => {
                return Err(SessionError::render_failed(
                    request.frame_index,
                    format!("canvas {}x{} exceeds {} pixels", self.width, self.height, u16::MAX),
                ));
            }
        };
        let (w, h) = (f64::from(width), f64::from(height));
        let t = request.progress();

        let hue = self.hues[request.segment_index % self.hues.len()];
        let saturation = 0.45 + 0.15 * (t * std::f32::consts::TAU).sin();
        let value = 0.30 + 0.20 * (t * std::f32::consts::PI).cos();

        let mut ctx = RenderContext::new(width, height);
        ctx.set_paint(hsv_color(hue, saturation, value));
        ctx.fill_rect(&Rect::new(0.0, 0.0, w, h));

        // Sweep line and marker
        let sweep_x = (f64::from(t) * w).floor();
        ctx.set_paint(paint(WHITE));
        ctx.fill_rect(&Rect::new(sweep_x - SWEEP_HALF_WIDTH, 0.0, sweep_x + SWEEP_HALF_WIDTH, h));
        ctx.fill_path(&Circle::new((sweep_x, (h / 2.0).floor()), MARKER_RADIUS).to_path(0.1));

        // Progress bar
        let bar_y = (h - PROGRESS_BAR_HEIGHT).max(0.0);
        ctx.set_paint(paint(BLACK));
        ctx.fill_rect(&Rect::new(0.0, bar_y, w, h));
        if sweep_x > 0.0 {
            ctx.set_paint(paint(PROGRESS_GREEN));
            ctx.fill_rect(&Rect::new(0.0, bar_y, sweep_x, h));
        }

        ctx.flush();
        let mut pixmap = Pixmap::new(width, height);
        ctx.render_to_pixmap(&mut pixmap);

        // Every pixel is covered by the opaque background, so dropping alpha is exact
        let rgb: Vec<u8> =
            pixmap.data_as_u8_slice().chunks_exact(4).flat_map(|px| [px[0], px[1], px[2]]).collect();
        let mut image = RgbImage::from_raw(self.width, self.height, rgb).ok_or_else(|| {
            SessionError::render_failed(request.frame_index, "pixmap size does not match canvas")
        })?;

        if let Some(font) = &self.font {
            let mut y = TEXT_Y;
            for line in Self::overlay_lines(request) {
                let shadow = (TEXT_X + SHADOW_OFFSET, y + SHADOW_OFFSET);
                draw_text(&mut image, font, self.font_size, shadow, &line, BLACK);
                draw_text(&mut image, font, self.font_size, (TEXT_X, y), &line, WHITE);
                y += LINE_SPACING;
            }
        }

        Ok(image)
    }

    fn encode(&self, image: &RgbImage, frame_index: u64) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let encoded = match self.format {
            FrameFormat::Jpeg => {
                image.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality))
            }
            FrameFormat::Png => image.write_with_encoder(PngEncoder::new(&mut bytes)),
        };
        encoded.map_err(|e| {
            SessionError::render_failed_with_source(
                frame_index,
                format!("{} encoding failed", self.format),
                Box::new(e),
            )
        })?;
        Ok(bytes)
    }
}

impl FrameRenderer for PlaceholderRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Frame> {
        let image = self.draw(request)?;
        let bytes = self.encode(&image, request.frame_index)?;

        trace!(
            "Rendered frame {}/{} (segment {}/{}, {} bytes)",
            request.frame_index,
            request.total_frames,
            request.segment_index + 1,
            request.segment_count,
            bytes.len()
        );

        Ok(Frame::new(request.frame_index, bytes, self.format))
    }

    fn name(&self) -> &'static str {
        "placeholder"
    }
}

fn load_font(path: &Path) -> Option<Font> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Overlay font {} unavailable, frames carry no text: {}", path.display(), e);
            return None;
        }
    };
    match Font::from_bytes(bytes, FontSettings::default()) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Overlay font {} could not be parsed, frames carry no text: {}", path.display(), e);
            None
        }
    }
}

fn paint(color: Rgb<u8>) -> Color {
    let Rgb([r, g, b]) = color;
    Color::from_rgba8(r, g, b, 255)
}

/// HSV with every component in `[0, 1]`, expressed through HWB
fn hsv_color(h: f32, s: f32, v: f32) -> Color {
    let (s, v) = (s.clamp(0.0, 1.0), v.clamp(0.0, 1.0));
    let whiteness = (1.0 - s) * v;
    let blackness = 1.0 - v;
    AlphaColor::<Hwb>::new([h.rem_euclid(1.0) * 360.0, whiteness * 100.0, blackness * 100.0, 1.0])
        .convert::<Srgb>()
}

/// Alpha-blend one line of text with its top-left corner at `origin`
fn draw_text(image: &mut RgbImage, font: &Font, size: f32, origin: (f32, f32), text: &str, color: Rgb<u8>) {
    let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
    layout.reset(&LayoutSettings { x: origin.0, y: origin.1, ..LayoutSettings::default() });
    layout.append(&[font], &TextStyle::new(text, size, 0));

    let (width, height) = (i64::from(image.width()), i64::from(image.height()));
    for glyph in layout.glyphs() {
        if glyph.width == 0 || glyph.height == 0 {
            continue;
        }
        let (_, coverage) = font.rasterize_config(glyph.key);
        let (gx, gy) = (glyph.x.round() as i64, glyph.y.round() as i64);

        for (i, &alpha) in coverage.iter().enumerate() {
            let x = gx + (i % glyph.width) as i64;
            let y = gy + (i / glyph.width) as i64;
            if alpha == 0 || x < 0 || y < 0 || x >= width || y >= height {
                continue;
            }
            let pixel = image.get_pixel_mut(x as u32, y as u32);
            let a = u16::from(alpha);
            for (dst, src) in pixel.0.iter_mut().zip(color.0) {
                *dst = ((u16::from(src) * a + u16::from(*dst) * (255 - a)) / 255) as u8;
            }
        }
    }
}
