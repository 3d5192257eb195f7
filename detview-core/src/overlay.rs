//! Bounding-box overlay drawn at display resolution.
//!
//! The overlay is a transparent RGBA surface the size of the displayed image. Every render
//! starts from a fully cleared surface, so rendering the same inputs twice produces the
//! same pixels.

use ab_glyph::{FontRef, PxScale};
use anyhow::{Result, anyhow};
use image::{DynamicImage, RgbaImage, imageops};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use log::{Level, trace};

use detview_utils::{config::OverlaySettings, telemetry::timing_guard};

use crate::{
    detection::DetectionRecord,
    geometry::{DisplayRect, ImageDimensions, ScaleTransform},
    palette::style_for,
};

static LABEL_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

/// Owns the overlay surface and redraws it on request.
pub struct OverlayRenderer {
    surface: RgbaImage,
    font: FontRef<'static>,
    settings: OverlaySettings,
}

impl std::fmt::Debug for OverlayRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRenderer")
            .field("surface", &self.surface.dimensions())
            .field("settings", &self.settings)
            .finish()
    }
}

impl OverlayRenderer {
    pub fn new(mut settings: OverlaySettings) -> Result<Self> {
        settings.sanitize();
        let font = FontRef::try_from_slice(LABEL_FONT)
            .map_err(|err| anyhow!("failed to load bundled label font: {err}"))?;
        Ok(Self {
            surface: RgbaImage::new(0, 0),
            font,
            settings,
        })
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    /// Resize the surface to `display` (if needed) and make it fully transparent.
    pub fn clear(&mut self, display: ImageDimensions) {
        if self.surface.dimensions() != (display.width, display.height) {
            self.surface = RgbaImage::new(display.width, display.height);
        } else {
            self.surface.fill(0);
        }
    }

    /// Redraw every detection mapped through `transform`.
    ///
    /// An empty detection list leaves a cleared surface.
    pub fn render(
        &mut self,
        transform: ScaleTransform,
        display: ImageDimensions,
        detections: &[DetectionRecord],
    ) -> &RgbaImage {
        let _guard = timing_guard("detview_core::overlay::render", Level::Debug);
        self.clear(display);
        for detection in detections {
            let rect = transform.map_rect(detection);
            self.draw_detection(detection, rect);
        }
        trace!(
            "Rendered {} detection(s) onto {display} overlay",
            detections.len()
        );
        &self.surface
    }

    fn draw_detection(&mut self, detection: &DetectionRecord, rect: DisplayRect) {
        let style = style_for(&detection.category);
        let stroke = style.stroke.to_rgba();
        let (surface_w, surface_h) = self.surface.dimensions();
        let line_width = self.settings.line_width as i32;

        // Edges far off the surface are pulled in to just past its border, where their
        // strokes still land outside it.
        let margin = i64::from(line_width) + 1;
        let clamp_x = |v: f32| (v.round() as i64).clamp(-margin, i64::from(surface_w) + margin);
        let clamp_y = |v: f32| (v.round() as i64).clamp(-margin, i64::from(surface_h) + margin);
        let left = clamp_x(rect.x) as i32;
        let top = clamp_y(rect.y) as i32;
        let width = (clamp_x(rect.right()) as i32 - left).max(1);
        let height = (clamp_y(rect.bottom()) as i32 - top).max(1);

        // Strokes straddle the box edge: half outside, half inside.
        for step in 0..line_width {
            let offset = step - line_width / 2;
            let w = width - 2 * offset;
            let h = height - 2 * offset;
            if w <= 0 || h <= 0 {
                continue;
            }
            let outline = Rect::at(left + offset, top + offset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut self.surface, outline, stroke);
        }

        let text = detection.label();
        let scale = PxScale::from(self.settings.font_px);
        let (text_width, text_height) = text_size(scale, &self.font, &text);
        let padding = self.settings.label_padding;
        let label_width = text_width + 2 * padding;
        let label_height = self.settings.label_height;
        let label_left = rect.x.round() as i64;
        let label_top =
            (rect.y.round() as i64).saturating_sub(i64::from(self.settings.label_offset));
        let visible = label_left < i64::from(surface_w)
            && label_top < i64::from(surface_h)
            && label_left + i64::from(label_width) > 0
            && label_top + i64::from(label_height) > 0;
        if !visible {
            return;
        }
        // Visible labels start within one label size of the surface, so they fit in i32.
        let (label_left, label_top) = (label_left as i32, label_top as i32);
        let background = Rect::at(label_left, label_top).of_size(label_width, label_height);
        draw_filled_rect_mut(&mut self.surface, background, stroke);

        // Text is centred vertically in the background.
        let text_top = label_top + (label_height as i32 - text_height as i32) / 2;
        draw_text_mut(
            &mut self.surface,
            style.text.to_rgba(),
            label_left + padding as i32,
            text_top,
            scale,
            &self.font,
            &text,
        );
    }
}

/// Scale `base` to the overlay size and draw the overlay on top.
pub fn composite(base: &DynamicImage, overlay: &RgbaImage) -> RgbaImage {
    let (width, height) = overlay.dimensions();
    let mut canvas = if base.width() == width && base.height() == height {
        base.to_rgba8()
    } else {
        imageops::resize(&base.to_rgba8(), width, height, imageops::FilterType::Triangle)
    };
    imageops::overlay(&mut canvas, overlay, 0, 0);
    canvas
}
