//! Native/display coordinate mapping and native-space pixel regions.
//!
//! Detections arrive in native image pixels. The preview is laid out at a display size
//! that may be smaller, so overlay drawing goes through a [`ScaleTransform`] while the
//! thumbnail cropper works in native space through [`PixelRegion`].

use serde::{Deserialize, Serialize};

use detview_utils::config::ViewportSettings;

use crate::detection::DetectionRecord;

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either side is zero.
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl From<(u32, u32)> for ImageDimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for ImageDimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Per-axis scale from native pixels to display pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleTransform {
    pub scale_x: f32,
    pub scale_y: f32,
}

impl ScaleTransform {
    /// `display / native` on each axis. Returns `None` when either size has a zero side,
    /// in which case nothing should be drawn.
    pub fn between(native: ImageDimensions, display: ImageDimensions) -> Option<Self> {
        if native.is_empty() || display.is_empty() {
            return None;
        }
        Some(Self {
            scale_x: display.width as f32 / native.width as f32,
            scale_y: display.height as f32 / native.height as f32,
        })
    }

    pub fn map_point(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.scale_x, y * self.scale_y)
    }

    /// Map a detection's native rectangle into display space.
    pub fn map_rect(&self, detection: &DetectionRecord) -> DisplayRect {
        let (x, y) = self.map_point(detection.x, detection.y);
        DisplayRect {
            x,
            y,
            width: detection.width * self.scale_x,
            height: detection.height * self.scale_y,
        }
    }
}

/// Rectangle in display pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl DisplayRect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// In-bounds pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Integer thumbnail region in native pixels. The origin may lie outside the image.
///
/// Thumbnail pixel `(i, j)` samples source pixel `(x + i, y + j)`, where `x`/`y` are the
/// floored detection origin; width and height are the rounded box size, at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

/// Portion of a [`PixelRegion`] that overlaps the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClippedRegion {
    /// Source pixels to copy.
    pub source: PixelRect,
    /// Where `source` lands inside the thumbnail.
    pub dest_x: u32,
    pub dest_y: u32,
}

impl PixelRegion {
    pub fn from_detection(detection: &DetectionRecord) -> Self {
        Self {
            x: detection.x.floor() as i64,
            y: detection.y.floor() as i64,
            width: rounded_side(detection.width),
            height: rounded_side(detection.height),
        }
    }

    pub fn dimensions(&self) -> ImageDimensions {
        ImageDimensions::new(self.width, self.height)
    }

    /// Intersect with `[0, bounds.width) x [0, bounds.height)`.
    ///
    /// Returns `None` when the region lies entirely outside the image.
    pub fn clip_to_bounds(&self, bounds: ImageDimensions) -> Option<ClippedRegion> {
        let (start_x, end_x) = clip_axis(self.x, self.width, bounds.width)?;
        let (start_y, end_y) = clip_axis(self.y, self.height, bounds.height)?;
        Some(ClippedRegion {
            source: PixelRect {
                x: start_x as u32,
                y: start_y as u32,
                width: (end_x - start_x) as u32,
                height: (end_y - start_y) as u32,
            },
            dest_x: (start_x - self.x) as u32,
            dest_y: (start_y - self.y) as u32,
        })
    }
}

fn rounded_side(side: f32) -> u32 {
    side.round().clamp(1.0, u32::MAX as f32) as u32
}

fn clip_axis(origin: i64, len: u32, limit: u32) -> Option<(i64, i64)> {
    let start = origin.max(0);
    let end = (origin + i64::from(len)).min(i64::from(limit));
    (start < end).then_some((start, end))
}

/// Layout constraints of the preview container.
///
/// Mirrors a responsive image: never upscaled, aspect ratio kept, width capped at
/// `max_width` and height optionally capped at `max_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewportLayout {
    pub max_width: u32,
    pub max_height: Option<u32>,
}

impl Default for ViewportLayout {
    fn default() -> Self {
        ViewportSettings::default().into()
    }
}

impl From<ViewportSettings> for ViewportLayout {
    fn from(settings: ViewportSettings) -> Self {
        Self {
            max_width: settings.max_width,
            max_height: settings.max_height,
        }
    }
}

impl ViewportLayout {
    pub const fn new(max_width: u32, max_height: Option<u32>) -> Self {
        Self {
            max_width,
            max_height,
        }
    }

    /// Rendered size of an image with `native` dimensions inside this layout.
    pub fn measure(&self, native: ImageDimensions) -> ImageDimensions {
        if native.is_empty() {
            return ImageDimensions::default();
        }
        let width = native.width as f64;
        let height = native.height as f64;

        let mut scale = (f64::from(self.max_width.max(1)) / width).min(1.0);
        if let Some(max_height) = self.max_height {
            scale = scale.min(f64::from(max_height.max(1)) / height);
        }
        if scale >= 1.0 {
            return native;
        }
        ImageDimensions {
            width: ((width * scale).round() as u32).max(1),
            height: ((height * scale).round() as u32).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(x: f32, y: f32, width: f32, height: f32) -> DetectionRecord {
        DetectionRecord::new("face", 0.9, x, y, width, height)
    }

    #[test]
    fn scale_maps_native_rect_into_display() {
        let transform =
            ScaleTransform::between(ImageDimensions::new(200, 100), ImageDimensions::new(100, 50))
                .expect("transform");
        let rect = transform.map_rect(&record(10.0, 10.0, 20.0, 20.0));
        assert_eq!(rect, DisplayRect { x: 5.0, y: 5.0, width: 10.0, height: 10.0 });
        assert_eq!(rect.right(), 15.0);
    }

    #[test]
    fn zero_sized_display_has_no_transform() {
        let native = ImageDimensions::new(200, 100);
        assert!(ScaleTransform::between(native, ImageDimensions::new(0, 50)).is_none());
        assert!(ScaleTransform::between(ImageDimensions::default(), native).is_none());
    }

    #[test]
    fn layout_never_upscales_and_keeps_aspect() {
        let layout = ViewportLayout::new(100, None);
        assert_eq!(layout.measure(ImageDimensions::new(200, 100)), ImageDimensions::new(100, 50));
        assert_eq!(layout.measure(ImageDimensions::new(80, 60)), ImageDimensions::new(80, 60));

        let boxed = ViewportLayout::new(1000, Some(50));
        assert_eq!(boxed.measure(ImageDimensions::new(400, 200)), ImageDimensions::new(100, 50));
        assert_eq!(
            ViewportLayout::new(1, None).measure(ImageDimensions::new(1000, 10)),
            ImageDimensions::new(1, 1)
        );
    }

    #[test]
    fn region_clips_partially_outside_box() {
        let region = PixelRegion::from_detection(&record(-5.0, -5.0, 50.0, 50.0));
        assert_eq!(region.dimensions(), ImageDimensions::new(50, 50));

        let clipped = region
            .clip_to_bounds(ImageDimensions::new(40, 40))
            .expect("overlap");
        assert_eq!(clipped.source, PixelRect { x: 0, y: 0, width: 40, height: 40 });
        assert_eq!((clipped.dest_x, clipped.dest_y), (5, 5));
    }

    #[test]
    fn region_outside_image_has_no_overlap() {
        let region = PixelRegion::from_detection(&record(50.0, 0.0, 10.0, 10.0));
        assert!(region.clip_to_bounds(ImageDimensions::new(40, 40)).is_none());
    }

    #[test]
    fn fractional_boxes_floor_origin_and_round_size() {
        let region = PixelRegion::from_detection(&record(3.7, 1.2, 10.4, 0.3));
        assert_eq!(region, PixelRegion { x: 3, y: 1, width: 10, height: 1 });
    }
}
