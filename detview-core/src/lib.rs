//! Detection visualization core.
//!
//! Takes detections produced by an external service, draws them as an overlay at the
//! image's display size, crops per-detection thumbnails from the native image, and keeps
//! summary statistics. [`ViewController`] coordinates all of it and discards stale
//! background results.

/// Per-detection thumbnail cropping.
pub mod cropper;
/// Detection records and payload parsing.
pub mod detection;
/// Native/display coordinate mapping.
pub mod geometry;
/// Bounding-box overlay rendering.
pub mod overlay;
/// Category colors.
pub mod palette;
/// Aggregates, legend and list rows.
pub mod summary;
/// Event-driven view state.
pub mod view;

pub use cropper::{CroppedThumbnail, SurfacePool, ThumbnailCropper, ThumbnailSet};
pub use detection::{
    DetectionRecord, NormalizedDetections, RawDetection, RecordError, normalize_detections,
    parse_detections_json,
};
pub use geometry::{
    DisplayRect, ImageDimensions, PixelRect, PixelRegion, ScaleTransform, ViewportLayout,
};
pub use overlay::{OverlayRenderer, composite};
pub use palette::{CategoryStyle, style_for};
pub use summary::{
    DetectionRow, LabelStats, Legend, LegendEntry, class_counts, detection_count_label,
    format_percent, legend, summarize_by, summarize_by_category, summarize_by_mood,
};
pub use view::{
    CropRequest, DecodeJob, ImageSource, ImageState, SourceRegistry, ViewController, ViewMessage,
};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
