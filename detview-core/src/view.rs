//! View controller tying the current image, its detections, the overlay, and thumbnails
//! together.
//!
//! The controller is driven by events from its host: a file was chosen, detections
//! arrived, the viewport was resized, a background job finished. Decoding and cropping run
//! as jobs the host executes whenever it likes (inline, on an idle callback, on a worker);
//! their results come back as [`ViewMessage`]s tagged with the generation that was current
//! when the job was issued. Results from older generations are dropped, so a slow job can
//! never overwrite newer state.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::Path,
    sync::Arc,
};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{Level, debug, info, warn};

use detview_utils::{
    config::AppSettings, image_utils::decode_image_bytes, image_utils::format_file_size,
    telemetry::timing_guard,
};

use crate::{
    cropper::{ThumbnailCropper, ThumbnailSet},
    detection::DetectionRecord,
    geometry::{DisplayRect, ImageDimensions, ScaleTransform, ViewportLayout},
    overlay::OverlayRenderer,
    summary::{self, DetectionRow, LabelStats, Legend},
};

/// Encoded image chosen by the user.
#[derive(Debug, Clone)]
pub struct ImageSource {
    bytes: Arc<[u8]>,
    media_type: String,
    name: Option<String>,
}

impl ImageSource {
    pub fn new(bytes: impl Into<Arc<[u8]>>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Read a file, deriving the media type from its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display()))?;
        let media_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type())
            .unwrap_or("application/octet-stream");
        let mut source = Self::new(bytes, media_type);
        source.name = path.file_name().map(|n| n.to_string_lossy().into_owned());
        Ok(source)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Registered reference to an [`ImageSource`]. Released exactly once through its registry.
#[derive(Debug)]
pub struct SourceHandle {
    id: u64,
    source: ImageSource,
}

impl SourceHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }
}

/// Tracks which source handles are live.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    next_id: u64,
    live: BTreeSet<u64>,
    released: u64,
}

impl SourceRegistry {
    pub fn register(&mut self, source: ImageSource) -> SourceHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id);
        debug!("Registered image source #{id}");
        SourceHandle { id, source }
    }

    /// Release `handle`. Returns `false` if it was not live in this registry.
    pub fn release(&mut self, handle: SourceHandle) -> bool {
        if self.live.remove(&handle.id) {
            self.released += 1;
            debug!("Released image source #{}", handle.id);
            true
        } else {
            warn!("Image source #{} is not live; ignoring release", handle.id);
            false
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Handles released over the registry's lifetime.
    pub fn released_count(&self) -> u64 {
        self.released
    }
}

/// Where the current image is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    NoImage,
    /// Decode of the source selected at `generation` is outstanding (or failed).
    Loading { generation: u64 },
    Ready { native: ImageDimensions },
}

impl ImageState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    pub fn native(&self) -> Option<ImageDimensions> {
        match self {
            Self::Ready { native } => Some(*native),
            _ => None,
        }
    }
}

/// Result of a background job, handed back to [`ViewController::handle_message`].
#[derive(Debug)]
pub enum ViewMessage {
    ImageDecoded {
        generation: u64,
        result: Result<DynamicImage>,
    },
    ThumbnailsReady {
        generation: u64,
        thumbnails: ThumbnailSet,
    },
}

/// Decode work for a newly selected source.
#[derive(Debug)]
pub struct DecodeJob {
    generation: u64,
    source: ImageSource,
}

impl DecodeJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn run(self) -> ViewMessage {
        let _guard = timing_guard("detview_core::view::decode", Level::Debug);
        let result = decode_image_bytes(self.source.bytes(), Some(self.source.media_type()));
        ViewMessage::ImageDecoded {
            generation: self.generation,
            result,
        }
    }
}

/// Thumbnail pass for one (image, detections) pair.
#[derive(Debug, Clone)]
pub struct CropRequest {
    generation: u64,
    image: Arc<DynamicImage>,
    detections: Arc<[DetectionRecord]>,
}

impl CropRequest {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn detections(&self) -> &[DetectionRecord] {
        &self.detections
    }

    /// Crop with `cropper`. A failed batch is logged and reported as an empty set.
    pub fn run(self, cropper: &mut ThumbnailCropper) -> ViewMessage {
        let thumbnails = cropper
            .crop_all(&self.image, &self.detections)
            .unwrap_or_else(|err| {
                warn!("Thumbnail batch discarded: {err:#}");
                ThumbnailSet::default()
            });
        ViewMessage::ThumbnailsReady {
            generation: self.generation,
            thumbnails,
        }
    }
}

/// Owns everything the viewer shows for the current file.
#[derive(Debug)]
pub struct ViewController {
    registry: SourceRegistry,
    current: Option<SourceHandle>,
    image_state: ImageState,
    image: Option<Arc<DynamicImage>>,
    layout: ViewportLayout,
    display: Option<ImageDimensions>,
    detections: Arc<[DetectionRecord]>,
    category_summary: BTreeMap<String, LabelStats>,
    mood_summary: BTreeMap<String, LabelStats>,
    thumbnails: ThumbnailSet,
    overlay: OverlayRenderer,
    pending_crop: Option<CropRequest>,
    // Bumped on every file change; tags decode jobs.
    image_generation: u64,
    // Bumped on every file or detections change; tags crop jobs.
    crop_generation: u64,
}

impl ViewController {
    pub fn new(settings: &AppSettings) -> Result<Self> {
        Ok(Self {
            registry: SourceRegistry::default(),
            current: None,
            image_state: ImageState::NoImage,
            image: None,
            layout: settings.viewport.into(),
            display: None,
            detections: Arc::from(Vec::new()),
            category_summary: BTreeMap::new(),
            mood_summary: BTreeMap::new(),
            thumbnails: ThumbnailSet::default(),
            overlay: OverlayRenderer::new(settings.overlay)?,
            pending_crop: None,
            image_generation: 0,
            crop_generation: 0,
        })
    }

    /// Replace the current file. Clears detections, thumbnails and the overlay, and returns
    /// the decode job the host should run.
    pub fn select_file(&mut self, source: ImageSource) -> DecodeJob {
        self.release_current();
        info!(
            "Selected image {} ({}, {})",
            source.name().unwrap_or("<memory>"),
            source.media_type(),
            format_file_size(source.byte_len())
        );
        let job_source = source.clone();
        self.current = Some(self.registry.register(source));

        self.image_generation += 1;
        self.image_state = ImageState::Loading {
            generation: self.image_generation,
        };
        self.image = None;
        self.display = None;
        self.reset_detections();

        DecodeJob {
            generation: self.image_generation,
            source: job_source,
        }
    }

    /// Drop the current file and everything derived from it.
    pub fn clear_file(&mut self) {
        self.release_current();
        self.image_generation += 1;
        self.image_state = ImageState::NoImage;
        self.image = None;
        self.display = None;
        self.reset_detections();
    }

    /// Replace the detections for the current image.
    pub fn set_detections(&mut self, detections: Vec<DetectionRecord>) {
        info!("Received {} detection(s)", detections.len());
        self.detections = detections.into();
        self.detections_changed();
    }

    pub fn clear_detections(&mut self) {
        self.set_detections(Vec::new());
    }

    /// Apply a job result. Returns `true` if it changed state, `false` if it was stale or
    /// failed.
    pub fn handle_message(&mut self, message: ViewMessage) -> bool {
        match message {
            ViewMessage::ImageDecoded { generation, result } => {
                if generation != self.image_generation {
                    debug!(
                        "Ignoring stale decode (generation {generation}, current {})",
                        self.image_generation
                    );
                    return false;
                }
                match result {
                    Ok(image) => {
                        self.commit_image(image);
                        true
                    }
                    Err(err) => {
                        warn!("Failed to decode selected image: {err:#}");
                        false
                    }
                }
            }
            ViewMessage::ThumbnailsReady {
                generation,
                thumbnails,
            } => {
                if generation != self.crop_generation {
                    debug!(
                        "Ignoring stale thumbnails (generation {generation}, current {})",
                        self.crop_generation
                    );
                    return false;
                }
                debug!("Committing {} thumbnail(s)", thumbnails.len());
                self.thumbnails = thumbnails;
                true
            }
        }
    }

    /// The container changed size; re-measure the image and redraw the overlay.
    pub fn on_resize(&mut self, layout: ViewportLayout) {
        self.layout = layout;
        if let Some(native) = self.image_state.native() {
            let display = layout.measure(native);
            debug!("Viewport resized; display size now {display}");
            self.display = Some(display);
        }
        self.refresh_overlay();
    }

    /// Take the outstanding thumbnail pass, if any.
    pub fn take_pending_crop(&mut self) -> Option<CropRequest> {
        self.pending_crop.take()
    }

    /// Release the source handle and drop all derived state. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.current.is_some() {
            info!("Tearing down viewer state");
        }
        self.clear_file();
    }

    pub fn image_state(&self) -> ImageState {
        self.image_state
    }

    pub fn image(&self) -> Option<&DynamicImage> {
        self.image.as_deref()
    }

    pub fn source(&self) -> Option<&ImageSource> {
        self.current.as_ref().map(SourceHandle::source)
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn layout(&self) -> ViewportLayout {
        self.layout
    }

    pub fn display_size(&self) -> Option<ImageDimensions> {
        self.display
    }

    /// Native-to-display mapping, available once the image is ready and laid out.
    pub fn transform(&self) -> Option<ScaleTransform> {
        ScaleTransform::between(self.image_state.native()?, self.display?)
    }

    pub fn detections(&self) -> &[DetectionRecord] {
        &self.detections
    }

    /// Detection rectangles in display space.
    pub fn display_rects(&self) -> Vec<DisplayRect> {
        match self.transform() {
            Some(transform) => self.detections.iter().map(|d| transform.map_rect(d)).collect(),
            None => Vec::new(),
        }
    }

    /// The overlay surface, once there is something to draw it over.
    pub fn overlay(&self) -> Option<&RgbaImage> {
        self.transform().map(|_| self.overlay.surface())
    }

    pub fn thumbnails(&self) -> &ThumbnailSet {
        &self.thumbnails
    }

    pub fn category_summary(&self) -> &BTreeMap<String, LabelStats> {
        &self.category_summary
    }

    pub fn mood_summary(&self) -> &BTreeMap<String, LabelStats> {
        &self.mood_summary
    }

    pub fn legend(&self) -> Legend {
        summary::legend(&self.category_summary)
    }

    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        summary::class_counts(&self.detections)
    }

    pub fn detection_rows(&self) -> Vec<DetectionRow> {
        summary::detection_rows(&self.detections)
    }

    pub fn count_label(&self) -> String {
        summary::detection_count_label(self.detections.len())
    }

    fn release_current(&mut self) {
        if let Some(handle) = self.current.take() {
            self.registry.release(handle);
        }
    }

    fn reset_detections(&mut self) {
        self.detections = Arc::from(Vec::new());
        self.detections_changed();
    }

    fn detections_changed(&mut self) {
        self.crop_generation += 1;
        self.thumbnails = ThumbnailSet::default();
        self.category_summary = summary::summarize_by_category(&self.detections);
        self.mood_summary = summary::summarize_by_mood(&self.detections);
        self.refresh_overlay();
        self.schedule_crop();
    }

    fn commit_image(&mut self, image: DynamicImage) {
        let native = ImageDimensions::new(image.width(), image.height());
        let display = self.layout.measure(native);
        info!("Image ready: native {native}, display {display}");
        self.image_state = ImageState::Ready { native };
        self.image = Some(Arc::new(image));
        self.display = Some(display);
        self.refresh_overlay();
        self.schedule_crop();
    }

    fn refresh_overlay(&mut self) {
        match (self.transform(), self.display) {
            (Some(transform), Some(display)) => {
                self.overlay.render(transform, display, &self.detections);
            }
            _ => self.overlay.clear(ImageDimensions::default()),
        }
    }

    fn schedule_crop(&mut self) {
        self.pending_crop = match &self.image {
            Some(image) if !self.detections.is_empty() => Some(CropRequest {
                generation: self.crop_generation,
                image: Arc::clone(image),
                detections: Arc::clone(&self.detections),
            }),
            _ => None,
        };
    }
}

impl Drop for ViewController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_refuses_foreign_handles() {
        let mut registry = SourceRegistry::default();
        let mut other = SourceRegistry::default();
        let handle = registry.register(ImageSource::new(vec![1u8, 2, 3], "image/png"));
        let _ = other.register(ImageSource::new(vec![9u8], "image/png"));
        let stranger = other.register(ImageSource::new(vec![7u8], "image/png"));

        assert_eq!(registry.live_count(), 1);
        assert!(!registry.release(stranger));
        assert!(registry.release(handle));
        assert_eq!(registry.live_count(), 0);
        assert_eq!(registry.released_count(), 1);
    }

    #[test]
    fn source_from_path_reads_media_type_and_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("portrait.JPG");
        fs::write(&path, [0xFFu8, 0xD8, 0xFF]).expect("write");

        let source = ImageSource::from_path(&path).expect("source");
        assert_eq!(source.media_type(), "image/jpeg");
        assert_eq!(source.name(), Some("portrait.JPG"));
        assert_eq!(source.byte_len(), 3);
        assert!(ImageSource::from_path(dir.path().join("missing.png")).is_err());
    }

    #[test]
    fn new_controller_starts_empty() {
        let controller = ViewController::new(&AppSettings::default()).expect("controller");
        assert_eq!(controller.image_state(), ImageState::NoImage);
        assert!(controller.overlay().is_none());
        assert!(controller.transform().is_none());
        assert!(controller.legend().is_placeholder());
        assert_eq!(controller.count_label(), "0 detections");
    }
}
