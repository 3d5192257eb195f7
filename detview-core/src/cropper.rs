//! Per-detection thumbnails cut from the native-resolution image.
//!
//! Each detection yields one encoded image of its rounded box size. Pixels that fall outside
//! the source stay transparent (PNG) or flatten to black (JPEG). A batch either produces a
//! thumbnail for every detection or nothing at all.

use std::{borrow::Cow, collections::BTreeMap};

use anyhow::{Context, Result, bail};
use image::{DynamicImage, RgbaImage};
use log::{Level, debug};

use detview_utils::{
    config::ThumbnailSettings, output::ImageFormatHint, output::encode_rgba,
    telemetry::timing_guard,
};

use crate::{
    detection::DetectionRecord,
    geometry::{ClippedRegion, ImageDimensions, PixelRegion},
};

/// One encoded thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedThumbnail {
    /// Position of the source detection in its list.
    pub index: usize,
    pub dimensions: ImageDimensions,
    pub format: ImageFormatHint,
    pub bytes: Vec<u8>,
}

impl CroppedThumbnail {
    pub fn media_type(&self) -> &'static str {
        self.format.media_type()
    }
}

/// Thumbnails keyed by detection index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailSet {
    entries: BTreeMap<usize, CroppedThumbnail>,
}

impl ThumbnailSet {
    pub fn get(&self, index: usize) -> Option<&CroppedThumbnail> {
        self.entries.get(&index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Thumbnails in detection order.
    pub fn iter(&self) -> impl Iterator<Item = &CroppedThumbnail> {
        self.entries.values()
    }
}

/// Recycles scratch raster buffers between crops.
#[derive(Debug, Default)]
pub struct SurfacePool {
    idle: Vec<Vec<u8>>,
    allocations: usize,
}

impl SurfacePool {
    /// Borrow a scratch surface for one batch; it returns to the pool when dropped.
    pub fn lease(&mut self) -> ScratchSurface<'_> {
        let mut buffer = match self.idle.pop() {
            Some(buffer) => buffer,
            None => {
                self.allocations += 1;
                Vec::new()
            }
        };
        buffer.clear();
        let image = RgbaImage::from_raw(0, 0, buffer).unwrap_or_else(|| RgbaImage::new(0, 0));
        ScratchSurface { pool: self, image }
    }

    /// Number of buffers ever allocated by this pool.
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Buffers waiting to be reused.
    pub fn available(&self) -> usize {
        self.idle.len()
    }

    fn recycle(&mut self, buffer: Vec<u8>) {
        self.idle.push(buffer);
    }
}

/// A leased raster that goes back to its [`SurfacePool`] on drop.
pub struct ScratchSurface<'a> {
    pool: &'a mut SurfacePool,
    image: RgbaImage,
}

impl ScratchSurface<'_> {
    /// Resize to `dimensions` and clear to transparent, keeping the allocation.
    ///
    /// Fails without touching the buffer when the byte length does not fit in `usize`.
    pub fn reset(&mut self, dimensions: ImageDimensions) -> Result<&mut RgbaImage> {
        let Some(len) = (dimensions.width as usize)
            .checked_mul(dimensions.height as usize)
            .and_then(|pixels| pixels.checked_mul(4))
        else {
            bail!("scratch surface of {dimensions} does not fit in memory");
        };
        let mut buffer = std::mem::replace(&mut self.image, RgbaImage::new(0, 0)).into_raw();
        buffer.clear();
        buffer.resize(len, 0);
        self.image = RgbaImage::from_raw(dimensions.width, dimensions.height, buffer)
            .unwrap_or_else(|| RgbaImage::new(dimensions.width, dimensions.height));
        Ok(&mut self.image)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

impl Drop for ScratchSurface<'_> {
    fn drop(&mut self) {
        let image = std::mem::replace(&mut self.image, RgbaImage::new(0, 0));
        self.pool.recycle(image.into_raw());
    }
}

/// Cuts and encodes thumbnails, reusing one scratch surface per batch.
#[derive(Debug, Default)]
pub struct ThumbnailCropper {
    pool: SurfacePool,
    settings: ThumbnailSettings,
}

impl ThumbnailCropper {
    pub fn new(settings: ThumbnailSettings) -> Self {
        Self {
            pool: SurfacePool::default(),
            settings,
        }
    }

    pub fn settings(&self) -> &ThumbnailSettings {
        &self.settings
    }

    pub fn pool(&self) -> &SurfacePool {
        &self.pool
    }

    /// Crop one thumbnail per detection.
    ///
    /// Fails as a whole if any box is longer than `max_side` on either axis or any thumbnail
    /// cannot be encoded.
    pub fn crop_all(
        &mut self,
        image: &DynamicImage,
        detections: &[DetectionRecord],
    ) -> Result<ThumbnailSet> {
        let _guard = timing_guard("detview_core::cropper::crop_all", Level::Debug);
        let source: Cow<'_, RgbaImage> = match image.as_rgba8() {
            Some(rgba) => Cow::Borrowed(rgba),
            None => Cow::Owned(image.to_rgba8()),
        };
        let bounds = ImageDimensions::new(source.width(), source.height());
        let ThumbnailSettings {
            format,
            jpeg_quality,
            max_side,
        } = self.settings;

        let mut entries = BTreeMap::new();
        let mut surface = self.pool.lease();
        for (index, detection) in detections.iter().enumerate() {
            let region = PixelRegion::from_detection(detection);
            let dimensions = region.dimensions();
            if dimensions.width > max_side || dimensions.height > max_side {
                bail!("detection #{index} needs a {dimensions} thumbnail, limit is {max_side}px");
            }
            let canvas = surface
                .reset(dimensions)
                .with_context(|| format!("failed to allocate thumbnail for detection #{index}"))?;
            if let Some(clip) = region.clip_to_bounds(bounds) {
                copy_region(&source, canvas, clip);
            }
            let bytes = encode_rgba(surface.image(), format, jpeg_quality)
                .with_context(|| format!("failed to encode thumbnail for detection #{index}"))?;
            entries.insert(
                index,
                CroppedThumbnail {
                    index,
                    dimensions,
                    format,
                    bytes,
                },
            );
        }

        debug!(
            "Cropped {} thumbnail(s) from {bounds} source as {}",
            entries.len(),
            format.extension()
        );
        Ok(ThumbnailSet { entries })
    }
}

fn copy_region(source: &RgbaImage, target: &mut RgbaImage, clip: ClippedRegion) {
    let src_stride = source.width() as usize * 4;
    let dst_stride = target.width() as usize * 4;
    let row_len = clip.source.width as usize * 4;
    let src = source.as_raw();
    let dst: &mut [u8] = &mut **target;
    for row in 0..clip.source.height as usize {
        let src_start = (clip.source.y as usize + row) * src_stride + clip.source.x as usize * 4;
        let dst_start = (clip.dest_y as usize + row) * dst_stride + clip.dest_x as usize * 4;
        dst[dst_start..dst_start + row_len].copy_from_slice(&src[src_start..src_start + row_len]);
    }
}
