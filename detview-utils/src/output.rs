//! Raster encoding helpers shared by the thumbnail cropper and the CLI exporter.

use anyhow::{Context, Result};
use image::{
    ExtendedColorType, ImageEncoder, RgbaImage,
    buffer::ConvertBuffer,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Image formats the encoder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormatHint {
    /// Lossless, keeps transparency of clipped regions.
    #[default]
    Png,
    /// Lossy; transparent pixels flatten to black.
    Jpeg,
}

impl ImageFormatHint {
    /// Canonical file extension (without the dot).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// MIME type of the encoded payload.
    pub fn media_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }
}

impl std::str::FromStr for ImageFormatHint {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(format!(
                "unknown image format '{other}'; expected 'png' or 'jpeg'"
            )),
        }
    }
}

/// Encode an RGBA buffer into `format`. `jpeg_quality` is clamped to 1-100.
pub fn encode_rgba(image: &RgbaImage, format: ImageFormatHint, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let (width, height) = image.dimensions();
    match format {
        ImageFormatHint::Png => {
            PngEncoder::new(&mut buffer)
                .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
                .context("failed to encode PNG")?;
        }
        ImageFormatHint::Jpeg => {
            let rgb: image::RgbImage = image.convert();
            JpegEncoder::new_with_quality(&mut buffer, jpeg_quality.clamp(1, 100))
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                .context("failed to encode JPEG")?;
        }
    }
    Ok(buffer)
}

/// Write an encoded payload to disk, creating parent directories as needed.
pub fn write_encoded(destination: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = destination.parent().filter(|p| !p.exists()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    debug!("Writing {} bytes to {}", bytes.len(), destination.display());
    fs::write(destination, bytes)
        .with_context(|| format!("failed to write {}", destination.display()))
}

/// Encode `image` as PNG and write it to `destination`.
pub fn save_rgba_png(image: &RgbaImage, destination: &Path) -> Result<()> {
    let bytes = encode_rgba(image, ImageFormatHint::Png, 100)?;
    write_encoded(destination, &bytes)
}
