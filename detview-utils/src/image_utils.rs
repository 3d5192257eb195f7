use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};
use log::debug;
use thiserror::Error;

/// Largest upload the picker accepts.
pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Media types the picker accepts.
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "image/gif"];

/// Reasons an upload is turned away before it reaches the viewer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Invalid file type. Please select a JPG, PNG, or GIF image.")]
    UnsupportedType(String),
    #[error("File too large. Please select an image smaller than 10MB.")]
    TooLarge { size: u64 },
}

/// Check an upload's declared media type and size.
pub fn validate_upload(media_type: &str, byte_len: u64) -> Result<(), UploadError> {
    let normalized = media_type.trim().to_ascii_lowercase();
    if !SUPPORTED_MEDIA_TYPES.contains(&normalized.as_str()) {
        return Err(UploadError::UnsupportedType(normalized));
    }
    if byte_len > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge { size: byte_len });
    }
    Ok(())
}

/// Human-readable byte count (`0 Bytes`, `1.5 KB`, `2 MB`).
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut exponent = 0;
    while exponent + 1 < UNITS.len() && bytes >= 1u64 << (10 * (exponent + 1)) {
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = format!("{value:.2}");
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[exponent])
}

/// Guess the raster format from a declared media type.
pub fn format_from_media_type(media_type: &str) -> Option<ImageFormat> {
    match media_type.trim().to_ascii_lowercase().as_str() {
        "image/jpg" => Some(ImageFormat::Jpeg),
        other => ImageFormat::from_mime_type(other),
    }
}

/// Decode an in-memory image, trusting the declared media type first and sniffing the
/// bytes when that fails.
pub fn decode_image_bytes(bytes: &[u8], media_type: Option<&str>) -> Result<DynamicImage> {
    if let Some(format) = media_type.and_then(format_from_media_type) {
        match image::load_from_memory_with_format(bytes, format) {
            Ok(image) => return Ok(image),
            Err(err) => debug!("declared format {format:?} failed ({err}); sniffing bytes"),
        }
    }
    image::load_from_memory(bytes).context("failed to decode image bytes")
}
