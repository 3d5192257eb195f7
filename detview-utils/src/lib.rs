//! Common helpers shared across detview crates.

/// Color values and hex parsing.
pub mod color;
/// Application configuration and settings management.
pub mod config;
/// Image decoding and upload validation.
pub mod image_utils;
/// Raster encoding and file output.
pub mod output;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use color::{RgbaColor, parse_hex_color};
pub use config::AppSettings;
pub use image_utils::{
    UploadError, decode_image_bytes, format_file_size, validate_upload,
};
pub use output::{ImageFormatHint, encode_rgba, save_rgba_png, write_encoded};
pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    timing_guard,
};

/// Initialize logging once for CLI and embedding hosts.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` applies. The telemetry target is
/// always let through so [`telemetry::configure`] alone decides whether timings appear.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module(telemetry::TELEMETRY_TARGET, LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
