//! Command-line argument definitions for detview-cli.

use clap::{ArgAction, Parser};
use detview_utils::ImageFormatHint;
use std::path::PathBuf;

/// Render a detection overlay, per-detection thumbnails, and a summary report for one image.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct ViewArgs {
    /// Image to visualize (JPG, PNG, or GIF up to 10MB).
    #[arg(short, long)]
    pub image: PathBuf,

    /// Detection payload: a JSON array, or an object with a `detections` array.
    #[arg(short, long)]
    pub detections: PathBuf,

    /// Directory receiving overlay.png, annotated.png and thumbnails/.
    #[arg(short, long, default_value = "detview-output")]
    pub output_dir: PathBuf,

    /// Optional settings JSON. Defaults to `config/detview_settings.json` when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum display width the image is laid out at.
    #[arg(long, value_name = "PX")]
    pub display_width: Option<u32>,

    /// Maximum display height the image is laid out at.
    #[arg(long, value_name = "PX")]
    pub display_height: Option<u32>,

    /// Thumbnail codec (png or jpeg).
    #[arg(long, value_name = "FORMAT")]
    pub thumbnail_format: Option<ImageFormatHint>,

    /// JPEG quality for thumbnails (1-100).
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: Option<u8>,

    /// Enable telemetry timing logs (defaults to settings file).
    #[arg(long, action = ArgAction::SetTrue)]
    pub telemetry: bool,

    /// Override telemetry logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub telemetry_level: Option<String>,

    /// Write the report to a JSON file instead of stdout.
    #[arg(long)]
    pub json: Option<PathBuf>,
}
