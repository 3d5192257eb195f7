//! Shared configuration types consumed across the detview workspace.
//!
//! These structures describe how overlays are drawn, how thumbnails are encoded, how the
//! preview viewport is laid out, and whether timing telemetry is emitted. They serialize
//! to JSON so the CLI (and any other host) can persist and reuse them.

use crate::output::ImageFormatHint;

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Geometry and typography of the bounding-box overlay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlaySettings {
    /// Outline thickness in display pixels.
    pub line_width: u32,
    /// Label font size in pixels.
    pub font_px: f32,
    /// Height of the filled label background.
    pub label_height: u32,
    /// Horizontal padding added on each side of the label text.
    pub label_padding: u32,
    /// Distance from the box's top edge to the top of the label background.
    pub label_offset: u32,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            line_width: 2,
            font_px: 12.0,
            label_height: 20,
            label_padding: 5,
            label_offset: 25,
        }
    }
}

impl OverlaySettings {
    /// Clamp values to sensible ranges.
    pub fn sanitize(&mut self) {
        self.line_width = self.line_width.clamp(1, 16);
        if !self.font_px.is_finite() || self.font_px < 4.0 {
            self.font_px = 4.0;
        }
        self.label_height = self.label_height.max(1);
    }
}

/// How per-detection thumbnails are encoded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ThumbnailSettings {
    /// Output codec for thumbnails.
    pub format: ImageFormatHint,
    /// JPEG quality (1-100), only used when `format` is jpeg.
    pub jpeg_quality: u8,
    /// Longest side a thumbnail may have; larger boxes fail their batch.
    pub max_side: u32,
}

impl Default for ThumbnailSettings {
    fn default() -> Self {
        Self {
            format: ImageFormatHint::Png,
            jpeg_quality: 80,
            max_side: 8192,
        }
    }
}

/// Container the preview image is laid out in.
///
/// Images wider than `max_width` (or taller than `max_height`, when set) are scaled down
/// preserving aspect ratio; smaller images are shown at native size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ViewportSettings {
    pub max_width: u32,
    pub max_height: Option<u32>,
}

impl Default for ViewportSettings {
    fn default() -> Self {
        Self {
            max_width: 768,
            max_height: None,
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether telemetry timing logs are enabled.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub overlay: OverlaySettings,
    pub thumbnails: ThumbnailSettings,
    pub viewport: ViewportSettings,
    pub telemetry: TelemetrySettings,
}

impl AppSettings {
    /// Load settings from a JSON file. Missing sections fall back to their defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;
        settings.overlay.sanitize();
        settings.thumbnails.jpeg_quality = settings.thumbnails.jpeg_quality.clamp(1, 100);
        settings.thumbnails.max_side = settings.thumbnails.max_side.max(1);
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

/// Returns the default path for persisted settings (`config/detview_settings.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/detview_settings.json"))
        .unwrap_or_else(|_| PathBuf::from("config/detview_settings.json"))
}
