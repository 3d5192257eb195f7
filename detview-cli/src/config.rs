//! Configuration loading and CLI override logic.

use std::path::PathBuf;

use anyhow::{Context, Result};
use detview_utils::{
    config::{AppSettings, default_settings_path},
    normalize_path,
};
use log::info;

use crate::args::ViewArgs;

/// Load application settings from a file or use defaults.
pub fn load_settings(config_path: Option<&PathBuf>) -> Result<AppSettings> {
    if let Some(path) = config_path {
        let resolved = normalize_path(path)?;
        let settings = AppSettings::load_from_path(&resolved)?;
        info!("Loaded settings from {}", resolved.display());
        Ok(settings)
    } else {
        let default_path = default_settings_path();
        if default_path.exists() {
            let settings = AppSettings::load_from_path(&default_path).with_context(|| {
                format!(
                    "failed to load default settings from {}",
                    default_path.display()
                )
            })?;
            info!("Loaded settings from {}", default_path.display());
            Ok(settings)
        } else {
            Ok(AppSettings::default())
        }
    }
}

/// Apply command-line arguments on top of loaded or default settings.
pub fn apply_cli_overrides(settings: &mut AppSettings, args: &ViewArgs) {
    if args.telemetry {
        settings.telemetry.enabled = true;
    }
    if let Some(level) = args.telemetry_level.as_ref() {
        let normalized = level.trim().to_ascii_lowercase();
        if !normalized.is_empty() {
            if normalized == "off" {
                settings.telemetry.enabled = false;
            }
            settings.telemetry.level = normalized;
        }
    }

    if let Some(width) = args.display_width {
        settings.viewport.max_width = width.max(1);
    }
    if let Some(height) = args.display_height {
        settings.viewport.max_height = Some(height.max(1));
    }

    if let Some(format) = args.thumbnail_format {
        settings.thumbnails.format = format;
    }
    if let Some(quality) = args.jpeg_quality {
        settings.thumbnails.jpeg_quality = quality;
    }
}
