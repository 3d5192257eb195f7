//! JSON report describing one visualization run.

use std::{collections::BTreeMap, path::Path};

use detview_core::{
    DetectionRow, ImageDimensions, LabelStats, Legend, ViewController, format_percent,
};
use detview_utils::format_file_size;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub count: usize,
    pub mean_confidence: f64,
    pub percent: String,
}

impl From<&LabelStats> for StatsReport {
    fn from(stats: &LabelStats) -> Self {
        Self {
            count: stats.count,
            mean_confidence: stats.mean_confidence(),
            percent: format_percent(stats.mean_confidence()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ThumbnailReport {
    pub index: usize,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub media_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ViewReport {
    pub image: String,
    pub media_type: String,
    pub file_size: String,
    pub native: ImageDimensions,
    pub display: ImageDimensions,
    pub count_label: String,
    pub skipped_records: usize,
    pub legend: Legend,
    pub categories: BTreeMap<String, StatsReport>,
    pub moods: BTreeMap<String, StatsReport>,
    pub class_counts: BTreeMap<String, usize>,
    pub rows: Vec<DetectionRow>,
    pub overlay: String,
    pub annotated: String,
    pub thumbnails: Vec<ThumbnailReport>,
}

/// Files written during the run.
pub struct WrittenOutputs<'a> {
    pub overlay: &'a Path,
    pub annotated: &'a Path,
    pub thumbnails: Vec<ThumbnailReport>,
}

fn stats_report(stats: &BTreeMap<String, LabelStats>) -> BTreeMap<String, StatsReport> {
    stats
        .iter()
        .map(|(label, stats)| (label.clone(), StatsReport::from(stats)))
        .collect()
}

pub fn build_report(
    image_path: &Path,
    view: &ViewController,
    skipped_records: usize,
    outputs: WrittenOutputs<'_>,
) -> ViewReport {
    let (media_type, byte_len) = view
        .source()
        .map(|source| (source.media_type().to_string(), source.byte_len()))
        .unwrap_or_default();
    ViewReport {
        image: image_path.display().to_string(),
        media_type,
        file_size: format_file_size(byte_len),
        native: view.image_state().native().unwrap_or_default(),
        display: view.display_size().unwrap_or_default(),
        count_label: view.count_label(),
        skipped_records,
        legend: view.legend(),
        categories: stats_report(view.category_summary()),
        moods: stats_report(view.mood_summary()),
        class_counts: view.class_counts(),
        rows: view.detection_rows(),
        overlay: outputs.overlay.display().to_string(),
        annotated: outputs.annotated.display().to_string(),
        thumbnails: outputs.thumbnails,
    }
}
