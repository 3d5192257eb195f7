//! Aggregate statistics and list rows derived from the current detections.

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use detview_utils::color::RgbaColor;

use crate::{detection::DetectionRecord, palette};

/// Label used when a detection carries no secondary attribute.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Round half-way values up, matching how percentages are shown elsewhere.
pub fn round_half_up(value: f32) -> i64 {
    (value + 0.5).floor() as i64
}

/// `0.873` -> `"87%"`.
pub fn format_percent(fraction: f64) -> String {
    format!("{}%", round_half_up((fraction * 100.0) as f32))
}

fn hex_color<S: Serializer>(color: &RgbaColor, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&color.to_hex())
}

/// Count and confidence sum for one label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LabelStats {
    pub count: usize,
    pub total_confidence: f64,
}

impl LabelStats {
    fn record(&mut self, confidence: f32) {
        self.count += 1;
        self.total_confidence += f64::from(confidence);
    }

    /// Mean confidence; zero for an empty bucket.
    pub fn mean_confidence(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_confidence / self.count as f64
        }
    }
}

/// Group detections by `key` and accumulate the confidence `key` pairs with each label.
pub fn summarize_by<'a, I, F>(detections: I, mut key: F) -> BTreeMap<String, LabelStats>
where
    I: IntoIterator<Item = &'a DetectionRecord>,
    F: FnMut(&'a DetectionRecord) -> (String, f32),
{
    let mut stats: BTreeMap<String, LabelStats> = BTreeMap::new();
    for detection in detections {
        let (label, confidence) = key(detection);
        stats.entry(label).or_default().record(confidence);
    }
    stats
}

/// Stats keyed by primary category.
pub fn summarize_by_category(detections: &[DetectionRecord]) -> BTreeMap<String, LabelStats> {
    summarize_by(detections, |d| (d.category.clone(), d.confidence))
}

/// Stats keyed by secondary attribute; records without one count as [`UNKNOWN_LABEL`].
/// Means use the primary detection confidence.
pub fn summarize_by_mood(detections: &[DetectionRecord]) -> BTreeMap<String, LabelStats> {
    summarize_by(detections, |d| {
        let label = d
            .secondary_attribute
            .clone()
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        (label, d.confidence)
    })
}

/// Number of detections per category.
pub fn class_counts(detections: &[DetectionRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for detection in detections {
        *counts.entry(detection.category.clone()).or_insert(0) += 1;
    }
    counts
}

/// `"1 detection"` / `"3 detections"`.
pub fn detection_count_label(count: usize) -> String {
    if count == 1 {
        "1 detection".to_string()
    } else {
        format!("{count} detections")
    }
}

/// One legend line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub label: String,
    #[serde(serialize_with = "hex_color")]
    pub color: RgbaColor,
    /// Mean confidence as a percentage, or `--` in the placeholder legend.
    pub value: String,
}

/// Legend shown beside the image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "entries", rename_all = "snake_case")]
pub enum Legend {
    Populated(Vec<LegendEntry>),
    /// Fixed entries shown before any detection exists.
    Placeholder(Vec<LegendEntry>),
}

impl Legend {
    pub fn entries(&self) -> &[LegendEntry] {
        match self {
            Self::Populated(entries) | Self::Placeholder(entries) => entries,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }
}

/// Build the legend from category stats, falling back to the placeholder when empty.
pub fn legend(stats: &BTreeMap<String, LabelStats>) -> Legend {
    if stats.is_empty() {
        return placeholder_legend();
    }
    Legend::Populated(
        stats
            .iter()
            .map(|(label, stats)| LegendEntry {
                label: label.clone(),
                color: palette::style_for(label).stroke,
                value: format_percent(stats.mean_confidence()),
            })
            .collect(),
    )
}

pub fn placeholder_legend() -> Legend {
    let entry = |label: &str, style: palette::CategoryStyle| LegendEntry {
        label: label.to_string(),
        color: style.stroke,
        value: "--".to_string(),
    };
    Legend::Placeholder(vec![
        entry("Happy", palette::HAPPY),
        entry("Neutral", palette::NEUTRAL),
        entry("Sad", palette::SAD),
    ])
}

/// Display row for the detection list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionRow {
    pub index: usize,
    pub category: String,
    #[serde(serialize_with = "hex_color")]
    pub color: RgbaColor,
    pub confidence: String,
    /// `Box: (x, y) - (x2, y2)` with coordinates rounded to whole pixels.
    pub bounds: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

impl DetectionRow {
    pub fn from_record(index: usize, record: &DetectionRecord) -> Self {
        let secondary = record
            .secondary_attribute
            .as_ref()
            .map(|mood| match record.secondary_confidence {
                Some(confidence) => format!("{mood} {}", format_percent(f64::from(confidence))),
                None => mood.clone(),
            });
        Self {
            index,
            category: record.category.clone(),
            color: palette::style_for(&record.category).stroke,
            confidence: format!("{}%", record.confidence_percent()),
            bounds: format!(
                "Box: ({}, {}) - ({}, {})",
                round_half_up(record.x),
                round_half_up(record.y),
                round_half_up(record.right()),
                round_half_up(record.bottom())
            ),
            secondary,
        }
    }
}

/// Rows for every detection, in list order.
pub fn detection_rows(detections: &[DetectionRecord]) -> Vec<DetectionRow> {
    detections
        .iter()
        .enumerate()
        .map(|(index, record)| DetectionRow::from_record(index, record))
        .collect()
}
