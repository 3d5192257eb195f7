//! Detection records as delivered by the detection service.
//!
//! The service hands back a JSON list (bare, or wrapped in `{"detections": [...]}`) using
//! the field names `class`, `confidence`, `x`, `y`, `width`, `height`, and the optional
//! `mood` / `moodConfidence` pair. Records are checked for structural shape only; a record
//! that fails the check is skipped and counted rather than failing the batch.

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::summary::round_half_up;

/// One detected region in native image pixel space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    /// Primary classification label.
    #[serde(rename = "class")]
    pub category: String,
    /// Primary confidence in `[0, 1]`.
    pub confidence: f32,
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Second-stage label such as a facial expression.
    #[serde(rename = "mood", default, skip_serializing_if = "Option::is_none")]
    pub secondary_attribute: Option<String>,
    /// Confidence for `secondary_attribute`; present exactly when it is.
    #[serde(
        rename = "moodConfidence",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub secondary_confidence: Option<f32>,
}

impl DetectionRecord {
    pub fn new(
        category: impl Into<String>,
        confidence: f32,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Self {
        Self {
            category: category.into(),
            confidence,
            x,
            y,
            width,
            height,
            secondary_attribute: None,
            secondary_confidence: None,
        }
    }

    /// Attach a secondary attribute together with its confidence.
    pub fn with_secondary(mut self, label: impl Into<String>, confidence: f32) -> Self {
        self.secondary_attribute = Some(label.into());
        self.secondary_confidence = Some(confidence);
        self
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Confidence as a whole percentage.
    pub fn confidence_percent(&self) -> i64 {
        round_half_up(self.confidence * 100.0)
    }

    /// Overlay label text, e.g. `happy 87%`.
    pub fn label(&self) -> String {
        format!("{} {}%", self.category, self.confidence_percent())
    }
}

/// Why a raw record was rejected.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecordError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing or non-numeric field `{0}`")]
    MissingField(&'static str),
    #[error("field `{0}` is not finite")]
    NonFinite(&'static str),
    #[error("category label is empty")]
    EmptyCategory,
    #[error("box size must be positive (got {width}x{height})")]
    NonPositiveSize { width: f32, height: f32 },
    #[error("`mood` and `moodConfidence` must be present together")]
    UnpairedSecondary,
}

/// Loosely-typed record used before structural validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawDetection {
    #[serde(rename = "class")]
    pub category: Option<String>,
    pub confidence: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub mood: Option<String>,
    #[serde(rename = "moodConfidence")]
    pub mood_confidence: Option<f64>,
}

impl RawDetection {
    /// Check structural shape and convert into a [`DetectionRecord`].
    pub fn validate(self) -> Result<DetectionRecord, RecordError> {
        let category = self.category.ok_or(RecordError::MissingField("class"))?;
        if category.trim().is_empty() {
            return Err(RecordError::EmptyCategory);
        }
        let confidence = finite("confidence", self.confidence)?;
        let x = finite("x", self.x)?;
        let y = finite("y", self.y)?;
        let width = finite("width", self.width)?;
        let height = finite("height", self.height)?;
        if width <= 0.0 || height <= 0.0 {
            return Err(RecordError::NonPositiveSize { width, height });
        }

        let (secondary_attribute, secondary_confidence) = match (self.mood, self.mood_confidence) {
            (Some(mood), Some(conf)) => (Some(mood), Some(finite("moodConfidence", Some(conf))?)),
            (None, None) => (None, None),
            _ => return Err(RecordError::UnpairedSecondary),
        };

        Ok(DetectionRecord {
            category,
            confidence,
            x,
            y,
            width,
            height,
            secondary_attribute,
            secondary_confidence,
        })
    }
}

fn finite(name: &'static str, value: Option<f64>) -> Result<f32, RecordError> {
    let value = value.ok_or(RecordError::MissingField(name))? as f32;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(RecordError::NonFinite(name))
    }
}

/// A record that was left out, with its position in the incoming list.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: RecordError,
}

/// Valid records in their original order plus what was skipped.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDetections {
    pub records: Vec<DetectionRecord>,
    pub skipped: Vec<SkippedRecord>,
}

/// Validate each JSON value independently; failures are logged and counted.
pub fn normalize_detections<I>(values: I) -> NormalizedDetections
where
    I: IntoIterator<Item = Value>,
{
    let mut normalized = NormalizedDetections::default();
    for (index, value) in values.into_iter().enumerate() {
        let outcome = if value.is_object() {
            serde_json::from_value::<RawDetection>(value)
                .map_err(|_| RecordError::NotAnObject)
                .and_then(RawDetection::validate)
        } else {
            Err(RecordError::NotAnObject)
        };
        match outcome {
            Ok(record) => normalized.records.push(record),
            Err(reason) => {
                warn!("Skipping detection #{index}: {reason}");
                normalized.skipped.push(SkippedRecord { index, reason });
            }
        }
    }
    normalized
}

/// Parse a detection payload: a bare array, or an object with a `detections` array.
///
/// An object without `detections` yields an empty list.
pub fn parse_detections_json(text: &str) -> Result<NormalizedDetections> {
    let value: Value = serde_json::from_str(text).context("detection payload is not valid JSON")?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("detections") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => anyhow::bail!(
                "`detections` must be an array (got {})",
                json_kind(&other)
            ),
        },
        other => anyhow::bail!(
            "detection payload must be an array or an object (got {})",
            json_kind(&other)
        ),
    };
    Ok(normalize_detections(items))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
