//! Per-frame metric values supplied by the external measurement pipeline.

use crate::constants::{REASON_MISSING, REASON_NON_FINITE};
use serde::Serialize;
use std::collections::HashMap;

/// Reference target values keyed by metric id
pub type ReferenceTargets = HashMap<String, f64>;

/// A single metric reading: a finite number or the reason it is unavailable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricValue {
    /// Finite measured value
    Value(f64),
    /// Metric could not be measured this frame
    Unavailable(String),
}

impl MetricValue {
    /// Wrap a raw number, demoting NaN and infinities to `Unavailable`
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::Unavailable(REASON_NON_FINITE.to_string())
        }
    }

    /// Unavailable value with the given reason
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    /// The finite value, if any
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// Whether a usable value is present
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.as_f64().is_some()
    }
}

impl From<Option<f64>> for MetricValue {
    fn from(value: Option<f64>) -> Self {
        value.map_or_else(|| Self::unavailable(REASON_MISSING), Self::from_f64)
    }
}

/// Mapping from metric id to its reading for one processed frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricFrame {
    values: HashMap<String, MetricValue>,
}

impl MetricFrame {
    /// Create an empty frame
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a numeric reading (non-finite values become unavailable)
    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), MetricValue::from_f64(value));
    }

    /// Record that a metric could not be measured
    pub fn set_unavailable(&mut self, key: impl Into<String>, reason: impl Into<String>) {
        self.values.insert(key.into(), MetricValue::unavailable(reason));
    }

    /// Insert an already-built reading
    pub fn insert(&mut self, key: impl Into<String>, value: MetricValue) {
        let value = match value {
            MetricValue::Value(v) => MetricValue::from_f64(v),
            other => other,
        };
        self.values.insert(key.into(), value);
    }

    /// Builder-style variant of [`MetricFrame::set`]
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.set(key, value);
        self
    }

    /// Reading for `key`; absent keys read as unavailable
    #[must_use]
    pub fn get(&self, key: &str) -> MetricValue {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| MetricValue::unavailable(REASON_MISSING))
    }

    /// Finite value for `key`, if any
    #[must_use]
    pub fn value(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(MetricValue::as_f64)
    }

    /// Remove a reading, returning it
    pub fn remove(&mut self, key: &str) -> Option<MetricValue> {
        self.values.remove(key)
    }

    /// Iterate over all recorded readings
    pub fn iter(&self) -> impl Iterator<Item = (&String, &MetricValue)> {
        self.values.iter()
    }

    /// Number of recorded readings
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, MetricValue)> for MetricFrame {
    fn from_iter<I: IntoIterator<Item = (String, MetricValue)>>(iter: I) -> Self {
        let mut frame = Self::new();
        for (key, value) in iter {
            frame.insert(key, value);
        }
        frame
    }
}
