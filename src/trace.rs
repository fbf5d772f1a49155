//! Recorded metric traces and deterministic replay.
//!
//! A trace is a JSON-lines file, one [`TraceFrame`] per line. Blank lines and
//! lines starting with `#` are ignored. Because every stage takes its time
//! from the frame timestamp, replaying a trace on a fresh session always
//! reproduces the same outcomes.

use crate::{
    constants::REASON_MISSING,
    metrics::{MetricFrame, MetricValue},
    session::{FrameInput, FrameOutcome, GuidanceSession},
    Error, Result,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One recorded frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFrame {
    /// Monotonic frame timestamp
    pub timestamp_ms: u64,

    /// Metric readings; `null` means the metric was missing
    #[serde(default)]
    pub metrics: BTreeMap<String, Option<f64>>,

    /// Metrics reported unavailable, with the reason
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unavailable: BTreeMap<String, String>,

    /// Reference targets active for this frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<BTreeMap<String, f64>>,

    /// Guidance restarted (new target or scene) just before this frame
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reset: bool,
}

impl TraceFrame {
    /// Convert to pipeline input
    #[must_use]
    pub fn to_input(&self) -> FrameInput {
        let mut metrics = MetricFrame::new();
        for (key, value) in &self.metrics {
            match value {
                Some(v) => metrics.set(key.clone(), *v),
                None => metrics.set_unavailable(key.clone(), REASON_MISSING),
            }
        }
        for (key, reason) in &self.unavailable {
            metrics.set_unavailable(key.clone(), reason.clone());
        }

        FrameInput {
            timestamp_ms: self.timestamp_ms,
            metrics,
            targets: self
                .targets
                .as_ref()
                .map(|t| t.iter().map(|(k, v)| (k.clone(), *v)).collect()),
        }
    }

    /// Record a pipeline input as a trace frame
    #[must_use]
    pub fn from_input(input: &FrameInput) -> Self {
        let mut metrics = BTreeMap::new();
        let mut unavailable = BTreeMap::new();
        for (key, value) in input.metrics.iter() {
            match value {
                MetricValue::Value(v) => {
                    metrics.insert(key.clone(), Some(*v));
                }
                MetricValue::Unavailable(reason) => {
                    unavailable.insert(key.clone(), reason.clone());
                }
            }
        }

        Self {
            timestamp_ms: input.timestamp_ms,
            metrics,
            unavailable,
            targets: input
                .targets
                .as_ref()
                .map(|t| t.iter().map(|(k, v)| (k.clone(), *v)).collect()),
            reset: false,
        }
    }
}

/// Parse JSON-lines trace text
///
/// # Errors
///
/// Returns [`Error::TraceError`] for undecodable lines or timestamps that go backwards
pub fn parse_trace(content: &str) -> Result<Vec<TraceFrame>> {
    let mut frames: Vec<TraceFrame> = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let frame: TraceFrame = serde_json::from_str(line).map_err(|e| Error::TraceError {
            line: index + 1,
            message: e.to_string(),
        })?;

        if let Some(previous) = frames.last() {
            if frame.timestamp_ms < previous.timestamp_ms {
                return Err(Error::TraceError {
                    line: index + 1,
                    message: format!(
                        "timestamp {} precedes previous frame at {}",
                        frame.timestamp_ms, previous.timestamp_ms
                    ),
                });
            }
        }

        frames.push(frame);
    }

    Ok(frames)
}

/// Read a JSON-lines trace file
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed
pub fn read_trace<P: AsRef<Path>>(path: P) -> Result<Vec<TraceFrame>> {
    let path = path.as_ref();
    let frames = parse_trace(&std::fs::read_to_string(path)?)?;
    info!("Read {} trace frames from {}", frames.len(), path.display());
    Ok(frames)
}

/// Encode frames as JSON-lines text
///
/// # Errors
///
/// Returns [`Error::TraceError`] if a frame cannot be encoded
pub fn to_jsonl(frames: &[TraceFrame]) -> Result<String> {
    let mut out = String::new();
    for (index, frame) in frames.iter().enumerate() {
        let line = serde_json::to_string(frame).map_err(|e| Error::TraceError {
            line: index + 1,
            message: e.to_string(),
        })?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Feed every frame through the session in order
pub fn replay(session: &mut GuidanceSession, frames: &[TraceFrame]) -> Vec<FrameOutcome> {
    frames
        .iter()
        .map(|frame| {
            if frame.reset {
                debug!("Trace requests guidance restart at {}ms", frame.timestamp_ms);
                session.reset();
            }
            session.process_frame(&frame.to_input())
        })
        .collect()
}
