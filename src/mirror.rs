//! Mirror-aware error resolution.
//!
//! A live preview may or may not be horizontally flipped relative to the
//! reference capture. Rather than tracking the camera state, the resolver
//! computes the error under both hypotheses and keeps the better fit.

use crate::metrics::{MetricFrame, MetricValue};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Which metrics change under a horizontal flip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorMap {
    partners: HashMap<String, String>,
    negated: HashSet<String>,
}

impl Default for MirrorMap {
    fn default() -> Self {
        Self::new(
            [
                ("left_shoulder_height", "right_shoulder_height"),
                ("left_eye_openness", "right_eye_openness"),
            ],
            ["center_x_offset", "registration_offset_x", "face_luma_lr_diff"],
        )
    }
}

impl MirrorMap {
    /// Build a map from left/right pairs and horizontally-signed metric ids
    pub fn new<P, N, S>(pairs: P, negated: N) -> Self
    where
        P: IntoIterator<Item = (S, S)>,
        N: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut partners = HashMap::new();
        for (left, right) in pairs {
            let (left, right) = (left.into(), right.into());
            partners.insert(left.clone(), right.clone());
            partners.insert(right, left);
        }
        Self {
            partners,
            negated: negated.into_iter().map(Into::into).collect(),
        }
    }

    /// Map that leaves every metric unchanged
    #[must_use]
    pub fn identity() -> Self {
        Self {
            partners: HashMap::new(),
            negated: HashSet::new(),
        }
    }

    /// Metric whose value takes the place of `key` when mirrored
    #[must_use]
    pub fn partner(&self, key: &str) -> Option<&str> {
        self.partners.get(key).map(String::as_str)
    }

    /// Whether `key` flips sign when mirrored
    #[must_use]
    pub fn is_negated(&self, key: &str) -> bool {
        self.negated.contains(key)
    }

    /// Value `key` would have if the frame were horizontally mirrored
    #[must_use]
    pub fn mirrored_value(&self, key: &str, frame: &MetricFrame) -> Option<f64> {
        let source = self.partner(key).unwrap_or(key);
        let value = frame.value(source)?;
        Some(if self.is_negated(key) { -value } else { value })
    }

    /// Horizontally mirrored copy of a whole frame
    #[must_use]
    pub fn mirror_frame(&self, frame: &MetricFrame) -> MetricFrame {
        let mut mirrored = MetricFrame::new();
        for (key, value) in frame.iter() {
            let target = self.partner(key).unwrap_or(key).to_string();
            let value = match value {
                MetricValue::Value(v) if self.is_negated(&target) => MetricValue::Value(-v),
                other => other.clone(),
            };
            mirrored.insert(target, value);
        }
        mirrored
    }
}

/// Error picked by [`resolve_error`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedError {
    /// Current value minus target under the chosen hypothesis
    pub error: f64,
    /// Whether the mirrored hypothesis won
    pub mirror_applied: bool,
}

/// Error of `key` against `target`, choosing between the normal and mirrored frame.
///
/// The smaller magnitude wins and ties keep the normal error. When only one
/// hypothesis is computable it is returned as-is; when neither is, `None`.
#[must_use]
pub fn resolve_error(
    key: &str,
    current: &MetricFrame,
    target: f64,
    mirror: &MirrorMap,
) -> Option<ResolvedError> {
    if !target.is_finite() {
        return None;
    }

    let normal = current.value(key).map(|v| v - target);
    let mirrored = mirror.mirrored_value(key, current).map(|v| v - target);

    match (normal, mirrored) {
        (Some(n), Some(m)) if m.abs() < n.abs() => Some(ResolvedError {
            error: m,
            mirror_applied: true,
        }),
        (Some(n), _) => Some(ResolvedError {
            error: n,
            mirror_applied: false,
        }),
        (None, Some(m)) => Some(ResolvedError {
            error: m,
            mirror_applied: true,
        }),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_negated_metric_prefers_mirror() {
        let frame = MetricFrame::new().with("center_x_offset", 0.2);
        let resolved = resolve_error("center_x_offset", &frame, -0.18, &MirrorMap::default()).unwrap();
        assert!(resolved.mirror_applied);
        assert!((resolved.error - (-0.02)).abs() < 1e-12);
    }

    #[test]
    fn test_tie_keeps_normal_error() {
        let frame = MetricFrame::new().with("center_x_offset", 0.1);
        let resolved = resolve_error("center_x_offset", &frame, 0.0, &MirrorMap::default()).unwrap();
        assert!(!resolved.mirror_applied);
        assert_eq!(resolved.error, 0.1);
    }

    #[test]
    fn test_paired_metric_uses_partner() {
        let frame = MetricFrame::new()
            .with("left_shoulder_height", 0.40)
            .with("right_shoulder_height", 0.55);
        let resolved =
            resolve_error("left_shoulder_height", &frame, 0.54, &MirrorMap::default()).unwrap();
        assert!(resolved.mirror_applied);
        assert!((resolved.error - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_one_sided_results() {
        let mut frame = MetricFrame::new().with("right_eye_openness", 0.3);
        frame.set_unavailable("left_eye_openness", "missing landmark");
        let resolved =
            resolve_error("left_eye_openness", &frame, 0.5, &MirrorMap::default()).unwrap();
        assert!(resolved.mirror_applied);
        assert!((resolved.error - (-0.2)).abs() < 1e-12);

        let resolved =
            resolve_error("right_eye_openness", &frame, 0.5, &MirrorMap::default()).unwrap();
        assert!(!resolved.mirror_applied);

        assert!(resolve_error("distance", &frame, 1.0, &MirrorMap::default()).is_none());
    }

    #[test]
    fn test_mirror_frame_swaps_and_negates() {
        let frame = MetricFrame::new()
            .with("left_shoulder_height", 0.4)
            .with("right_shoulder_height", 0.6)
            .with("face_luma_lr_diff", 12.0)
            .with("distance", 1.5);
        let mirrored = MirrorMap::default().mirror_frame(&frame);
        assert_eq!(mirrored.value("left_shoulder_height"), Some(0.6));
        assert_eq!(mirrored.value("right_shoulder_height"), Some(0.4));
        assert_eq!(mirrored.value("face_luma_lr_diff"), Some(-12.0));
        assert_eq!(mirrored.value("distance"), Some(1.5));
    }

    proptest! {
        #[test]
        fn prop_resolved_error_is_never_worse(
            value in -10.0..10.0f64,
            partner in -10.0..10.0f64,
            target in -10.0..10.0f64,
            use_pair in any::<bool>(),
        ) {
            let mirror = MirrorMap::default();
            let key = if use_pair { "left_eye_openness" } else { "center_x_offset" };
            let frame = MetricFrame::new()
                .with(key, value)
                .with("right_eye_openness", partner);

            let normal = value - target;
            let mirrored = mirror.mirrored_value(key, &frame).unwrap() - target;
            let resolved = resolve_error(key, &frame, target, &mirror).unwrap();

            prop_assert!(resolved.error.abs() <= normal.abs());
            prop_assert!(resolved.error.abs() <= mirrored.abs());
            if normal.abs() == mirrored.abs() {
                prop_assert!(!resolved.mirror_applied);
            }
        }
    }
}
