//! Cue definitions and the threshold evaluator.

use crate::{
    metrics::{MetricFrame, MetricValue, ReferenceTargets},
    mirror::{resolve_error, MirrorMap},
    threshold::{Level, RuleMatch, ThresholdSet},
};
use serde::Serialize;

/// A named guidance instruction tied to one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueDefinition {
    /// Unique cue id, e.g. `move_left`
    pub id: String,
    /// Metric the cue reads
    pub metric: String,
    /// Thresholds applied to the error against a reference target
    pub with_reference: Option<ThresholdSet>,
    /// Thresholds applied to the raw metric
    pub no_reference: Option<ThresholdSet>,
    /// Display priority, higher wins
    pub priority: i32,
    /// Cues sharing a group compete for the same guidance dimension
    pub mutex_group: String,
    /// Consecutive exit frames required before the cue stops blocking a match
    pub persist_frames: u32,
    /// Match decisions read the untransformed metric instead of the error
    pub exit_uses_raw_value: bool,
}

impl CueDefinition {
    /// Threshold set that applies for the given comparison mode
    #[must_use]
    pub fn threshold_set(&self, has_reference: bool) -> Option<(&ThresholdSet, EvaluationMode)> {
        if has_reference {
            if let Some(set) = &self.with_reference {
                return Some((set, EvaluationMode::WithReference));
            }
        }
        self.no_reference
            .as_ref()
            .map(|set| (set, EvaluationMode::NoReference))
    }
}

/// Which threshold set classified a cue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationMode {
    /// Error relative to a captured target
    WithReference,
    /// Raw metric value
    NoReference,
}

/// Result of classifying one cue for one frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueEvaluation {
    /// Cue that was evaluated
    pub cue_id: String,
    /// Resolved level
    pub level: Level,
    /// Rule that produced the level
    pub matched_rule: Option<RuleMatch>,
    /// Number of rules tested
    pub rules_evaluated: usize,
    /// Threshold set used, `None` when no set applied or the value was unavailable
    pub mode: Option<EvaluationMode>,
    /// The classified value, if one was available
    pub value: Option<f64>,
}

impl CueEvaluation {
    /// Evaluation for a cue that could not be classified
    pub fn unclassified(cue_id: impl Into<String>) -> Self {
        Self {
            cue_id: cue_id.into(),
            level: Level::None,
            matched_rule: None,
            rules_evaluated: 0,
            mode: None,
            value: None,
        }
    }
}

/// Classify `value` against the cue's thresholds.
///
/// Uses the with-reference set when `has_reference` is true and the cue
/// defines one, otherwise the no-reference set. A missing set or an
/// unavailable value yields `Level::None` with zero rules evaluated.
#[must_use]
pub fn evaluate(cue: &CueDefinition, value: &MetricValue, has_reference: bool) -> CueEvaluation {
    let Some((set, mode)) = cue.threshold_set(has_reference) else {
        return CueEvaluation::unclassified(&cue.id);
    };
    let Some(value) = value.as_f64() else {
        return CueEvaluation::unclassified(&cue.id);
    };

    let classification = set.classify(value);

    CueEvaluation {
        cue_id: cue.id.clone(),
        level: classification.level,
        matched_rule: classification.matched,
        rules_evaluated: classification.rules_evaluated,
        mode: Some(mode),
        value: Some(value),
    }
}

/// Value a cue is classified on for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct CueInput {
    /// Error against the target, or the raw metric
    pub value: MetricValue,
    /// Whether a with-reference comparison applies
    pub has_reference: bool,
    /// Whether the mirrored hypothesis produced `value`
    pub mirror_applied: bool,
}

/// Resolve what `cue` should be classified on.
///
/// Reference mode applies when the cue has a with-reference set and the
/// metric has a finite target. The cue's own metric must be available;
/// a mirror partner never stands in for a missing reading.
/// `exit_uses_raw_value` cues always read the raw metric.
#[must_use]
pub fn resolve_input(
    cue: &CueDefinition,
    metrics: &MetricFrame,
    targets: Option<&ReferenceTargets>,
    mirror: &MirrorMap,
) -> CueInput {
    let raw = metrics.get(&cue.metric);
    let target = targets
        .and_then(|t| t.get(&cue.metric))
        .copied()
        .filter(|t| t.is_finite() && cue.with_reference.is_some());

    let Some(target) = target else {
        return CueInput {
            value: raw,
            has_reference: false,
            mirror_applied: false,
        };
    };

    if cue.exit_uses_raw_value || !raw.is_available() {
        return CueInput {
            value: raw,
            has_reference: true,
            mirror_applied: false,
        };
    }

    match resolve_error(&cue.metric, metrics, target, mirror) {
        Some(resolved) => CueInput {
            value: MetricValue::Value(resolved.error),
            has_reference: true,
            mirror_applied: resolved.mirror_applied,
        },
        None => CueInput {
            value: raw,
            has_reference: true,
            mirror_applied: false,
        },
    }
}
