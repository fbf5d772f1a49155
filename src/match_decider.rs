//! Aggregate "pose matches target" decision.
//!
//! Every required cue is classified against its with-reference thresholds on
//! every frame. Required cues are grouped into dimensions by mutex group; a
//! dimension stops blocking only once each of its cues sits at `exit` and has
//! stayed there for the cue's `persist_frames`.

use crate::{
    constants::REASON_NO_TARGET,
    cue::{evaluate, resolve_input, CueDefinition, CueEvaluation},
    metrics::{MetricFrame, MetricValue, ReferenceTargets},
    mirror::MirrorMap,
    threshold::Level,
};
use log::debug;
use serde::Serialize;
use std::cmp::Ordering;

/// Why a required dimension blocks a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockReason {
    /// The cue's metric (or its target) is unavailable
    MissingData {
        /// Reported unavailability reason
        reason: String,
    },
    /// The cue is not at `exit`
    NotExit {
        /// Current level
        level: Level,
    },
    /// The cue is at `exit` but has not persisted long enough
    NotPersisted {
        /// Consecutive exit frames so far
        frames: u32,
        /// Frames required
        required: u32,
    },
}

/// One blocking cue and its dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blocker {
    /// Mutex group the cue belongs to
    pub dimension: String,
    /// Cue reported as blocking
    pub cue_id: String,
    /// Why it blocks
    pub reason: BlockReason,
}

/// Output of [`MatchDecider::evaluate`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// True iff at least one dimension is required and nothing blocks
    pub is_match: bool,
    /// Required dimension ids in configuration order
    pub required_dimensions: Vec<String>,
    /// Blocking cue ids, one per blocking dimension
    pub blocked_by: Vec<String>,
    /// Structured detail for each entry of `blocked_by`
    pub blockers: Vec<Blocker>,
    /// Whether the mirrored hypothesis was used for any cue
    pub mirror_applied: bool,
}

struct CueFrame {
    evaluation: CueEvaluation,
    unavailable: Option<String>,
    exit_frames: u32,
}

#[derive(Debug, Clone)]
struct Dimension {
    id: String,
    cue_indices: Vec<usize>,
}

/// Stateful match decider, one per guidance session
#[derive(Debug, Clone)]
pub struct MatchDecider {
    cues: Vec<CueDefinition>,
    dimensions: Vec<Dimension>,
    exit_frames: Vec<u32>,
    mirror: MirrorMap,
    last_match: bool,
}

impl MatchDecider {
    /// Create a decider over an ordered list of required cues
    #[must_use]
    pub fn new(required: Vec<CueDefinition>, mirror: MirrorMap) -> Self {
        let mut dimensions: Vec<Dimension> = Vec::new();
        for (index, cue) in required.iter().enumerate() {
            match dimensions.iter_mut().find(|d| d.id == cue.mutex_group) {
                Some(dimension) => dimension.cue_indices.push(index),
                None => dimensions.push(Dimension {
                    id: cue.mutex_group.clone(),
                    cue_indices: vec![index],
                }),
            }
        }

        Self {
            exit_frames: vec![0; required.len()],
            cues: required,
            dimensions,
            mirror,
            last_match: false,
        }
    }

    /// Required dimension ids in configuration order
    #[must_use]
    pub fn required_dimensions(&self) -> Vec<String> {
        self.dimensions.iter().map(|d| d.id.clone()).collect()
    }

    /// Consecutive exit frames recorded for a required cue
    #[must_use]
    pub fn exit_frames(&self, cue_id: &str) -> Option<u32> {
        self.cues
            .iter()
            .position(|c| c.id == cue_id)
            .map(|index| self.exit_frames[index])
    }

    /// Classify every required cue for this frame and decide the match
    pub fn evaluate(&mut self, metrics: &MetricFrame, targets: Option<&ReferenceTargets>) -> MatchResult {
        let mut mirror_applied = false;
        let mut frames = Vec::with_capacity(self.cues.len());

        for (index, cue) in self.cues.iter().enumerate() {
            let (value, has_reference) = self.cue_value(cue, metrics, targets, &mut mirror_applied);
            let unavailable = match &value {
                MetricValue::Unavailable(reason) => Some(reason.clone()),
                MetricValue::Value(_) => None,
            };
            let evaluation = evaluate(cue, &value, has_reference);

            let counter = &mut self.exit_frames[index];
            *counter = if evaluation.level == Level::Exit {
                counter.saturating_add(1)
            } else {
                0
            };

            frames.push(CueFrame {
                evaluation,
                unavailable,
                exit_frames: *counter,
            });
        }

        let blockers: Vec<Blocker> = self
            .dimensions
            .iter()
            .filter_map(|dimension| self.dimension_blocker(dimension, &frames))
            .collect();

        let required_dimensions = self.required_dimensions();
        let is_match = !required_dimensions.is_empty() && blockers.is_empty();

        if is_match != self.last_match {
            debug!(
                "Pose match {} (blocked by {:?})",
                if is_match { "reached" } else { "lost" },
                blockers.iter().map(|b| b.cue_id.as_str()).collect::<Vec<_>>()
            );
            self.last_match = is_match;
        }

        MatchResult {
            is_match,
            required_dimensions,
            blocked_by: blockers.iter().map(|b| b.cue_id.clone()).collect(),
            blockers,
            mirror_applied,
        }
    }

    /// Clear all persistence counters
    pub fn reset(&mut self) {
        self.exit_frames.iter_mut().for_each(|count| *count = 0);
        self.last_match = false;
    }

    /// Value a required cue is judged on; non-raw cues need a reference target
    fn cue_value(
        &self,
        cue: &CueDefinition,
        metrics: &MetricFrame,
        targets: Option<&ReferenceTargets>,
        mirror_applied: &mut bool,
    ) -> (MetricValue, bool) {
        let input = resolve_input(cue, metrics, targets, &self.mirror);
        if !cue.exit_uses_raw_value && !input.has_reference {
            return (MetricValue::unavailable(REASON_NO_TARGET), true);
        }
        *mirror_applied |= input.mirror_applied;
        (input.value, input.has_reference)
    }

    fn dimension_blocker(&self, dimension: &Dimension, frames: &[CueFrame]) -> Option<Blocker> {
        let blocker = |index: usize, reason: BlockReason| Blocker {
            dimension: dimension.id.clone(),
            cue_id: self.cues[index].id.clone(),
            reason,
        };

        if let Some(&index) = dimension
            .cue_indices
            .iter()
            .find(|&&i| frames[i].unavailable.is_some())
        {
            let reason = frames[index].unavailable.clone().unwrap_or_default();
            return Some(blocker(index, BlockReason::MissingData { reason }));
        }

        let worst = dimension
            .cue_indices
            .iter()
            .copied()
            .filter(|&i| frames[i].evaluation.level != Level::Exit)
            .min_by(|&a, &b| self.compare_severity(&frames[a], &frames[b], a, b));
        if let Some(index) = worst {
            let level = frames[index].evaluation.level;
            return Some(blocker(index, BlockReason::NotExit { level }));
        }

        let least_persisted = dimension
            .cue_indices
            .iter()
            .copied()
            .filter(|&i| frames[i].exit_frames < self.cues[i].persist_frames)
            .min_by(|&a, &b| {
                frames[a]
                    .exit_frames
                    .cmp(&frames[b].exit_frames)
                    .then_with(|| self.cues[a].id.cmp(&self.cues[b].id))
            });
        least_persisted.map(|index| {
            blocker(
                index,
                BlockReason::NotPersisted {
                    frames: frames[index].exit_frames,
                    required: self.cues[index].persist_frames,
                },
            )
        })
    }

    /// `Less` when `a` is the worse blocker
    fn compare_severity(&self, a: &CueFrame, b: &CueFrame, ai: usize, bi: usize) -> Ordering {
        let magnitude = |f: &CueFrame| f.evaluation.value.map_or(f64::NEG_INFINITY, f64::abs);
        b.evaluation
            .level
            .severity_rank()
            .cmp(&a.evaluation.level.severity_rank())
            .then_with(|| magnitude(b).total_cmp(&magnitude(a)))
            .then_with(|| self.cues[ai].id.cmp(&self.cues[bi].id))
    }
}
