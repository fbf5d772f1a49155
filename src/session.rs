//! Per-session guidance pipeline.
//!
//! A [`GuidanceSession`] owns every stateful stage for one capture session
//! and runs them once per frame, in frame-arrival order:
//!
//! 1. each cue is classified (with or without reference) and confirmed by its
//!    own stability gate
//! 2. active cues compete in the selector for the single display slot
//! 3. the anti-jitter gate decides what is actually shown
//! 4. the match decider independently evaluates the required dimensions
//!
//! The session is not thread-safe; callers serialise frames per session.

use crate::{
    anti_jitter::{AntiJitterGate, DisplayCue, GateDecision},
    config::CueCatalog,
    cue::{evaluate, resolve_input, CueDefinition, CueEvaluation, CueInput},
    match_decider::{MatchDecider, MatchResult},
    metrics::{MetricFrame, ReferenceTargets},
    mirror::MirrorMap,
    selector::{pick_one, Candidate, Selection},
    stability::{StabilityGate, StabilityResult},
};
use log::{debug, info, trace};
use serde::Serialize;

/// Everything the pipeline needs for one frame
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    /// Caller-supplied monotonic timestamp
    pub timestamp_ms: u64,
    /// Measured metrics
    pub metrics: MetricFrame,
    /// Reference targets, when a with-reference comparison is active
    pub targets: Option<ReferenceTargets>,
}

/// Per-cue detail of one processed frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueReport {
    /// Raw classification
    pub evaluation: CueEvaluation,
    /// Stability-confirmed classification
    pub stability: StabilityResult,
    /// Whether the mirrored hypothesis produced the classified error
    pub mirror_applied: bool,
}

/// Result of [`GuidanceSession::process_frame`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameOutcome {
    /// Timestamp of the processed frame
    pub timestamp_ms: u64,
    /// Per-frame selector winner before arbitration
    pub selection: Option<Selection>,
    /// Cue to display and why
    pub display: GateDecision,
    /// Aggregate pose-match decision
    pub match_result: MatchResult,
    /// Per-cue details in configuration order
    pub cues: Vec<CueReport>,
}

struct CueSlot {
    definition: CueDefinition,
    stability: StabilityGate,
}

/// All per-session decision state
pub struct GuidanceSession {
    slots: Vec<CueSlot>,
    mirror: MirrorMap,
    gate: AntiJitterGate,
    decider: MatchDecider,
    frames_processed: u64,
}

impl GuidanceSession {
    /// Build a fresh session from a validated catalog
    #[must_use]
    pub fn new(catalog: &CueCatalog) -> Self {
        info!(
            "Starting guidance session with {} cues, {} required",
            catalog.cues.len(),
            catalog.required.len()
        );

        let slots = catalog
            .cues
            .iter()
            .map(|definition| CueSlot {
                definition: definition.clone(),
                stability: StabilityGate::new(catalog.stability),
            })
            .collect();

        Self {
            slots,
            mirror: catalog.mirror.clone(),
            gate: AntiJitterGate::new(catalog.anti_jitter),
            decider: MatchDecider::new(catalog.required_cues(), catalog.mirror.clone()),
            frames_processed: 0,
        }
    }

    /// Run every stage for one frame
    pub fn process_frame(&mut self, frame: &FrameInput) -> FrameOutcome {
        let mut reports = Vec::with_capacity(self.slots.len());
        let mut candidates = Vec::new();

        for slot in &mut self.slots {
            let CueInput {
                value,
                has_reference,
                mirror_applied,
            } = resolve_input(
                &slot.definition,
                &frame.metrics,
                frame.targets.as_ref(),
                &self.mirror,
            );
            let evaluation = evaluate(&slot.definition, &value, has_reference);
            let stability = slot.stability.confirm(&evaluation);

            if stability.level.is_active() {
                let hard_threshold_abs = slot
                    .definition
                    .threshold_set(has_reference)
                    .and_then(|(set, _)| set.hard_threshold_abs());
                candidates.push(Candidate {
                    cue_id: slot.definition.id.clone(),
                    priority: slot.definition.priority,
                    mutex_group: slot.definition.mutex_group.clone(),
                    error: value.as_f64(),
                    hard_threshold_abs,
                });
            }

            reports.push(CueReport {
                evaluation,
                stability,
                mirror_applied,
            });
        }

        let selection = pick_one(&candidates);
        let input = selection.as_ref().and_then(|s| {
            reports
                .iter()
                .find(|r| r.stability.cue_id == s.winner.cue_id)
                .map(|r| DisplayCue::new(s.winner.cue_id.clone(), r.stability.level))
        });

        let display = self.gate.filter(input, frame.timestamp_ms);
        if display.changed {
            debug!(
                "Frame {} at {}ms: display {}",
                self.frames_processed,
                frame.timestamp_ms,
                display
                    .output
                    .as_ref()
                    .map_or_else(|| "none".to_string(), ToString::to_string)
            );
        }

        let match_result = self.decider.evaluate(&frame.metrics, frame.targets.as_ref());

        trace!(
            "Frame {}: {} candidates, gate {:?}, match {}",
            self.frames_processed,
            candidates.len(),
            display.reason,
            match_result.is_match
        );
        self.frames_processed += 1;

        FrameOutcome {
            timestamp_ms: frame.timestamp_ms,
            selection,
            display,
            match_result,
            cues: reports,
        }
    }

    /// Clear all state, e.g. for a new target or scene
    pub fn reset(&mut self) {
        info!("Resetting guidance session after {} frames", self.frames_processed);
        for slot in &mut self.slots {
            slot.stability.reset();
        }
        self.gate.reset();
        self.decider.reset();
        self.frames_processed = 0;
    }

    /// Currently displayed cue
    #[must_use]
    pub fn displayed(&self) -> Option<&DisplayCue> {
        self.gate.current()
    }

    /// Number of frames processed since creation or the last reset
    #[must_use]
    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }
}
