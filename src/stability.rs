//! Frame-stability confirmation for `hard` and `exit` classifications.
//!
//! One [`StabilityGate`] exists per cue. `hard` and `exit` must repeat for a
//! number of consecutive frames before they are emitted; until then the gate
//! keeps emitting the last confirmed classification. Other levels pass
//! straight through.

use crate::{
    constants::{DEFAULT_EXIT_STABLE_FRAMES, DEFAULT_HARD_STABLE_FRAMES},
    cue::CueEvaluation,
    threshold::Level,
};
use log::debug;
use serde::Serialize;

/// Consecutive-frame requirements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityConfig {
    /// Frames a `hard` reading must repeat before it is confirmed
    pub hard_frames: u32,
    /// Frames an `exit` reading must repeat before it is confirmed
    pub exit_frames: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            hard_frames: DEFAULT_HARD_STABLE_FRAMES,
            exit_frames: DEFAULT_EXIT_STABLE_FRAMES,
        }
    }
}

impl StabilityConfig {
    fn required_frames(&self, level: Level) -> Option<u32> {
        match level {
            Level::Hard => Some(self.hard_frames),
            Level::Exit => Some(self.exit_frames),
            _ => None,
        }
    }
}

/// Whether the emitted classification reflects the current frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityStatus {
    /// Emitted level is the incoming one
    Confirmed,
    /// Incoming level awaits repetition; the previous confirmed level is emitted
    Unstable,
}

/// Output of [`StabilityGate::confirm`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityResult {
    /// Cue id of the emitted pair
    pub cue_id: String,
    /// Emitted (trusted) level
    pub level: Level,
    /// Level read this frame
    pub raw_level: Level,
    /// Confirmation status
    pub status: StabilityStatus,
    /// Consecutive repeats of the incoming pair before this frame
    pub repeat_count: u32,
}

/// Per-cue stability tracker
#[derive(Debug, Clone)]
pub struct StabilityGate {
    config: StabilityConfig,
    previous: Option<(String, Level)>,
    repeat_count: u32,
    confirmed: Option<(String, Level)>,
}

impl StabilityGate {
    /// Create a gate with the given frame requirements
    #[must_use]
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            previous: None,
            repeat_count: 0,
            confirmed: None,
        }
    }

    /// Feed one frame's evaluation and get the classification to trust
    pub fn confirm(&mut self, evaluation: &CueEvaluation) -> StabilityResult {
        let incoming = (evaluation.cue_id.clone(), evaluation.level);

        if self.previous.as_ref() == Some(&incoming) {
            self.repeat_count = self.repeat_count.saturating_add(1);
        } else {
            self.repeat_count = 0;
            self.previous = Some(incoming.clone());
        }

        let status = match self.config.required_frames(evaluation.level) {
            Some(required) if self.repeat_count < required.saturating_sub(1) => {
                StabilityStatus::Unstable
            }
            _ => StabilityStatus::Confirmed,
        };

        if status == StabilityStatus::Confirmed {
            if self.confirmed.as_ref() != Some(&incoming) && self.config.required_frames(incoming.1).is_some() {
                debug!(
                    "Cue {} confirmed {} after {} repeats",
                    incoming.0, incoming.1, self.repeat_count
                );
            }
            self.confirmed = Some(incoming);
        }

        let (cue_id, level) = self
            .confirmed
            .clone()
            .unwrap_or_else(|| (evaluation.cue_id.clone(), Level::None));

        StabilityResult {
            cue_id,
            level,
            raw_level: evaluation.level,
            status,
            repeat_count: self.repeat_count,
        }
    }

    /// Last confirmed level, `Level::None` before anything was confirmed
    #[must_use]
    pub fn confirmed_level(&self) -> Level {
        self.confirmed.as_ref().map_or(Level::None, |(_, level)| *level)
    }

    /// Clear all history
    pub fn reset(&mut self) {
        self.previous = None;
        self.repeat_count = 0;
        self.confirmed = None;
    }
}

impl Default for StabilityGate {
    fn default() -> Self {
        Self::new(StabilityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(level: Level) -> CueEvaluation {
        CueEvaluation {
            level,
            ..CueEvaluation::unclassified("move_left")
        }
    }

    #[test]
    fn test_single_hard_frame_never_confirms() {
        let mut gate = StabilityGate::default();
        assert_eq!(gate.confirm(&eval(Level::None)).level, Level::None);

        let result = gate.confirm(&eval(Level::Hard));
        assert_eq!(result.level, Level::None);
        assert_eq!(result.raw_level, Level::Hard);
        assert_eq!(result.status, StabilityStatus::Unstable);

        let result = gate.confirm(&eval(Level::None));
        assert_eq!(result.level, Level::None);
        assert_eq!(result.status, StabilityStatus::Confirmed);
    }

    #[test]
    fn test_hard_confirms_on_second_frame() {
        let mut gate = StabilityGate::default();
        gate.confirm(&eval(Level::Warn));
        let first = gate.confirm(&eval(Level::Hard));
        assert_eq!(first.level, Level::Warn);
        let second = gate.confirm(&eval(Level::Hard));
        assert_eq!(second.level, Level::Hard);
        assert_eq!(second.status, StabilityStatus::Confirmed);
        assert_eq!(second.repeat_count, 1);
    }

    #[test]
    fn test_warn_and_enter_pass_through() {
        let mut gate = StabilityGate::default();
        for level in [Level::Enter, Level::Warn, Level::None, Level::Warn] {
            let result = gate.confirm(&eval(level));
            assert_eq!(result.level, level);
            assert_eq!(result.status, StabilityStatus::Confirmed);
        }
    }

    #[test]
    fn test_exit_uses_its_own_requirement() {
        let mut gate = StabilityGate::new(StabilityConfig {
            hard_frames: 1,
            exit_frames: 3,
        });
        assert_eq!(gate.confirm(&eval(Level::Hard)).level, Level::Hard);
        assert_eq!(gate.confirm(&eval(Level::Exit)).level, Level::Hard);
        assert_eq!(gate.confirm(&eval(Level::Exit)).level, Level::Hard);
        assert_eq!(gate.confirm(&eval(Level::Exit)).level, Level::Exit);
        assert_eq!(gate.confirmed_level(), Level::Exit);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut gate = StabilityGate::default();
        gate.confirm(&eval(Level::Hard));
        gate.reset();
        let result = gate.confirm(&eval(Level::Hard));
        assert_eq!(result.status, StabilityStatus::Unstable);
        assert_eq!(result.repeat_count, 0);
    }
}
