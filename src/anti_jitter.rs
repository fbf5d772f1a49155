//! Anti-jitter arbitration of the single displayed cue.
//!
//! The gate sits between the per-frame winner and the UI. A switch must
//! survive three checks: the current output has been held for `min_hold_ms`,
//! the new input has repeated for `persist_frames` consecutive frames, and a
//! cue displaced recently is not back inside its `cooldown_ms` window.

use crate::{
    constants::{DEFAULT_COOLDOWN_MS, DEFAULT_MIN_HOLD_MS, DEFAULT_PERSIST_FRAMES},
    threshold::Level,
};
use log::{debug, trace};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Hysteresis parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AntiJitterConfig {
    /// Consecutive identical inputs required before switching
    pub persist_frames: u32,
    /// Minimum time since the last output change before any switch
    pub min_hold_ms: u64,
    /// Time a displaced cue waits before it can reclaim the display
    pub cooldown_ms: u64,
}

impl Default for AntiJitterConfig {
    fn default() -> Self {
        Self {
            persist_frames: DEFAULT_PERSIST_FRAMES,
            min_hold_ms: DEFAULT_MIN_HOLD_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }
}

/// A cue as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DisplayCue {
    /// Cue id
    pub cue_id: String,
    /// Severity it is shown at
    pub level: Level,
}

impl DisplayCue {
    /// Create a display cue
    pub fn new(cue_id: impl Into<String>, level: Level) -> Self {
        Self {
            cue_id: cue_id.into(),
            level,
        }
    }
}

impl fmt::Display for DisplayCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.cue_id, self.level)
    }
}

/// Why the output did or did not follow the input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateReason {
    /// Output equals input, either already or after an accepted switch
    None,
    /// Current output is still inside its minimum hold time
    Hold,
    /// Input has not repeated for enough frames yet
    Frames,
    /// Input cue was displaced recently and is cooling down
    Cooldown,
}

/// Output of [`AntiJitterGate::filter`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    /// Cue to display
    pub output: Option<DisplayCue>,
    /// Arbitration reason
    pub reason: GateReason,
    /// Whether this frame changed the output
    pub changed: bool,
}

/// Stateful display arbiter, one per guidance session
#[derive(Debug, Clone)]
pub struct AntiJitterGate {
    config: AntiJitterConfig,
    current: Option<DisplayCue>,
    last_input: Option<Option<DisplayCue>>,
    input_repeat: u32,
    candidate_since_ms: Option<u64>,
    last_output_change_ms: Option<u64>,
    cooldown_until: HashMap<String, u64>,
}

impl AntiJitterGate {
    /// Create a gate with the given parameters
    #[must_use]
    pub fn new(config: AntiJitterConfig) -> Self {
        Self {
            config,
            current: None,
            last_input: None,
            input_repeat: 0,
            candidate_since_ms: None,
            last_output_change_ms: None,
            cooldown_until: HashMap::new(),
        }
    }

    /// Feed the per-frame winner (or none) and get the cue to display
    pub fn filter(&mut self, input: Option<DisplayCue>, now_ms: u64) -> GateDecision {
        if self.last_input.as_ref() == Some(&input) {
            self.input_repeat = self.input_repeat.saturating_add(1);
        } else {
            self.input_repeat = 1;
            self.candidate_since_ms = Some(now_ms);
            self.last_input = Some(input.clone());
        }

        if input == self.current {
            return self.hold_with(GateReason::None);
        }

        if self.current.is_some() {
            if let Some(changed_at) = self.last_output_change_ms {
                if now_ms.saturating_sub(changed_at) < self.config.min_hold_ms {
                    return self.hold_with(GateReason::Hold);
                }
            }
        }

        let required = self.config.persist_frames.max(1);

        let Some(candidate) = input else {
            if self.input_repeat < required {
                return self.hold_with(GateReason::Frames);
            }
            return self.switch_to(None, now_ms);
        };

        if self.in_cooldown(&candidate.cue_id, now_ms) {
            return self.hold_with(GateReason::Cooldown);
        }

        if self.input_repeat < required {
            return self.hold_with(GateReason::Frames);
        }

        self.switch_to(Some(candidate), now_ms)
    }

    /// Currently displayed cue
    #[must_use]
    pub fn current(&self) -> Option<&DisplayCue> {
        self.current.as_ref()
    }

    /// Consecutive frames the latest input has been seen
    #[must_use]
    pub fn input_repeat(&self) -> u32 {
        self.input_repeat
    }

    /// Timestamp at which the latest input was first seen
    #[must_use]
    pub fn candidate_since_ms(&self) -> Option<u64> {
        self.candidate_since_ms
    }

    /// Cooldown expiry for a cue, if one was recorded
    #[must_use]
    pub fn cooldown_expiry(&self, cue_id: &str) -> Option<u64> {
        self.cooldown_until.get(cue_id).copied()
    }

    /// Clear all state
    pub fn reset(&mut self) {
        self.current = None;
        self.last_input = None;
        self.input_repeat = 0;
        self.candidate_since_ms = None;
        self.last_output_change_ms = None;
        self.cooldown_until.clear();
    }

    fn in_cooldown(&self, cue_id: &str, now_ms: u64) -> bool {
        let is_current = self.current.as_ref().is_some_and(|c| c.cue_id == cue_id);
        !is_current && self.cooldown_until.get(cue_id).is_some_and(|until| now_ms < *until)
    }

    fn hold_with(&self, reason: GateReason) -> GateDecision {
        if reason != GateReason::None {
            trace!(
                "Holding {:?} ({:?}, input repeat {})",
                self.current,
                reason,
                self.input_repeat
            );
        }
        GateDecision {
            output: self.current.clone(),
            reason,
            changed: false,
        }
    }

    fn switch_to(&mut self, next: Option<DisplayCue>, now_ms: u64) -> GateDecision {
        if let (Some(previous), Some(incoming)) = (&self.current, &next) {
            if previous.cue_id != incoming.cue_id {
                let expiry = now_ms.saturating_add(self.config.cooldown_ms);
                self.cooldown_until.insert(previous.cue_id.clone(), expiry);
            }
        }

        debug!("Display cue {:?} -> {:?} at {}ms", self.current, next, now_ms);

        self.current = next;
        self.last_output_change_ms = Some(now_ms);

        GateDecision {
            output: self.current.clone(),
            reason: GateReason::None,
            changed: true,
        }
    }
}

impl Default for AntiJitterGate {
    fn default() -> Self {
        Self::new(AntiJitterConfig::default())
    }
}
