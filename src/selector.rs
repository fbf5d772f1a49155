//! Deterministic single-winner selection among active cues.
//!
//! Candidates are ordered by severity-boosted priority, then normalised
//! severity, then raw priority, then mutex group and cue id (both ascending).
//! The lexical keys make the order total, so any non-empty candidate list
//! has exactly one winner regardless of input order.

use crate::constants::{MAX_EFFECTIVE_PRIORITY, SEVERITY_BOOST_HIGH, SEVERITY_BOOST_LOW};
use serde::Serialize;
use std::cmp::Ordering;

/// One active cue competing for the display slot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// Cue id
    pub cue_id: String,
    /// Configured priority
    pub priority: i32,
    /// Mutex group key
    pub mutex_group: String,
    /// Current error (or raw value) of the cue's metric
    pub error: Option<f64>,
    /// Magnitude of the cue's hard threshold
    pub hard_threshold_abs: Option<f64>,
}

impl Candidate {
    /// `|error| / |hard threshold|` when both are known and the threshold is positive
    #[must_use]
    pub fn severity_normalized(&self) -> Option<f64> {
        let error = self.error.filter(|e| e.is_finite())?;
        let hard = self.hard_threshold_abs.map(f64::abs).filter(|h| *h > 0.0)?;
        Some(error.abs() / hard)
    }

    /// Priority after the severity boost, capped at [`MAX_EFFECTIVE_PRIORITY`]
    #[must_use]
    pub fn effective_priority(&self) -> i32 {
        let boost = match self.severity_normalized() {
            Some(s) if s >= SEVERITY_BOOST_HIGH => 2,
            Some(s) if s >= SEVERITY_BOOST_LOW => 1,
            _ => 0,
        };
        if boost == 0 {
            return self.priority;
        }
        // A boost never lowers a priority already above the cap.
        self.priority
            .saturating_add(boost)
            .min(MAX_EFFECTIVE_PRIORITY.max(self.priority))
    }
}

/// First sort key that separated the winner from the runner-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    /// Only one candidate was offered
    SoleCandidate,
    /// Higher severity-boosted priority
    EffectivePriority,
    /// Higher normalised severity
    Severity,
    /// Higher configured priority
    RawPriority,
    /// Lexically smaller mutex group
    MutexGroup,
    /// Lexically smaller cue id
    CueId,
    /// Runner-up was indistinguishable from the winner
    Identical,
}

/// Winner of [`pick_one`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    /// Winning candidate
    pub winner: Candidate,
    /// Its boosted priority
    pub effective_priority: i32,
    /// Its normalised severity
    pub severity_normalized: Option<f64>,
    /// Why it beat the runner-up
    pub reason: SelectionReason,
}

struct Ranked<'a> {
    candidate: &'a Candidate,
    effective_priority: i32,
    severity: Option<f64>,
}

impl<'a> Ranked<'a> {
    fn new(candidate: &'a Candidate) -> Self {
        Self {
            candidate,
            effective_priority: candidate.effective_priority(),
            severity: candidate.severity_normalized(),
        }
    }

    /// Ordering where `Less` means "ranks ahead", plus the key that decided it
    fn compare(&self, other: &Self) -> (Ordering, SelectionReason) {
        let severity = |s: Option<f64>| s.unwrap_or(f64::NEG_INFINITY);
        let keys = [
            (
                other.effective_priority.cmp(&self.effective_priority),
                SelectionReason::EffectivePriority,
            ),
            (
                severity(other.severity).total_cmp(&severity(self.severity)),
                SelectionReason::Severity,
            ),
            (
                other.candidate.priority.cmp(&self.candidate.priority),
                SelectionReason::RawPriority,
            ),
            (
                self.candidate.mutex_group.cmp(&other.candidate.mutex_group),
                SelectionReason::MutexGroup,
            ),
            (
                self.candidate.cue_id.cmp(&other.candidate.cue_id),
                SelectionReason::CueId,
            ),
        ];

        keys.into_iter()
            .find(|(ordering, _)| *ordering != Ordering::Equal)
            .unwrap_or((Ordering::Equal, SelectionReason::Identical))
    }
}

/// Pick exactly one winner; `None` for an empty list
#[must_use]
pub fn pick_one(candidates: &[Candidate]) -> Option<Selection> {
    let mut ranked: Vec<Ranked<'_>> = candidates.iter().map(Ranked::new).collect();
    ranked.sort_by(|a, b| a.compare(b).0);

    let mut iter = ranked.into_iter();
    let first = iter.next()?;
    let reason = iter
        .next()
        .map_or(SelectionReason::SoleCandidate, |runner_up| first.compare(&runner_up).1);

    Some(Selection {
        winner: first.candidate.clone(),
        effective_priority: first.effective_priority,
        severity_normalized: first.severity,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn candidate(id: &str, priority: i32, group: &str, error: f64, hard: f64) -> Candidate {
        Candidate {
            cue_id: id.to_string(),
            priority,
            mutex_group: group.to_string(),
            error: Some(error),
            hard_threshold_abs: Some(hard),
        }
    }

    #[test]
    fn test_raw_priority_dominates_without_boost() {
        let a = candidate("A", 3, "Y", 0.10, 0.10);
        let b = candidate("B", 5, "X", 0.05, 0.10);
        let selection = pick_one(&[a, b]).unwrap();
        assert_eq!(selection.winner.cue_id, "B");
        assert_eq!(selection.reason, SelectionReason::EffectivePriority);
    }

    #[test]
    fn test_severity_boost_overturns_priority() {
        let mild = candidate("MILD", 4, "G", 0.05, 0.1);
        let severe = candidate("SEVERE", 3, "G", 0.2, 0.1);
        let selection = pick_one(&[mild, severe]).unwrap();
        assert_eq!(selection.winner.cue_id, "SEVERE");
        assert_eq!(selection.effective_priority, 5);
        assert_eq!(selection.severity_normalized, Some(2.0));
    }

    #[test]
    fn test_boost_steps_and_cap() {
        assert_eq!(candidate("a", 2, "g", 0.625, 0.5).effective_priority(), 3);
        assert_eq!(candidate("a", 2, "g", 0.6, 0.5).effective_priority(), 2);
        assert_eq!(candidate("a", 5, "g", 0.5, 0.1).effective_priority(), 6);
        assert_eq!(candidate("a", 8, "g", 0.5, 0.1).effective_priority(), 8);
        assert_eq!(candidate("a", 4, "g", 0.5, 0.0).effective_priority(), 4);
    }

    #[test]
    fn test_extreme_priorities_do_not_overflow() {
        let top = candidate("top", i32::MAX, "g", 0.2, 0.1);
        assert_eq!(top.effective_priority(), i32::MAX);
        let bottom = candidate("bottom", i32::MIN, "g", 0.2, 0.1);
        assert_eq!(bottom.effective_priority(), i32::MIN + 2);

        let selection = pick_one(&[candidate("low", 1, "g", 0.0, 0.1), top]).unwrap();
        assert_eq!(selection.winner.cue_id, "top");
        assert_eq!(selection.effective_priority, i32::MAX);
    }

    #[test]
    fn test_missing_severity_ranks_last_among_equals() {
        let mut unknown = candidate("a_unknown", 4, "g", 0.0, 0.1);
        unknown.error = None;
        let known = candidate("z_known", 4, "g", 0.01, 0.1);
        let selection = pick_one(&[unknown, known]).unwrap();
        assert_eq!(selection.winner.cue_id, "z_known");
        assert_eq!(selection.reason, SelectionReason::Severity);
    }

    #[test]
    fn test_lexical_fallbacks() {
        let mut a = candidate("move_left", 3, "horizontal", 0.1, 0.2);
        let mut b = candidate("move_up", 3, "vertical", 0.1, 0.2);
        assert_eq!(pick_one(&[b.clone(), a.clone()]).unwrap().reason, SelectionReason::MutexGroup);

        a.mutex_group = "same".to_string();
        b.mutex_group = "same".to_string();
        let selection = pick_one(&[b, a]).unwrap();
        assert_eq!(selection.winner.cue_id, "move_left");
        assert_eq!(selection.reason, SelectionReason::CueId);
    }

    #[test]
    fn test_empty_and_single() {
        assert!(pick_one(&[]).is_none());
        let only = candidate("tilt_left", 1, "tilt", 0.0, 0.0);
        assert_eq!(pick_one(&[only]).unwrap().reason, SelectionReason::SoleCandidate);
    }

    fn arb_candidate() -> impl Strategy<Value = Candidate> {
        (
            "[a-d]{1,2}",
            0..6i32,
            "[x-z]",
            proptest::option::of(-1.0..1.0f64),
            proptest::option::of(0.0..0.5f64),
        )
            .prop_map(|(cue_id, priority, mutex_group, error, hard_threshold_abs)| Candidate {
                cue_id,
                priority,
                mutex_group,
                error,
                hard_threshold_abs,
            })
    }

    proptest! {
        #[test]
        fn prop_winner_independent_of_order(
            candidates in proptest::collection::vec(arb_candidate(), 1..8),
            rotation in 0..8usize,
        ) {
            let forward = pick_one(&candidates).unwrap();

            let mut shuffled = candidates.clone();
            shuffled.reverse();
            let len = shuffled.len();
            shuffled.rotate_left(rotation % len);
            let reordered = pick_one(&shuffled).unwrap();

            prop_assert_eq!(&forward.winner.cue_id, &reordered.winner.cue_id);
            prop_assert_eq!(&forward.winner.mutex_group, &reordered.winner.mutex_group);
            prop_assert_eq!(forward.effective_priority, reordered.effective_priority);
            prop_assert!(candidates.contains(&forward.winner));
        }
    }
}
