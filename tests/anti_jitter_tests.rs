//! Timing scenarios for the anti-jitter gate

use pose_guidance::{
    anti_jitter::{AntiJitterConfig, AntiJitterGate, DisplayCue, GateReason},
    threshold::Level,
};

fn gate(persist_frames: u32, min_hold_ms: u64, cooldown_ms: u64) -> AntiJitterGate {
    AntiJitterGate::new(AntiJitterConfig {
        persist_frames,
        min_hold_ms,
        cooldown_ms,
    })
}

fn cue(id: &str) -> Option<DisplayCue> {
    Some(DisplayCue::new(id, Level::Warn))
}

#[test]
fn test_third_identical_frame_switches_output() {
    let mut gate = gate(3, 3000, 5000);
    let outputs: Vec<_> = [0, 100, 200, 300]
        .into_iter()
        .map(|ts| gate.filter(cue("A"), ts).output)
        .collect();

    assert_eq!(outputs, vec![None, None, cue("A"), cue("A")]);
}

#[test]
fn test_min_hold_blocks_stable_competitor() {
    let mut gate = gate(3, 3000, 5000);
    for _ in 0..3 {
        gate.filter(cue("A"), 0);
    }
    assert_eq!(gate.current(), cue("A").as_ref());

    for ts in [800, 900, 1000, 1500, 2000, 2999] {
        let decision = gate.filter(cue("B"), ts);
        assert_eq!(decision.output, cue("A"), "B displaced A at {ts}ms");
        assert_eq!(decision.reason, GateReason::Hold);
    }

    let decision = gate.filter(cue("B"), 3000);
    assert!(decision.changed);
    assert_eq!(decision.output, cue("B"));
}

#[test]
fn test_displaced_cue_waits_for_cooldown() {
    let mut gate = gate(2, 0, 1000);
    gate.filter(cue("A"), 0);
    gate.filter(cue("A"), 10);
    gate.filter(cue("B"), 20);
    let displaced_at = 30;
    assert!(gate.filter(cue("B"), displaced_at).changed);
    assert_eq!(gate.cooldown_expiry("A"), Some(displaced_at + 1000));

    // A is now the only stable candidate, but it was displaced at 30ms.
    for ts in (40..1030).step_by(50) {
        let decision = gate.filter(cue("A"), ts);
        assert_eq!(decision.output, cue("B"), "A re-selected at {ts}ms");
        assert_eq!(decision.reason, GateReason::Cooldown);
    }

    let decision = gate.filter(cue("A"), 1030);
    assert_eq!(decision.output, cue("A"));
    assert!(decision.changed);
}

#[test]
fn test_transient_reading_never_shown() {
    let mut gate = gate(3, 0, 0);
    let inputs = [cue("A"), cue("A"), None, cue("A"), cue("A"), None];
    for (i, input) in inputs.into_iter().enumerate() {
        let expected_reason = if input.is_some() {
            GateReason::Frames
        } else {
            GateReason::None
        };
        let decision = gate.filter(input, i as u64 * 33);
        assert_eq!(decision.output, None);
        assert_eq!(decision.reason, expected_reason);
    }
}

#[test]
fn test_hold_applies_before_clearing() {
    let mut gate = gate(1, 500, 0);
    gate.filter(cue("A"), 0);
    let decision = gate.filter(None, 200);
    assert_eq!(decision.reason, GateReason::Hold);
    assert_eq!(decision.output, cue("A"));

    let decision = gate.filter(None, 500);
    assert!(decision.changed);
    assert_eq!(decision.output, None);
}

#[test]
fn test_output_changes_at_most_once_per_hold_window() {
    let mut gate = gate(1, 1000, 0);
    let mut change_times = Vec::new();
    for step in 0..100u64 {
        let input = if step % 2 == 0 { cue("A") } else { cue("B") };
        let ts = step * 50;
        if gate.filter(input, ts).changed {
            change_times.push(ts);
        }
    }

    assert!(change_times.len() > 1);
    for pair in change_times.windows(2) {
        assert!(pair[1] - pair[0] >= 1000, "changes at {:?}", pair);
    }
}
