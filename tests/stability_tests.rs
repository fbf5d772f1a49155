//! Stability confirmation fed from real threshold evaluations


use pose_guidance::{
    cue::evaluate,
    metrics::MetricValue,
    stability::{StabilityConfig, StabilityGate, StabilityStatus},
    threshold::Level,
};
use test_helpers::offset_cue;

#[test]
fn test_single_hard_spike_is_suppressed() {
    let cue = offset_cue("move_left", "horizontal", "center_x_offset", 3);
    let mut gate = StabilityGate::default();

    // 0.055 sits between the exit band and the enter threshold.
    let raw: Vec<Level> = [0.055, 0.5, 0.055]
        .into_iter()
        .map(|error| evaluate(&cue, &MetricValue::Value(error), true).level)
        .collect();
    assert_eq!(raw, vec![Level::None, Level::Hard, Level::None]);

    let emitted: Vec<Level> = [0.055, 0.5, 0.055]
        .into_iter()
        .map(|error| {
            let eval = evaluate(&cue, &MetricValue::Value(error), true);
            gate.confirm(&eval).level
        })
        .collect();

    assert_eq!(emitted, vec![Level::None, Level::None, Level::None]);
}

#[test]
fn test_first_exit_frame_is_not_trusted() {
    let cue = offset_cue("level_head", "roll", "head_roll_deg", 2);
    let mut gate = StabilityGate::default();

    let warn = evaluate(&cue, &MetricValue::Value(0.2), true);
    assert_eq!(gate.confirm(&warn).level, Level::Warn);

    let exit = evaluate(&cue, &MetricValue::Value(0.01), true);
    let first = gate.confirm(&exit);
    assert_eq!(first.level, Level::Warn);
    assert_eq!(first.raw_level, Level::Exit);
    assert_eq!(first.status, StabilityStatus::Unstable);

    let second = gate.confirm(&exit);
    assert_eq!(second.level, Level::Exit);
    assert_eq!(second.status, StabilityStatus::Confirmed);
}

#[test]
fn test_unavailable_metric_passes_through_as_none() {
    let cue = offset_cue("step_back", "distance", "face_height_ratio", 2);
    let mut gate = StabilityGate::new(StabilityConfig {
        hard_frames: 3,
        exit_frames: 3,
    });

    let hard = evaluate(&cue, &MetricValue::Value(0.4), true);
    for _ in 0..3 {
        gate.confirm(&hard);
    }
    assert_eq!(gate.confirmed_level(), Level::Hard);

    let missing = evaluate(&cue, &MetricValue::unavailable("missing landmark"), true);
    let result = gate.confirm(&missing);
    assert_eq!(result.level, Level::None);
    assert_eq!(result.status, StabilityStatus::Confirmed);
}
