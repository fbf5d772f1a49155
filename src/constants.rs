//! Constants used throughout the engine

/// Configuration version this engine is built against
pub const SUPPORTED_CONFIG_VERSION: &str = "1";

/// Default consecutive identical inputs before the display cue switches
pub const DEFAULT_PERSIST_FRAMES: u32 = 3;

/// Default minimum time an output is held before any switch is considered
pub const DEFAULT_MIN_HOLD_MS: u64 = 1500;

/// Default time a displaced cue must wait before reclaiming the display
pub const DEFAULT_COOLDOWN_MS: u64 = 2500;

/// Default consecutive frames before a `hard` classification is trusted
pub const DEFAULT_HARD_STABLE_FRAMES: u32 = 2;

/// Default consecutive frames before an `exit` classification is trusted
pub const DEFAULT_EXIT_STABLE_FRAMES: u32 = 2;

/// Default consecutive exit frames a required cue needs before it stops blocking a match
pub const DEFAULT_CUE_PERSIST_FRAMES: u32 = 3;

/// Normalised severity at which a candidate gains +1 priority
pub const SEVERITY_BOOST_LOW: f64 = 1.25;

/// Normalised severity at which a candidate gains +2 priority
pub const SEVERITY_BOOST_HIGH: f64 = 1.75;

/// Ceiling for severity-boosted priority
pub const MAX_EFFECTIVE_PRIORITY: i32 = 6;

/// Reason recorded when a metric key is absent from a frame
pub const REASON_MISSING: &str = "missing";

/// Reason recorded when a metric value is NaN or infinite
pub const REASON_NON_FINITE: &str = "non-finite";

/// Reason recorded when a reference comparison has no target for the metric
pub const REASON_NO_TARGET: &str = "no target";
