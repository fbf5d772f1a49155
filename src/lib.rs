//! Cue decision engine for live pose guidance.
//!
//! This library turns noisy per-frame pose and face metrics into a single,
//! stable guidance cue ("move left", "step back") and a boolean
//! "pose matches target" signal.
//!
//! The pipeline for each frame consists of:
//! 1. Threshold evaluation of every cue against its metric (or its error
//!    relative to a reference target)
//! 2. Mirror-aware error resolution, picking the better fit between the
//!    normal and the horizontally flipped frame
//! 3. Stability confirmation of `hard` and `exit` classifications
//! 4. Deterministic selection of one winning cue
//! 5. Anti-jitter arbitration of what is actually displayed
//! 6. An independent match decision over the required cue dimensions
//!
//! All latency bounds are expressed in caller-supplied timestamps and frame
//! counts, so a recorded trace always replays to the same decisions.
//!
//! # Examples
//!
//! ## Running a session
//!
//! ```
//! use pose_guidance::{
//!     config::{GuidanceConfig, EXAMPLE_CONFIG},
//!     metrics::MetricFrame,
//!     session::{FrameInput, GuidanceSession},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = GuidanceConfig::from_yaml_str(EXAMPLE_CONFIG)?.into_catalog()?;
//! let mut session = GuidanceSession::new(&catalog);
//!
//! for ts in [0, 33, 66] {
//!     let frame = FrameInput {
//!         timestamp_ms: ts,
//!         metrics: MetricFrame::new()
//!             .with("center_x_offset", 0.3)
//!             .with("face_luma", 150.0),
//!         targets: None,
//!     };
//!     let outcome = session.process_frame(&frame);
//!     if let Some(cue) = &outcome.display.output {
//!         println!("Show {} at {}ms", cue, ts);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Picking a cue directly
//!
//! ```
//! use pose_guidance::selector::{pick_one, Candidate};
//!
//! let candidates = vec![
//!     Candidate {
//!         cue_id: "step_back".into(),
//!         priority: 4,
//!         mutex_group: "distance".into(),
//!         error: Some(0.05),
//!         hard_threshold_abs: Some(0.1),
//!     },
//!     Candidate {
//!         cue_id: "level_head".into(),
//!         priority: 3,
//!         mutex_group: "roll".into(),
//!         error: Some(20.0),
//!         hard_threshold_abs: Some(10.0),
//!     },
//! ];
//!
//! let selection = pick_one(&candidates).expect("non-empty input has a winner");
//! assert_eq!(selection.winner.cue_id, "level_head");
//! ```

/// Per-frame metric values and reference targets
pub mod metrics;

/// Threshold rules, rule sets and severity levels
pub mod threshold;

/// Cue definitions and the threshold evaluator
pub mod cue;

/// Mirror-aware error resolution
pub mod mirror;

/// Frame-stability confirmation of `hard` and `exit` readings
pub mod stability;

/// Deterministic single-winner cue selection
pub mod selector;

/// Anti-jitter arbitration of the displayed cue
pub mod anti_jitter;

/// Aggregate pose-match decision
pub mod match_decider;

/// Per-session pipeline joining all stages
pub mod session;

/// Recorded traces and replay
pub mod trace;

/// Error types and result handling
pub mod error;

/// Constants used throughout the engine
pub mod constants;

/// Configuration management
pub mod config;

pub use error::{Error, Result};
