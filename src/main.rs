//! Replays a recorded metric trace through the cue decision engine.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use pose_guidance::{
    config::{CueCatalog, EXAMPLE_CONFIG},
    session::{FrameOutcome, GuidanceSession},
    trace::{read_trace, replay},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to guidance configuration file (YAML format)
    #[arg(short = 'C', long, required_unless_present = "print_example_config")]
    config: Option<String>,

    /// Recorded trace to replay (JSON lines)
    #[arg(short, long, required_unless_present = "print_example_config")]
    trace: Option<String>,

    /// Emit one JSON outcome per frame instead of a summary line
    #[arg(long)]
    json: bool,

    /// Only print frames where the displayed cue or match state changed
    #[arg(long)]
    changes_only: bool,

    /// Print the example configuration and exit
    #[arg(long)]
    print_example_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_example_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    let config_path = args.config.context("--config is required")?;
    let trace_path = args.trace.context("--trace is required")?;

    // Load configuration and trace
    let catalog = CueCatalog::load(&config_path)
        .with_context(|| format!("Failed to load configuration {config_path}"))?;
    let frames =
        read_trace(&trace_path).with_context(|| format!("Failed to read trace {trace_path}"))?;

    // Replay every frame through a fresh session
    let mut session = GuidanceSession::new(&catalog);
    let outcomes = replay(&mut session, &frames);

    let mut previous_match = false;
    let mut matched_frames = 0usize;
    for outcome in &outcomes {
        let match_changed = outcome.match_result.is_match != previous_match;
        previous_match = outcome.match_result.is_match;
        if outcome.match_result.is_match {
            matched_frames += 1;
        }

        if args.changes_only && !outcome.display.changed && !match_changed {
            continue;
        }

        if args.json {
            println!("{}", serde_json::to_string(outcome)?);
        } else {
            println!("{}", summary_line(outcome));
        }
    }

    info!(
        "Replayed {} frames, {} matched",
        outcomes.len(),
        matched_frames
    );

    Ok(())
}

fn summary_line(outcome: &FrameOutcome) -> String {
    let display = outcome
        .display
        .output
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string);
    let blocked = if outcome.match_result.blocked_by.is_empty() {
        "-".to_string()
    } else {
        outcome.match_result.blocked_by.join(",")
    };

    format!(
        "{:>8}ms  cue={:<24} gate={:<8} match={:<5} mirror={:<5} blocked={}",
        outcome.timestamp_ms,
        display,
        format!("{:?}", outcome.display.reason).to_lowercase(),
        outcome.match_result.is_match,
        outcome.match_result.mirror_applied,
        blocked
    )
}
