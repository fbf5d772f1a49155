//! Error types for the pose guidance library.
//!
//! Only configuration loading and trace parsing fail with these errors.
//! Per-frame evaluation never errors: unusable metrics are folded into
//! `Level::None` or a missing-data blocker instead.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration document could not be parsed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration declares a version this engine was not built against
    #[error("Configuration version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Version the engine supports
        expected: String,
        /// Version declared by the document
        found: String,
    },

    /// A cue reads a metric that the configuration never declares
    #[error("Cue '{cue}' references undefined metric '{metric}'")]
    UnknownMetric {
        /// Offending cue id
        cue: String,
        /// Metric id it references
        metric: String,
    },

    /// A threshold rule has an unknown operator or a missing/invalid operand
    #[error("Malformed threshold rule: {0}")]
    MalformedRule(String),

    /// Any other configuration problem
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A recorded trace line could not be decoded
    #[error("Trace error at line {line}: {message}")]
    TraceError {
        /// 1-based line number in the trace file
        line: usize,
        /// Decoder message
        message: String,
    },
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
