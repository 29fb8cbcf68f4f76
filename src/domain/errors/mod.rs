// Domain errors - Per-item failure taxonomy for the sweep

use std::fmt;

/// Domain-specific error types
///
/// Everything except `BadConfig` is local to one spec, one decode run or one
/// sample: callers log it, count it and move on.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainError {
    /// Empty or contradictory configuration (fatal at startup)
    BadConfig(String),
    /// Codec / pixel format / backend triple that cannot work together
    UnsupportedCombination(String),
    /// External encoder could not be spawned or exited non-zero
    EncoderFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    /// Decoder backend failed to produce frames
    DecodeFailed(String),
    /// No decoded frame close enough to a requested timestamp
    TimestampMismatch {
        requested: f64,
        closest: Option<f64>,
        tolerance: f64,
    },
    /// Frames that cannot be compared (size or layout differs)
    FrameMismatch(String),
    /// Dataset directory is missing or malformed
    DatasetInvalid(String),
    /// File system failure
    FsFail(String),
    /// Sample aborted for any other reason (including a worker panic)
    SampleFailed(String),
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainError::BadConfig(msg) => write!(f, "Bad configuration: {}", msg),
            DomainError::UnsupportedCombination(msg) => {
                write!(f, "Unsupported combination: {}", msg)
            }
            DomainError::EncoderFailed {
                command,
                code,
                stderr,
            } => {
                let code = code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "none".to_string());
                write!(
                    f,
                    "Encoder failed (exit code {}): {}\n{}",
                    code,
                    command,
                    stderr.trim_end()
                )
            }
            DomainError::DecodeFailed(msg) => write!(f, "Decode failed: {}", msg),
            DomainError::TimestampMismatch {
                requested,
                closest,
                tolerance,
            } => match closest {
                Some(closest) => write!(
                    f,
                    "No frame within {}s of {:.6}s (closest {:.6}s)",
                    tolerance, requested, closest
                ),
                None => write!(f, "No frame decoded near {:.6}s", requested),
            },
            DomainError::FrameMismatch(msg) => write!(f, "Frame mismatch: {}", msg),
            DomainError::DatasetInvalid(msg) => write!(f, "Invalid dataset: {}", msg),
            DomainError::FsFail(msg) => write!(f, "File system error: {}", msg),
            DomainError::SampleFailed(msg) => write!(f, "Sample failed: {}", msg),
        }
    }
}

impl std::error::Error for DomainError {}
