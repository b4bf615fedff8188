//! Error types for trajectory generation

use thiserror::Error;

/// Failures of a single pipeline run.
///
/// None of these are retryable within the run; the next invocation starts
/// from scratch with whatever waypoints are current.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrajectoryError {
    #[error("at least 2 waypoints are required, got {0}")]
    InsufficientWaypoints(usize),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("invalid kinematic limits: v_max={v_max}, a_max={a_max}")]
    InvalidLimits { v_max: f64, a_max: f64 },
    #[error("degenerate linear system: {0}")]
    SolverDegenerate(String),
    #[error("time {t} outside trajectory range [{min}, {max}]")]
    TimeOutOfRange { t: f64, min: f64, max: f64 },
    #[error("tuning constant {0} must be finite and non-negative")]
    InvalidTuning(f64),
    #[error("marker spacing {0} must be finite and non-negative")]
    InvalidSpacing(f64),
    #[error("invalid sampling range: start={start}, end={end}, dt={dt}")]
    InvalidRange { start: f64, end: f64, dt: f64 },
}

pub type Result<T> = std::result::Result<T, TrajectoryError>;
