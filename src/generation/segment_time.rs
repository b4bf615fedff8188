//! Initial segment durations from kinematic heuristics
//!
//! These are first guesses used to set up the optimization; they are not
//! refined by the optimizer afterwards.

use crate::error::{Result, TrajectoryError};
use crate::generation::vertex::Vertex;
use std::fmt::Debug;

/// Durations shorter than this are raised to it unless configured otherwise
pub const DEFAULT_MIN_SEGMENT_TIME: f64 = 0.1;

/// Trait for segment time heuristics
pub trait SegmentTimeEstimator: Debug + Send + Sync {
    /// Duration for a straight-line distance
    fn segment_time(&self, distance: f64) -> f64;

    /// Get the name of this estimator
    fn name(&self) -> &str;

    /// One duration per consecutive vertex pair
    fn estimate(&self, vertices: &[Vertex]) -> Result<Vec<f64>> {
        if vertices.len() < 2 {
            return Err(TrajectoryError::InsufficientWaypoints(vertices.len()));
        }

        let mut times = Vec::with_capacity(vertices.len() - 1);
        for pair in vertices.windows(2) {
            let start = pair[0].position().ok_or(TrajectoryError::DimensionMismatch {
                expected: pair[0].dimension(),
                actual: 0,
            })?;
            let end = pair[1].position().ok_or(TrajectoryError::DimensionMismatch {
                expected: pair[1].dimension(),
                actual: 0,
            })?;
            if start.len() != end.len() {
                return Err(TrajectoryError::DimensionMismatch {
                    expected: start.len(),
                    actual: end.len(),
                });
            }
            times.push(self.segment_time((end - start).norm()));
        }

        tracing::debug!("{} segment times: {:?}", self.name(), times);
        Ok(times)
    }
}

fn check_limits(v_max: f64, a_max: f64) -> Result<()> {
    let valid = |x: f64| x.is_finite() && x > 0.0;
    if !valid(v_max) || !valid(a_max) {
        return Err(TrajectoryError::InvalidLimits { v_max, a_max });
    }
    Ok(())
}

/// Velocity-limited travel time with an exponential correction that
/// stretches short segments so they are not traversed unrealistically fast.
///
/// In normalised distance `x = 2d / v_max` the raw estimate is
/// `t(x) = x (1 + k e^-x)` with `k = tuning * v_max / a_max`. For `k > e^2`
/// it rises to a local peak, dips and rises again; past the peak the
/// duration is held at the peak value so longer segments never get less
/// time.
#[derive(Debug, Clone)]
pub struct NfabianEstimator {
    v_max: f64,
    gain: f64,
    /// `(x, t(x))` at the local peak, when there is one
    peak: Option<(f64, f64)>,
    min_segment_time: f64,
}

impl NfabianEstimator {
    /// Create an estimator; fails if either limit is not strictly positive
    /// or the tuning constant is negative
    pub fn new(v_max: f64, a_max: f64, tuning: f64) -> Result<Self> {
        check_limits(v_max, a_max)?;
        if !(tuning.is_finite() && tuning >= 0.0) {
            return Err(TrajectoryError::InvalidTuning(tuning));
        }
        let gain = tuning * v_max / a_max;
        Ok(NfabianEstimator {
            v_max,
            gain,
            peak: local_peak(gain).map(|x| (x, raw_nfabian(x, gain))),
            min_segment_time: DEFAULT_MIN_SEGMENT_TIME,
        })
    }

    /// Override the lower bound on any single duration
    pub fn with_min_segment_time(mut self, min_segment_time: f64) -> Self {
        self.min_segment_time = min_segment_time.max(f64::EPSILON);
        self
    }
}

fn raw_nfabian(x: f64, gain: f64) -> f64 {
    x * (1.0 + gain * (-x).exp())
}

/// First stationary point of `x (1 + k e^-x)`, found by bisection.
///
/// The slope `1 + k e^-x (1 - x)` is smallest at `x = 2`, so the curve is
/// monotone unless the slope is negative there; the peak then lies in
/// `(1, 2)`.
fn local_peak(gain: f64) -> Option<f64> {
    let slope = |x: f64| 1.0 + gain * (-x).exp() * (1.0 - x);
    if slope(2.0) >= 0.0 {
        return None;
    }
    let (mut lo, mut hi) = (1.0, 2.0);
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if slope(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Some(lo)
}

impl SegmentTimeEstimator for NfabianEstimator {
    fn segment_time(&self, distance: f64) -> f64 {
        let cruise = 2.0 * distance / self.v_max;
        let mut t = raw_nfabian(cruise, self.gain);
        if let Some((x_peak, t_peak)) = self.peak {
            if cruise > x_peak {
                t = t.max(t_peak);
            }
        }
        t.max(self.min_segment_time)
    }

    fn name(&self) -> &str {
        "nfabian"
    }
}

/// Trapezoidal velocity ramp: accelerate at `a_max` to `v_max`, cruise,
/// decelerate. Short segments never reach cruise speed.
#[derive(Debug, Clone)]
pub struct VelocityRampEstimator {
    v_max: f64,
    a_max: f64,
    min_segment_time: f64,
}

impl VelocityRampEstimator {
    pub fn new(v_max: f64, a_max: f64) -> Result<Self> {
        check_limits(v_max, a_max)?;
        Ok(VelocityRampEstimator {
            v_max,
            a_max,
            min_segment_time: DEFAULT_MIN_SEGMENT_TIME,
        })
    }

    pub fn with_min_segment_time(mut self, min_segment_time: f64) -> Self {
        self.min_segment_time = min_segment_time.max(f64::EPSILON);
        self
    }
}

impl SegmentTimeEstimator for VelocityRampEstimator {
    fn segment_time(&self, distance: f64) -> f64 {
        let ramp_distance = self.v_max * self.v_max / self.a_max;
        let t = if distance < ramp_distance {
            2.0 * (distance / self.a_max).sqrt()
        } else {
            distance / self.v_max + self.v_max / self.a_max
        };
        t.max(self.min_segment_time)
    }

    fn name(&self) -> &str {
        "velocity_ramp"
    }
}

/// Estimate segment times with the default heuristic
pub fn estimate_segment_times(
    vertices: &[Vertex],
    v_max: f64,
    a_max: f64,
    tuning: f64,
) -> Result<Vec<f64>> {
    NfabianEstimator::new(v_max, a_max, tuning)?.estimate(vertices)
}
