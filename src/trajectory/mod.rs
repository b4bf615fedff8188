//! Piecewise polynomial trajectories
pub mod polynomial;
pub mod sampler;

use self::polynomial::Polynomial;
use crate::error::{Result, TrajectoryError};
use nalgebra::DVector;

pub use self::sampler::{RangeSamples, TrajectoryPoint};

/// One polynomial piece per spatial dimension over a shared duration.
///
/// Polynomials are expressed in segment-local time, `t = 0` at the start
/// of the segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    duration: f64,
    polynomials: Vec<Polynomial>,
}

impl Segment {
    /// Create a segment; all polynomials must share one coefficient count
    pub fn new(duration: f64, polynomials: Vec<Polynomial>) -> Result<Self> {
        let count = polynomials.first().map(Polynomial::coefficient_count);
        if polynomials
            .iter()
            .any(|p| Some(p.coefficient_count()) != count)
        {
            return Err(TrajectoryError::SolverDegenerate(
                "segment polynomials differ in degree".to_string(),
            ));
        }
        if !(duration.is_finite() && duration > 0.0) {
            return Err(TrajectoryError::SolverDegenerate(format!(
                "segment duration {} is not positive",
                duration
            )));
        }
        Ok(Segment {
            duration,
            polynomials,
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn dimension(&self) -> usize {
        self.polynomials.len()
    }

    pub fn coefficient_count(&self) -> usize {
        self.polynomials
            .first()
            .map(Polynomial::coefficient_count)
            .unwrap_or(0)
    }

    /// Evaluate every dimension at local time `t`
    pub fn evaluate(&self, t: f64, derivative: usize) -> DVector<f64> {
        DVector::from_iterator(
            self.polynomials.len(),
            self.polynomials.iter().map(|p| p.evaluate(t, derivative)),
        )
    }

    /// Summed `∫ ||d^k p/dt^k||^2 dt` over the segment
    pub fn cost(&self, derivative: usize) -> f64 {
        self.polynomials
            .iter()
            .map(|p| p.integral_squared_derivative(self.duration, derivative))
            .sum()
    }
}

/// An ordered chain of segments starting at time 0
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    segments: Vec<Segment>,
}

impl Trajectory {
    pub fn new(segments: Vec<Segment>) -> Result<Self> {
        let Some(first) = segments.first() else {
            return Err(TrajectoryError::SolverDegenerate(
                "trajectory has no segments".to_string(),
            ));
        };
        let dimension = first.dimension();
        if let Some(bad) = segments.iter().find(|s| s.dimension() != dimension) {
            return Err(TrajectoryError::DimensionMismatch {
                expected: dimension,
                actual: bad.dimension(),
            });
        }
        Ok(Trajectory { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn dimension(&self) -> usize {
        self.segments[0].dimension()
    }

    pub fn min_time(&self) -> f64 {
        0.0
    }

    /// End time of the last segment
    pub fn max_time(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Start time of every vertex, the final entry being `max_time`
    pub fn vertex_times(&self) -> Vec<f64> {
        let mut times = Vec::with_capacity(self.segments.len() + 1);
        let mut t = 0.0;
        times.push(t);
        for segment in &self.segments {
            t += segment.duration();
            times.push(t);
        }
        times
    }

    /// Evaluate the `derivative`-th derivative at time `t`.
    ///
    /// `t` may equal `max_time`, which evaluates the end of the last
    /// segment.
    pub fn evaluate(&self, t: f64, derivative: usize) -> Result<DVector<f64>> {
        let max = self.max_time();
        if !(t >= self.min_time() && t <= max) {
            return Err(TrajectoryError::TimeOutOfRange {
                t,
                min: self.min_time(),
                max,
            });
        }
        Ok(self.evaluate_in_range(t, derivative))
    }

    /// Evaluation without the range check; callers guarantee `t` lies in
    /// `[min_time, max_time]`.
    pub(crate) fn evaluate_in_range(&self, t: f64, derivative: usize) -> DVector<f64> {
        let last = self.segments.len() - 1;
        let mut local = t;
        for segment in &self.segments[..last] {
            if local < segment.duration() {
                return segment.evaluate(local, derivative);
            }
            local -= segment.duration();
        }
        let segment = &self.segments[last];
        segment.evaluate(local.min(segment.duration()), derivative)
    }

    /// Summed cost of every segment for one derivative order
    pub fn cost(&self, derivative: usize) -> f64 {
        self.segments.iter().map(|s| s.cost(derivative)).sum()
    }
}
