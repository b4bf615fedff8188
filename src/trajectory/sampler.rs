//! Dense sampling of trajectories

use super::Trajectory;
use crate::common::types::{to_vector3, DerivativeOrder};
use crate::error::{Result, TrajectoryError};
use nalgebra::{DVector, Vector3};
use serde::Serialize;

/// Slack on the span/step ratio so that e.g. 8.0 / 0.01 still counts 801
/// samples despite rounding instead of 802.
const STEP_RATIO_TOLERANCE: f64 = 1e-9;

/// Lazy `(time, value)` samples at `start + i * dt`, the last one clamped
/// to `end`.
///
/// Cloning yields an independent cursor, so a range can be replayed.
#[derive(Debug, Clone)]
pub struct RangeSamples<'a> {
    trajectory: &'a Trajectory,
    start: f64,
    end: f64,
    dt: f64,
    derivative: usize,
    index: usize,
    count: usize,
}

impl<'a> RangeSamples<'a> {
    fn time_at(&self, i: usize) -> f64 {
        (self.start + i as f64 * self.dt).min(self.end)
    }
}

impl<'a> Iterator for RangeSamples<'a> {
    type Item = (f64, DVector<f64>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let t = self.time_at(self.index);
        self.index += 1;
        Some((t, self.trajectory.evaluate_in_range(t, self.derivative)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count - self.index;
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for RangeSamples<'a> {}

/// Full flat state at one instant, lifted to 3D
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrajectoryPoint {
    pub time: f64,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub acceleration: Vector3<f64>,
}

impl Trajectory {
    /// Samples of one derivative over `[t_start, t_end]` every `dt`.
    ///
    /// Yields `ceil((t_end - t_start) / dt) + 1` samples covering both ends.
    pub fn evaluate_range(
        &self,
        t_start: f64,
        t_end: f64,
        dt: f64,
        derivative: usize,
    ) -> Result<RangeSamples<'_>> {
        let finite = t_start.is_finite() && t_end.is_finite() && dt.is_finite();
        if !finite || t_end < t_start || dt <= 0.0 {
            return Err(TrajectoryError::InvalidRange {
                start: t_start,
                end: t_end,
                dt,
            });
        }
        let (min, max) = (self.min_time(), self.max_time());
        if t_start < min {
            return Err(TrajectoryError::TimeOutOfRange { t: t_start, min, max });
        }
        if t_end > max {
            return Err(TrajectoryError::TimeOutOfRange { t: t_end, min, max });
        }

        let steps = ((t_end - t_start) / dt - STEP_RATIO_TOLERANCE).ceil().max(0.0) as usize;
        Ok(RangeSamples {
            trajectory: self,
            start: t_start,
            end: t_end,
            dt,
            derivative,
            index: 0,
            count: steps + 1,
        })
    }

    /// Position, velocity and acceleration over the whole trajectory
    pub fn sample_points(&self, dt: f64) -> Result<Vec<TrajectoryPoint>> {
        let (min, max) = (self.min_time(), self.max_time());
        let positions = self.evaluate_range(min, max, dt, DerivativeOrder::Position.order())?;
        let velocities = self.evaluate_range(min, max, dt, DerivativeOrder::Velocity.order())?;
        let accelerations =
            self.evaluate_range(min, max, dt, DerivativeOrder::Acceleration.order())?;

        Ok(positions
            .zip(velocities)
            .zip(accelerations)
            .map(|(((time, p), (_, v)), (_, a))| TrajectoryPoint {
                time,
                position: to_vector3(&p),
                velocity: to_vector3(&v),
                acceleration: to_vector3(&a),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trajectory::polynomial::Polynomial;
    use crate::trajectory::Segment;

    fn parabola() -> Trajectory {
        // x = t^2 on [0, 10]
        let x = Polynomial::new(DVector::from_vec(vec![0.0, 0.0, 1.0]));
        let y = Polynomial::new(DVector::from_vec(vec![1.0, 0.0, 0.0]));
        Trajectory::new(vec![Segment::new(10.0, vec![x, y]).unwrap()]).unwrap()
    }

    #[test]
    fn range_count_is_boundary_inclusive() {
        let trajectory = parabola();
        let samples = trajectory.evaluate_range(2.0, 10.0, 0.01, 0).unwrap();
        assert_eq!(samples.len(), 801);
        let collected: Vec<_> = samples.collect();
        assert_eq!(collected.len(), 801);
        assert_eq!(collected[0].0, 2.0);
        assert!((collected[800].0 - 10.0).abs() < 1e-9);
        assert!((collected[800].1[0] - 100.0).abs() < 1e-6);
        assert!(collected.iter().all(|(t, _)| *t <= 10.0));
    }

    #[test]
    fn range_never_passes_end() {
        let trajectory = parabola();
        let times: Vec<f64> = trajectory
            .evaluate_range(0.0, 1.0, 0.3, 0)
            .unwrap()
            .map(|(t, _)| t)
            .collect();
        // ceil(1.0 / 0.3) + 1, the last sample clamped onto the end
        assert_eq!(times.len(), 5);
        assert!((times[3] - 0.9).abs() < 1e-12);
        assert_eq!(times[4], 1.0);
        assert!(times.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn range_is_restartable() {
        let trajectory = parabola();
        let samples = trajectory.evaluate_range(0.0, 5.0, 0.5, 1).unwrap();
        let first: Vec<_> = samples.clone().collect();
        let second: Vec<_> = samples.collect();
        assert_eq!(first, second);

        let again: Vec<_> = trajectory.evaluate_range(0.0, 5.0, 0.5, 1).unwrap().collect();
        assert_eq!(first, again);
        // Velocity of t^2
        assert!((first[2].1[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn single_instant_range() {
        let trajectory = parabola();
        let samples: Vec<_> = trajectory.evaluate_range(3.0, 3.0, 0.1, 0).unwrap().collect();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn invalid_ranges() {
        let trajectory = parabola();
        assert!(matches!(
            trajectory.evaluate_range(5.0, 4.0, 0.1, 0),
            Err(TrajectoryError::InvalidRange { .. })
        ));
        assert!(matches!(
            trajectory.evaluate_range(0.0, 4.0, 0.0, 0),
            Err(TrajectoryError::InvalidRange { .. })
        ));
        assert!(matches!(
            trajectory.evaluate_range(0.0, 11.0, 0.1, 0),
            Err(TrajectoryError::TimeOutOfRange { .. })
        ));
    }

    #[test]
    fn sample_points_reach_the_end() {
        let trajectory = parabola();
        let points = trajectory.sample_points(3.0).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[4].time, 10.0);
        assert_eq!(points[4].position, Vector3::new(100.0, 1.0, 0.0));
    }

    #[test]
    fn flat_states_are_padded_to_3d() {
        let trajectory = parabola();
        let points = trajectory.sample_points(1.0).unwrap();
        assert_eq!(points.len(), 11);
        assert_eq!(points[3].position, Vector3::new(9.0, 1.0, 0.0));
        assert_eq!(points[3].velocity, Vector3::new(6.0, 0.0, 0.0));
        assert_eq!(points[3].acceleration, Vector3::new(2.0, 0.0, 0.0));
    }
}
