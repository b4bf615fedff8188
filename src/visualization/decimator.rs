//! Spatially even marker placement along a sampled trajectory

use super::markers::{style, Marker, MarkerBatch, MarkerCategory};
use crate::error::{Result, TrajectoryError};
use crate::trajectory::TrajectoryPoint;
use nalgebra::{Matrix3, Point3, Rotation3, UnitQuaternion, Vector3};

/// Standard gravity, m/s^2
pub const GRAVITY: f64 = 9.81;

/// Emits pose, velocity and acceleration markers roughly every `spacing`
/// metres of travel, independent of how densely the trajectory was sampled.
#[derive(Debug, Clone)]
pub struct Decimator {
    spacing: f64,
    frame_id: String,
}

impl Decimator {
    /// A spacing of 0 places markers at every sample
    pub fn new(spacing: f64, frame_id: &str) -> Result<Self> {
        if !(spacing.is_finite() && spacing >= 0.0) {
            return Err(TrajectoryError::InvalidSpacing(spacing));
        }
        Ok(Decimator {
            spacing,
            frame_id: frame_id.to_string(),
        })
    }

    pub fn decimate(&self, points: &[TrajectoryPoint]) -> MarkerBatch {
        let mut batch = MarkerBatch::new(&self.frame_id);
        batch.path.reserve(points.len());

        let mut accumulated_distance = 0.0;
        let mut last_position = Vector3::zeros();
        for point in points {
            accumulated_distance += (point.position - last_position).norm();
            batch.path.push(Point3::from(point.position));

            if self.spacing == 0.0 || accumulated_distance > self.spacing {
                accumulated_distance = 0.0;
                push_state_markers(&mut batch, point);
            }
            last_position = point.position;
        }

        tracing::debug!(
            "Decimated {} samples into {} markers",
            points.len(),
            batch.markers.len()
        );
        batch
    }
}

fn push_state_markers(batch: &mut MarkerBatch, point: &TrajectoryPoint) {
    let origin = Point3::from(point.position);
    batch
        .markers
        .push(Marker::pose(origin, flat_orientation(&point.acceleration)));
    batch.markers.push(Marker::arrow(
        MarkerCategory::Velocity,
        origin,
        origin + point.velocity,
        style::VELOCITY_COLOR,
    ));
    batch.markers.push(Marker::arrow(
        MarkerCategory::Acceleration,
        origin,
        origin + point.acceleration,
        style::ACCELERATION_COLOR,
    ));
}

/// Attitude of a multirotor following `acceleration` with zero yaw: the
/// body z axis points along the thrust, acceleration plus gravity.
pub fn flat_orientation(acceleration: &Vector3<f64>) -> UnitQuaternion<f64> {
    let thrust = acceleration + Vector3::z() * GRAVITY;
    let z_body = thrust.try_normalize(1e-9).unwrap_or_else(Vector3::z);
    let y_body = z_body
        .cross(&Vector3::x())
        .try_normalize(1e-9)
        .unwrap_or_else(Vector3::y);
    let x_body = y_body.cross(&z_body);
    let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x_body, y_body, z_body]));
    UnitQuaternion::from_rotation_matrix(&rotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualization::markers::MarkerShape;

    fn straight_line(count: usize, step: f64) -> Vec<TrajectoryPoint> {
        (0..count)
            .map(|i| TrajectoryPoint {
                time: i as f64 * 0.1,
                position: Vector3::new(i as f64 * step, 0.0, 0.0),
                velocity: Vector3::new(1.0, 0.0, 0.0),
                acceleration: Vector3::new(0.0, 0.5, 0.0),
            })
            .collect()
    }

    #[test]
    fn zero_spacing_marks_every_sample() {
        let points = straight_line(25, 0.1);
        let batch = Decimator::new(0.0, "world").unwrap().decimate(&points);
        assert_eq!(batch.path.len(), 25);
        assert_eq!(batch.markers_in(MarkerCategory::Pose).count(), 25);
        assert_eq!(batch.markers_in(MarkerCategory::Velocity).count(), 25);
        assert_eq!(batch.markers_in(MarkerCategory::Acceleration).count(), 25);
    }

    #[test]
    fn spacing_is_respected_along_path() {
        let points = straight_line(200, 0.07);
        let spacing = 1.6;
        let batch = Decimator::new(spacing, "world").unwrap().decimate(&points);
        assert_eq!(batch.path.len(), 200);

        let anchors: Vec<Point3<f64>> = batch
            .markers_in(MarkerCategory::Pose)
            .filter_map(Marker::anchor)
            .collect();
        assert!(anchors.len() >= 5);
        for pair in anchors.windows(2) {
            // Straight line: path distance equals Euclidean distance
            assert!((pair[1] - pair[0]).norm() > spacing);
        }
    }

    #[test]
    fn accumulates_from_origin() {
        // The cursor starts at the origin, so a far first sample is marked
        let points = vec![TrajectoryPoint {
            time: 0.0,
            position: Vector3::new(5.0, 0.0, 0.0),
            velocity: Vector3::zeros(),
            acceleration: Vector3::zeros(),
        }];
        let batch = Decimator::new(1.0, "world").unwrap().decimate(&points);
        assert_eq!(batch.markers.len(), 3);

        let near = vec![TrajectoryPoint {
            position: Vector3::new(0.5, 0.0, 0.0),
            ..points[0]
        }];
        let batch = Decimator::new(1.0, "world").unwrap().decimate(&near);
        assert!(batch.markers.is_empty());
        assert_eq!(batch.path.len(), 1);
    }

    #[test]
    fn arrows_follow_derivatives() {
        let points = straight_line(1, 0.0);
        let batch = Decimator::new(0.0, "world").unwrap().decimate(&points);
        let velocity = batch.markers_in(MarkerCategory::Velocity).next().unwrap();
        match &velocity.shape {
            MarkerShape::Arrow { start, end } => assert_eq!(end - start, Vector3::new(1.0, 0.0, 0.0)),
            _ => panic!("velocity marker is not an arrow"),
        }
    }

    #[test]
    fn hover_orientation_is_level() {
        let q = flat_orientation(&Vector3::zeros());
        assert!(q.angle() < 1e-12);

        let tilted = flat_orientation(&Vector3::new(GRAVITY, 0.0, 0.0));
        let z_body = tilted * Vector3::z();
        assert!((z_body - Vector3::new(1.0, 0.0, 1.0).normalize()).norm() < 1e-9);
    }

    #[test]
    fn rejects_negative_spacing() {
        assert!(Decimator::new(-1.0, "world").is_err());
        assert!(Decimator::new(f64::NAN, "world").is_err());
    }
}
