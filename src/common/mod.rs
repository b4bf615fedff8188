//! Common utilities and types for trajectory generation

/// Common types and utilities used across the codebase
pub mod types {
    use crate::error::TrajectoryError;
    use nalgebra::{DVector, Vector3};
    use serde::{Deserialize, Serialize};
    use std::fmt;

    /// A waypoint as delivered by the mission source.
    ///
    /// `z` is optional; planar missions leave it out and it reads as 0.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Waypoint {
        pub x: f64,
        pub y: f64,
        #[serde(default)]
        pub z: Option<f64>,
    }

    impl Waypoint {
        /// Create a planar waypoint
        pub fn planar(x: f64, y: f64) -> Self {
            Waypoint { x, y, z: None }
        }

        /// Create a waypoint with an explicit altitude
        pub fn spatial(x: f64, y: f64, z: f64) -> Self {
            Waypoint { x, y, z: Some(z) }
        }

        /// Coordinates of this waypoint in a `dimension`-dimensional space.
        ///
        /// A 2D request fails if the waypoint carries a non-zero altitude.
        pub fn position(&self, dimension: usize) -> Result<DVector<f64>, TrajectoryError> {
            match dimension {
                2 => match self.z {
                    Some(z) if z != 0.0 => Err(TrajectoryError::DimensionMismatch {
                        expected: 2,
                        actual: 3,
                    }),
                    _ => Ok(DVector::from_vec(vec![self.x, self.y])),
                },
                3 => Ok(DVector::from_vec(vec![
                    self.x,
                    self.y,
                    self.z.unwrap_or(0.0),
                ])),
                other => Err(TrajectoryError::DimensionMismatch {
                    expected: other,
                    actual: if self.z.is_some() { 3 } else { 2 },
                }),
            }
        }
    }

    /// Derivative orders of a position signal
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum DerivativeOrder {
        Position,
        Velocity,
        Acceleration,
        Jerk,
        Snap,
    }

    impl DerivativeOrder {
        pub const ALL: [DerivativeOrder; 5] = [
            DerivativeOrder::Position,
            DerivativeOrder::Velocity,
            DerivativeOrder::Acceleration,
            DerivativeOrder::Jerk,
            DerivativeOrder::Snap,
        ];

        /// Numeric order (0 for position)
        pub fn order(self) -> usize {
            self as usize
        }

        /// Look up an order by number
        pub fn from_order(order: usize) -> Option<Self> {
            Self::ALL.get(order).copied()
        }

        pub fn name(self) -> &'static str {
            match self {
                DerivativeOrder::Position => "position",
                DerivativeOrder::Velocity => "velocity",
                DerivativeOrder::Acceleration => "acceleration",
                DerivativeOrder::Jerk => "jerk",
                DerivativeOrder::Snap => "snap",
            }
        }
    }

    impl fmt::Display for DerivativeOrder {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.name())
        }
    }

    /// Lift a 2D or 3D vector into 3D space, padding z with 0
    pub fn to_vector3(v: &DVector<f64>) -> Vector3<f64> {
        Vector3::new(
            v.get(0).copied().unwrap_or(0.0),
            v.get(1).copied().unwrap_or(0.0),
            v.get(2).copied().unwrap_or(0.0),
        )
    }
}
