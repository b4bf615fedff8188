//! Trajectory knots and their derivative constraints

use crate::common::types::DerivativeOrder;
use crate::error::{Result, TrajectoryError};
use nalgebra::DVector;
use std::collections::BTreeMap;

/// The state required at one trajectory knot.
///
/// Each derivative order may carry a fixed value; orders without a
/// constraint are left free for the optimizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    dimension: usize,
    constraints: BTreeMap<DerivativeOrder, DVector<f64>>,
}

impl Vertex {
    /// Create an unconstrained vertex
    pub fn new(dimension: usize) -> Self {
        Vertex {
            dimension,
            constraints: BTreeMap::new(),
        }
    }

    /// Create a boundary vertex: position fixed to `position`, every
    /// derivative up to and including `up_to` fixed to zero.
    pub fn start_or_end(position: DVector<f64>, up_to: DerivativeOrder) -> Self {
        let dimension = position.len();
        let mut constraints = BTreeMap::new();
        for order in DerivativeOrder::ALL.iter().copied().filter(|o| *o <= up_to) {
            let value = if order == DerivativeOrder::Position {
                position.clone()
            } else {
                DVector::zeros(dimension)
            };
            constraints.insert(order, value);
        }
        Vertex {
            dimension,
            constraints,
        }
    }

    /// Fix the value of one derivative order
    pub fn add_constraint(&mut self, order: DerivativeOrder, value: DVector<f64>) -> Result<()> {
        if value.len() != self.dimension {
            return Err(TrajectoryError::DimensionMismatch {
                expected: self.dimension,
                actual: value.len(),
            });
        }
        self.constraints.insert(order, value);
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn has_constraint(&self, order: DerivativeOrder) -> bool {
        self.constraints.contains_key(&order)
    }

    pub fn constraint(&self, order: DerivativeOrder) -> Option<&DVector<f64>> {
        self.constraints.get(&order)
    }

    /// All constraints in ascending derivative order
    pub fn constraints(&self) -> impl Iterator<Item = (DerivativeOrder, &DVector<f64>)> {
        self.constraints.iter().map(|(order, value)| (*order, value))
    }

    /// The position constraint, if any
    pub fn position(&self) -> Option<&DVector<f64>> {
        self.constraint(DerivativeOrder::Position)
    }
}

/// Turn an ordered waypoint sequence into vertices.
///
/// The first and last waypoints become boundary vertices constrained up to
/// `optimize_order`; interior waypoints only pin position.
pub fn build_vertices(
    waypoints: &[DVector<f64>],
    dimension: usize,
    optimize_order: DerivativeOrder,
) -> Result<Vec<Vertex>> {
    if waypoints.len() < 2 {
        return Err(TrajectoryError::InsufficientWaypoints(waypoints.len()));
    }
    if dimension != 2 && dimension != 3 {
        return Err(TrajectoryError::DimensionMismatch {
            expected: 3,
            actual: dimension,
        });
    }
    if let Some(bad) = waypoints.iter().find(|w| w.len() != dimension) {
        return Err(TrajectoryError::DimensionMismatch {
            expected: dimension,
            actual: bad.len(),
        });
    }

    let last = waypoints.len() - 1;
    let mut vertices = Vec::with_capacity(waypoints.len());
    for (i, waypoint) in waypoints.iter().enumerate() {
        if i == 0 || i == last {
            vertices.push(Vertex::start_or_end(waypoint.clone(), optimize_order));
        } else {
            let mut middle = Vertex::new(dimension);
            middle.add_constraint(DerivativeOrder::Position, waypoint.clone())?;
            vertices.push(middle);
        }
    }

    tracing::debug!(
        "Built {} vertices (dimension {}, optimizing {})",
        vertices.len(),
        dimension,
        optimize_order
    );
    Ok(vertices)
}
