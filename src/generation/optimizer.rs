//! Minimum-derivative polynomial optimization
//!
//! Each segment polynomial with `N` coefficients is fully described by the
//! derivatives of orders `0..N/2` at its two end points. Adjacent segments
//! share the derivative block of their common vertex, which makes the
//! trajectory continuous up to order `N/2 - 1` by construction. Derivatives
//! fixed by vertex constraints are known; the remaining ones minimise the
//! summed squared integral of the target derivative, a quadratic problem
//! solved in closed form.
//!
//! Segments are set up in normalised time `tau = t / T` so the linear
//! algebra does not see powers of the raw durations.

use crate::common::types::DerivativeOrder;
use crate::error::{Result, TrajectoryError};
use crate::generation::vertex::Vertex;
use crate::trajectory::polynomial::{basis_row, cost_matrix, Polynomial};
use crate::trajectory::{Segment, Trajectory};
use nalgebra::{DMatrix, DVector};

/// Default coefficient count, snap-continuous when optimizing acceleration
pub const DEFAULT_COEFFICIENT_COUNT: usize = 10;

/// Linear solver for piecewise polynomial trajectories
#[derive(Debug, Clone)]
pub struct PolynomialOptimizer {
    dimension: usize,
    coefficient_count: usize,
    optimize_order: DerivativeOrder,
}

impl PolynomialOptimizer {
    /// Create an optimizer.
    ///
    /// `coefficient_count` must be even and at least
    /// `2 * (optimize_order + 1)`.
    pub fn new(
        dimension: usize,
        coefficient_count: usize,
        optimize_order: DerivativeOrder,
    ) -> Result<Self> {
        if coefficient_count % 2 != 0 {
            return Err(TrajectoryError::SolverDegenerate(format!(
                "coefficient count {} is odd",
                coefficient_count
            )));
        }
        if coefficient_count < 2 * (optimize_order.order() + 1) {
            return Err(TrajectoryError::SolverDegenerate(format!(
                "{} coefficients cannot optimize {}",
                coefficient_count, optimize_order
            )));
        }
        Ok(PolynomialOptimizer {
            dimension,
            coefficient_count,
            optimize_order,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn coefficient_count(&self) -> usize {
        self.coefficient_count
    }

    /// Highest derivative order kept continuous across vertices
    pub fn continuity_order(&self) -> usize {
        self.coefficient_count / 2 - 1
    }

    /// Solve for the trajectory through `vertices` with the given segment
    /// durations.
    pub fn solve(&self, vertices: &[Vertex], segment_times: &[f64]) -> Result<Trajectory> {
        self.check_inputs(vertices, segment_times)?;

        let n = self.coefficient_count;
        let per_vertex = n / 2;
        let r = self.optimize_order.order();
        let slot_count = vertices.len() * per_vertex;

        // Map from the endpoint derivatives of a unit-duration segment to
        // its coefficients.
        let unit_inverse = unit_endpoint_map(n)
            .try_inverse()
            .ok_or_else(|| TrajectoryError::SolverDegenerate("endpoint map is singular".into()))?;
        let unit_cost = unit_inverse.transpose() * cost_matrix(n, 1.0, r) * &unit_inverse;

        // Cost of the whole trajectory as a quadratic form over all slots
        let mut cost = DMatrix::<f64>::zeros(slot_count, slot_count);
        for (s, &duration) in segment_times.iter().enumerate() {
            let scale = time_scaling(per_vertex, duration);
            let segment_cost = &scale * &unit_cost * &scale * duration.powi(1 - 2 * r as i32);
            let offset = s * per_vertex;
            let mut block = cost.view_mut((offset, offset), (n, n));
            block += segment_cost;
        }

        // Partition the slots into fixed and free
        let mut fixed_slots = Vec::new();
        let mut free_slots = Vec::new();
        for (v, vertex) in vertices.iter().enumerate() {
            for k in 0..per_vertex {
                let slot = v * per_vertex + k;
                match DerivativeOrder::from_order(k).filter(|o| vertex.has_constraint(*o)) {
                    Some(_) => fixed_slots.push(slot),
                    None => free_slots.push(slot),
                }
            }
        }

        let mut fixed_values = DMatrix::<f64>::zeros(fixed_slots.len(), self.dimension);
        for (row, &slot) in fixed_slots.iter().enumerate() {
            let vertex = &vertices[slot / per_vertex];
            if let Some(value) = DerivativeOrder::from_order(slot % per_vertex)
                .and_then(|o| vertex.constraint(o))
            {
                fixed_values.set_row(row, &value.transpose());
            }
        }

        let free_values = if free_slots.is_empty() {
            DMatrix::<f64>::zeros(0, self.dimension)
        } else {
            let free_cost = cost.select_rows(&free_slots).select_columns(&free_slots);
            let coupling = cost.select_rows(&fixed_slots).select_columns(&free_slots);
            let rhs = -(coupling.transpose() * &fixed_values);
            solve_symmetric(free_cost, rhs)?
        };

        tracing::debug!(
            "Solved {} free of {} derivative slots over {} segments",
            free_slots.len(),
            slot_count,
            segment_times.len()
        );

        // Scatter back into one derivative table, slot x dimension
        let mut derivatives = DMatrix::<f64>::zeros(slot_count, self.dimension);
        for (row, &slot) in fixed_slots.iter().enumerate() {
            derivatives.set_row(slot, &fixed_values.row(row));
        }
        for (row, &slot) in free_slots.iter().enumerate() {
            derivatives.set_row(slot, &free_values.row(row));
        }

        let mut segments = Vec::with_capacity(segment_times.len());
        for (s, &duration) in segment_times.iter().enumerate() {
            let scale = time_scaling(per_vertex, duration);
            let endpoint = derivatives.rows(s * per_vertex, n);
            let normalized = &unit_inverse * (&scale * endpoint);
            let polynomials = (0..self.dimension)
                .map(|d| {
                    Polynomial::new(DVector::from_fn(n, |power, _| {
                        normalized[(power, d)] / duration.powi(power as i32)
                    }))
                })
                .collect();
            segments.push(Segment::new(duration, polynomials)?);
        }

        Trajectory::new(segments)
    }

    fn check_inputs(&self, vertices: &[Vertex], segment_times: &[f64]) -> Result<()> {
        if vertices.len() < 2 {
            return Err(TrajectoryError::InsufficientWaypoints(vertices.len()));
        }
        if let Some(bad) = vertices.iter().find(|v| v.dimension() != self.dimension) {
            return Err(TrajectoryError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.dimension(),
            });
        }
        for vertex in vertices {
            if let Some((_, value)) = vertex.constraints().find(|(_, v)| v.len() != self.dimension)
            {
                return Err(TrajectoryError::DimensionMismatch {
                    expected: self.dimension,
                    actual: value.len(),
                });
            }
            if let Some((order, _)) = vertex
                .constraints()
                .find(|(o, _)| o.order() > self.continuity_order())
            {
                return Err(TrajectoryError::SolverDegenerate(format!(
                    "{} constraint needs more than {} coefficients",
                    order, self.coefficient_count
                )));
            }
        }
        if segment_times.len() != vertices.len() - 1 {
            return Err(TrajectoryError::SolverDegenerate(format!(
                "{} segment times for {} vertices",
                segment_times.len(),
                vertices.len()
            )));
        }
        if let Some(bad) = segment_times.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
            return Err(TrajectoryError::SolverDegenerate(format!(
                "segment time {} is not positive",
                bad
            )));
        }
        Ok(())
    }
}

/// Rows: derivatives `0..n/2` at tau = 0, then at tau = 1
fn unit_endpoint_map(n: usize) -> DMatrix<f64> {
    let half = n / 2;
    let mut map = DMatrix::<f64>::zeros(n, n);
    for k in 0..half {
        map.set_row(k, &basis_row(n, 0.0, k));
        map.set_row(half + k, &basis_row(n, 1.0, k));
    }
    map
}

/// Converts real-time endpoint derivatives to normalised time: the k-th
/// derivative scales by `duration^k`.
fn time_scaling(per_vertex: usize, duration: f64) -> DMatrix<f64> {
    DMatrix::from_diagonal(&DVector::from_fn(2 * per_vertex, |i, _| {
        duration.powi((i % per_vertex) as i32)
    }))
}

/// Solve `a x = b` for symmetric positive definite `a`, falling back to LU
/// when Cholesky rejects it.
fn solve_symmetric(a: DMatrix<f64>, b: DMatrix<f64>) -> Result<DMatrix<f64>> {
    let solution = match a.clone().cholesky() {
        Some(cholesky) => Some(cholesky.solve(&b)),
        None => a.lu().solve(&b),
    };
    match solution {
        Some(x) if x.iter().all(|v| v.is_finite()) => Ok(x),
        _ => Err(TrajectoryError::SolverDegenerate(
            "free derivative system is singular".to_string(),
        )),
    }
}

/// Convenience wrapper: build an optimizer and solve in one call
pub fn solve_linear(
    vertices: &[Vertex],
    segment_times: &[f64],
    dimension: usize,
    coefficient_count: usize,
    optimize_order: DerivativeOrder,
) -> Result<Trajectory> {
    PolynomialOptimizer::new(dimension, coefficient_count, optimize_order)?
        .solve(vertices, segment_times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::segment_time::estimate_segment_times;
    use crate::generation::vertex::build_vertices;

    const TOLERANCE: f64 = 1e-6;

    fn vertices(raw: &[[f64; 3]], order: DerivativeOrder) -> Vec<Vertex> {
        let wps: Vec<_> = raw.iter().map(|p| DVector::from_row_slice(p)).collect();
        build_vertices(&wps, 3, order).unwrap()
    }

    fn assert_close(a: &DVector<f64>, b: &DVector<f64>) {
        assert!((a - b).norm() < TOLERANCE, "{} != {}", a, b);
    }

    #[test]
    fn interpolates_vertex_constraints() {
        let order = DerivativeOrder::Acceleration;
        let vs = vertices(
            &[[0.0, 0.0, 0.0], [2.0, 1.0, 0.5], [4.0, -1.0, 1.0], [5.0, 3.0, 0.0]],
            order,
        );
        let times = estimate_segment_times(&vs, 1.0, 3.0, 6.5).unwrap();
        let trajectory = solve_linear(&vs, &times, 3, 10, order).unwrap();
        assert_eq!(trajectory.segments().len(), 3);

        for (vertex, t) in vs.iter().zip(trajectory.vertex_times()) {
            for (o, value) in vertex.constraints() {
                assert_close(&trajectory.evaluate(t, o.order()).unwrap(), value);
            }
        }
    }

    #[test]
    fn continuous_at_internal_vertices() {
        let order = DerivativeOrder::Acceleration;
        let vs = vertices(
            &[[0.0, 0.0, 0.0], [1.0, 2.0, 0.0], [3.0, 2.0, 0.0], [4.0, 0.0, 0.0]],
            order,
        );
        let times = estimate_segment_times(&vs, 1.0, 3.0, 6.5).unwrap();
        let optimizer = PolynomialOptimizer::new(3, 10, order).unwrap();
        let trajectory = optimizer.solve(&vs, &times).unwrap();

        let segments = trajectory.segments();
        for pair in segments.windows(2) {
            for k in 0..=optimizer.continuity_order() {
                let left = pair[0].evaluate(pair[0].duration(), k);
                let right = pair[1].evaluate(0.0, k);
                let scale = 1.0 + left.norm();
                assert!((left - right).norm() / scale < TOLERANCE, "order {}", k);
            }
        }
    }

    #[test]
    fn rest_to_rest_is_symmetric() {
        let order = DerivativeOrder::Acceleration;
        let vs = vertices(&[[0.0, 0.0, 0.0], [4.0, 0.0, 0.0]], order);
        let trajectory = solve_linear(&vs, &[4.0], 3, 10, order).unwrap();
        let mid = trajectory.evaluate(2.0, 0).unwrap();
        assert_close(&mid, &DVector::from_vec(vec![2.0, 0.0, 0.0]));
        // Peak speed at the middle, positive along x
        assert!(trajectory.evaluate(2.0, 1).unwrap()[0] > 1.0);
    }

    #[test]
    fn free_derivatives_minimise_cost() {
        let order = DerivativeOrder::Acceleration;
        let vs = vertices(&[[0.0, 0.0, 0.0], [5.0, 0.0, 0.0], [10.0, 0.0, 0.0]], order);
        let times = vec![4.0, 4.0];
        let optimal = solve_linear(&vs, &times, 3, 10, order).unwrap();
        let best = optimal.cost(order.order());

        let through = optimal.evaluate(4.0, 1).unwrap();
        let mut perturbed_vertices = vs.clone();
        let mut velocity = through.clone();
        velocity[0] += 0.3;
        perturbed_vertices[1]
            .add_constraint(DerivativeOrder::Velocity, velocity)
            .unwrap();
        let perturbed = solve_linear(&perturbed_vertices, &times, 3, 10, order).unwrap();
        assert!(perturbed.cost(order.order()) > best);

        // Pinning the middle velocity to its optimum reproduces the optimum
        let mut pinned_vertices = vs.clone();
        pinned_vertices[1]
            .add_constraint(DerivativeOrder::Velocity, through)
            .unwrap();
        let pinned = solve_linear(&pinned_vertices, &times, 3, 10, order).unwrap();
        assert!((pinned.cost(order.order()) - best).abs() < 1e-6 * (1.0 + best));
    }

    #[test]
    fn planar_jerk_trajectory() {
        let wps = vec![
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![1.0, 1.0]),
            DVector::from_vec(vec![2.0, 0.0]),
        ];
        let order = DerivativeOrder::Jerk;
        let vs = build_vertices(&wps, 2, order).unwrap();
        let trajectory = solve_linear(&vs, &[2.0, 2.0], 2, 10, order).unwrap();
        assert_eq!(trajectory.dimension(), 2);
        assert_close(&trajectory.evaluate(2.0, 0).unwrap(), &wps[1]);
        assert_close(&trajectory.evaluate(4.0, 2).unwrap(), &DVector::zeros(2));
    }

    #[test]
    fn rejects_bad_setup() {
        let order = DerivativeOrder::Acceleration;
        assert!(matches!(
            PolynomialOptimizer::new(3, 9, order),
            Err(TrajectoryError::SolverDegenerate(_))
        ));
        assert!(matches!(
            PolynomialOptimizer::new(3, 4, order),
            Err(TrajectoryError::SolverDegenerate(_))
        ));

        let vs = vertices(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]], order);
        let optimizer = PolynomialOptimizer::new(3, 10, order).unwrap();
        assert!(matches!(
            optimizer.solve(&vs, &[0.0]),
            Err(TrajectoryError::SolverDegenerate(_))
        ));
        assert!(matches!(
            optimizer.solve(&vs, &[1.0, 1.0]),
            Err(TrajectoryError::SolverDegenerate(_))
        ));

        let planar = PolynomialOptimizer::new(2, 10, order).unwrap();
        assert!(matches!(
            planar.solve(&vs, &[1.0]),
            Err(TrajectoryError::DimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn unpinned_interior_vertex_follows_cost() {
        let order = DerivativeOrder::Velocity;
        let mut vs = vertices(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]], order);
        vs[1] = Vertex::new(3);
        let trajectory = solve_linear(&vs, &[1.0, 1.0], 3, 4, order).unwrap();
        assert!((trajectory.evaluate(1.0, 0).unwrap()[0] - 1.0).abs() < TOLERANCE);
    }
}
