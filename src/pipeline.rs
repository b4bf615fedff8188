//! One full waypoint-to-markers run
//!
//! Every invocation rebuilds vertices, segment times and the trajectory
//! from scratch; nothing is carried over between runs.

use crate::common::types::Waypoint;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::generation::optimizer::PolynomialOptimizer;
use crate::generation::vertex::{build_vertices, Vertex};
use crate::trajectory::Trajectory;
use crate::visualization::decimator::Decimator;
use crate::visualization::markers::{draw_vertices, MarkerBatch};
use nalgebra::DVector;
use std::time::Instant;

/// Everything produced by a successful run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub vertices: Vec<Vertex>,
    pub segment_times: Vec<f64>,
    pub trajectory: Trajectory,
    /// Configured single-instant sample; `None` when the time lies outside
    /// the trajectory
    pub sample: Option<DVector<f64>>,
    /// Configured range samples as `(time, value)`, clipped to the
    /// trajectory's time span
    pub range: Vec<(f64, DVector<f64>)>,
    pub markers: MarkerBatch,
}

/// Stateless trajectory generation pipeline
#[derive(Debug, Clone)]
pub struct TrajectoryPipeline {
    config: PipelineConfig,
}

impl TrajectoryPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        TrajectoryPipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline on one waypoint snapshot.
    ///
    /// Fewer than two waypoints is not an error: the run is skipped and
    /// `Ok(None)` returned. A failure while building or solving the
    /// trajectory discards the whole output; the configured samples never
    /// do, so markers are produced for trajectories of any length.
    pub fn run(&self, waypoints: &[Waypoint]) -> Result<Option<PipelineOutput>> {
        if waypoints.len() < 2 {
            tracing::debug!(
                "Skipping trajectory generation with {} waypoint(s)",
                waypoints.len()
            );
            return Ok(None);
        }

        let started = Instant::now();
        let generation = &self.config.generation;

        let positions = waypoints
            .iter()
            .map(|w| w.position(generation.dimension))
            .collect::<Result<Vec<_>>>()?;
        let vertices = build_vertices(&positions, generation.dimension, generation.optimize_order)?;
        let segment_times = generation.estimator()?.estimate(&vertices)?;

        let optimizer = PolynomialOptimizer::new(
            generation.dimension,
            generation.coefficient_count,
            generation.optimize_order,
        )?;
        let trajectory = optimizer.solve(&vertices, &segment_times)?;
        let solved = started.elapsed();

        let sample = self.configured_sample(&trajectory);
        let range = self.configured_range(&trajectory);

        let visualization = &self.config.visualization;
        let points = trajectory.sample_points(visualization.sampling_interval)?;
        let mut markers = Decimator::new(visualization.marker_spacing, &visualization.frame_id)?
            .decimate(&points);
        markers
            .markers
            .extend(draw_vertices(&vertices, &visualization.frame_id)?.markers);

        tracing::info!(
            "Generated {:.2}s trajectory over {} segments (solve {:?}, total {:?})",
            trajectory.max_time(),
            segment_times.len(),
            solved,
            started.elapsed()
        );

        Ok(Some(PipelineOutput {
            vertices,
            segment_times,
            trajectory,
            sample,
            range,
            markers,
        }))
    }

    fn configured_sample(&self, trajectory: &Trajectory) -> Option<DVector<f64>> {
        let sampling = &self.config.sampling;
        match trajectory.evaluate(sampling.sample_time, sampling.sample_derivative.order()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Skipping configured sample: {}", e);
                None
            }
        }
    }

    fn configured_range(&self, trajectory: &Trajectory) -> Vec<(f64, DVector<f64>)> {
        let sampling = &self.config.sampling;
        let start = sampling.range_start.max(trajectory.min_time());
        let end = sampling.range_end.min(trajectory.max_time());
        if start > end {
            tracing::warn!(
                "Sample range [{}, {}] lies outside the {:.2}s trajectory",
                sampling.range_start,
                sampling.range_end,
                trajectory.max_time()
            );
            return Vec::new();
        }
        if start != sampling.range_start || end != sampling.range_end {
            tracing::debug!("Clipped sample range to [{}, {}]", start, end);
        }
        match trajectory.evaluate_range(start, end, sampling.range_step, sampling.range_derivative.order()) {
            Ok(samples) => samples.collect(),
            Err(e) => {
                tracing::warn!("Skipping configured range: {}", e);
                Vec::new()
            }
        }
    }
}
