//! Pipeline configuration
//!
//! Loaded from TOML; every field has a default so a partial file (or none
//! at all) is valid. Individual numeric values can be overridden afterwards
//! with `apply_params`, mirroring node parameters passed on the command
//! line.

use crate::common::types::DerivativeOrder;
use crate::generation::optimizer::DEFAULT_COEFFICIENT_COUNT;
use crate::generation::segment_time::{
    NfabianEstimator, SegmentTimeEstimator, VelocityRampEstimator, DEFAULT_MIN_SEGMENT_TIME,
};
use crate::error::TrajectoryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("unknown parameter {0}")]
    UnknownParameter(String),
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeEstimatorKind {
    Nfabian,
    VelocityRamp,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub generation: GenerationConfig,
    pub sampling: SamplingConfig,
    pub visualization: VisualizationConfig,
    pub node: NodeConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            generation: GenerationConfig::default(),
            sampling: SamplingConfig::default(),
            visualization: VisualizationConfig::default(),
            node: NodeConfig::default(),
        }
    }
}

/// Trajectory shape parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub dimension: usize,
    pub optimize_order: DerivativeOrder,
    /// Coefficients per segment polynomial (degree + 1)
    pub coefficient_count: usize,
    pub max_velocity: f64,
    pub max_acceleration: f64,
    /// Empirical; larger values stretch short segments more
    pub tuning_constant: f64,
    pub min_segment_time: f64,
    pub time_estimator: TimeEstimatorKind,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            dimension: 3,
            optimize_order: DerivativeOrder::Acceleration,
            coefficient_count: DEFAULT_COEFFICIENT_COUNT,
            max_velocity: 1.0,
            max_acceleration: 3.0,
            tuning_constant: 6.5,
            min_segment_time: DEFAULT_MIN_SEGMENT_TIME,
            time_estimator: TimeEstimatorKind::Nfabian,
        }
    }
}

impl GenerationConfig {
    /// Build the configured segment time estimator
    pub fn estimator(&self) -> Result<Box<dyn SegmentTimeEstimator>, TrajectoryError> {
        Ok(match self.time_estimator {
            TimeEstimatorKind::Nfabian => Box::new(
                NfabianEstimator::new(self.max_velocity, self.max_acceleration, self.tuning_constant)?
                    .with_min_segment_time(self.min_segment_time),
            ),
            TimeEstimatorKind::VelocityRamp => Box::new(
                VelocityRampEstimator::new(self.max_velocity, self.max_acceleration)?
                    .with_min_segment_time(self.min_segment_time),
            ),
        })
    }
}

/// Which samples each run produces alongside the trajectory
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub sample_time: f64,
    pub sample_derivative: DerivativeOrder,
    pub range_start: f64,
    pub range_end: f64,
    pub range_step: f64,
    pub range_derivative: DerivativeOrder,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_time: 2.0,
            sample_derivative: DerivativeOrder::Position,
            range_start: 2.0,
            range_end: 10.0,
            range_step: 0.01,
            range_derivative: DerivativeOrder::Position,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Time between samples feeding the decimator
    pub sampling_interval: f64,
    /// Path distance between markers; 0 marks every sample
    pub marker_spacing: f64,
    pub frame_id: String,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            sampling_interval: 0.1,
            marker_spacing: 1.6,
            frame_id: "world".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    pub rate_hz: f64,
    /// Deadline for one pipeline run; 0 disables it
    pub solve_timeout_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            rate_hz: 10.0,
            solve_timeout_ms: 0,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check every value the pipeline relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        if g.dimension != 2 && g.dimension != 3 {
            return Err(invalid("dimension", "must be 2 or 3"));
        }
        if g.coefficient_count % 2 != 0 {
            return Err(invalid("coefficient_count", "must be even"));
        }
        if g.coefficient_count < 2 * (g.optimize_order.order() + 1) {
            return Err(invalid(
                "coefficient_count",
                format!("must be at least {}", 2 * (g.optimize_order.order() + 1)),
            ));
        }
        if !(g.max_velocity.is_finite() && g.max_velocity > 0.0) {
            return Err(invalid("max_velocity", "must be positive"));
        }
        if !(g.max_acceleration.is_finite() && g.max_acceleration > 0.0) {
            return Err(invalid("max_acceleration", "must be positive"));
        }
        if !(g.min_segment_time.is_finite() && g.min_segment_time > 0.0) {
            return Err(invalid("min_segment_time", "must be positive"));
        }
        if !(g.tuning_constant.is_finite() && g.tuning_constant >= 0.0) {
            return Err(invalid("tuning_constant", "must be finite and non-negative"));
        }

        let s = &self.sampling;
        for (key, value) in [
            ("sample_time", s.sample_time),
            ("range_start", s.range_start),
            ("range_end", s.range_end),
        ] {
            if !value.is_finite() {
                return Err(invalid(key, "must be finite"));
            }
        }
        if s.range_end < s.range_start {
            return Err(invalid("range_end", "must not precede range_start"));
        }
        if !(s.range_step.is_finite() && s.range_step > 0.0) {
            return Err(invalid("range_step", "must be positive"));
        }

        let v = &self.visualization;
        if !(v.sampling_interval.is_finite() && v.sampling_interval > 0.0) {
            return Err(invalid("sampling_interval", "must be positive"));
        }
        if !(v.marker_spacing.is_finite() && v.marker_spacing >= 0.0) {
            return Err(invalid("marker_spacing", "must be non-negative"));
        }

        if !(self.node.rate_hz.is_finite() && self.node.rate_hz > 0.0) {
            return Err(invalid("rate_hz", "must be positive"));
        }
        Ok(())
    }

    /// Override individual values by name, then re-validate
    pub fn apply_params(&mut self, params: &HashMap<String, f64>) -> Result<(), ConfigError> {
        for (key, &value) in params {
            match key.as_str() {
                "dimension" => self.generation.dimension = value as usize,
                "optimize_order" => {
                    self.generation.optimize_order = DerivativeOrder::from_order(value as usize)
                        .ok_or_else(|| invalid(key, "unknown derivative order"))?
                }
                "coefficient_count" => self.generation.coefficient_count = value as usize,
                "max_velocity" => self.generation.max_velocity = value,
                "max_acceleration" => self.generation.max_acceleration = value,
                "tuning_constant" => self.generation.tuning_constant = value,
                "min_segment_time" => self.generation.min_segment_time = value,
                "sample_time" => self.sampling.sample_time = value,
                "range_start" => self.sampling.range_start = value,
                "range_end" => self.sampling.range_end = value,
                "range_step" => self.sampling.range_step = value,
                "sampling_interval" => self.visualization.sampling_interval = value,
                "marker_spacing" => self.visualization.marker_spacing = value,
                "rate_hz" => self.node.rate_hz = value,
                "solve_timeout_ms" => self.node.solve_timeout_ms = value.max(0.0) as u64,
                _ => return Err(ConfigError::UnknownParameter(key.clone())),
            }
        }
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.generation.coefficient_count, 10);
        assert_eq!(config.generation.tuning_constant, 6.5);
        assert_eq!(config.visualization.frame_id, "world");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [generation]
            dimension = 2
            optimize_order = "jerk"
            time_estimator = "velocity_ramp"

            [visualization]
            marker_spacing = 0.0
            frame_id = "map"
            "#,
        )
        .unwrap();
        assert_eq!(config.generation.dimension, 2);
        assert_eq!(config.generation.optimize_order, DerivativeOrder::Jerk);
        assert_eq!(config.generation.time_estimator, TimeEstimatorKind::VelocityRamp);
        assert_eq!(config.generation.max_velocity, 1.0);
        assert_eq!(config.visualization.frame_id, "map");
        assert_eq!(config.node, NodeConfig::default());
        assert_eq!(config.generation.estimator().unwrap().name(), "velocity_ramp");
    }

    #[test]
    fn rejects_invalid_values() {
        let err = PipelineConfig::from_toml_str("[generation]\ncoefficient_count = 9\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "coefficient_count"));

        let err = PipelineConfig::from_toml_str(
            "[generation]\noptimize_order = \"snap\"\ncoefficient_count = 8\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        assert!(matches!(
            PipelineConfig::from_toml_str("[generation]\nmax_velocity = -1.0\n"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            PipelineConfig::from_toml_str("[generation\n"),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn rejects_non_finite_values() {
        let cases: [(&str, fn(&mut PipelineConfig)); 6] = [
            ("tuning_constant", |c| c.generation.tuning_constant = f64::NAN),
            ("tuning_constant", |c| c.generation.tuning_constant = -2.0),
            ("sample_time", |c| c.sampling.sample_time = f64::INFINITY),
            ("range_start", |c| c.sampling.range_start = f64::NAN),
            ("range_end", |c| c.sampling.range_end = f64::NAN),
            ("sampling_interval", |c| c.visualization.sampling_interval = f64::INFINITY),
        ];
        for (expected, corrupt) in cases {
            let mut config = PipelineConfig::default();
            corrupt(&mut config);
            match config.validate() {
                Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected),
                other => panic!("{} accepted: {:?}", expected, other),
            }
        }

        let mut params = HashMap::new();
        params.insert("tuning_constant".to_string(), f64::NAN);
        assert!(PipelineConfig::default().apply_params(&params).is_err());
    }

    #[test]
    fn params_override_values() {
        let mut config = PipelineConfig::default();
        let mut params = HashMap::new();
        params.insert("max_velocity".to_string(), 2.5);
        params.insert("marker_spacing".to_string(), 0.0);
        config.apply_params(&params).unwrap();
        assert_eq!(config.generation.max_velocity, 2.5);
        assert_eq!(config.visualization.marker_spacing, 0.0);

        let mut params = HashMap::new();
        params.insert("wheel_base".to_string(), 0.5);
        assert!(matches!(
            config.apply_params(&params),
            Err(ConfigError::UnknownParameter(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[node]\nrate_hz = 5.0\nsolve_timeout_ms = 50").unwrap();
        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config.node.rate_hz, 5.0);
        assert_eq!(config.node.solve_timeout_ms, 50);

        assert!(matches!(
            PipelineConfig::load("/nonexistent/trajectory.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
