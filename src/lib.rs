//! Minimum-derivative polynomial trajectories through waypoints, sampled
//! for control and decimated into viewer markers.

pub mod common;
pub mod config;
pub mod error;
pub mod generation;
pub mod lifecycle;
pub mod node;
pub mod pipeline;
pub mod trajectory;
pub mod visualization;

pub use common::types::{DerivativeOrder, Waypoint};
pub use config::{ConfigError, PipelineConfig};
pub use error::{Result, TrajectoryError};
pub use lifecycle::{LifecycleError, LifecycleNode, NodeRegistry};
pub use node::{MarkerPublisher, TrajectoryNode, WaypointSnapshot};
pub use pipeline::{PipelineOutput, TrajectoryPipeline};
pub use trajectory::{Trajectory, TrajectoryPoint};
pub use visualization::markers::MarkerBatch;
