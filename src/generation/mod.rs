//! Trajectory generation: vertex constraints, segment timing and the
//! minimum-derivative solve

pub mod optimizer;
pub mod segment_time;
pub mod vertex;

pub use optimizer::PolynomialOptimizer;
pub use segment_time::{NfabianEstimator, SegmentTimeEstimator, VelocityRampEstimator};
pub use vertex::{build_vertices, Vertex};
