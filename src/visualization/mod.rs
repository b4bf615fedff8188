//! Viewer-facing markers

pub mod decimator;
pub mod markers;

pub use decimator::Decimator;
pub use markers::{draw_vertices, Marker, MarkerBatch, MarkerCategory, MarkerMessage, MarkerShape};
