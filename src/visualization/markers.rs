//! Marker types handed to an external viewer

use crate::common::types::{to_vector3, DerivativeOrder};
use crate::error::{Result, TrajectoryError};
use crate::generation::vertex::Vertex;
use nalgebra::{Point3, UnitQuaternion};
use serde::Serialize;

/// Semantic group of a marker, used as its namespace by viewers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerCategory {
    Path,
    StraightPath,
    Pose,
    Velocity,
    Acceleration,
}

impl MarkerCategory {
    pub fn namespace(self) -> &'static str {
        match self {
            MarkerCategory::Path => "path",
            MarkerCategory::StraightPath => "straight_path",
            MarkerCategory::Pose => "pose",
            MarkerCategory::Velocity => DerivativeOrder::Velocity.name(),
            MarkerCategory::Acceleration => DerivativeOrder::Acceleration.name(),
        }
    }
}

/// RGBA colour, components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Color { r, g, b, a }
    }
}

/// Marker colours and line widths
pub mod style {
    use super::Color;

    pub const PATH_COLOR: Color = Color { r: 1.0, g: 0.5, b: 0.0, a: 1.0 };
    pub const STRAIGHT_PATH_COLOR: Color = Color { r: 0.5, g: 1.0, b: 0.0, a: 1.0 };
    pub const VELOCITY_COLOR: Color = Color { r: 80.0 / 255.0, g: 172.0 / 255.0, b: 196.0 / 255.0, a: 1.0 };
    pub const ACCELERATION_COLOR: Color = Color { r: 190.0 / 255.0, g: 81.0 / 255.0, b: 80.0 / 255.0, a: 1.0 };
    pub const POSE_COLOR: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub const LINE_WIDTH: f64 = 0.01;
    pub const ARROW_WIDTH: f64 = 0.3;
    pub const AXES_LENGTH: f64 = 0.3;
}

/// Geometry of a single marker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkerShape {
    LineStrip {
        points: Vec<Point3<f64>>,
    },
    Arrow {
        start: Point3<f64>,
        end: Point3<f64>,
    },
    /// Body axes at `origin`
    Axes {
        origin: Point3<f64>,
        orientation: UnitQuaternion<f64>,
        length: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub category: MarkerCategory,
    pub shape: MarkerShape,
    pub color: Color,
    pub scale: f64,
}

impl Marker {
    pub fn arrow(category: MarkerCategory, start: Point3<f64>, end: Point3<f64>, color: Color) -> Self {
        Marker {
            category,
            shape: MarkerShape::Arrow { start, end },
            color,
            scale: style::ARROW_WIDTH,
        }
    }

    pub fn pose(origin: Point3<f64>, orientation: UnitQuaternion<f64>) -> Self {
        Marker {
            category: MarkerCategory::Pose,
            shape: MarkerShape::Axes {
                origin,
                orientation,
                length: style::AXES_LENGTH,
            },
            color: style::POSE_COLOR,
            scale: style::ARROW_WIDTH,
        }
    }

    pub fn line_strip(category: MarkerCategory, points: Vec<Point3<f64>>, color: Color) -> Self {
        Marker {
            category,
            shape: MarkerShape::LineStrip { points },
            color,
            scale: style::LINE_WIDTH,
        }
    }

    /// Anchor point: arrow tail, axes origin, or first polyline point
    pub fn anchor(&self) -> Option<Point3<f64>> {
        match &self.shape {
            MarkerShape::LineStrip { points } => points.first().copied(),
            MarkerShape::Arrow { start, .. } => Some(*start),
            MarkerShape::Axes { origin, .. } => Some(*origin),
        }
    }
}

/// Everything a viewer needs to draw one trajectory
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerBatch {
    pub frame_id: String,
    /// Continuous polyline through every sample
    pub path: Vec<Point3<f64>>,
    /// Discrete pose and derivative markers, in emission order
    pub markers: Vec<Marker>,
}

impl MarkerBatch {
    pub fn new(frame_id: &str) -> Self {
        MarkerBatch {
            frame_id: frame_id.to_string(),
            path: Vec::new(),
            markers: Vec::new(),
        }
    }

    /// Markers of one category
    pub fn markers_in(&self, category: MarkerCategory) -> impl Iterator<Item = &Marker> {
        self.markers.iter().filter(move |m| m.category == category)
    }

    /// Styled marker list, the path polyline last
    pub fn to_markers(&self) -> Vec<Marker> {
        let mut markers = self.markers.clone();
        if !self.path.is_empty() {
            markers.push(Marker::line_strip(
                MarkerCategory::Path,
                self.path.clone(),
                style::PATH_COLOR,
            ));
        }
        markers
    }
}

/// Wire form of a batch: every element, the path included, as a styled
/// marker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerMessage {
    pub frame_id: String,
    pub markers: Vec<Marker>,
}

impl From<&MarkerBatch> for MarkerMessage {
    fn from(batch: &MarkerBatch) -> Self {
        MarkerMessage {
            frame_id: batch.frame_id.clone(),
            markers: batch.to_markers(),
        }
    }
}

/// Straight polyline through the vertex positions.
///
/// Vertices without a position constraint are skipped.
pub fn draw_vertices(vertices: &[Vertex], frame_id: &str) -> Result<MarkerBatch> {
    let mut points = Vec::with_capacity(vertices.len());
    for (i, vertex) in vertices.iter().enumerate() {
        if vertex.dimension() != 2 && vertex.dimension() != 3 {
            return Err(TrajectoryError::DimensionMismatch {
                expected: 3,
                actual: vertex.dimension(),
            });
        }
        match vertex.position() {
            Some(position) => points.push(Point3::from(to_vector3(position))),
            None => tracing::warn!("Vertex {} has no position constraint, skipping", i),
        }
    }

    let mut batch = MarkerBatch::new(frame_id);
    batch.markers.push(Marker::line_strip(
        MarkerCategory::StraightPath,
        points,
        style::STRAIGHT_PATH_COLOR,
    ));
    Ok(batch)
}
