use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use super::object_candidate::{CameraId, ObjectCandidate};

/// A point on the world ground plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPoint {
    pub x: f64,
    pub y: f64,
}

impl WorldPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &WorldPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<Point2<f64>> for WorldPoint {
    fn from(p: Point2<f64>) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<WorldPoint> for Point2<f64> {
    fn from(p: WorldPoint) -> Self {
        Point2::new(p.x, p.y)
    }
}

/// Candidates from one or more cameras believed to be one physical object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MVObjectCandidate {
    pub world_position: WorldPoint,
    #[serde(default)]
    pub height: Option<f32>,
    pub score: f32,
    /// At most one candidate per camera, sorted by camera id. Empty for
    /// positions the tracker predicted rather than observed.
    #[serde(default)]
    pub contributing: Vec<ObjectCandidate>,
}

impl MVObjectCandidate {
    /// An estimated position with no contributing observation.
    pub fn predicted(world_position: WorldPoint, height: Option<f32>) -> Self {
        Self {
            world_position,
            height,
            score: 0.0,
            contributing: Vec::new(),
        }
    }

    pub fn camera_ids(&self) -> Vec<CameraId> {
        self.contributing.iter().map(|c| c.camera_id).collect()
    }

    pub fn view_count(&self) -> usize {
        self.contributing.len()
    }

    pub fn is_observed(&self) -> bool {
        !self.contributing.is_empty()
    }
}
