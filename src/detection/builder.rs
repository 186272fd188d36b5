//! Builder for creating ObjectCandidate objects from various input formats.

use crate::candidate::{CameraId, ObjectCandidate, Rect, Tag};

/// Builder for creating `ObjectCandidate` objects from various input formats.
#[derive(Debug, Clone, Default)]
pub struct CandidateBuilder {
    camera_id: CameraId,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
    score: f32,
    height: Option<f32>,
    tags: Vec<Tag>,
}

impl CandidateBuilder {
    /// Create a new candidate builder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn camera(mut self, camera_id: CameraId) -> Self {
        self.camera_id = camera_id;
        self
    }

    /// Set bounding box in TLBR format (x1, y1, x2, y2).
    pub fn tlbr(mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
        self
    }

    /// Set bounding box in XYWH format (center_x, center_y, width, height).
    pub fn xywh(mut self, cx: f32, cy: f32, w: f32, h: f32) -> Self {
        self.x1 = cx - w / 2.0;
        self.y1 = cy - h / 2.0;
        self.x2 = cx + w / 2.0;
        self.y2 = cy + h / 2.0;
        self
    }

    /// Set bounding box in TLWH format (left, top, width, height).
    pub fn tlwh(mut self, l: f32, t: f32, w: f32, h: f32) -> Self {
        self.x1 = l;
        self.y1 = t;
        self.x2 = l + w;
        self.y2 = t + h;
        self
    }

    /// Set the confidence score.
    pub fn score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// Build the final `ObjectCandidate`.
    pub fn build(self) -> ObjectCandidate {
        ObjectCandidate {
            camera_id: self.camera_id,
            bbox: Rect::from_tlbr(self.x1, self.y1, self.x2, self.y2),
            score: self.score,
            height: self.height,
            tags: self.tags,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_builder() {
        let c = CandidateBuilder::new()
            .camera(2)
            .xywh(30.0, 50.0, 40.0, 60.0)
            .score(0.95)
            .tag("gender", "Male")
            .build();

        assert_eq!(c.camera_id, 2);
        assert_eq!(c.score, 0.95);
        assert_eq!(c.bbox.to_tlbr(), [10.0, 20.0, 50.0, 80.0]);
        assert_eq!(c.tag("gender"), Some("Male"));
    }

    #[test]
    fn test_tlwh_is_left_top() {
        let c = CandidateBuilder::new().tlwh(10.0, 20.0, 5.0, 7.0).build();
        assert_eq!(c.bbox.to_tlbr(), [10.0, 20.0, 15.0, 27.0]);
    }
}
