use std::fmt;

use serde::{Deserialize, Serialize};

use super::rect::Rect;

pub type CameraId = u32;

/// Attribute predicted for a candidate, such as `gender=Male`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A single-camera detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectCandidate {
    pub camera_id: CameraId,
    /// Bounding box; processed-frame coordinates until restored by the pipeline.
    pub bbox: Rect,
    /// Detection confidence score
    pub score: f32,
    /// Estimated real-world height, in world units.
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl ObjectCandidate {
    pub fn new(camera_id: CameraId, bbox: Rect, score: f32) -> Self {
        Self {
            camera_id,
            bbox,
            score,
            height: None,
            tags: Vec::new(),
        }
    }

    pub fn with_height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_tag(key, value);
        self
    }

    /// Insert a tag, replacing any previous value under the same key.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.tags.iter_mut().find(|t| t.key == key) {
            Some(tag) => tag.value = value,
            None => self.tags.push(Tag { key, value }),
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }
}

/// All candidates one camera produced for one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraCandidates {
    pub camera_id: CameraId,
    pub candidates: Vec<ObjectCandidate>,
}

impl CameraCandidates {
    /// Group candidates under `camera_id`, stamping the id on each of them.
    pub fn new(camera_id: CameraId, candidates: Vec<ObjectCandidate>) -> Self {
        let candidates = candidates
            .into_iter()
            .map(|mut c| {
                c.camera_id = camera_id;
                c
            })
            .collect();
        Self {
            camera_id,
            candidates,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_tag_replaces_value() {
        let mut c = ObjectCandidate::new(0, Rect::default(), 0.9).with_tag("gender", "Male");
        c.set_tag("gender", "Female");
        c.set_tag("age", "20s");
        assert_eq!(c.tags.len(), 2);
        assert_eq!(c.tag("gender"), Some("Female"));
        assert_eq!(c.tags[1].to_string(), "age=20s");
    }

    #[test]
    fn test_camera_candidates_stamp_camera_id() {
        let views = CameraCandidates::new(3, vec![ObjectCandidate::new(0, Rect::default(), 0.5)]);
        assert_eq!(views.candidates[0].camera_id, 3);
        assert_eq!(views.len(), 1);
    }
}
