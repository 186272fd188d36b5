use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::candidate::{CameraId, ObjectCandidate, Rect};

/// Where a processed frame sits inside the raw camera image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub offset_x: i32,
    pub offset_y: i32,
}

impl FrameMeta {
    /// Map a processed-frame rect back into camera coordinates.
    pub fn restore(&self, rect: &Rect) -> Rect {
        rect.translate(self.offset_x as f32, self.offset_y as f32)
    }

    /// Restore every candidate bbox in place.
    pub fn restore_all(&self, candidates: &mut [ObjectCandidate]) {
        for c in candidates.iter_mut() {
            c.bbox = self.restore(&c.bbox);
        }
    }
}

/// A pre-processed camera image ready for detection.
#[derive(Debug, Clone)]
pub struct Frame {
    pub camera_id: CameraId,
    pub image: RgbImage,
    pub meta: FrameMeta,
}

impl Frame {
    /// A frame covering the whole camera image.
    pub fn new(camera_id: CameraId, image: RgbImage) -> Self {
        Self {
            camera_id,
            image,
            meta: FrameMeta::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}
