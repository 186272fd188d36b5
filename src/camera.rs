//! Per-camera geometry: ground-plane homography, mounting position and
//! detection mask.

use std::collections::BTreeMap;

use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

use crate::candidate::{CameraId, Rect, WorldPoint};
use crate::error::{Result, ScouterError};

const PROJECTION_EPS: f64 = 1e-12;

fn default_image_width() -> u32 {
    640
}

fn default_image_height() -> u32 {
    480
}

/// Calibration of one camera, loaded once from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraParameter {
    pub camera_id: CameraId,
    /// Row-major homography mapping image pixels onto the world ground plane.
    pub homography: [[f64; 3]; 3],
    /// Camera centre in world coordinates; `z` is the mounting height.
    #[serde(default)]
    pub position: Option<[f64; 3]>,
    /// Polygon (image pixels) outside of which detections are discarded.
    /// An empty mask accepts everything.
    #[serde(default)]
    pub mask: Vec<[f64; 2]>,
    #[serde(default = "default_image_width")]
    pub image_width: u32,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
}

impl CameraParameter {
    pub fn new(camera_id: CameraId, homography: Matrix3<f64>) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = homography[(i, j)];
            }
        }
        Self {
            camera_id,
            homography: rows,
            position: None,
            mask: Vec::new(),
            image_width: default_image_width(),
            image_height: default_image_height(),
        }
    }

    pub fn with_position(mut self, x: f64, y: f64, z: f64) -> Self {
        self.position = Some([x, y, z]);
        self
    }

    pub fn with_mask(mut self, polygon: Vec<[f64; 2]>) -> Self {
        self.mask = polygon;
        self
    }

    pub fn with_image_size(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    pub fn homography_matrix(&self) -> Matrix3<f64> {
        let h = &self.homography;
        Matrix3::new(
            h[0][0], h[0][1], h[0][2], h[1][0], h[1][1], h[1][2], h[2][0], h[2][1], h[2][2],
        )
    }

    /// Project an image pixel onto the ground plane.
    pub fn image_to_world(&self, x: f64, y: f64) -> Option<WorldPoint> {
        apply_homography(&self.homography_matrix(), x, y).map(WorldPoint::from)
    }

    /// Project a ground-plane point back into the image.
    pub fn world_to_image(&self, point: &WorldPoint) -> Option<(f64, f64)> {
        let inverse = self.homography_matrix().try_inverse()?;
        apply_homography(&inverse, point.x, point.y).map(|p| (p.x, p.y))
    }

    /// Ground position of the bottom-centre of `bbox`.
    pub fn project_footpoint(&self, bbox: &Rect) -> Option<WorldPoint> {
        let (fx, fy) = bbox.footpoint();
        self.image_to_world(fx as f64, fy as f64)
    }

    /// Estimate the real-world height of an upright object.
    ///
    /// The head pixel projected onto the ground lands on the camera ray
    /// beyond the foot, so `h / z = |head - foot| / |head - camera|`.
    pub fn estimate_height(&self, bbox: &Rect) -> Option<f32> {
        let [cx, cy, cz] = self.position?;
        let foot = self.project_footpoint(bbox)?;
        let (hx, hy) = bbox.headpoint();
        let head = self.image_to_world(hx as f64, hy as f64)?;
        let camera = WorldPoint::new(cx, cy);

        let head_to_camera = head.distance(&camera);
        if head_to_camera <= foot.distance(&camera) || head_to_camera < PROJECTION_EPS {
            return None;
        }
        let height = cz * head.distance(&foot) / head_to_camera;
        height.is_finite().then_some(height as f32)
    }

    /// Whether an image pixel lies inside the detection mask.
    pub fn mask_contains(&self, x: f64, y: f64) -> bool {
        if self.mask.is_empty() {
            return true;
        }
        // Even-odd ray casting.
        let mut inside = false;
        let n = self.mask.len();
        let mut j = n - 1;
        for i in 0..n {
            let [xi, yi] = self.mask[i];
            let [xj, yj] = self.mask[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    pub fn validate(&self) -> Result<()> {
        let id = self.camera_id;
        if self.homography.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ScouterError::config(format!(
                "camera {id}: homography contains non-finite values"
            )));
        }
        if self.homography_matrix().try_inverse().is_none() {
            return Err(ScouterError::config(format!(
                "camera {id}: homography is not invertible"
            )));
        }
        if let Some([_, _, z]) = self.position {
            if !(z.is_finite() && z > 0.0) {
                return Err(ScouterError::config(format!(
                    "camera {id}: mounting height must be positive, got {z}"
                )));
            }
        }
        if !self.mask.is_empty() && self.mask.len() < 3 {
            return Err(ScouterError::config(format!(
                "camera {id}: mask polygon needs at least 3 points"
            )));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(ScouterError::config(format!(
                "camera {id}: image size must be non-zero"
            )));
        }
        Ok(())
    }
}

fn apply_homography(h: &Matrix3<f64>, x: f64, y: f64) -> Option<Point2<f64>> {
    let v = h * Vector3::new(x, y, 1.0);
    if v.z.abs() < PROJECTION_EPS {
        return None;
    }
    let p = Point2::new(v.x / v.z, v.y / v.z);
    (p.x.is_finite() && p.y.is_finite()).then_some(p)
}

/// Camera parameters keyed by camera id, iterated in ascending id order.
#[derive(Debug, Clone, Default)]
pub struct CameraRegistry {
    cameras: BTreeMap<CameraId, CameraParameter>,
}

impl CameraRegistry {
    pub fn new(params: Vec<CameraParameter>) -> Result<Self> {
        let mut registry = Self::default();
        for param in params {
            let id = param.camera_id;
            if registry.insert(param)?.is_some() {
                return Err(ScouterError::config(format!(
                    "camera {id} is configured more than once"
                )));
            }
        }
        Ok(registry)
    }

    /// Insert or replace a camera, returning the previous parameter.
    pub fn insert(&mut self, param: CameraParameter) -> Result<Option<CameraParameter>> {
        param.validate()?;
        Ok(self.cameras.insert(param.camera_id, param))
    }

    pub fn get(&self, camera_id: CameraId) -> Result<&CameraParameter> {
        self.cameras
            .get(&camera_id)
            .ok_or(ScouterError::UnknownCamera(camera_id))
    }

    pub fn contains(&self, camera_id: CameraId) -> bool {
        self.cameras.contains_key(&camera_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = CameraId> + '_ {
        self.cameras.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CameraParameter> {
        self.cameras.values()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 100 px per world unit, world origin at pixel (0, 0).
    fn scaled_camera() -> CameraParameter {
        CameraParameter::new(0, Matrix3::new(0.01, 0.0, 0.0, 0.0, 0.01, 0.0, 0.0, 0.0, 1.0))
    }

    #[test]
    fn test_projection_round_trip() {
        let cam = scaled_camera();
        let p = cam.image_to_world(250.0, 400.0).unwrap();
        assert!((p.x - 2.5).abs() < 1e-9);
        assert!((p.y - 4.0).abs() < 1e-9);

        let (u, v) = cam.world_to_image(&p).unwrap();
        assert!((u - 250.0).abs() < 1e-6);
        assert!((v - 400.0).abs() < 1e-6);
    }

    #[test]
    fn test_estimate_height_similar_triangles() {
        // Foot pixel y=600 lands on (0, 6), head pixel y=400 on (0, 4).
        let bbox = Rect::from_tlbr(0.0, 400.0, 0.0, 600.0);

        // Camera at (0, 10, 3): foot is 4 away, head 6 away, h = 3 * 2 / 6.
        let cam = scaled_camera().with_position(0.0, 10.0, 3.0);
        let h = cam.estimate_height(&bbox).unwrap();
        assert!((h - 1.0).abs() < 1e-5);

        // Head closer to the camera than the foot.
        let cam = scaled_camera().with_position(0.0, 0.0, 3.0);
        assert_eq!(cam.estimate_height(&bbox), None);

        // No mounting position.
        assert_eq!(scaled_camera().estimate_height(&bbox), None);
    }

    #[test]
    fn test_mask_contains() {
        let cam = scaled_camera().with_mask(vec![[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]]);
        assert!(cam.mask_contains(50.0, 50.0));
        assert!(!cam.mask_contains(150.0, 50.0));
        assert!(scaled_camera().mask_contains(1e6, 1e6));
    }

    #[test]
    fn test_validate_rejects_singular_homography() {
        let cam = CameraParameter::new(1, Matrix3::zeros());
        assert!(matches!(cam.validate(), Err(ScouterError::Configuration(_))));
    }

    #[test]
    fn test_registry() {
        let registry = CameraRegistry::new(vec![
            scaled_camera(),
            CameraParameter { camera_id: 2, ..scaled_camera() },
        ])
        .unwrap();
        assert_eq!(registry.ids().collect::<Vec<_>>(), vec![0, 2]);
        assert!(matches!(registry.get(5), Err(ScouterError::UnknownCamera(5))));

        let dup = CameraRegistry::new(vec![scaled_camera(), scaled_camera()]);
        assert!(dup.is_err());
    }
}
