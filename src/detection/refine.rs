//! Post-detection refinement of single-camera candidates.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::camera::CameraParameter;
use crate::candidate::{ObjectCandidate, Rect, iou_batch};
use crate::error::{Result, ScouterError};

use super::frame::FrameMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Candidates scoring below this are discarded.
    pub min_score: f32,
    /// Overlapping candidates above this IoU are suppressed, keeping the
    /// higher score. `None` disables suppression.
    pub nms_iou: Option<f32>,
    pub min_height: Option<f32>,
    pub max_height: Option<f32>,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            nms_iou: None,
            min_height: None,
            max_height: None,
        }
    }
}

impl RefineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(ScouterError::config(format!(
                "refine.min_score must be within [0, 1], got {}",
                self.min_score
            )));
        }
        if let Some(iou) = self.nms_iou {
            if !(0.0..=1.0).contains(&iou) {
                return Err(ScouterError::config(format!(
                    "refine.nms_iou must be within [0, 1], got {iou}"
                )));
            }
        }
        if let (Some(lo), Some(hi)) = (self.min_height, self.max_height) {
            if lo > hi {
                return Err(ScouterError::config(format!(
                    "refine.min_height {lo} exceeds max_height {hi}"
                )));
            }
        }
        Ok(())
    }
}

/// Mask, score, overlap and height filtering for one camera's candidates.
///
/// Candidates are expected in processed-frame coordinates; `meta` maps them
/// into the camera image where the mask and geometry are defined.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    config: RefineConfig,
}

impl CandidateFilter {
    pub fn new(config: RefineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RefineConfig {
        &self.config
    }

    /// Run every refinement step in order.
    pub fn refine(
        &self,
        camera: &CameraParameter,
        candidates: Vec<ObjectCandidate>,
        meta: &FrameMeta,
    ) -> Vec<ObjectCandidate> {
        let candidates = self.filter_by_mask(camera, candidates, meta);
        let mut candidates = self.suppress_overlaps(candidates);
        self.estimate_height(camera, &mut candidates, meta);
        self.filter_by_height(candidates)
    }

    /// Drop candidates below `min_score` or whose footpoint is outside the
    /// camera mask.
    pub fn filter_by_mask(
        &self,
        camera: &CameraParameter,
        candidates: Vec<ObjectCandidate>,
        meta: &FrameMeta,
    ) -> Vec<ObjectCandidate> {
        let before = candidates.len();
        let kept: Vec<_> = candidates
            .into_iter()
            .filter(|c| c.score >= self.config.min_score)
            .filter(|c| {
                let (fx, fy) = meta.restore(&c.bbox).footpoint();
                camera.mask_contains(fx as f64, fy as f64)
            })
            .collect();
        if kept.len() < before {
            debug!(
                "camera {}: mask/score filter kept {}/{} candidates",
                camera.camera_id,
                kept.len(),
                before
            );
        }
        kept
    }

    /// Greedy non-maximum suppression; survivors keep their input order.
    pub fn suppress_overlaps(&self, candidates: Vec<ObjectCandidate>) -> Vec<ObjectCandidate> {
        let Some(thresh) = self.config.nms_iou else {
            return candidates;
        };
        if candidates.len() < 2 {
            return candidates;
        }

        let rects: Vec<Rect> = candidates.iter().map(|c| c.bbox).collect();
        let ious = iou_batch(&rects, &rects);

        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| candidates[b].score.total_cmp(&candidates[a].score).then(a.cmp(&b)));

        let mut suppressed = vec![false; candidates.len()];
        for (rank, &i) in order.iter().enumerate() {
            if suppressed[i] {
                continue;
            }
            for &j in &order[rank + 1..] {
                if !suppressed[j] && ious[[i, j]] > thresh {
                    suppressed[j] = true;
                }
            }
        }

        candidates
            .into_iter()
            .zip(suppressed)
            .filter_map(|(c, s)| (!s).then_some(c))
            .collect()
    }

    /// Fill in `height` from the camera geometry where it can be estimated.
    pub fn estimate_height(
        &self,
        camera: &CameraParameter,
        candidates: &mut [ObjectCandidate],
        meta: &FrameMeta,
    ) {
        for c in candidates.iter_mut() {
            if let Some(h) = camera.estimate_height(&meta.restore(&c.bbox)) {
                c.height = Some(h);
            }
        }
    }

    /// Drop candidates whose known height is outside the configured range.
    pub fn filter_by_height(&self, candidates: Vec<ObjectCandidate>) -> Vec<ObjectCandidate> {
        let RefineConfig {
            min_height,
            max_height,
            ..
        } = self.config;
        candidates
            .into_iter()
            .filter(|c| match c.height {
                Some(h) => min_height.is_none_or(|lo| h >= lo) && max_height.is_none_or(|hi| h <= hi),
                None => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::CandidateBuilder;
    use nalgebra::Matrix3;

    fn camera() -> CameraParameter {
        CameraParameter::new(0, Matrix3::new(0.01, 0.0, 0.0, 0.0, 0.01, 0.0, 0.0, 0.0, 1.0))
            .with_position(0.0, 10.0, 3.0)
            .with_mask(vec![[0.0, 0.0], [500.0, 0.0], [500.0, 700.0], [0.0, 700.0]])
    }

    fn candidate(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> ObjectCandidate {
        CandidateBuilder::new().tlbr(x1, y1, x2, y2).score(score).build()
    }

    #[test]
    fn test_filter_by_mask_uses_restored_footpoint() {
        let filter = CandidateFilter::new(RefineConfig {
            min_score: 0.3,
            ..RefineConfig::default()
        })
        .unwrap();
        let candidates = vec![
            candidate(10.0, 10.0, 30.0, 60.0, 0.9),
            candidate(10.0, 10.0, 30.0, 60.0, 0.1),
            candidate(480.0, 10.0, 520.0, 60.0, 0.9),
        ];

        let kept = filter.filter_by_mask(&camera(), candidates.clone(), &FrameMeta::default());
        assert_eq!(kept.len(), 2);

        // The same boxes shifted right by the crop offset leave the mask.
        let meta = FrameMeta {
            offset_x: 480,
            offset_y: 0,
        };
        let kept = filter.filter_by_mask(&camera(), candidates, &meta);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_suppress_overlaps_keeps_best_in_order() {
        let filter = CandidateFilter::new(RefineConfig {
            nms_iou: Some(0.5),
            ..RefineConfig::default()
        })
        .unwrap();
        let kept = filter.suppress_overlaps(vec![
            candidate(0.0, 0.0, 10.0, 10.0, 0.6),
            candidate(100.0, 100.0, 110.0, 110.0, 0.5),
            candidate(1.0, 0.0, 11.0, 10.0, 0.9),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.5);
        assert_eq!(kept[1].score, 0.9);
    }

    #[test]
    fn test_estimate_and_filter_height() {
        let filter = CandidateFilter::new(RefineConfig {
            min_height: Some(0.5),
            max_height: Some(2.5),
            ..RefineConfig::default()
        })
        .unwrap();

        let mut candidates = vec![
            // Foot (0, 6), head (0, 4): 1.0 tall.
            candidate(0.0, 400.0, 0.0, 600.0, 0.9),
            // Foot (0, 6), head (0, 5.9): well under 0.5.
            candidate(0.0, 590.0, 0.0, 600.0, 0.9),
        ];
        filter.estimate_height(&camera(), &mut candidates, &FrameMeta::default());
        assert!((candidates[0].height.unwrap() - 1.0).abs() < 1e-4);

        let kept = filter.filter_by_height(candidates);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let bad = RefineConfig {
            min_height: Some(3.0),
            max_height: Some(1.0),
            ..RefineConfig::default()
        };
        assert!(CandidateFilter::new(bad).is_err());
    }
}
