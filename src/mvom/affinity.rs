//! Ground-plane projection and pairwise affinity between candidates.

use std::collections::BTreeSet;

use log::trace;
use ndarray::Array2;

use crate::camera::CameraRegistry;
use crate::candidate::{CameraCandidates, CameraId, ObjectCandidate, WorldPoint};
use crate::error::{Result, ScouterError};

use super::matching::MvomConfig;

/// A candidate together with its ground-plane footprint.
#[derive(Debug, Clone)]
pub struct ProjectedCandidate {
    pub candidate: ObjectCandidate,
    pub footprint: WorldPoint,
}

impl ProjectedCandidate {
    pub fn camera_id(&self) -> CameraId {
        self.candidate.camera_id
    }
}

/// Project every candidate onto the ground plane.
///
/// Views are ordered by camera id and candidates keep their order within a
/// view, so the flattened index is deterministic. The camera id of each list
/// is stamped on its candidates.
pub fn project_views(
    mut views: Vec<CameraCandidates>,
    cameras: &CameraRegistry,
) -> Result<Vec<ProjectedCandidate>> {
    views.sort_by_key(|v| v.camera_id);

    let mut seen = BTreeSet::new();
    let mut projected = Vec::with_capacity(views.iter().map(|v| v.len()).sum());
    for view in views {
        if !seen.insert(view.camera_id) {
            return Err(ScouterError::invalid(format!(
                "camera {} appears more than once in one matching round",
                view.camera_id
            )));
        }
        let camera = cameras.get(view.camera_id)?;
        for mut candidate in view.candidates {
            candidate.camera_id = view.camera_id;
            let footprint = camera.project_footpoint(&candidate.bbox).ok_or_else(|| {
                ScouterError::invalid(format!(
                    "camera {}: candidate {:?} cannot be projected onto the ground plane",
                    view.camera_id, candidate.bbox
                ))
            })?;
            projected.push(ProjectedCandidate {
                candidate,
                footprint,
            });
        }
    }
    Ok(projected)
}

/// Similarity in `[0, 1]` of two candidates being the same object.
///
/// Candidates of the same camera never match.
pub fn pair_affinity(a: &ProjectedCandidate, b: &ProjectedCandidate, config: &MvomConfig) -> f32 {
    if a.camera_id() == b.camera_id() {
        return 0.0;
    }
    let d = a.footprint.distance(&b.footprint);
    let mut affinity = (-(d * d) / (2.0 * config.sigma * config.sigma)).exp();

    if let (Some(sigma_h), Some(ha), Some(hb)) =
        (config.height_sigma, a.candidate.height, b.candidate.height)
    {
        let dh = (ha - hb) as f64;
        affinity *= (-(dh * dh) / (2.0 * sigma_h * sigma_h)).exp();
    }
    affinity as f32
}

/// Symmetric affinity matrix over the flattened candidates; the diagonal is 0.
pub fn affinity_matrix(projected: &[ProjectedCandidate], config: &MvomConfig) -> Array2<f32> {
    let n = projected.len();
    let mut affinities = Array2::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let a = pair_affinity(&projected[i], &projected[j], config);
            affinities[[i, j]] = a;
            affinities[[j, i]] = a;
            trace!(
                "affinity cam{}#{} - cam{}#{}: {:.4}",
                projected[i].camera_id(),
                i,
                projected[j].camera_id(),
                j,
                a
            );
        }
    }
    affinities
}
