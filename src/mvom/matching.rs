use std::collections::BTreeSet;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::camera::CameraRegistry;
use crate::candidate::{CameraCandidates, CameraId, MVObjectCandidate, WorldPoint};
use crate::error::{Result, ScouterError};

use super::affinity::{ProjectedCandidate, affinity_matrix, project_views};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MvomConfig {
    /// Minimum group affinity for two groups to merge. Values above 1 leave
    /// every candidate in its own group.
    pub threshold: f32,
    /// Ground-plane distance scale of the affinity kernel, in world units.
    pub sigma: f64,
    /// Height difference scale; `None` ignores heights.
    pub height_sigma: Option<f64>,
    /// Links this close to the best one are treated as equally good.
    pub tie_tolerance: f32,
}

impl Default for MvomConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            sigma: 0.5,
            height_sigma: None,
            tie_tolerance: 1e-4,
        }
    }
}

impl MvomConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(ScouterError::config(format!(
                "mvom.threshold must be a non-negative number, got {}",
                self.threshold
            )));
        }
        if !(self.sigma.is_finite() && self.sigma > 0.0) {
            return Err(ScouterError::config(format!(
                "mvom.sigma must be positive, got {}",
                self.sigma
            )));
        }
        if let Some(s) = self.height_sigma {
            if !(s.is_finite() && s > 0.0) {
                return Err(ScouterError::config(format!(
                    "mvom.height_sigma must be positive, got {s}"
                )));
            }
        }
        if !(self.tie_tolerance.is_finite() && self.tie_tolerance >= 0.0) {
            return Err(ScouterError::config(format!(
                "mvom.tie_tolerance must be non-negative, got {}",
                self.tie_tolerance
            )));
        }
        Ok(())
    }
}

/// Greedy complete-linkage matcher over candidates of several cameras.
#[derive(Debug, Clone, Default)]
pub struct MultiViewMatcher {
    config: MvomConfig,
}

struct Group {
    members: Vec<usize>,
    cameras: BTreeSet<CameraId>,
}

impl MultiViewMatcher {
    pub fn new(config: MvomConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MvomConfig {
        &self.config
    }

    /// Group the candidates of one instant into multi-view candidates.
    ///
    /// Every input candidate lands in exactly one output group and no group
    /// holds two candidates of the same camera.
    pub fn get_matching(
        &self,
        views: Vec<CameraCandidates>,
        cameras: &CameraRegistry,
    ) -> Result<Vec<MVObjectCandidate>> {
        let view_count = views.len();
        let projected = project_views(views, cameras)?;
        if projected.is_empty() {
            return Ok(Vec::new());
        }

        let groups = self.group(&projected);
        debug!(
            "mvom: {} candidates from {} cameras -> {} groups",
            projected.len(),
            view_count,
            groups.len()
        );

        let mut slots: Vec<Option<ProjectedCandidate>> = projected.into_iter().map(Some).collect();
        Ok(groups
            .into_iter()
            .map(|members| {
                let members: Vec<ProjectedCandidate> =
                    members.into_iter().filter_map(|i| slots[i].take()).collect();
                merge(members)
            })
            .collect())
    }

    /// Agglomerate flattened candidate indices. Groups come back ordered by
    /// their smallest member index.
    fn group(&self, projected: &[ProjectedCandidate]) -> Vec<Vec<usize>> {
        let n = projected.len();
        let mut links = affinity_matrix(projected, &self.config);
        let mut groups: Vec<Option<Group>> = projected
            .iter()
            .enumerate()
            .map(|(i, p)| {
                Some(Group {
                    members: vec![i],
                    cameras: BTreeSet::from([p.camera_id()]),
                })
            })
            .collect();

        loop {
            let mergeable = |i: usize, j: usize| match (&groups[i], &groups[j]) {
                (Some(a), Some(b)) => a.cameras.is_disjoint(&b.cameras),
                _ => false,
            };

            let mut best = f32::NEG_INFINITY;
            for i in 0..n {
                for j in (i + 1)..n {
                    if mergeable(i, j) && links[[i, j]] > best {
                        best = links[[i, j]];
                    }
                }
            }
            if best < self.config.threshold {
                break;
            }

            // Among near-best links: more cameras, then lower camera ids,
            // then lower input order. The winner does not depend on the
            // threshold; merging stops once the winner falls below it.
            let floor = best - self.config.tie_tolerance;
            let mut chosen: Option<((std::cmp::Reverse<usize>, [CameraId; 2], [usize; 2]), usize, usize)> =
                None;
            for i in 0..n {
                for j in (i + 1)..n {
                    if !mergeable(i, j) || links[[i, j]] < floor {
                        continue;
                    }
                    let (Some(a), Some(b)) = (&groups[i], &groups[j]) else {
                        continue;
                    };
                    let first_cam = |g: &Group| g.cameras.first().copied().unwrap_or(CameraId::MAX);
                    let key = (
                        std::cmp::Reverse(a.cameras.len() + b.cameras.len()),
                        [first_cam(a), first_cam(b)],
                        [i, j],
                    );
                    if chosen.as_ref().is_none_or(|(k, _, _)| key < *k) {
                        chosen = Some((key, i, j));
                    }
                }
            }
            let Some((_, i, j)) = chosen else {
                break;
            };
            if links[[i, j]] < self.config.threshold {
                trace!(
                    "mvom: tie winner {} - {} links at {:.4}, below threshold",
                    i,
                    j,
                    links[[i, j]]
                );
                break;
            }

            trace!("mvom: merge group {} into {} (link {:.4})", j, i, links[[i, j]]);
            if let Some(absorbed) = groups[j].take() {
                if let Some(target) = groups[i].as_mut() {
                    target.members.extend(absorbed.members);
                    target.cameras.extend(absorbed.cameras);
                }
            }
            // Complete linkage: the merged group is as close as its farthest pair.
            for k in 0..n {
                if k == i || groups[k].is_none() {
                    continue;
                }
                let link = links[[i, k]].min(links[[j, k]]);
                links[[i, k]] = link;
                links[[k, i]] = link;
            }
        }

        groups
            .into_iter()
            .flatten()
            .map(|mut g| {
                g.members.sort_unstable();
                g.members
            })
            .collect()
    }
}

fn merge(mut members: Vec<ProjectedCandidate>) -> MVObjectCandidate {
    members.sort_by_key(|p| p.camera_id());

    let total: f64 = members.iter().map(|p| p.candidate.score.max(0.0) as f64).sum();
    let weight = |p: &ProjectedCandidate| {
        if total > 0.0 {
            p.candidate.score.max(0.0) as f64 / total
        } else {
            1.0 / members.len() as f64
        }
    };
    let (x, y) = members.iter().fold((0.0, 0.0), |(x, y), p| {
        let w = weight(p);
        (x + w * p.footprint.x, y + w * p.footprint.y)
    });

    let heights: Vec<f32> = members.iter().filter_map(|p| p.candidate.height).collect();
    let height = (!heights.is_empty()).then(|| heights.iter().sum::<f32>() / heights.len() as f32);
    let score = members
        .iter()
        .map(|p| p.candidate.score)
        .fold(f32::NEG_INFINITY, f32::max);

    MVObjectCandidate {
        world_position: WorldPoint::new(x, y),
        height,
        score,
        contributing: members.into_iter().map(|p| p.candidate).collect(),
    }
}

/// Match with default kernel settings and the given threshold.
pub fn get_matching(
    views: Vec<CameraCandidates>,
    cameras: &CameraRegistry,
    k_threshold: f32,
) -> Result<Vec<MVObjectCandidate>> {
    let config = MvomConfig {
        threshold: k_threshold,
        ..MvomConfig::default()
    };
    MultiViewMatcher::new(config)?.get_matching(views, cameras)
}
