//! Association of tracks with multi-view candidates.

use ndarray::Array2;

use crate::candidate::WorldPoint;

/// Cost given to pairs outside the gate. Kept well below the padding cost
/// so the solver still prefers any gated pair over a dummy row. Gates must
/// stay below it.
pub(crate) const GATED_COST: f64 = 1e5;
const PADDING_COST: f64 = 1e6;

/// Euclidean distance matrix between predicted track positions and
/// candidate positions. Pairs farther than `max_distance` get a gated cost.
pub fn distance_matrix(tracks: &[WorldPoint], candidates: &[WorldPoint], max_distance: f64) -> Array2<f64> {
    let mut dists = Array2::zeros((tracks.len(), candidates.len()));
    for (i, t) in tracks.iter().enumerate() {
        for (j, c) in candidates.iter().enumerate() {
            let d = t.distance(c);
            dists[[i, j]] = if d <= max_distance { d } else { GATED_COST };
        }
    }
    dists
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentResult {
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Minimum-cost assignment; pairs costing more than `thresh`, or gated out,
/// are left unmatched.
pub fn linear_assignment(cost_matrix: &Array2<f64>, thresh: f64) -> AssignmentResult {
    let (num_rows, num_cols) = cost_matrix.dim();

    if num_rows == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: vec![],
            unmatched_detections: (0..num_cols).collect(),
        };
    }

    if num_cols == 0 {
        return AssignmentResult {
            matches: vec![],
            unmatched_tracks: (0..num_rows).collect(),
            unmatched_detections: vec![],
        };
    }

    let size = num_rows.max(num_cols);
    let mut padded = Array2::<f64>::from_elem((size, size), PADDING_COST);
    padded
        .slice_mut(ndarray::s![..num_rows, ..num_cols])
        .assign(cost_matrix);

    let mut matches = vec![];
    let mut unmatched_tracks = vec![];
    let mut unmatched_detections_mask = vec![true; num_cols];

    match lapjv::lapjv(&padded) {
        Ok((row_to_col, _)) => {
            for (row_idx, &col_idx) in row_to_col.iter().enumerate().take(num_rows) {
                let cost = cost_matrix.get((row_idx, col_idx)).copied().unwrap_or(PADDING_COST);
                if cost <= thresh && cost < GATED_COST {
                    matches.push((row_idx, col_idx));
                    unmatched_detections_mask[col_idx] = false;
                } else {
                    unmatched_tracks.push(row_idx);
                }
            }
        }
        Err(e) => {
            log::warn!("linear assignment failed ({e:?}); leaving all tracks unmatched");
            unmatched_tracks = (0..num_rows).collect();
        }
    }

    let unmatched_detections = unmatched_detections_mask
        .iter()
        .enumerate()
        .filter_map(|(i, &u)| u.then_some(i))
        .collect();

    AssignmentResult {
        matches,
        unmatched_tracks,
        unmatched_detections,
    }
}
