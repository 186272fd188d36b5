//! Multi-view object matching.
//!
//! Fuses the candidates several cameras observed at one instant into
//! multi-view candidates, one per physical object. Candidates no other
//! camera confirms come out as single-view groups.

mod affinity;
mod matching;

pub use affinity::{ProjectedCandidate, affinity_matrix, pair_affinity, project_views};
pub use matching::{MultiViewMatcher, MvomConfig, get_matching};
