use serde::{Deserialize, Serialize};

use crate::candidate::MVObjectCandidate;

/// One identity's state in one tracking cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trackee {
    pub id: u64,
    pub candidate: MVObjectCandidate,
    /// The position was predicted, not observed, this cycle.
    pub interpolated: bool,
}

/// Output of one tracking cycle. Trackees are sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingResult {
    pub timestamp: u64,
    pub trackees: Vec<Trackee>,
}

impl TrackingResult {
    pub fn ids(&self) -> Vec<u64> {
        self.trackees.iter().map(|t| t.id).collect()
    }

    pub fn get(&self, id: u64) -> Option<&Trackee> {
        self.trackees
            .binary_search_by_key(&id, |t| t.id)
            .ok()
            .map(|i| &self.trackees[i])
    }

    pub fn is_empty(&self) -> bool {
        self.trackees.is_empty()
    }
}
