//! Single tracked identity.

use ndarray::{Array1, Array2};

use crate::candidate::{MVObjectCandidate, WorldPoint};
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::track_state::TrackState;

/// One identity followed across cycles.
#[derive(Debug, Clone)]
pub struct Track {
    /// Stable id, assigned on promotion out of `Unconfirmed`
    pub id: Option<u64>,
    pub state: TrackState,
    /// Creation order, used to order unconfirmed tracks
    pub seq: u64,
    /// Consecutive matched cycles
    pub hits: u32,
    /// Consecutive unmatched cycles
    pub missed: u32,
    pub start_timestamp: u64,
    pub last_timestamp: u64,
    /// Kalman filter state mean (4-dim)
    pub mean: Array1<f64>,
    /// Kalman filter state covariance (4x4)
    pub covariance: Array2<f64>,
    /// Latest observation
    pub last_candidate: MVObjectCandidate,
}

impl Track {
    pub fn new(
        candidate: MVObjectCandidate,
        seq: u64,
        timestamp: u64,
        kalman_filter: &KalmanFilter,
    ) -> Self {
        let p = candidate.world_position;
        let (mean, covariance) = kalman_filter.initiate([p.x, p.y]);
        Self {
            id: None,
            state: TrackState::Unconfirmed,
            seq,
            hits: 1,
            missed: 0,
            start_timestamp: timestamp,
            last_timestamp: timestamp,
            mean,
            covariance,
            last_candidate: candidate,
        }
    }

    /// Current filtered or predicted position.
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.mean[0], self.mean[1])
    }

    pub fn velocity(&self) -> WorldPoint {
        WorldPoint::new(self.mean[2], self.mean[3])
    }

    pub fn is_confirmed(&self) -> bool {
        self.id.is_some() && self.state.is_confirmed()
    }

    pub fn predict(&mut self, kalman_filter: &KalmanFilter, dt: f64) {
        let (mean, cov) = kalman_filter.predict(&self.mean, &self.covariance, dt);
        self.mean = mean;
        self.covariance = cov;
    }

    pub fn update(&mut self, candidate: MVObjectCandidate, kalman_filter: &KalmanFilter, timestamp: u64) {
        let p = candidate.world_position;
        let (mean, cov) = kalman_filter.update(&self.mean, &self.covariance, [p.x, p.y]);
        self.mean = mean;
        self.covariance = cov;
        self.hits += 1;
        self.missed = 0;
        self.last_timestamp = timestamp;
        self.last_candidate = candidate;
        if self.state == TrackState::Coasting {
            self.state = TrackState::Active;
        }
    }

    /// Give the track its stable id.
    pub fn promote(&mut self, id: u64) {
        self.id = Some(id);
        self.state = TrackState::Active;
    }

    /// Record a cycle without a match. Returns the new state.
    pub fn mark_missed(&mut self, max_missed: u32) -> TrackState {
        self.hits = 0;
        self.missed += 1;
        self.state = match self.state {
            TrackState::Unconfirmed => TrackState::Lost,
            _ if self.missed > max_missed => TrackState::Lost,
            _ => TrackState::Coasting,
        };
        self.state
    }

    /// Candidate describing the predicted position.
    pub fn predicted_candidate(&self) -> MVObjectCandidate {
        MVObjectCandidate::predicted(self.position(), self.last_candidate.height)
    }

    pub fn multi_predict(tracks: &mut [Track], kalman_filter: &KalmanFilter, dt: f64) {
        for track in tracks.iter_mut() {
            track.predict(kalman_filter, dt);
        }
    }
}
