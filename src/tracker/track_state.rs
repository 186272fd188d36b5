use serde::{Deserialize, Serialize};

/// Track state enumeration for the identity lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackState {
    /// Seen but not yet promoted to a stable id
    #[default]
    Unconfirmed,
    /// Matched in the latest cycle
    Active,
    /// Unmatched, position extrapolated within the grace period
    Coasting,
    /// Grace period exceeded; the id is retired
    Lost,
}

impl TrackState {
    pub fn is_confirmed(self) -> bool {
        matches!(self, TrackState::Active | TrackState::Coasting)
    }
}
