//! Identity tracking over multi-view candidates.
//!
//! The [`Tracker`] buffers pushed cycles in a rolling window and resolves
//! them one at a time, assigning persistent ids with a constant-velocity
//! Kalman filter and optimal linear assignment.

mod assignment;
mod config;
mod kalman_filter;
mod mv_tracker;
mod result;
mod track;
mod track_state;

pub use assignment::{AssignmentResult, distance_matrix, linear_assignment};
pub use config::TrackerConfig;
pub use kalman_filter::KalmanFilter;
pub use mv_tracker::{Cycle, Tracker};
pub use result::{Trackee, TrackingResult};
pub use track::Track;
pub use track_state::TrackState;
