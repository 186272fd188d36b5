use serde::{Deserialize, Serialize};

use crate::error::{Result, ScouterError};
use crate::tracker::assignment::GATED_COST;

/// Configuration for the multi-view tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Association gate, in world units.
    pub max_distance: f64,
    /// Consecutive matches before a track gets a stable id.
    pub min_hits: u32,
    /// Grace period, in cycles, before a coasting track is retired.
    pub max_missed: u32,
    /// Cycles of history that must be buffered before tracking starts.
    pub window_size: usize,
    /// Timestamp step used when `push` is given no timestamp.
    pub default_interval: u64,
    /// Seconds per timestamp tick.
    pub time_unit_secs: f64,
    /// Report coasting tracks with their predicted position.
    pub emit_interpolated: bool,
    pub std_position: f64,
    pub std_velocity: f64,
    pub std_measurement: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_distance: 1.0,
            min_hits: 2,
            max_missed: 5,
            window_size: 1,
            default_interval: 100_000,
            time_unit_secs: 1e-6,
            emit_interpolated: true,
            std_position: 0.1,
            std_velocity: 0.5,
            std_measurement: 0.1,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("max_distance", self.max_distance),
            ("time_unit_secs", self.time_unit_secs),
            ("std_position", self.std_position),
            ("std_velocity", self.std_velocity),
            ("std_measurement", self.std_measurement),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ScouterError::config(format!(
                    "tracker.{name} must be positive, got {value}"
                )));
            }
        }
        if self.max_distance >= GATED_COST {
            return Err(ScouterError::config(format!(
                "tracker.max_distance must be below {GATED_COST}, got {}",
                self.max_distance
            )));
        }
        if self.min_hits == 0 {
            return Err(ScouterError::config("tracker.min_hits must be at least 1"));
        }
        if self.window_size == 0 {
            return Err(ScouterError::config("tracker.window_size must be at least 1"));
        }
        if self.default_interval == 0 {
            return Err(ScouterError::config("tracker.default_interval must be positive"));
        }
        Ok(())
    }
}
