//! JSON report consumed by downstream reporting systems.
//!
//! Field names and nesting are part of an external contract:
//!
//! ```text
//! {"time":<ms>,"instances":[{"id":7,"location":{"x":100,"y":200,"floor_id":3},"labels":["k=v"]}]}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScouterError};

use super::state::InstanceState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstancesReport {
    /// Epoch milliseconds
    pub time: u64,
    pub instances: Vec<ExportedInstance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedInstance {
    pub id: u64,
    pub location: Location,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub x: i64,
    pub y: i64,
    pub floor_id: i64,
}

impl InstancesReport {
    /// Positions are rounded to the nearest integer world unit.
    pub fn new(states: &[InstanceState], floor_id: i64, time_ms: u64) -> Self {
        let instances = states
            .iter()
            .map(|s| ExportedInstance {
                id: s.id,
                location: Location {
                    x: s.position.x.round() as i64,
                    y: s.position.y.round() as i64,
                    floor_id,
                },
                labels: s.labels(),
            })
            .collect();
        Self {
            time: time_ms,
            instances,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(ScouterError::Serialization)
    }
}

pub fn convert_instance_states_to_json(
    states: &[InstanceState],
    floor_id: i64,
    time_ms: u64,
) -> Result<String> {
    InstancesReport::new(states, floor_id, time_ms).to_json()
}

/// Microsecond timestamps to the milliseconds the report carries.
pub fn micros_to_millis(micros: u64) -> u64 {
    micros / 1_000
}
