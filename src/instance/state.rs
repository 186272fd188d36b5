use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::candidate::{Tag, WorldPoint};

/// Current knowledge about one tracked instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceState {
    pub id: u64,
    pub position: WorldPoint,
    pub height: Option<f32>,
    /// Majority tag per key, sorted by key.
    pub tags: Vec<Tag>,
    pub first_seen: u64,
    pub last_seen: u64,
    /// The latest position was predicted rather than observed.
    pub interpolated: bool,
    /// Recent positions, oldest first.
    pub trajectory: VecDeque<WorldPoint>,
}

impl InstanceState {
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// Tags rendered as `key=value` labels.
    pub fn labels(&self) -> Vec<String> {
        self.tags.iter().map(Tag::to_string).collect()
    }
}
