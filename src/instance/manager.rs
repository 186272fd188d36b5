use std::collections::{BTreeMap, BTreeSet, VecDeque};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::candidate::Tag;
use crate::error::{Result, ScouterError};
use crate::tracker::{Trackee, TrackingResult};

use super::state::InstanceState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceManagerConfig {
    /// An instance absent for longer than this many timestamp ticks is
    /// evicted on the next update.
    pub stale_timeout: u64,
    /// Positions kept per instance.
    pub trajectory_length: usize,
}

impl Default for InstanceManagerConfig {
    fn default() -> Self {
        Self {
            stale_timeout: 3_000_000,
            trajectory_length: 64,
        }
    }
}

impl InstanceManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trajectory_length == 0 {
            return Err(ScouterError::config(
                "instance_manager.trajectory_length must be at least 1",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Record {
    state: InstanceState,
    /// key -> value -> count
    votes: BTreeMap<String, BTreeMap<String, u32>>,
}

impl Record {
    fn new(trackee: &Trackee, timestamp: u64) -> Self {
        Self {
            state: InstanceState {
                id: trackee.id,
                position: trackee.candidate.world_position,
                height: trackee.candidate.height,
                tags: Vec::new(),
                first_seen: timestamp,
                last_seen: timestamp,
                interpolated: trackee.interpolated,
                trajectory: VecDeque::new(),
            },
            votes: BTreeMap::new(),
        }
    }

    fn apply(&mut self, trackee: &Trackee, timestamp: u64, trajectory_length: usize) {
        let state = &mut self.state;
        state.position = trackee.candidate.world_position;
        if trackee.candidate.height.is_some() {
            state.height = trackee.candidate.height;
        }
        state.last_seen = timestamp;
        state.interpolated = trackee.interpolated;

        state.trajectory.push_back(state.position);
        while state.trajectory.len() > trajectory_length {
            state.trajectory.pop_front();
        }

        if trackee.interpolated {
            return;
        }
        for tag in trackee.candidate.contributing.iter().flat_map(|c| &c.tags) {
            *self
                .votes
                .entry(tag.key.clone())
                .or_default()
                .entry(tag.value.clone())
                .or_default() += 1;
        }
        state.tags = self
            .votes
            .iter()
            .filter_map(|(key, values)| {
                // Most votes; BTreeMap order settles ties on the smallest value.
                let (value, _) = values
                    .iter()
                    .fold(None, |best: Option<(&String, u32)>, (v, &n)| match best {
                        Some((_, m)) if m >= n => best,
                        _ => Some((v, n)),
                    })?;
                Some(Tag::new(key.clone(), value.clone()))
            })
            .collect();
    }
}

/// Table of current instance states keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InstanceManager {
    config: InstanceManagerConfig,
    records: BTreeMap<u64, Record>,
    last_update: Option<u64>,
}

impl InstanceManager {
    pub fn new(config: InstanceManagerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            records: BTreeMap::new(),
            last_update: None,
        })
    }

    pub fn config(&self) -> &InstanceManagerConfig {
        &self.config
    }

    /// Upsert every trackee of `result`, then evict stale instances.
    ///
    /// Returns the evicted states. A rejected result leaves the table
    /// untouched.
    pub fn update(&mut self, result: &TrackingResult) -> Result<Vec<InstanceState>> {
        if let Some(last) = self.last_update {
            if result.timestamp < last {
                return Err(ScouterError::invalid(format!(
                    "tracking result {} is older than the last update {last}",
                    result.timestamp
                )));
            }
        }
        let mut ids = BTreeSet::new();
        if let Some(dup) = result.trackees.iter().find(|t| !ids.insert(t.id)) {
            return Err(ScouterError::invalid(format!(
                "id {} appears twice in tracking result {}",
                dup.id, result.timestamp
            )));
        }

        let timestamp = result.timestamp;
        self.last_update = Some(timestamp);
        for trackee in &result.trackees {
            self.records
                .entry(trackee.id)
                .or_insert_with(|| Record::new(trackee, timestamp))
                .apply(trackee, timestamp, self.config.trajectory_length);
        }

        let stale_timeout = self.config.stale_timeout;
        let stale: Vec<u64> = self
            .records
            .values()
            .filter(|r| timestamp.saturating_sub(r.state.last_seen) > stale_timeout)
            .map(|r| r.state.id)
            .collect();
        let evicted: Vec<InstanceState> = stale
            .into_iter()
            .filter_map(|id| self.records.remove(&id))
            .map(|r| r.state)
            .collect();
        if !evicted.is_empty() {
            debug!(
                "evicted {} stale instances at {}: {:?}",
                evicted.len(),
                timestamp,
                evicted.iter().map(|s| s.id).collect::<Vec<_>>()
            );
        }
        Ok(evicted)
    }

    /// Snapshot of every known instance, ascending by id.
    pub fn get_current_states(&self) -> Vec<InstanceState> {
        self.records.values().map(|r| r.state.clone()).collect()
    }

    pub fn get(&self, id: u64) -> Option<&InstanceState> {
        self.records.get(&id).map(|r| &r.state)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
