//! Multi-view tracker: buffers cycles and resolves identities over them.

use std::collections::{BTreeSet, VecDeque};

use log::{debug, trace};

use crate::candidate::{MVObjectCandidate, WorldPoint};
use crate::detection::Frame;
use crate::error::{Result, ScouterError};
use crate::tracker::assignment::{self, AssignmentResult};
use crate::tracker::config::TrackerConfig;
use crate::tracker::kalman_filter::KalmanFilter;
use crate::tracker::result::{Trackee, TrackingResult};
use crate::tracker::track::Track;
use crate::tracker::track_state::TrackState;

/// Everything pushed for one instant.
#[derive(Debug, Clone)]
pub struct Cycle {
    pub timestamp: u64,
    pub frames: Vec<Frame>,
    pub candidates: Vec<MVObjectCandidate>,
}

pub struct Tracker {
    config: TrackerConfig,
    kalman_filter: KalmanFilter,
    /// Resolved cycles kept as history, followed by `pending` unresolved ones.
    cycles: VecDeque<Cycle>,
    pending: usize,
    last_pushed: Option<u64>,
    last_tracked: Option<u64>,
    tracks: Vec<Track>,
    next_id: u64,
    next_seq: u64,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let kalman_filter = KalmanFilter::new(
            config.std_position,
            config.std_velocity,
            config.std_measurement,
        );
        Ok(Self {
            config,
            kalman_filter,
            cycles: VecDeque::new(),
            pending: 0,
            last_pushed: None,
            last_tracked: None,
            tracks: Vec::new(),
            next_id: 1,
            next_seq: 0,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Buffer one cycle of observations.
    ///
    /// Timestamps must strictly increase. Without one, the previous
    /// timestamp plus `default_interval` is used.
    pub fn push(
        &mut self,
        frames: Vec<Frame>,
        candidates: Vec<MVObjectCandidate>,
        timestamp: Option<u64>,
    ) -> Result<()> {
        let timestamp = match (timestamp, self.last_pushed) {
            (Some(ts), _) => ts,
            (None, Some(last)) => last.saturating_add(self.config.default_interval),
            (None, None) => 0,
        };
        if let Some(last) = self.last_pushed {
            if timestamp <= last {
                return Err(ScouterError::invalid(format!(
                    "timestamp {timestamp} does not follow previous cycle {last}"
                )));
            }
        }

        let mut cameras = BTreeSet::new();
        for frame in &frames {
            if !cameras.insert(frame.camera_id) {
                return Err(ScouterError::invalid(format!(
                    "camera {} pushed twice in cycle {timestamp}",
                    frame.camera_id
                )));
            }
        }
        if let Some(bad) = candidates.iter().find(|c| !c.world_position.is_finite()) {
            return Err(ScouterError::invalid(format!(
                "non-finite candidate position {:?} in cycle {timestamp}",
                bad.world_position
            )));
        }

        self.cycles.push_back(Cycle {
            timestamp,
            frames,
            candidates,
        });
        self.pending += 1;
        self.last_pushed = Some(timestamp);
        self.trim();
        Ok(())
    }

    /// The history window is full and a cycle is waiting to be resolved.
    pub fn ready(&self) -> bool {
        self.pending > 0 && self.cycles.len() >= self.config.window_size
    }

    /// Resolve the oldest pending cycle.
    pub fn track(&mut self) -> Result<TrackingResult> {
        if !self.ready() {
            return Err(ScouterError::NotReady);
        }
        let cycle = &self.cycles[self.cycles.len() - self.pending];
        let (timestamp, candidates) = (cycle.timestamp, cycle.candidates.clone());
        self.pending -= 1;

        let result = self.step(timestamp, candidates);
        self.trim();
        Ok(result)
    }

    /// Resolve every pending cycle up to `timestamp` and return the last result.
    pub fn track_at(&mut self, timestamp: u64) -> Result<TrackingResult> {
        let mut result = None;
        while self.ready() && self.next_pending_timestamp().is_some_and(|ts| ts <= timestamp) {
            result = Some(self.track()?);
        }
        result.ok_or(ScouterError::NotReady)
    }

    fn next_pending_timestamp(&self) -> Option<u64> {
        (self.pending > 0).then(|| self.cycles[self.cycles.len() - self.pending].timestamp)
    }

    /// Buffered frames, oldest first, with their timestamps.
    pub fn frame_history(&self) -> impl Iterator<Item = (u64, &[Frame])> + '_ {
        self.cycles.iter().map(|c| (c.timestamp, c.frames.as_slice()))
    }

    /// Frames of the most recently resolved cycle, while it is still
    /// buffered. This is the backdrop the visualizer draws on.
    pub fn last_resolved_frames(&self) -> Option<&[Frame]> {
        let last = self.last_tracked?;
        let idx = self.cycles.len().checked_sub(self.pending + 1)?;
        let cycle = &self.cycles[idx];
        (cycle.timestamp == last).then_some(cycle.frames.as_slice())
    }

    /// Ids of every confirmed identity, ascending.
    pub fn live_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.tracks.iter().filter_map(|t| t.id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    fn trim(&mut self) {
        while self.cycles.len() > self.config.window_size && self.cycles.len() > self.pending {
            self.cycles.pop_front();
        }
    }

    fn step(&mut self, timestamp: u64, candidates: Vec<MVObjectCandidate>) -> TrackingResult {
        let dt = self
            .last_tracked
            .map_or(0.0, |last| timestamp.saturating_sub(last) as f64 * self.config.time_unit_secs);
        self.last_tracked = Some(timestamp);
        Track::multi_predict(&mut self.tracks, &self.kalman_filter, dt);

        // Confirmed tracks by id first, then unconfirmed by creation order.
        self.tracks
            .sort_by_key(|t| (t.id.is_none(), t.id.unwrap_or(0), t.seq));
        let n_confirmed = self.tracks.iter().take_while(|t| t.id.is_some()).count();

        let positions: Vec<WorldPoint> = candidates.iter().map(|c| c.world_position).collect();
        let mut slots: Vec<Option<MVObjectCandidate>> = candidates.into_iter().map(Some).collect();
        let mut matched = vec![false; self.tracks.len()];

        // Step 1: confirmed tracks against every candidate
        let confirmed: Vec<WorldPoint> = self.tracks[..n_confirmed].iter().map(Track::position).collect();
        let all: Vec<usize> = (0..positions.len()).collect();
        let AssignmentResult {
            matches,
            unmatched_detections: remaining,
            ..
        } = self.associate(&confirmed, &positions, &all);
        for (ti, ci) in matches {
            self.apply_match(ti, &mut slots, ci, timestamp);
            matched[ti] = true;
        }

        // Step 2: unconfirmed tracks against what is left
        let unconfirmed: Vec<WorldPoint> = self.tracks[n_confirmed..].iter().map(Track::position).collect();
        let AssignmentResult {
            matches,
            unmatched_detections: unmatched_new,
            ..
        } = self.associate(&unconfirmed, &positions, &remaining);
        for (ti, ci) in matches {
            self.apply_match(n_confirmed + ti, &mut slots, ci, timestamp);
            matched[n_confirmed + ti] = true;
        }

        // Step 3: promotion, in association order
        for track in self.tracks.iter_mut() {
            if track.id.is_none() && track.hits >= self.config.min_hits {
                track.promote(self.next_id);
                debug!("track #{} promoted to id {}", track.seq, self.next_id);
                self.next_id += 1;
            }
        }

        // Step 4: misses
        let max_missed = self.config.max_missed;
        for (track, _) in self.tracks.iter_mut().zip(&matched).filter(|(_, m)| !**m) {
            if track.mark_missed(max_missed) == TrackState::Lost {
                if let Some(id) = track.id {
                    debug!("track {} lost after {} missed cycles", id, track.missed);
                }
            }
        }
        self.tracks.retain(|t| t.state != TrackState::Lost);

        // Step 5: new tracks from unmatched candidates, in input order
        for ci in unmatched_new {
            let Some(candidate) = slots[ci].take() else {
                continue;
            };
            let mut track = Track::new(candidate, self.next_seq, timestamp, &self.kalman_filter);
            self.next_seq += 1;
            if self.config.min_hits <= 1 {
                track.promote(self.next_id);
                self.next_id += 1;
            }
            self.tracks.push(track);
        }

        let mut trackees: Vec<Trackee> = self
            .tracks
            .iter()
            .filter_map(|t| {
                let id = t.id?;
                match t.state {
                    TrackState::Active if t.last_timestamp == timestamp => Some(Trackee {
                        id,
                        candidate: t.last_candidate.clone(),
                        interpolated: false,
                    }),
                    TrackState::Coasting if self.config.emit_interpolated => Some(Trackee {
                        id,
                        candidate: t.predicted_candidate(),
                        interpolated: true,
                    }),
                    _ => None,
                }
            })
            .collect();
        trackees.sort_by_key(|t| t.id);

        debug!(
            "cycle {}: {} tracks, {} trackees",
            timestamp,
            self.tracks.len(),
            trackees.len()
        );
        TrackingResult {
            timestamp,
            trackees,
        }
    }

    /// Assign `tracks` to the candidates listed in `subset`. Returned
    /// candidate indices refer to `positions`.
    fn associate(
        &self,
        tracks: &[WorldPoint],
        positions: &[WorldPoint],
        subset: &[usize],
    ) -> AssignmentResult {
        let points: Vec<WorldPoint> = subset.iter().map(|&i| positions[i]).collect();
        let cost = assignment::distance_matrix(tracks, &points, self.config.max_distance);
        let mut result = assignment::linear_assignment(&cost, self.config.max_distance);
        for m in result.matches.iter_mut() {
            m.1 = subset[m.1];
        }
        for d in result.unmatched_detections.iter_mut() {
            *d = subset[*d];
        }
        result.unmatched_detections.sort_unstable();
        result
    }

    fn apply_match(
        &mut self,
        track_idx: usize,
        slots: &mut [Option<MVObjectCandidate>],
        candidate_idx: usize,
        timestamp: u64,
    ) {
        if let Some(candidate) = slots[candidate_idx].take() {
            trace!(
                "track #{} <- candidate {} at {:?}",
                self.tracks[track_idx].seq,
                candidate_idx,
                candidate.world_position
            );
            self.tracks[track_idx].update(candidate, &self.kalman_filter, timestamp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f64, y: f64) -> MVObjectCandidate {
        MVObjectCandidate {
            world_position: WorldPoint::new(x, y),
            height: None,
            score: 0.9,
            contributing: vec![],
        }
    }

    fn config() -> TrackerConfig {
        TrackerConfig {
            min_hits: 1,
            time_unit_secs: 1.0,
            default_interval: 1,
            ..TrackerConfig::default()
        }
    }

    #[test]
    fn test_track_before_ready_fails_fast() {
        let mut tracker = Tracker::new(config()).unwrap();
        assert!(!tracker.ready());
        assert!(matches!(tracker.track(), Err(ScouterError::NotReady)));
    }

    #[test]
    fn test_window_gates_readiness() {
        let mut tracker = Tracker::new(TrackerConfig {
            window_size: 3,
            ..config()
        })
        .unwrap();
        tracker.push(vec![], vec![at(0.0, 0.0)], Some(1)).unwrap();
        tracker.push(vec![], vec![at(0.1, 0.0)], Some(2)).unwrap();
        assert!(!tracker.ready());
        tracker.push(vec![], vec![at(0.2, 0.0)], Some(3)).unwrap();
        assert!(tracker.ready());

        let r = tracker.track_at(3).unwrap();
        assert_eq!(r.timestamp, 3);
        assert_eq!(r.ids(), vec![1]);
        assert!(!tracker.ready());
        assert_eq!(tracker.frame_history().count(), 3);
    }

    #[test]
    fn test_push_rejects_bad_cycles() {
        let mut tracker = Tracker::new(config()).unwrap();
        tracker.push(vec![], vec![], Some(5)).unwrap();
        assert!(tracker.push(vec![], vec![], Some(5)).is_err());
        assert!(tracker.push(vec![], vec![at(f64::NAN, 0.0)], Some(6)).is_err());

        let img = image::RgbImage::new(4, 4);
        let frames = vec![Frame::new(0, img.clone()), Frame::new(0, img)];
        assert!(tracker.push(frames, vec![], Some(7)).is_err());

        // Rejected pushes leave nothing queued beyond the first cycle.
        assert_eq!(tracker.frame_history().count(), 1);
        tracker.push(vec![], vec![], None).unwrap();
        assert_eq!(tracker.frame_history().last().map(|(ts, _)| ts), Some(6));
    }

    #[test]
    fn test_last_resolved_frames_follow_tracking() {
        let mut tracker = Tracker::new(TrackerConfig {
            window_size: 2,
            ..config()
        })
        .unwrap();
        let frame = |w| vec![Frame::new(0, image::RgbImage::new(w, 1))];
        tracker.push(frame(1), vec![], Some(1)).unwrap();
        tracker.push(frame(2), vec![], Some(2)).unwrap();
        assert!(tracker.last_resolved_frames().is_none());

        tracker.track().unwrap();
        let frames = tracker.last_resolved_frames().unwrap();
        assert_eq!(frames[0].width(), 1);

        tracker.push(frame(3), vec![], Some(3)).unwrap();
        tracker.track().unwrap();
        assert_eq!(tracker.last_resolved_frames().unwrap()[0].width(), 2);
    }

    #[test]
    fn test_ids_are_deterministic_per_tracker() {
        let run = || {
            let mut tracker = Tracker::new(config()).unwrap();
            tracker
                .push(vec![], vec![at(5.0, 0.0), at(0.0, 0.0)], Some(1))
                .unwrap();
            tracker.track().unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a, b);
        assert_eq!(a.ids(), vec![1, 2]);
        assert_eq!(a.get(1).map(|t| t.candidate.world_position.x), Some(5.0));
    }

    #[test]
    fn test_coasting_is_interpolated() {
        let mut tracker = Tracker::new(TrackerConfig {
            max_missed: 1,
            ..config()
        })
        .unwrap();
        for (ts, x) in [(1, 0.0), (2, 0.1)] {
            tracker.push(vec![], vec![at(x, 0.0)], Some(ts)).unwrap();
            tracker.track().unwrap();
        }

        tracker.push(vec![], vec![], Some(3)).unwrap();
        let r = tracker.track().unwrap();
        assert_eq!(r.trackees.len(), 1);
        assert!(r.trackees[0].interpolated);
        assert!(!r.trackees[0].candidate.is_observed());

        tracker.push(vec![], vec![], Some(4)).unwrap();
        let r = tracker.track().unwrap();
        assert!(r.is_empty());
        assert!(tracker.live_ids().is_empty());
    }
}
