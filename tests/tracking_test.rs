use scouter_rs::candidate::{MVObjectCandidate, WorldPoint};
use scouter_rs::{ScouterError, Tracker, TrackerConfig, TrackingResult};

fn at(x: f64, y: f64) -> MVObjectCandidate {
    MVObjectCandidate {
        world_position: WorldPoint::new(x, y),
        height: Some(1.7),
        score: 0.9,
        contributing: vec![],
    }
}

fn config() -> TrackerConfig {
    TrackerConfig {
        max_distance: 1.0,
        min_hits: 1,
        max_missed: 2,
        time_unit_secs: 1.0,
        default_interval: 1,
        ..TrackerConfig::default()
    }
}

fn step(tracker: &mut Tracker, ts: u64, candidates: Vec<MVObjectCandidate>) -> TrackingResult {
    tracker.push(vec![], candidates, Some(ts)).unwrap();
    tracker.track().unwrap()
}

#[test]
fn test_identity_survives_missed_cycle() {
    let mut tracker = Tracker::new(config()).unwrap();
    let mut id = None;

    for cycle in 1..=10u64 {
        let x = 0.3 * cycle as f64;
        let candidates = if cycle == 4 { vec![] } else { vec![at(x, 2.0)] };
        let result = step(&mut tracker, cycle, candidates);

        assert_eq!(result.trackees.len(), 1, "cycle {cycle}");
        let trackee = &result.trackees[0];
        let expected = *id.get_or_insert(trackee.id);
        assert_eq!(trackee.id, expected, "cycle {cycle}");
        assert_eq!(trackee.interpolated, cycle == 4, "cycle {cycle}");
        assert_eq!(tracker.live_ids(), vec![expected]);
    }
}

#[test]
fn test_interpolated_position_extrapolates() {
    let mut tracker = Tracker::new(config()).unwrap();
    for cycle in 1..=5u64 {
        step(&mut tracker, cycle, vec![at(cycle as f64 * 0.2, 0.0)]);
    }
    let result = step(&mut tracker, 6, vec![]);
    let predicted = result.trackees[0].candidate.world_position.x;
    // Moving +x: prediction lies beyond the last observation.
    assert!(predicted > 1.0 && predicted < 1.4, "predicted {predicted}");
}

#[test]
fn test_min_hits_debounces_spurious_candidates() {
    let mut tracker = Tracker::new(TrackerConfig {
        min_hits: 3,
        ..config()
    })
    .unwrap();

    // A spurious candidate far away shows up once.
    let r1 = step(&mut tracker, 1, vec![at(0.0, 0.0), at(10.0, 10.0)]);
    let r2 = step(&mut tracker, 2, vec![at(0.1, 0.0)]);
    assert!(r1.is_empty());
    assert!(r2.is_empty());

    let r3 = step(&mut tracker, 3, vec![at(0.2, 0.0)]);
    assert_eq!(r3.ids(), vec![1]);
    assert!(!r3.trackees[0].interpolated);
}

#[test]
fn test_grace_period_retires_identity() {
    let mut tracker = Tracker::new(config()).unwrap();
    step(&mut tracker, 1, vec![at(0.0, 0.0)]);
    for ts in 2..=3 {
        let r = step(&mut tracker, ts, vec![]);
        assert!(r.trackees[0].interpolated);
    }
    let r = step(&mut tracker, 4, vec![]);
    assert!(r.is_empty());
    assert!(tracker.live_ids().is_empty());

    // A new object gets a fresh id.
    let r = step(&mut tracker, 5, vec![at(0.0, 0.0)]);
    assert_eq!(r.ids(), vec![2]);
}

#[test]
fn test_two_objects_keep_their_ids() {
    let mut tracker = Tracker::new(config()).unwrap();
    let first = step(&mut tracker, 1, vec![at(0.0, 0.0), at(0.0, 3.0)]);
    let ids_by_y = |r: &TrackingResult| {
        let mut v: Vec<(i64, u64)> = r
            .trackees
            .iter()
            .map(|t| (t.candidate.world_position.y.round() as i64, t.id))
            .collect();
        v.sort();
        v
    };
    let expected = ids_by_y(&first);

    for ts in 2..=6u64 {
        let x = ts as f64 * 0.25;
        // Reversed input order must not swap identities.
        let r = step(&mut tracker, ts, vec![at(x, 3.0), at(x, 0.0)]);
        assert_eq!(ids_by_y(&r), expected);
    }
}

#[test]
fn test_not_ready_fails_fast() {
    let mut tracker = Tracker::new(TrackerConfig {
        window_size: 2,
        ..config()
    })
    .unwrap();
    assert!(matches!(tracker.track(), Err(ScouterError::NotReady)));
    tracker.push(vec![], vec![at(0.0, 0.0)], Some(10)).unwrap();
    assert!(matches!(tracker.track(), Err(ScouterError::NotReady)));

    tracker.push(vec![], vec![at(0.1, 0.0)], None).unwrap();
    assert!(matches!(tracker.track_at(5), Err(ScouterError::NotReady)));
    let r = tracker.track_at(11).unwrap();
    assert_eq!(r.timestamp, 11);
}
