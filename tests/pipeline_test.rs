use image::RgbImage;
use scouter_rs::detection::{CandidateBuilder, Detector, Frame, NoTagger};
use scouter_rs::{CameraId, ObjectCandidate, Pipeline, PipelineConfig, ScouterError, micros_to_millis};

const CONFIG: &str = r#"{
    "floor_id": 2,
    "cameras": [
        {"camera_id": 0, "homography": [[0.01, 0, 0], [0, 0.01, 0], [0, 0, 1]]},
        {"camera_id": 1, "homography": [[0.01, 0, 0], [0, 0.01, 0], [0, 0, 1]]}
    ],
    "frame_processors": [
        {"camera_id": 1, "roi": {"x": 100, "y": 0, "width": 540, "height": 480}}
    ],
    "tracker": {"min_hits": 2, "max_missed": 3},
    "visualizer": {"camera_ids": [0, 1], "marker_radius": 4}
}"#;

/// Sees one person standing at a known world position.
struct ScriptedDetector {
    world: (f64, f64),
}

impl Detector for ScriptedDetector {
    type Error = std::io::Error;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<ObjectCandidate>, Self::Error> {
        let px = (self.world.0 * 100.0) as f32 - frame.meta.offset_x as f32;
        let py = (self.world.1 * 100.0) as f32 - frame.meta.offset_y as f32;
        Ok(vec![
            CandidateBuilder::new()
                .camera(frame.camera_id)
                .tlbr(px - 15.0, py - 120.0, px + 15.0, py)
                .score(0.9)
                .build(),
        ])
    }
}

struct FailingDetector;

impl Detector for FailingDetector {
    type Error = std::io::Error;

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<ObjectCandidate>, Self::Error> {
        Err(std::io::Error::other("model not loaded"))
    }
}

fn raw() -> Vec<(CameraId, RgbImage)> {
    vec![(0, RgbImage::new(640, 480)), (1, RgbImage::new(640, 480))]
}

#[test]
fn test_end_to_end_identity_and_export() {
    let config = PipelineConfig::from_json(CONFIG).unwrap();
    let detector = ScriptedDetector { world: (2.0, 3.0) };
    let mut pipeline = Pipeline::new(config, detector, NoTagger).unwrap();

    let start: u64 = 1_620_000_000_000_000;
    let mut id = None;
    for cycle in 0..6u64 {
        let x = 2.0 + 0.12 * cycle as f64;
        pipeline.detector_mut().world = (x, 3.0);
        let ts = start + cycle * 100_000;
        let out = pipeline.process(&raw(), Some(ts)).unwrap().unwrap();

        if cycle == 0 {
            // Not yet promoted.
            assert!(out.tracking.is_empty());
            continue;
        }
        assert_eq!(out.tracking.trackees.len(), 1);
        let trackee = &out.tracking.trackees[0];
        assert_eq!(trackee.candidate.camera_ids(), vec![0, 1]);
        assert!((trackee.candidate.world_position.x - x).abs() < 1e-3);
        assert_eq!(*id.get_or_insert(trackee.id), trackee.id);
    }

    let states = pipeline.instances().get_current_states().unwrap();
    assert_eq!(states.len(), 1);
    let json = pipeline
        .export_json(&states, micros_to_millis(start + 500_000))
        .unwrap();
    assert_eq!(
        json,
        r#"{"time":1620000000500,"instances":[{"id":1,"location":{"x":3,"y":3,"floor_id":2},"labels":[]}]}"#
    );

    let plot = pipeline.draw().unwrap().unwrap();
    assert_eq!(plot.dimensions(), (1280, 480));
}

#[test]
fn test_detector_failure_is_recoverable() {
    let config = PipelineConfig::from_json(CONFIG).unwrap();
    let mut pipeline = Pipeline::new(config, FailingDetector, NoTagger).unwrap();
    let err = pipeline.process(&raw(), Some(0)).unwrap_err();
    assert!(matches!(err, ScouterError::Detection(_)));
    assert!(!err.is_fatal());
    assert!(pipeline.tracker().frame_history().next().is_none());
}

#[test]
fn test_invalid_config_is_fatal() {
    let mut config = PipelineConfig::from_json(CONFIG).unwrap();
    config.tracker.window_size = 0;
    let err = Pipeline::new(config, FailingDetector, NoTagger).err().unwrap();
    assert!(err.is_fatal());
}
