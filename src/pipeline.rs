//! Pipeline combining per-camera detection with matching, tracking and the
//! instance table.

use std::collections::BTreeMap;

use image::RgbImage;
use log::{debug, warn};

use crate::camera::{CameraParameter, CameraRegistry};
use crate::candidate::{CameraCandidates, CameraId};
use crate::config::PipelineConfig;
use crate::detection::{
    CandidateFilter, Detector, Frame, FrameProcessor, FrameProcessorConfig, ImageTagger, NoTagger,
};
use crate::error::{ErrorKind, Result, ScouterError};
use crate::instance::{
    InstanceManager, InstanceState, SharedInstanceManager, convert_instance_states_to_json,
};
use crate::mvom::MultiViewMatcher;
use crate::tracker::{Tracker, TrackingResult};
use crate::visualizer::InstancesVisualizer;

/// Result of one processed cycle.
#[derive(Debug, Clone)]
pub struct CycleOutput {
    /// The latest resolved tracking cycle
    pub tracking: TrackingResult,
    /// Instance table snapshot after the update
    pub states: Vec<InstanceState>,
    /// Instances evicted as stale during this call
    pub evicted: Vec<InstanceState>,
}

/// End-to-end multi-camera pipeline.
///
/// Each call to [`Pipeline::process`] runs one cycle: frame processing,
/// detection, refinement, tagging, multi-view matching, tracking and the
/// instance table update.
pub struct Pipeline<D: Detector, T: ImageTagger = NoTagger> {
    floor_id: i64,
    cameras: CameraRegistry,
    processors: BTreeMap<CameraId, FrameProcessor>,
    filter: CandidateFilter,
    matcher: MultiViewMatcher,
    tracker: Tracker,
    instances: SharedInstanceManager,
    visualizer: Option<InstancesVisualizer>,
    detector: D,
    tagger: T,
}

impl<D, T> Pipeline<D, T>
where
    D: Detector,
    D::Error: std::error::Error + Send + Sync + 'static,
    T: ImageTagger,
    T::Error: std::error::Error + Send + Sync + 'static,
{
    pub fn new(config: PipelineConfig, detector: D, tagger: T) -> Result<Self> {
        config.validate()?;
        let cameras = config.registry()?;

        let mut processors = BTreeMap::new();
        for fp in &config.frame_processors {
            processors.insert(fp.camera_id, FrameProcessor::new(fp.clone())?);
        }
        for id in cameras.ids() {
            if !processors.contains_key(&id) {
                processors.insert(
                    id,
                    FrameProcessor::new(FrameProcessorConfig {
                        camera_id: id,
                        ..FrameProcessorConfig::default()
                    })?,
                );
            }
        }

        let visualizer = config
            .visualizer
            .clone()
            .map(|v| InstancesVisualizer::new(v, &cameras))
            .transpose()?;

        Ok(Self {
            floor_id: config.floor_id,
            processors,
            filter: CandidateFilter::new(config.refine)?,
            matcher: MultiViewMatcher::new(config.mvom)?,
            tracker: Tracker::new(config.tracker)?,
            instances: SharedInstanceManager::new(InstanceManager::new(config.instance_manager)?),
            visualizer,
            cameras,
            detector,
            tagger,
        })
    }

    /// Run one cycle on raw camera images.
    ///
    /// Returns `None` while the tracker is still filling its history window.
    pub fn process(
        &mut self,
        raw_frames: &[(CameraId, RgbImage)],
        timestamp: Option<u64>,
    ) -> Result<Option<CycleOutput>> {
        let frames = self.prepare(raw_frames).inspect_err(log_skipped)?;
        let views = self.detect(&frames).inspect_err(log_skipped)?;
        self.process_views(frames, views, timestamp)
    }

    /// Run one cycle on candidates that were detected elsewhere.
    ///
    /// Candidates must be in camera image coordinates.
    pub fn process_views(
        &mut self,
        frames: Vec<Frame>,
        views: Vec<CameraCandidates>,
        timestamp: Option<u64>,
    ) -> Result<Option<CycleOutput>> {
        self.advance(frames, views, timestamp).inspect_err(log_skipped)
    }

    fn prepare(&self, raw_frames: &[(CameraId, RgbImage)]) -> Result<Vec<Frame>> {
        raw_frames
            .iter()
            .map(|(id, image)| {
                let processor = self
                    .processors
                    .get(id)
                    .ok_or(ScouterError::UnknownCamera(*id))?;
                processor.apply(image)
            })
            .collect()
    }

    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<CameraCandidates>> {
        let detections = self
            .detector
            .detect_batch(frames)
            .map_err(|e| ScouterError::Detection(Box::new(e)))?;
        if detections.len() != frames.len() {
            return Err(ScouterError::Detection(
                format!(
                    "detector returned {} candidate lists for {} frames",
                    detections.len(),
                    frames.len()
                )
                .into(),
            ));
        }

        let mut views = Vec::with_capacity(frames.len());
        for (frame, candidates) in frames.iter().zip(detections) {
            let camera = self.cameras.get(frame.camera_id)?;
            let mut candidates = self.filter.refine(camera, candidates, &frame.meta);
            if !candidates.is_empty() {
                self.tagger
                    .predict_tags_batch(&mut candidates, &frame.image)
                    .map_err(|e| ScouterError::Tagging(Box::new(e)))?;
            }
            frame.meta.restore_all(&mut candidates);
            debug!(
                "camera {}: {} candidates after refinement",
                frame.camera_id,
                candidates.len()
            );
            views.push(CameraCandidates::new(frame.camera_id, candidates));
        }
        Ok(views)
    }

    fn advance(
        &mut self,
        frames: Vec<Frame>,
        views: Vec<CameraCandidates>,
        timestamp: Option<u64>,
    ) -> Result<Option<CycleOutput>> {
        let matched = self.matcher.get_matching(views, &self.cameras)?;
        self.tracker.push(frames, matched, timestamp)?;

        let mut latest = None;
        let mut evicted = Vec::new();
        while self.tracker.ready() {
            let tracking = self.tracker.track()?;
            evicted.extend(self.instances.update(&tracking)?);
            latest = Some(tracking);
        }
        let Some(tracking) = latest else {
            return Ok(None);
        };

        Ok(Some(CycleOutput {
            tracking,
            states: self.instances.get_current_states()?,
            evicted,
        }))
    }

    /// Render states with the configured floor id.
    pub fn export_json(&self, states: &[InstanceState], time_ms: u64) -> Result<String> {
        convert_instance_states_to_json(states, self.floor_id, time_ms)
    }

    /// Tiled trajectory plot of the current instances over the frames of the
    /// last resolved cycle, when a visualizer is configured.
    pub fn draw(&self) -> Result<Option<RgbImage>> {
        let Some(visualizer) = &self.visualizer else {
            return Ok(None);
        };
        let states = self.instances.get_current_states()?;
        let frames = self.tracker.last_resolved_frames().unwrap_or_default();
        Ok(Some(visualizer.draw_on(frames, &states)))
    }

    pub fn update_frame_processor(&mut self, config: FrameProcessorConfig) -> Result<()> {
        self.processors
            .get_mut(&config.camera_id)
            .ok_or(ScouterError::UnknownCamera(config.camera_id))?
            .update_config(config)
    }

    /// Replace a camera calibration for matching and visualization.
    pub fn update_camera_parameter(&mut self, param: CameraParameter) -> Result<()> {
        if !self.cameras.contains(param.camera_id) {
            return Err(ScouterError::UnknownCamera(param.camera_id));
        }
        if let Some(vis) = self.visualizer.as_mut() {
            if vis.camera_ids().contains(&param.camera_id) {
                vis.update_camera_parameter(param.clone())?;
            }
        }
        self.cameras.insert(param)?;
        Ok(())
    }

    /// Shared handle to the instance table.
    pub fn instances(&self) -> &SharedInstanceManager {
        &self.instances
    }

    pub fn cameras(&self) -> &CameraRegistry {
        &self.cameras
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut D {
        &mut self.detector
    }

    pub fn tagger_mut(&mut self) -> &mut T {
        &mut self.tagger
    }
}

fn log_skipped(e: &ScouterError) {
    if e.kind() == ErrorKind::InvalidInput {
        warn!("skipping cycle: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::ObjectCandidate;
    use crate::detection::{CandidateBuilder, MeanColorTagger};
    use nalgebra::Matrix3;
    use std::convert::Infallible;

    struct MockDetector {
        candidates: Vec<ObjectCandidate>,
    }

    impl Detector for MockDetector {
        type Error = Infallible;

        fn detect(&mut self, _frame: &Frame) -> std::result::Result<Vec<ObjectCandidate>, Self::Error> {
            Ok(self.candidates.clone())
        }
    }

    fn config() -> PipelineConfig {
        let h = Matrix3::new(0.01, 0.0, 0.0, 0.0, 0.01, 0.0, 0.0, 0.0, 1.0);
        PipelineConfig {
            floor_id: 3,
            cameras: vec![
                CameraParameter::new(0, h).with_image_size(64, 48),
                CameraParameter::new(1, h).with_image_size(64, 48),
            ],
            tracker: crate::tracker::TrackerConfig {
                min_hits: 1,
                ..Default::default()
            },
            ..PipelineConfig::default()
        }
    }

    fn raw() -> Vec<(CameraId, RgbImage)> {
        vec![(0, RgbImage::new(64, 48)), (1, RgbImage::new(64, 48))]
    }

    #[test]
    fn test_pipeline_one_object_two_cameras() {
        let detector = MockDetector {
            candidates: vec![CandidateBuilder::new().tlbr(10.0, 10.0, 20.0, 40.0).score(0.9).build()],
        };
        let mut pipeline = Pipeline::new(config(), detector, MeanColorTagger::default()).unwrap();

        let out = pipeline.process(&raw(), Some(0)).unwrap().unwrap();
        assert_eq!(out.tracking.trackees.len(), 1);
        assert_eq!(out.tracking.trackees[0].candidate.camera_ids(), vec![0, 1]);
        assert_eq!(out.states.len(), 1);
        assert_eq!(out.states[0].tag("color"), Some("black"));

        let json = pipeline.export_json(&out.states, 0).unwrap();
        assert!(json.contains(r#""floor_id":3"#));
        assert!(json.contains(r#""labels":["color=black"]"#));
    }

    #[test]
    fn test_unknown_camera_skips_cycle() {
        let detector = MockDetector { candidates: vec![] };
        let mut pipeline = Pipeline::new(config(), detector, NoTagger).unwrap();
        let err = pipeline
            .process(&[(9, RgbImage::new(4, 4))], Some(0))
            .unwrap_err();
        assert!(!err.is_fatal());
        assert!(pipeline.instances().get_current_states().unwrap().is_empty());

        // The next good cycle still goes through.
        assert!(pipeline.process(&raw(), Some(1)).unwrap().is_some());
    }

    #[test]
    fn test_draw_uses_resolved_frames() {
        let mut config = config();
        config.visualizer = Some(crate::visualizer::VisualizerConfig::default());
        let detector = MockDetector {
            candidates: vec![CandidateBuilder::new().tlbr(10.0, 10.0, 20.0, 40.0).score(0.9).build()],
        };
        let mut pipeline = Pipeline::new(config, detector, NoTagger).unwrap();
        let grey = image::Rgb([90, 90, 90]);
        let raw = vec![
            (0, RgbImage::from_pixel(64, 48, grey)),
            (1, RgbImage::from_pixel(64, 48, grey)),
        ];
        pipeline.process(&raw, Some(0)).unwrap().unwrap();

        let tiled = pipeline.draw().unwrap().unwrap();
        assert_eq!(tiled.dimensions(), (128, 48));
        assert_eq!(*tiled.get_pixel(60, 5), grey);
        assert_eq!(*tiled.get_pixel(124, 5), grey);
        assert_ne!(*tiled.get_pixel(15, 40), grey);
    }

    #[test]
    fn test_warm_up_returns_none() {
        let mut config = config();
        config.tracker.window_size = 2;
        let detector = MockDetector { candidates: vec![] };
        let mut pipeline = Pipeline::new(config, detector, NoTagger).unwrap();
        assert!(pipeline.process(&raw(), Some(0)).unwrap().is_none());
        assert!(pipeline.process(&raw(), Some(1)).unwrap().is_some());
        assert!(pipeline.draw().unwrap().is_none());
    }
}
