//! JSON configuration for every component and for the whole pipeline.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::camera::{CameraParameter, CameraRegistry};
use crate::detection::{FrameProcessorConfig, RefineConfig};
use crate::error::{Result, ScouterError};
use crate::instance::InstanceManagerConfig;
use crate::mvom::MvomConfig;
use crate::tracker::TrackerConfig;
use crate::visualizer::VisualizerConfig;

/// Parse any component configuration from JSON text.
pub fn load_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(ScouterError::ConfigParse)
}

pub fn load_json_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ScouterError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    load_json(&text)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Floor reported with every exported location.
    pub floor_id: i64,
    pub cameras: Vec<CameraParameter>,
    /// Cameras without an entry use an identity processor.
    pub frame_processors: Vec<FrameProcessorConfig>,
    pub refine: RefineConfig,
    pub mvom: MvomConfig,
    pub tracker: TrackerConfig,
    pub instance_manager: InstanceManagerConfig,
    pub visualizer: Option<VisualizerConfig>,
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = load_json(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_json_file(path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn registry(&self) -> Result<CameraRegistry> {
        CameraRegistry::new(self.cameras.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(ScouterError::config("at least one camera is required"));
        }
        let registry = self.registry()?;

        let mut seen = BTreeSet::new();
        for fp in &self.frame_processors {
            if !registry.contains(fp.camera_id) {
                return Err(ScouterError::config(format!(
                    "frame processor references unknown camera {}",
                    fp.camera_id
                )));
            }
            if !seen.insert(fp.camera_id) {
                return Err(ScouterError::config(format!(
                    "camera {} has more than one frame processor",
                    fp.camera_id
                )));
            }
            fp.validate()?;
        }

        self.refine.validate()?;
        self.mvom.validate()?;
        self.tracker.validate()?;
        self.instance_manager.validate()?;

        if let Some(vis) = &self.visualizer {
            if let Some(id) = vis.camera_ids.iter().find(|id| !registry.contains(**id)) {
                return Err(ScouterError::config(format!(
                    "visualizer references unknown camera {id}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "floor_id": 3,
        "cameras": [
            {"camera_id": 0, "homography": [[0.01, 0, 0], [0, 0.01, 0], [0, 0, 1]]},
            {"camera_id": 1, "homography": [[0.01, 0, 1], [0, 0.01, 0], [0, 0, 1]],
             "position": [0, 10, 3], "image_width": 1280, "image_height": 720}
        ],
        "frame_processors": [{"camera_id": 1, "roi": {"x": 0, "y": 100, "width": 1280, "height": 500}}],
        "mvom": {"threshold": 0.3},
        "tracker": {"min_hits": 3}
    }"#;

    #[test]
    fn test_load_pipeline_config() {
        let config = PipelineConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.floor_id, 3);
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[1].image_width, 1280);
        assert_eq!(config.mvom.threshold, 0.3);
        assert_eq!(config.mvom.sigma, MvomConfig::default().sigma);
        assert_eq!(config.tracker.min_hits, 3);
        assert!(config.visualizer.is_none());
    }

    #[test]
    fn test_component_config_alone() {
        let tracker: TrackerConfig = load_json(r#"{"max_missed": 2}"#).unwrap();
        assert_eq!(tracker.max_missed, 2);
        assert_eq!(tracker.window_size, TrackerConfig::default().window_size);
    }

    #[test]
    fn test_validation_errors() {
        assert!(matches!(
            load_json::<PipelineConfig>("{"),
            Err(ScouterError::ConfigParse(_))
        ));
        assert!(matches!(
            PipelineConfig::from_json("{}"),
            Err(ScouterError::Configuration(_))
        ));

        let mut config = PipelineConfig::from_json(CONFIG).unwrap();
        config.frame_processors[0].camera_id = 5;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::from_json(CONFIG).unwrap();
        config.cameras[0].homography = [[0.0; 3]; 3];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_json_file::<PipelineConfig>("/nonexistent/scouter.json").unwrap_err();
        assert!(matches!(err, ScouterError::ConfigIo { .. }));
    }
}
