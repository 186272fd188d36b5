//! Multi-camera object matching, tracking and instance management.
//!
//! Per cycle, camera frames are pre-processed and run through a
//! [`Detector`], the per-camera candidates are fused across views by the
//! multi-view matcher, the [`Tracker`] assigns persistent ids, and the
//! [`InstanceManager`] keeps the table of current instances that can be
//! exported as JSON or drawn back into the camera views.

pub mod camera;
pub mod candidate;
pub mod config;
pub mod detection;
pub mod error;
pub mod instance;
pub mod mvom;
pub mod pipeline;
pub mod tracker;
pub mod visualizer;

pub use camera::{CameraParameter, CameraRegistry};
pub use candidate::{CameraCandidates, CameraId, MVObjectCandidate, ObjectCandidate, Rect, Tag, WorldPoint};
pub use config::PipelineConfig;
pub use detection::{Detector, Frame, ImageTagger};
pub use error::{ErrorKind, Result, ScouterError};
pub use instance::{
    InstanceManager, InstanceState, SharedInstanceManager, convert_instance_states_to_json,
    micros_to_millis,
};
pub use mvom::{MultiViewMatcher, MvomConfig, get_matching};
pub use pipeline::{CycleOutput, Pipeline};
pub use tracker::{Trackee, Tracker, TrackerConfig, TrackingResult};
pub use visualizer::{InstancesVisualizer, VisualizerConfig};
