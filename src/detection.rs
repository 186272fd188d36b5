//! Per-camera stages that run before multi-view matching.
//!
//! This module provides the frame processor, the detector and tagger
//! capability traits that connect external inference engines, and the
//! candidate refinement steps (mask/score filtering, height estimation,
//! overlap suppression).

mod builder;
mod detector;
mod frame;
mod frame_processor;
mod refine;
mod tagger;

pub use builder::CandidateBuilder;
pub use detector::{Detector, IntoCandidates};
pub use frame::{Frame, FrameMeta};
pub use frame_processor::{FrameProcessor, FrameProcessorConfig, Roi};
pub use refine::{CandidateFilter, RefineConfig};
pub use tagger::{ImageTagger, MeanColorTagger, NoTagger, crop_candidate};

#[cfg(feature = "burn-backend")]
mod burn_backend;

#[cfg(feature = "burn-backend")]
pub use burn_backend::{BurnDetector, BurnDetectorError, BurnModel, RawDetection};
