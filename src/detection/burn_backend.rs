//! Burn inference backend for object detection.
//!
//! This module provides a `BurnDetector` that implements `Detector`
//! for running object detection models built with the Burn framework.
//!
//! # Example
//!
//! ```ignore
//! use scouter_rs::detection::{BurnDetector, BurnModel, RawDetection};
//! use burn::backend::NdArray;
//!
//! // Implement BurnModel for your detection model
//! struct MyYoloModel { /* ... */ }
//!
//! impl BurnModel<NdArray> for MyYoloModel {
//!     fn forward(&self, input: burn::tensor::Tensor<NdArray, 4>) -> Vec<RawDetection> {
//!         // Run inference
//!     }
//! }
//!
//! let model = MyYoloModel::load("model.bin");
//! let detector = BurnDetector::new(model, Default::default());
//! ```

use burn::prelude::*;
use burn::tensor::Tensor;
use thiserror::Error;

use super::builder::CandidateBuilder;
use super::detector::Detector;
use super::frame::Frame;
use crate::candidate::ObjectCandidate;

/// Error type for Burn detection failures.
#[derive(Debug, Clone, Error)]
pub enum BurnDetectorError {
    /// Frame size does not match the model input.
    #[error("invalid input dimensions: expected {expected:?}, got {got:?}")]
    InvalidInputDimensions {
        expected: (u32, u32, u32),
        got: (u32, u32, u32),
    },
    #[error("preprocessing error: {0}")]
    PreprocessingError(String),
}

/// Raw detection output from the model before thresholding.
#[derive(Debug, Clone)]
pub struct RawDetection {
    /// Bounding box: [x1, y1, x2, y2] or [cx, cy, w, h] depending on model
    pub bbox: [f32; 4],
    /// Confidence score
    pub score: f32,
    /// Class ID (optional, for multi-class detection)
    pub class_id: Option<usize>,
}

/// Trait for Burn-based detection models.
///
/// Implement this trait for your specific model architecture.
pub trait BurnModel<B: Backend>: Send + Sync {
    /// Run forward pass on the input tensor of shape [batch, channels, height, width].
    fn forward(&self, input: Tensor<B, 4>) -> Vec<RawDetection>;

    /// Get the expected input size (channels, height, width).
    fn input_size(&self) -> (u32, u32, u32) {
        (3, 640, 640)
    }

    /// Whether bbox output is in XYWH format (vs TLBR).
    fn bbox_is_xywh(&self) -> bool {
        true
    }

    /// Label recorded as the `class` tag for a class id.
    fn class_label(&self, class_id: usize) -> Option<String> {
        Some(class_id.to_string())
    }
}

/// Burn-based object detector implementing `Detector`.
pub struct BurnDetector<B: Backend, M: BurnModel<B>> {
    model: M,
    device: B::Device,
    conf_threshold: f32,
}

impl<B: Backend, M: BurnModel<B>> BurnDetector<B, M> {
    /// Create a new Burn detector with the given model and device.
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            conf_threshold: 0.25,
        }
    }

    /// Set the confidence threshold for filtering detections.
    pub fn with_conf_threshold(mut self, threshold: f32) -> Self {
        self.conf_threshold = threshold;
        self
    }

    /// Convert an RGB frame to a normalized CHW tensor of shape [1, 3, H, W].
    pub fn preprocess(&self, frame: &Frame) -> Result<Tensor<B, 4>, BurnDetectorError> {
        let (channels, target_h, target_w) = self.model.input_size();
        let (width, height) = (frame.width(), frame.height());

        if channels != 3 {
            return Err(BurnDetectorError::PreprocessingError(format!(
                "model expects {channels} channels, frames are RGB"
            )));
        }
        if height != target_h || width != target_w {
            return Err(BurnDetectorError::InvalidInputDimensions {
                expected: (channels, target_h, target_w),
                got: (3, height, width),
            });
        }

        let plane = (width * height) as usize;
        let mut data = vec![0f32; plane * 3];
        for (i, pixel) in frame.image.pixels().enumerate() {
            for c in 0..3 {
                data[c * plane + i] = pixel.0[c] as f32 / 255.0;
            }
        }

        let tensor = Tensor::<B, 1>::from_floats(data.as_slice(), &self.device).reshape([
            1,
            3,
            height as usize,
            width as usize,
        ]);
        Ok(tensor)
    }

    /// Convert raw model outputs to candidates of `frame`'s camera.
    fn postprocess(&self, frame: &Frame, raw_detections: Vec<RawDetection>) -> Vec<ObjectCandidate> {
        raw_detections
            .into_iter()
            .filter(|d| d.score >= self.conf_threshold)
            .map(|d| {
                let mut builder = CandidateBuilder::new().camera(frame.camera_id).score(d.score);
                if let Some(label) = d.class_id.and_then(|id| self.model.class_label(id)) {
                    builder = builder.tag("class", label);
                }
                if self.model.bbox_is_xywh() {
                    builder.xywh(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3]).build()
                } else {
                    builder.tlbr(d.bbox[0], d.bbox[1], d.bbox[2], d.bbox[3]).build()
                }
            })
            .collect()
    }
}

impl<B: Backend, M: BurnModel<B>> Detector for BurnDetector<B, M> {
    type Error = BurnDetectorError;

    fn detect(&mut self, frame: &Frame) -> Result<Vec<ObjectCandidate>, Self::Error> {
        let tensor = self.preprocess(frame)?;
        let raw_detections = self.model.forward(tensor);
        Ok(self.postprocess(frame, raw_detections))
    }
}
