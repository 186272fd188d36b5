//! Frame pre-processing: region-of-interest crop and brightness adjustment.

use image::{RgbImage, imageops};
use log::info;
use serde::{Deserialize, Serialize};

use crate::candidate::CameraId;
use crate::error::{Result, ScouterError};

use super::frame::{Frame, FrameMeta};

/// Region of interest inside the raw camera image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameProcessorConfig {
    pub camera_id: CameraId,
    /// Crop applied before detection; `None` keeps the whole image.
    pub roi: Option<Roi>,
    /// Added to every channel, saturating.
    pub brightness: i32,
}

/// Turns raw camera images into detector-ready frames.
#[derive(Debug, Clone)]
pub struct FrameProcessor {
    config: FrameProcessorConfig,
}

impl FrameProcessor {
    pub fn new(config: FrameProcessorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn camera_id(&self) -> CameraId {
        self.config.camera_id
    }

    pub fn config(&self) -> &FrameProcessorConfig {
        &self.config
    }

    /// Replace the configuration of a running processor.
    pub fn update_config(&mut self, config: FrameProcessorConfig) -> Result<()> {
        config.validate()?;
        if config.camera_id != self.config.camera_id {
            return Err(ScouterError::config(format!(
                "frame processor for camera {} cannot be reassigned to camera {}",
                self.config.camera_id, config.camera_id
            )));
        }
        info!(
            "frame processor for camera {} reconfigured: roi={:?} brightness={}",
            config.camera_id, config.roi, config.brightness
        );
        self.config = config;
        Ok(())
    }

    /// Apply the configured crop and photometric adjustment.
    pub fn apply(&self, raw: &RgbImage) -> Result<Frame> {
        let (image, meta) = match self.config.roi {
            Some(roi) => {
                let fits = roi.x.checked_add(roi.width).is_some_and(|r| r <= raw.width())
                    && roi.y.checked_add(roi.height).is_some_and(|b| b <= raw.height());
                if !fits {
                    return Err(ScouterError::invalid(format!(
                        "camera {}: roi {:?} exceeds image {}x{}",
                        self.config.camera_id,
                        roi,
                        raw.width(),
                        raw.height()
                    )));
                }
                let cropped = imageops::crop_imm(raw, roi.x, roi.y, roi.width, roi.height).to_image();
                let meta = FrameMeta {
                    offset_x: roi.x as i32,
                    offset_y: roi.y as i32,
                };
                (cropped, meta)
            }
            None => (raw.clone(), FrameMeta::default()),
        };

        let image = if self.config.brightness != 0 {
            imageops::brighten(&image, self.config.brightness)
        } else {
            image
        };

        Ok(Frame {
            camera_id: self.config.camera_id,
            image,
            meta,
        })
    }
}

impl FrameProcessorConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(roi) = self.roi {
            if roi.width == 0 || roi.height == 0 {
                return Err(ScouterError::config(format!(
                    "camera {}: roi must have a non-zero size",
                    self.camera_id
                )));
            }
        }
        Ok(())
    }
}
