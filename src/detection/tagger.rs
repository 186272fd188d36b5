//! Attribute tagging of candidate image regions.

use std::convert::Infallible;

use image::{RgbImage, imageops};

use crate::candidate::{ObjectCandidate, Rect};

/// Trait for attribute classifiers run on candidate crops.
///
/// Only the batch entry point is required; a single candidate is a batch of
/// one.
pub trait ImageTagger {
    type Error;

    /// Crop each candidate out of `image` and append its predicted tags.
    fn predict_tags_batch(
        &mut self,
        candidates: &mut [ObjectCandidate],
        image: &RgbImage,
    ) -> Result<(), Self::Error>;

    fn predict_tags(
        &mut self,
        candidate: &mut ObjectCandidate,
        image: &RgbImage,
    ) -> Result<(), Self::Error> {
        self.predict_tags_batch(std::slice::from_mut(candidate), image)
    }
}

/// Crop the candidate region, clamped to the image. `None` when nothing of
/// the box lies inside the image.
pub fn crop_candidate(image: &RgbImage, bbox: &Rect) -> Option<RgbImage> {
    let clamped = bbox.clamp_to(image.width() as f32, image.height() as f32);
    let [x1, y1, x2, y2] = clamped.to_tlbr();
    let (x, y) = (x1.floor() as u32, y1.floor() as u32);
    let w = (x2.ceil() as u32).saturating_sub(x);
    let h = (y2.ceil() as u32).saturating_sub(y);
    if w == 0 || h == 0 {
        return None;
    }
    Some(imageops::crop_imm(image, x, y, w, h).to_image())
}

/// Tagger that leaves candidates untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTagger;

impl ImageTagger for NoTagger {
    type Error = Infallible;

    fn predict_tags_batch(
        &mut self,
        _candidates: &mut [ObjectCandidate],
        _image: &RgbImage,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

const PALETTE: [(&str, [f32; 3]); 8] = [
    ("black", [0.0, 0.0, 0.0]),
    ("white", [255.0, 255.0, 255.0]),
    ("gray", [128.0, 128.0, 128.0]),
    ("red", [200.0, 30.0, 30.0]),
    ("green", [30.0, 160.0, 60.0]),
    ("blue", [30.0, 60.0, 200.0]),
    ("yellow", [220.0, 200.0, 40.0]),
    ("brown", [120.0, 80.0, 40.0]),
];

/// Tags each candidate with the palette colour nearest to its crop mean.
#[derive(Debug, Clone)]
pub struct MeanColorTagger {
    key: String,
}

impl Default for MeanColorTagger {
    fn default() -> Self {
        Self::new("color")
    }
}

impl MeanColorTagger {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn classify(crop: &RgbImage) -> &'static str {
        let mut sum = [0f64; 3];
        for p in crop.pixels() {
            for (s, v) in sum.iter_mut().zip(p.0) {
                *s += v as f64;
            }
        }
        let n = (crop.width() * crop.height()).max(1) as f64;
        let mean = sum.map(|s| (s / n) as f32);

        PALETTE
            .iter()
            .min_by(|(_, a), (_, b)| dist2(&mean, a).total_cmp(&dist2(&mean, b)))
            .map(|(name, _)| *name)
            .unwrap_or("gray")
    }
}

fn dist2(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

impl ImageTagger for MeanColorTagger {
    type Error = Infallible;

    fn predict_tags_batch(
        &mut self,
        candidates: &mut [ObjectCandidate],
        image: &RgbImage,
    ) -> Result<(), Self::Error> {
        for c in candidates.iter_mut() {
            if let Some(crop) = crop_candidate(image, &c.bbox) {
                c.set_tag(self.key.as_str(), Self::classify(&crop));
            }
        }
        Ok(())
    }
}
