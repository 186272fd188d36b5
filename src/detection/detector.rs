//! Trait for object detection inference backends.

use crate::candidate::ObjectCandidate;

use super::frame::Frame;

/// Trait for object detection inference backends.
///
/// Implement this trait to connect any single- or multi-model detector to
/// the pipeline. Candidates are returned in processed-frame coordinates and
/// carry the frame's camera id.
///
/// # Example
///
/// ```ignore
/// use scouter_rs::detection::{Detector, Frame};
/// use scouter_rs::candidate::ObjectCandidate;
///
/// struct MyDetector {
///     // Your model here
/// }
///
/// impl Detector for MyDetector {
///     type Error = std::io::Error;
///
///     fn detect(&mut self, frame: &Frame) -> Result<Vec<ObjectCandidate>, Self::Error> {
///         // Run inference and return candidates
///         Ok(vec![])
///     }
/// }
/// ```
pub trait Detector {
    /// Error type for detection failures.
    type Error;

    /// Run inference on one processed frame.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<ObjectCandidate>, Self::Error>;

    /// Run inference on several frames, one candidate list per frame in
    /// input order.
    ///
    /// Backends able to batch on the device should override this.
    fn detect_batch(&mut self, frames: &[Frame]) -> Result<Vec<Vec<ObjectCandidate>>, Self::Error> {
        frames.iter().map(|frame| self.detect(frame)).collect()
    }
}

/// Helper trait for converting model-specific outputs to `ObjectCandidate`s.
///
/// Implement this for your model's output format to enable easy conversion.
pub trait IntoCandidates {
    /// Convert the output into candidates observed by `frame`.
    fn into_candidates(self, frame: &Frame) -> Vec<ObjectCandidate>;
}

impl IntoCandidates for Vec<ObjectCandidate> {
    fn into_candidates(self, frame: &Frame) -> Vec<ObjectCandidate> {
        self.into_iter()
            .map(|mut c| {
                c.camera_id = frame.camera_id;
                c
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::Rect;
    use image::RgbImage;

    struct CountingDetector {
        calls: usize,
    }

    impl Detector for CountingDetector {
        type Error = std::convert::Infallible;

        fn detect(&mut self, frame: &Frame) -> Result<Vec<ObjectCandidate>, Self::Error> {
            self.calls += 1;
            Ok(vec![ObjectCandidate::new(0, Rect::new(0.0, 0.0, 4.0, 8.0), 0.9)].into_candidates(frame))
        }
    }

    #[test]
    fn test_detect_batch_defaults_to_per_frame() {
        let frames = vec![
            Frame::new(1, RgbImage::new(8, 8)),
            Frame::new(4, RgbImage::new(8, 8)),
        ];
        let mut detector = CountingDetector { calls: 0 };
        let batches = detector.detect_batch(&frames).unwrap();

        assert_eq!(detector.calls, 2);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1][0].camera_id, 4);
    }
}
