//! Candidate records exchanged between the detection, matching and tracking stages.

mod mv_candidate;
mod object_candidate;
mod rect;

pub use mv_candidate::{MVObjectCandidate, WorldPoint};
pub use object_candidate::{CameraCandidates, CameraId, ObjectCandidate, Tag};
pub use rect::{Rect, iou_batch};
