//! Pluggable model capabilities.
//!
//! Neural inference lives outside this crate. The cascade consumes these
//! traits and never loads, schedules, or touches a model runtime itself.
//! Any error returned here is contained at the camera-worker boundary: the
//! cycle is logged and treated as unevaluated, never escalated.
//!
//! Implementations MUST be `Send` (each camera worker owns its own set) and
//! MUST NOT retain references to the frames they are handed.

use anyhow::Result;

use crate::frame::Frame;
use crate::geometry::BBox;

/// A single raw model output, before zone filtering and classification.
#[derive(Clone, Debug)]
pub struct RawDetection {
    pub bbox: BBox,
    pub class: String,
    pub score: f32,
}

/// Fine-grained label from the classification stage.
#[derive(Clone, Debug)]
pub struct ClassifiedLabel {
    pub label: String,
    pub score: f32,
}

/// Stage A: subject (person/vehicle) detection on the full frame.
pub trait SubjectDetector: Send {
    fn detect_subjects(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<RawDetection>>;
}

/// Stage B: item detection on a subject crop. Boxes are crop-local.
pub trait ItemDetector: Send {
    fn detect_items(&mut self, crop: &Frame, confidence: f32) -> Result<Vec<RawDetection>>;
}

/// Stage C: fine classification of an item crop. `None` means the model
/// produced no usable label; the item is dropped, not treated as a violation.
pub trait Classifier: Send {
    fn classify(&mut self, crop: &Frame) -> Result<Option<ClassifiedLabel>>;
}

/// Independent obstacle detection on the full frame.
pub trait ObstacleDetector: Send {
    fn detect_obstacles(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<RawDetection>>;
}

/// The four capabilities a camera worker is wired with.
pub struct ModelSet {
    pub subjects: Box<dyn SubjectDetector>,
    pub items: Box<dyn ItemDetector>,
    pub classifier: Box<dyn Classifier>,
    pub obstacles: Box<dyn ObstacleDetector>,
}
