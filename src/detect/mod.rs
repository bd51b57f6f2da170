//! Detection pipeline: injected model capabilities and the staged cascade
//! that turns frames into detection batches.

mod capability;
mod cascade;
mod result;
pub mod stub;

pub use capability::{
    ClassifiedLabel, Classifier, ItemDetector, ModelSet, ObstacleDetector, RawDetection,
    SubjectDetector,
};
pub use cascade::{
    compile_violation_pattern, default_class_map, CascadeConfig, DetectionCascade,
    CLASSIFY_CROP_PADDING, SUBJECT_CROP_PADDING,
};
pub use result::{Detection, DetectionBatch, DetectionKind};
