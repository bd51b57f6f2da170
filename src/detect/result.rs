use serde::Serialize;

use crate::geometry::BBox;

/// What a detection is, which decides its path through the cascade and the
/// alerting side it feeds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    /// Stage A output: a primary entity (worker) or a non-primary entity
    /// (e.g. forklift) that anchors no item detection.
    Subject,
    /// Stage B/C output: an item found within a subject, classified.
    Item,
    /// Independent full-frame obstacle pass output.
    Obstacle,
}

/// One accepted detection in frame coordinates.
#[derive(Clone, Debug, Serialize)]
pub struct Detection {
    pub bbox: BBox,
    /// Coarse class from the detector (e.g. "person", "shirt", "pallet").
    pub primary_class: String,
    pub score: f32,
    /// Fine label from Stage C, present only for classified items.
    pub classified_label: Option<String>,
    pub classification_score: Option<f32>,
    /// 1-based index of the subject this item was found in.
    pub subject_id: Option<usize>,
    pub kind: DetectionKind,
    /// True when the classified label matches the violation naming convention.
    pub is_violation: bool,
}

/// All accepted detections for one evaluated frame, plus the derived flags
/// the alerting state machines consume.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DetectionBatch {
    pub detections: Vec<Detection>,
    pub has_violation: bool,
    pub has_obstacle: bool,
}

impl DetectionBatch {
    pub fn violation_count(&self) -> usize {
        self.detections.iter().filter(|d| d.is_violation).count()
    }

    pub fn obstacle_count(&self) -> usize {
        self.detections
            .iter()
            .filter(|d| d.kind == DetectionKind::Obstacle)
            .count()
    }
}
