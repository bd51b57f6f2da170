//! Detection cascade.
//!
//! Three stages over the injected capabilities, plus an independent obstacle
//! pass:
//!
//! - Stage A: subject detection on the full frame. Non-primary subject
//!   classes (e.g. forklifts) are recorded as subject detections and skip
//!   Stage B.
//! - Stage B: item detection on a padded subject crop, optional NMS,
//!   crop-local boxes translated back to frame coordinates.
//! - Stage C: fine classification for item classes registered in the
//!   class map; an item that cannot be classified is dropped, never counted
//!   as a violation.
//!
//! The obstacle pass runs on the full frame and shares the zone filter.
//! All capability errors propagate out of `evaluate`; the camera worker
//! contains them and treats the cycle as unevaluated.

use std::collections::HashMap;

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

use crate::detect::capability::{ModelSet, RawDetection};
use crate::detect::result::{Detection, DetectionBatch, DetectionKind};
use crate::frame::Frame;
use crate::geometry::ZoneFilter;

/// Crop padding around a subject before Stage B, in pixels.
pub const SUBJECT_CROP_PADDING: i32 = 20;
/// Crop padding around an item before Stage C, in pixels.
pub const CLASSIFY_CROP_PADDING: i32 = 10;

/// Tuning for one camera's cascade.
#[derive(Clone, Debug)]
pub struct CascadeConfig {
    pub subject_confidence: f32,
    pub item_confidence: f32,
    pub classification_confidence: f32,
    pub obstacle_confidence: f32,
    /// When false, Stage B runs on the full frame and subjects are skipped
    /// entirely (the single-stage pipeline is this configuration, not a
    /// separate code path).
    pub subject_stage: bool,
    pub obstacle_stage: bool,
    /// Subject classes that are recorded but anchor no item detection.
    pub non_primary_subject_classes: Vec<String>,
    /// Item class -> fine labels the classifier may legally return for it.
    pub class_map: HashMap<String, Vec<String>>,
    /// Naming convention marking a classified label as non-compliant.
    pub violation_pattern: Regex,
    pub nms_enabled: bool,
    pub nms_iou_threshold: f32,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            subject_confidence: 0.5,
            item_confidence: 0.5,
            classification_confidence: 0.5,
            obstacle_confidence: 0.5,
            subject_stage: true,
            obstacle_stage: true,
            non_primary_subject_classes: vec!["forklift".to_string()],
            class_map: default_class_map(),
            violation_pattern: compile_violation_pattern("non-safety")
                .expect("default violation pattern"),
            nms_enabled: true,
            nms_iou_threshold: 0.45,
        }
    }
}

/// The reference deployment's item classes and their fine labels.
pub fn default_class_map() -> HashMap<String, Vec<String>> {
    [
        ("shirt", vec!["non-safety-vest", "safety-vest"]),
        ("shoes", vec!["non-safety-shoes", "safety-shoes"]),
        ("head", vec!["non-safety-helmet", "safety-helmet"]),
    ]
    .into_iter()
    .map(|(class, labels)| {
        (
            class.to_string(),
            labels.into_iter().map(str::to_string).collect(),
        )
    })
    .collect()
}

/// Compile the violation naming convention, case-insensitive.
pub fn compile_violation_pattern(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("invalid violation pattern {:?}", pattern))
}

/// Per-camera cascade. Owns the camera's model capabilities and zone filter.
pub struct DetectionCascade {
    config: CascadeConfig,
    zones: ZoneFilter,
    models: ModelSet,
}

impl DetectionCascade {
    pub fn new(config: CascadeConfig, zones: ZoneFilter, models: ModelSet) -> Self {
        Self {
            config,
            zones,
            models,
        }
    }

    pub fn zones(&self) -> &ZoneFilter {
        &self.zones
    }

    /// Run all stages over one frame.
    pub fn evaluate(&mut self, frame: &Frame) -> Result<DetectionBatch> {
        let mut batch = DetectionBatch::default();

        if self.config.obstacle_stage {
            self.obstacle_pass(frame, &mut batch)?;
        }

        if self.config.subject_stage {
            self.subject_pass(frame, &mut batch)?;
        } else {
            // Single-stage configuration: the whole frame is the crop.
            self.item_pass(frame, frame, 0, 0, None, &mut batch)?;
        }

        Ok(batch)
    }

    fn obstacle_pass(&mut self, frame: &Frame, batch: &mut DetectionBatch) -> Result<()> {
        let found = self
            .models
            .obstacles
            .detect_obstacles(frame, self.config.obstacle_confidence)
            .context("obstacle detection")?;

        for raw in found {
            if !self.zones.allows(raw.bbox.centroid()) {
                continue;
            }
            batch.has_obstacle = true;
            batch.detections.push(Detection {
                bbox: raw.bbox,
                primary_class: raw.class,
                score: raw.score,
                classified_label: None,
                classification_score: None,
                subject_id: None,
                kind: DetectionKind::Obstacle,
                is_violation: false,
            });
        }
        Ok(())
    }

    fn subject_pass(&mut self, frame: &Frame, batch: &mut DetectionBatch) -> Result<()> {
        let subjects = self
            .models
            .subjects
            .detect_subjects(frame, self.config.subject_confidence)
            .context("subject detection")?;

        for (index, subject) in subjects.into_iter().enumerate() {
            if !self.zones.allows(subject.bbox.centroid()) {
                continue;
            }

            let class_lower = subject.class.to_lowercase();
            if self
                .config
                .non_primary_subject_classes
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&class_lower))
            {
                batch.detections.push(Detection {
                    bbox: subject.bbox,
                    primary_class: subject.class,
                    score: subject.score,
                    classified_label: None,
                    classification_score: None,
                    subject_id: None,
                    kind: DetectionKind::Subject,
                    is_violation: false,
                });
                continue;
            }

            let Some((crop, ox, oy)) = frame.crop_padded(&subject.bbox, SUBJECT_CROP_PADDING)
            else {
                continue;
            };
            self.item_pass(frame, &crop, ox, oy, Some(index + 1), batch)?;
        }
        Ok(())
    }

    /// Stage B + C over one crop. `origin_x/origin_y` map crop-local boxes
    /// back to frame coordinates.
    fn item_pass(
        &mut self,
        frame: &Frame,
        crop: &Frame,
        origin_x: i32,
        origin_y: i32,
        subject_id: Option<usize>,
        batch: &mut DetectionBatch,
    ) -> Result<()> {
        let mut items = self
            .models
            .items
            .detect_items(crop, self.config.item_confidence)
            .context("item detection")?;

        if self.config.nms_enabled && items.len() > 1 {
            items = suppress_overlaps(items, self.config.nms_iou_threshold);
        }

        for item in items {
            let bbox = item.bbox.translated(origin_x, origin_y);

            // Stage C only applies to registered item classes; everything
            // else is dropped here, not alerted on.
            let Some(allowed) = self.config.class_map.get(&item.class) else {
                continue;
            };

            let Some((item_crop, _, _)) = frame.crop_padded(&bbox, CLASSIFY_CROP_PADDING) else {
                continue;
            };
            let Some(label) = self
                .models
                .classifier
                .classify(&item_crop)
                .context("item classification")?
            else {
                continue;
            };

            if !allowed.iter().any(|a| a == &label.label)
                || label.score < self.config.classification_confidence
            {
                // Unclassifiable or low-confidence items are not violations.
                continue;
            }

            if !self.zones.allows(bbox.centroid()) {
                continue;
            }

            let is_violation = self.config.violation_pattern.is_match(&label.label);
            batch.has_violation |= is_violation;
            batch.detections.push(Detection {
                bbox,
                primary_class: item.class,
                score: item.score,
                classified_label: Some(label.label),
                classification_score: Some(label.score),
                subject_id,
                kind: DetectionKind::Item,
                is_violation,
            });
        }
        Ok(())
    }
}

/// Greedy non-maximum suppression: keep the highest-scoring box, drop any
/// remaining box whose IoU with a kept box exceeds the threshold.
fn suppress_overlaps(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    detections.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<RawDetection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        if kept
            .iter()
            .all(|k| k.bbox.iou(&candidate.bbox) <= iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
