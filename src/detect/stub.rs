//! Stub model capabilities.
//!
//! Deterministic, scriptable implementations of the capability traits for
//! tests and for running the daemon without real models. A script is a
//! sequence of per-call outcomes; once exhausted, the stub keeps returning
//! the last entry (or empty if the script was empty).

use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::capability::{
    ClassifiedLabel, Classifier, ItemDetector, ModelSet, ObstacleDetector, RawDetection,
    SubjectDetector,
};
use crate::frame::Frame;
use crate::geometry::BBox;

/// One scripted call outcome: detections, or a simulated inference failure.
#[derive(Clone, Debug)]
pub enum ScriptStep {
    Detections(Vec<RawDetection>),
    Fail(&'static str),
}

impl ScriptStep {
    pub fn one(bbox: BBox, class: &str, score: f32) -> Self {
        ScriptStep::Detections(vec![RawDetection {
            bbox,
            class: class.to_string(),
            score,
        }])
    }

    pub fn none() -> Self {
        ScriptStep::Detections(Vec::new())
    }
}

#[derive(Debug, Default)]
struct Script {
    steps: VecDeque<ScriptStep>,
    last: Option<ScriptStep>,
}

impl Script {
    fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps: steps.into(),
            last: None,
        }
    }

    fn next(&mut self) -> Result<Vec<RawDetection>> {
        let step = match self.steps.pop_front() {
            Some(step) => {
                self.last = Some(step.clone());
                step
            }
            None => self.last.clone().unwrap_or_else(ScriptStep::none),
        };
        match step {
            ScriptStep::Detections(found) => Ok(found),
            ScriptStep::Fail(reason) => Err(anyhow!("stub inference failure: {}", reason)),
        }
    }
}

/// Scripted Stage A detector.
#[derive(Debug, Default)]
pub struct ScriptedSubjects(Script);

impl ScriptedSubjects {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self(Script::new(steps))
    }
}

impl SubjectDetector for ScriptedSubjects {
    fn detect_subjects(&mut self, _frame: &Frame, confidence: f32) -> Result<Vec<RawDetection>> {
        Ok(self
            .0
            .next()?
            .into_iter()
            .filter(|d| d.score >= confidence)
            .collect())
    }
}

/// Scripted Stage B detector. Boxes in the script are crop-local.
#[derive(Debug, Default)]
pub struct ScriptedItems(Script);

impl ScriptedItems {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self(Script::new(steps))
    }
}

impl ItemDetector for ScriptedItems {
    fn detect_items(&mut self, _crop: &Frame, confidence: f32) -> Result<Vec<RawDetection>> {
        Ok(self
            .0
            .next()?
            .into_iter()
            .filter(|d| d.score >= confidence)
            .collect())
    }
}

/// Scripted obstacle detector.
#[derive(Debug, Default)]
pub struct ScriptedObstacles(Script);

impl ScriptedObstacles {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self(Script::new(steps))
    }
}

impl ObstacleDetector for ScriptedObstacles {
    fn detect_obstacles(&mut self, _frame: &Frame, confidence: f32) -> Result<Vec<RawDetection>> {
        Ok(self
            .0
            .next()?
            .into_iter()
            .filter(|d| d.score >= confidence)
            .collect())
    }
}

/// Classifier that returns a fixed label for every crop.
#[derive(Clone, Debug)]
pub struct FixedClassifier {
    pub label: String,
    pub score: f32,
}

impl FixedClassifier {
    pub fn new(label: &str, score: f32) -> Self {
        Self {
            label: label.to_string(),
            score,
        }
    }
}

impl Classifier for FixedClassifier {
    fn classify(&mut self, _crop: &Frame) -> Result<Option<ClassifiedLabel>> {
        Ok(Some(ClassifiedLabel {
            label: self.label.clone(),
            score: self.score,
        }))
    }
}

/// Classifier driven by a per-call queue; `None` entries simulate a model
/// that produced no usable label. Repeats the final entry once exhausted.
#[derive(Debug, Default)]
pub struct ScriptedClassifier {
    labels: VecDeque<Option<ClassifiedLabel>>,
    last: Option<Option<ClassifiedLabel>>,
}

impl ScriptedClassifier {
    pub fn new(labels: Vec<Option<ClassifiedLabel>>) -> Self {
        Self {
            labels: labels.into(),
            last: None,
        }
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&mut self, _crop: &Frame) -> Result<Option<ClassifiedLabel>> {
        match self.labels.pop_front() {
            Some(label) => {
                self.last = Some(label.clone());
                Ok(label)
            }
            None => Ok(self.last.clone().flatten()),
        }
    }
}

/// Capability that never detects anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyModel;

impl SubjectDetector for EmptyModel {
    fn detect_subjects(&mut self, _frame: &Frame, _confidence: f32) -> Result<Vec<RawDetection>> {
        Ok(Vec::new())
    }
}

impl ItemDetector for EmptyModel {
    fn detect_items(&mut self, _crop: &Frame, _confidence: f32) -> Result<Vec<RawDetection>> {
        Ok(Vec::new())
    }
}

impl Classifier for EmptyModel {
    fn classify(&mut self, _crop: &Frame) -> Result<Option<ClassifiedLabel>> {
        Ok(None)
    }
}

impl ObstacleDetector for EmptyModel {
    fn detect_obstacles(&mut self, _frame: &Frame, _confidence: f32) -> Result<Vec<RawDetection>> {
        Ok(Vec::new())
    }
}

/// Obstacle stub that reports a fixed box for `present` consecutive calls out
/// of every `period`. Lets the daemon exercise the dwell path without models.
#[derive(Clone, Debug)]
pub struct PulseObstacles {
    pub bbox: BBox,
    pub period: u64,
    pub present: u64,
    calls: u64,
}

impl PulseObstacles {
    pub fn new(bbox: BBox, period: u64, present: u64) -> Self {
        Self {
            bbox,
            period,
            present,
            calls: 0,
        }
    }
}

impl ObstacleDetector for PulseObstacles {
    fn detect_obstacles(&mut self, _frame: &Frame, _confidence: f32) -> Result<Vec<RawDetection>> {
        let phase = self.calls % self.period.max(1);
        self.calls += 1;
        if phase < self.present {
            Ok(vec![RawDetection {
                bbox: self.bbox,
                class: "obstruction".to_string(),
                score: 0.9,
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

impl ModelSet {
    /// A model set that never detects anything.
    pub fn noop() -> Self {
        Self {
            subjects: Box::new(EmptyModel),
            items: Box::new(EmptyModel),
            classifier: Box::new(EmptyModel),
            obstacles: Box::new(EmptyModel),
        }
    }
}
