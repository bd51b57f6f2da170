//! sitewatch - multi-camera industrial safety monitor
//!
//! Watches N camera streams for personal-equipment violations and
//! left-behind obstacles. Each camera runs an independent worker thread:
//!
//! 1. Ingest frames (RTSP via GStreamer, or `stub://` synthetic sources)
//! 2. On interval-selected frames, run the staged detection cascade
//!    (subjects, items on subject crops, fine classification) plus an
//!    obstacle pass, filtered by operator-drawn zones
//! 3. Advance the per-camera debounce and dwell state machines in frame
//!    order and hand fired alerts to the dispatcher
//! 4. Publish the latest frame, annotated frame, detections, and
//!    statistics to the shared store
//!
//! Model inference is injected through the capability traits in
//! [`detect`]; the crate ships scripted stubs, not real models.

pub mod alert;
pub mod annotate;
pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod manager;
pub mod store;
pub mod worker;

pub use alert::dispatch::{AlertDispatcher, AlertHandle, AlertSink, ImageSink, LogSink};
pub use alert::{
    AlertDebouncer, AlertEvent, DebounceOutcome, DwellOutcome, DwellTracker, ObstacleAlert,
    ViolationAlert,
};
pub use config::{CameraConfig, Config};
pub use detect::{
    CascadeConfig, ClassifiedLabel, Classifier, Detection, DetectionBatch, DetectionCascade,
    DetectionKind, ItemDetector, ModelSet, ObstacleDetector, RawDetection, SubjectDetector,
};
pub use frame::Frame;
pub use geometry::{point_in_polygon, BBox, Point, Zone, ZoneFilter, ZoneRole};
pub use ingest::{open_source, FrameSource, SourceConfig, SourceStats, StubSource};
pub use manager::{AggregateStatistics, Manager};
pub use store::{CameraState, CameraStatistics, SharedFrameStore};
pub use worker::{CameraWorker, StepOutcome, StreakOnError, WorkerConfig, WorkerReport};
