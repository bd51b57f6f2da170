//! Alert events and the temporal state machines that produce them.
//!
//! Workers evaluate [`AlertDebouncer`] and [`DwellTracker`] in frame order
//! and hand the resulting events to a [`dispatch::AlertDispatcher`], which
//! runs sinks on its own thread so a slow sink never blocks acquisition.

mod debounce;
pub mod dispatch;
mod dwell;

pub use debounce::{AlertDebouncer, DebounceOutcome};
pub use dwell::{DwellOutcome, DwellTracker};

use std::time::{Duration, SystemTime};

use crate::detect::Detection;
use crate::frame::Frame;

/// A debounced equipment violation on one camera.
#[derive(Clone, Debug)]
pub struct ViolationAlert {
    pub camera_id: usize,
    pub camera_name: String,
    pub fired_at: SystemTime,
    /// Running count of fires on this camera, 1-based.
    pub sequence: u64,
    pub frame: Frame,
    pub annotated: Frame,
    pub detections: Vec<Detection>,
}

/// An obstacle that has dwelled past the alert threshold.
#[derive(Clone, Debug)]
pub struct ObstacleAlert {
    pub camera_id: usize,
    pub camera_name: String,
    pub fired_at: SystemTime,
    pub sequence: u64,
    pub dwell: Duration,
    pub frame: Frame,
    pub annotated: Frame,
    pub detections: Vec<Detection>,
}

/// Either kind of alert, as carried on the dispatch channel.
#[derive(Clone, Debug)]
pub enum AlertEvent {
    Violation(ViolationAlert),
    Obstacle(ObstacleAlert),
}

impl AlertEvent {
    pub fn camera_id(&self) -> usize {
        match self {
            AlertEvent::Violation(a) => a.camera_id,
            AlertEvent::Obstacle(a) => a.camera_id,
        }
    }
}
