//! Shared frame store.
//!
//! One [`CameraState`] per camera behind its own mutex. The owning worker
//! writes; external consumers read point-in-time clones through the
//! [`SharedFrameStore`] accessors. There is no cross-camera lock, so one
//! slow or stalled camera never blocks reads or writes on another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::detect::Detection;
use crate::frame::Frame;
use crate::ingest::SourceStats;

/// Point-in-time counters for one camera.
#[derive(Clone, Debug, Default)]
pub struct CameraStatistics {
    pub camera_id: usize,
    pub camera_name: String,
    /// False while the source is down or being reacquired.
    pub active: bool,
    pub frames_captured: u64,
    pub frames_evaluated: u64,
    pub inference_failures: u64,
    /// Evaluated frames that carried at least one violation.
    pub violation_frames: u64,
    pub violation_alerts: u64,
    pub obstacle_alerts: u64,
    pub violation_streak: u32,
    pub obstacle_present: bool,
    pub obstacle_dwell: Option<Duration>,
    pub fps: f32,
    pub source: SourceStats,
}

/// Mutable per-camera state. Exclusive to the owning worker; everyone else
/// goes through the store's locked accessors.
#[derive(Debug)]
pub struct CameraState {
    pub latest_frame: Option<Frame>,
    pub latest_annotated: Option<Frame>,
    pub latest_detections: Vec<Detection>,
    pub statistics: CameraStatistics,
}

impl CameraState {
    fn new(camera_id: usize, camera_name: String) -> Self {
        Self {
            latest_frame: None,
            latest_annotated: None,
            latest_detections: Vec::new(),
            statistics: CameraStatistics {
                camera_id,
                camera_name,
                ..CameraStatistics::default()
            },
        }
    }
}

/// Read surface over all cameras. The camera set is fixed at startup; only
/// the per-camera contents change.
#[derive(Clone, Default)]
pub struct SharedFrameStore {
    cameras: HashMap<usize, Arc<Mutex<CameraState>>>,
}

impl SharedFrameStore {
    /// Build the store with one slot per `(camera_id, camera_name)`.
    pub fn new(cameras: impl IntoIterator<Item = (usize, String)>) -> Self {
        Self {
            cameras: cameras
                .into_iter()
                .map(|(id, name)| (id, Arc::new(Mutex::new(CameraState::new(id, name)))))
                .collect(),
        }
    }

    /// Handle for the worker that owns `camera_id`.
    pub fn state(&self, camera_id: usize) -> Option<Arc<Mutex<CameraState>>> {
        self.cameras.get(&camera_id).cloned()
    }

    pub fn camera_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.cameras.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn latest_frame(&self, camera_id: usize) -> Option<Frame> {
        self.with_state(camera_id, |state| state.latest_frame.clone())?
    }

    pub fn latest_annotated_frame(&self, camera_id: usize) -> Option<Frame> {
        self.with_state(camera_id, |state| state.latest_annotated.clone())?
    }

    pub fn latest_detections(&self, camera_id: usize) -> Option<Vec<Detection>> {
        self.with_state(camera_id, |state| state.latest_detections.clone())
    }

    pub fn statistics(&self, camera_id: usize) -> Option<CameraStatistics> {
        self.with_state(camera_id, |state| state.statistics.clone())
    }

    /// Statistics snapshot for every camera, in id order.
    pub fn all_statistics(&self) -> Vec<CameraStatistics> {
        self.camera_ids()
            .into_iter()
            .filter_map(|id| self.statistics(id))
            .collect()
    }

    fn with_state<T>(&self, camera_id: usize, f: impl FnOnce(&CameraState) -> T) -> Option<T> {
        let state = self.cameras.get(&camera_id)?;
        Some(f(&lock_state(state)))
    }
}

/// Lock a camera slot, recovering the data from a poisoned mutex. A worker
/// that panicked mid-update leaves a consistent enough state for reads.
pub fn lock_state(state: &Mutex<CameraState>) -> MutexGuard<'_, CameraState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn store() -> SharedFrameStore {
        SharedFrameStore::new([(0, "dock".to_string()), (1, "aisle".to_string())])
    }

    #[test]
    fn unknown_camera_yields_none() {
        let store = store();
        assert!(store.latest_frame(9).is_none());
        assert!(store.statistics(9).is_none());
    }

    #[test]
    fn worker_updates_are_visible_through_accessors() {
        let store = store();
        let slot = store.state(0).expect("slot");
        {
            let mut state = lock_state(&slot);
            state.latest_frame = Some(Frame::new(
                vec![0; 4 * 4 * 3],
                4,
                4,
                SystemTime::UNIX_EPOCH,
            ));
            state.statistics.frames_captured = 7;
            state.statistics.active = true;
        }

        let stats = store.statistics(0).expect("stats");
        assert_eq!(stats.frames_captured, 7);
        assert!(stats.active);
        assert!(store.latest_frame(0).is_some());
        assert!(store.latest_frame(1).is_none());
    }

    #[test]
    fn all_statistics_come_back_in_id_order() {
        let store = store();
        let ids: Vec<usize> = store
            .all_statistics()
            .into_iter()
            .map(|s| s.camera_id)
            .collect();
        assert_eq!(ids, vec![0, 1]);
    }
}
