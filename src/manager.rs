//! Pipeline manager.
//!
//! Builds one worker per configured camera, starts each on its own thread,
//! and owns the stop signal. Shutdown raises the flag, waits bounded for
//! each worker's final report, then drains the alert dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{info, warn};

use crate::alert::dispatch::{AlertDispatcher, AlertSink, ImageSink, LogSink};
use crate::alert::{AlertDebouncer, DwellTracker};
use crate::config::{CameraConfig, Config};
use crate::detect::{DetectionCascade, ModelSet};
use crate::ingest::open_source;
use crate::store::{CameraStatistics, SharedFrameStore};
use crate::worker::{CameraWorker, WorkerReport};

/// Totals across every camera, logged at shutdown and exposed to callers.
#[derive(Clone, Debug, Default)]
pub struct AggregateStatistics {
    pub cameras: usize,
    pub active_cameras: usize,
    pub frames_captured: u64,
    pub frames_evaluated: u64,
    pub inference_failures: u64,
    pub violation_alerts: u64,
    pub obstacle_alerts: u64,
}

impl AggregateStatistics {
    fn from_cameras(stats: &[CameraStatistics]) -> Self {
        let mut totals = Self {
            cameras: stats.len(),
            ..Self::default()
        };
        for camera in stats {
            if camera.active {
                totals.active_cameras += 1;
            }
            totals.frames_captured += camera.frames_captured;
            totals.frames_evaluated += camera.frames_evaluated;
            totals.inference_failures += camera.inference_failures;
            totals.violation_alerts += camera.violation_alerts;
            totals.obstacle_alerts += camera.obstacle_alerts;
        }
        totals
    }
}

pub struct Manager {
    store: SharedFrameStore,
    stop: Arc<AtomicBool>,
    handles: Vec<(usize, JoinHandle<()>)>,
    done_rx: mpsc::Receiver<WorkerReport>,
    dispatcher: Option<AlertDispatcher>,
}

impl Manager {
    /// Build workers from configuration and start them. `models` supplies
    /// each camera's model capabilities.
    pub fn from_config(
        config: &Config,
        mut models: impl FnMut(&CameraConfig) -> Result<ModelSet>,
    ) -> Result<Self> {
        let mut sinks: Vec<Box<dyn AlertSink>> = vec![Box::new(LogSink)];
        if config.alerts.save_images {
            sinks.push(Box::new(ImageSink::new(config.alerts.image_dir.clone())));
        }
        let dispatcher = AlertDispatcher::start(sinks)?;

        let store = SharedFrameStore::new(
            config
                .cameras
                .iter()
                .map(|camera| (camera.id, camera.name.clone())),
        );

        let worker_config = config.worker_config();
        let mut workers = Vec::with_capacity(config.cameras.len());
        for camera in &config.cameras {
            let source = open_source(camera.source_config())
                .with_context(|| format!("camera {}: open source", camera.id))?;
            let cascade = DetectionCascade::new(
                config.cascade_config()?,
                camera.zone_filter(),
                models(camera).with_context(|| format!("camera {}: load models", camera.id))?,
            );
            let state = store
                .state(camera.id)
                .ok_or_else(|| anyhow!("camera {}: missing state slot", camera.id))?;
            workers.push(CameraWorker::new(
                camera.id,
                camera.name.clone(),
                worker_config.clone(),
                source,
                cascade,
                AlertDebouncer::new(
                    config.alerts.violation_threshold,
                    config.alerts.violation_cooldown,
                ),
                DwellTracker::new(
                    config.alerts.obstacle_threshold,
                    config.alerts.obstacle_cooldown,
                ),
                state,
                dispatcher.handle(),
            ));
        }

        Self::start(workers, store, dispatcher)
    }

    /// Start prebuilt workers, one thread each.
    pub fn start(
        workers: Vec<CameraWorker>,
        store: SharedFrameStore,
        dispatcher: AlertDispatcher,
    ) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();

        let mut handles = Vec::with_capacity(workers.len());
        for worker in workers {
            let camera_id = worker.camera_id();
            let stop = stop.clone();
            let done = done_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("camera-{camera_id}"))
                .spawn(move || worker.run(stop, done))
                .with_context(|| format!("spawn worker thread for camera {camera_id}"))?;
            handles.push((camera_id, handle));
        }
        info!("manager: started {} camera worker(s)", handles.len());

        Ok(Self {
            store,
            stop,
            handles,
            done_rx,
            dispatcher: Some(dispatcher),
        })
    }

    pub fn store(&self) -> &SharedFrameStore {
        &self.store
    }

    /// Shared flag a signal handler can raise to begin shutdown.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn aggregate_statistics(&self) -> AggregateStatistics {
        AggregateStatistics::from_cameras(&self.store.all_statistics())
    }

    /// Signal stop, wait up to `per_worker_timeout` for each worker's final
    /// report, then drain the dispatcher. Returns the reports received.
    pub fn stop(mut self, per_worker_timeout: Duration) -> Vec<WorkerReport> {
        self.stop.store(true, Ordering::Relaxed);

        let mut reports = Vec::with_capacity(self.handles.len());
        for _ in 0..self.handles.len() {
            match self.done_rx.recv_timeout(per_worker_timeout) {
                Ok(report) => reports.push(report),
                Err(_) => {
                    warn!("manager: timed out waiting for a worker report");
                    break;
                }
            }
        }

        // Join only workers that reported; a stuck worker is detached so
        // shutdown stays bounded.
        let reported: Vec<usize> = reports.iter().map(|r| r.camera_id).collect();
        let mut detached = false;
        for (camera_id, handle) in self.handles.drain(..) {
            if !reported.contains(&camera_id) {
                warn!("manager: detaching unresponsive worker for camera {}", camera_id);
                detached = true;
                continue;
            }
            if handle.join().is_err() {
                warn!("manager: worker thread for camera {} panicked", camera_id);
            }
        }

        if let Some(dispatcher) = self.dispatcher.take() {
            if detached {
                // A detached worker still holds an alert handle, so the
                // dispatcher channel cannot drain; leak it rather than hang.
                std::mem::forget(dispatcher);
            } else {
                dispatcher.stop();
            }
        }

        let totals = AggregateStatistics::from_cameras(&self.store.all_statistics());
        info!(
            "manager: stopped; {} frames captured, {} evaluated, {} violation alert(s), \
             {} obstacle alert(s), {} inference failure(s)",
            totals.frames_captured,
            totals.frames_evaluated,
            totals.violation_alerts,
            totals.obstacle_alerts,
            totals.inference_failures
        );
        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::dispatch::LogSink;
    use crate::alert::{AlertDebouncer, DwellTracker};
    use crate::detect::{CascadeConfig, ModelSet};
    use crate::geometry::ZoneFilter;
    use crate::ingest::{SourceConfig, StubSource};
    use crate::worker::WorkerConfig;
    use std::time::Instant;

    fn stub_worker(camera_id: usize, store: &SharedFrameStore, dispatcher: &AlertDispatcher) -> CameraWorker {
        CameraWorker::new(
            camera_id,
            format!("camera-{camera_id}"),
            WorkerConfig {
                tick_sleep: Duration::from_millis(1),
                ..WorkerConfig::default()
            },
            Box::new(StubSource::new(SourceConfig {
                url: format!("stub://{camera_id}"),
                target_fps: 10,
                width: 64,
                height: 48,
            })),
            DetectionCascade::new(
                CascadeConfig::default(),
                ZoneFilter::default(),
                ModelSet::noop(),
            ),
            AlertDebouncer::new(3, Duration::from_secs(5)),
            DwellTracker::new(Duration::from_secs(60), Duration::from_secs(300)),
            store.state(camera_id).expect("state"),
            dispatcher.handle(),
        )
    }

    #[test]
    fn start_and_stop_returns_one_report_per_camera() -> Result<()> {
        let store = SharedFrameStore::new([(0, "a".to_string()), (1, "b".to_string())]);
        let dispatcher = AlertDispatcher::start(vec![Box::new(LogSink)])?;
        let workers = vec![
            stub_worker(0, &store, &dispatcher),
            stub_worker(1, &store, &dispatcher),
        ];

        let manager = Manager::start(workers, store, dispatcher)?;
        // Let the workers capture a few frames.
        std::thread::sleep(Duration::from_millis(100));

        let totals = manager.aggregate_statistics();
        assert_eq!(totals.cameras, 2);

        let reports = manager.stop(Duration::from_secs(5));
        assert_eq!(reports.len(), 2);
        let mut ids: Vec<usize> = reports.iter().map(|r| r.camera_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![0, 1]);
        assert!(reports.iter().all(|r| r.frames_captured > 0));
        Ok(())
    }

    #[test]
    fn aggregate_totals_sum_across_cameras() {
        let stats = vec![
            CameraStatistics {
                camera_id: 0,
                active: true,
                frames_captured: 10,
                frames_evaluated: 2,
                violation_alerts: 1,
                ..CameraStatistics::default()
            },
            CameraStatistics {
                camera_id: 1,
                active: false,
                frames_captured: 7,
                frames_evaluated: 1,
                obstacle_alerts: 2,
                ..CameraStatistics::default()
            },
        ];
        let totals = AggregateStatistics::from_cameras(&stats);
        assert_eq!(totals.cameras, 2);
        assert_eq!(totals.active_cameras, 1);
        assert_eq!(totals.frames_captured, 17);
        assert_eq!(totals.violation_alerts, 1);
        assert_eq!(totals.obstacle_alerts, 2);
    }

    #[test]
    fn worker_steps_do_not_require_the_manager() -> Result<()> {
        // Workers stay drivable directly, which the isolation tests rely on.
        let store = SharedFrameStore::new([(0, "a".to_string())]);
        let dispatcher = AlertDispatcher::start(vec![Box::new(LogSink)])?;
        let mut worker = stub_worker(0, &store, &dispatcher);
        worker.connect()?;
        worker.step(Instant::now());
        assert_eq!(store.statistics(0).expect("stats").frames_captured, 1);
        // The worker holds an AlertHandle; drop it so stop() can drain.
        drop(worker);
        dispatcher.stop();
        Ok(())
    }
}
