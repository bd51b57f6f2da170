//! Per-camera worker.
//!
//! One worker per camera, on its own OS thread. Each tick pulls a frame,
//! publishes it to the shared store, and, on frames selected by the
//! detection interval, runs the cascade and advances the debounce and
//! dwell machines in frame order. Alerts are handed to the dispatcher;
//! the worker never runs a sink itself.
//!
//! Read failures are contained per camera: transient ones retry with a
//! short sleep, and after `failure_threshold` consecutive failures the
//! worker releases the source and reacquires it with a longer backoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::alert::dispatch::AlertHandle;
use crate::alert::{
    AlertDebouncer, AlertEvent, DebounceOutcome, DwellOutcome, DwellTracker, ObstacleAlert,
    ViolationAlert,
};
use crate::annotate::annotate;
use crate::detect::DetectionCascade;
use crate::ingest::FrameSource;
use crate::store::{lock_state, CameraState};

/// What happens to the violation streak when a cycle cannot be evaluated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakOnError {
    /// Keep the streak as it was; the next evaluated frame continues it.
    #[default]
    Freeze,
    /// Treat the gap as a broken streak.
    Reset,
}

/// Loop tuning shared by all workers.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Run detection when `(frame_index + camera_offset * camera_id) mod
    /// detection_interval == 0`.
    pub detection_interval: u64,
    /// Per-camera stride spreading inference cost across cameras.
    pub camera_offset: u64,
    /// Consecutive read failures before releasing and reacquiring.
    pub failure_threshold: u32,
    pub reconnect_backoff: Duration,
    pub retry_sleep: Duration,
    pub tick_sleep: Duration,
    pub streak_on_error: StreakOnError,
    pub fps_log_interval: Duration,
    /// Warn when one cascade evaluation takes longer than this.
    pub slow_cycle_warn: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            detection_interval: 10,
            camera_offset: 5,
            failure_threshold: 10,
            reconnect_backoff: Duration::from_secs(2),
            retry_sleep: Duration::from_millis(100),
            tick_sleep: Duration::from_millis(10),
            streak_on_error: StreakOnError::Freeze,
            fps_log_interval: Duration::from_secs(5),
            slow_cycle_warn: Duration::from_secs(1),
        }
    }
}

/// Final counters handed back on the completion channel.
#[derive(Clone, Debug)]
pub struct WorkerReport {
    pub camera_id: usize,
    pub frames_captured: u64,
    pub frames_evaluated: u64,
    pub inference_failures: u64,
    pub violation_alerts: u64,
    pub obstacle_alerts: u64,
}

/// Outcome of one loop tick, driving the sleep policy in `run`.
#[derive(Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Frame captured; `evaluated` is true when the cascade ran.
    Captured { evaluated: bool },
    /// Transient read failure, below the reacquire threshold.
    ReadFailed,
    /// Threshold hit; the source was released and needs reacquisition.
    NeedsReacquire,
}

pub struct CameraWorker {
    camera_id: usize,
    camera_name: String,
    config: WorkerConfig,
    source: Box<dyn FrameSource>,
    cascade: DetectionCascade,
    debouncer: AlertDebouncer,
    dwell: DwellTracker,
    state: Arc<Mutex<CameraState>>,
    alerts: AlertHandle,
    frame_index: u64,
    consecutive_failures: u32,
    violation_sequence: u64,
    obstacle_sequence: u64,
}

impl CameraWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        camera_id: usize,
        camera_name: String,
        config: WorkerConfig,
        source: Box<dyn FrameSource>,
        cascade: DetectionCascade,
        debouncer: AlertDebouncer,
        dwell: DwellTracker,
        state: Arc<Mutex<CameraState>>,
        alerts: AlertHandle,
    ) -> Self {
        Self {
            camera_id,
            camera_name,
            config,
            source,
            cascade,
            debouncer,
            dwell,
            state,
            alerts,
            frame_index: 0,
            consecutive_failures: 0,
            violation_sequence: 0,
            obstacle_sequence: 0,
        }
    }

    pub fn camera_id(&self) -> usize {
        self.camera_id
    }

    /// Open the source and mark the camera active.
    pub fn connect(&mut self) -> Result<()> {
        self.source
            .connect()
            .with_context(|| format!("camera {}: connect source", self.camera_id))?;
        self.consecutive_failures = 0;
        let mut state = lock_state(&self.state);
        state.statistics.active = true;
        state.statistics.source = self.source.stats();
        Ok(())
    }

    /// One acquisition attempt. `now` feeds the debounce and dwell machines
    /// so transitions stay in frame order.
    pub fn step(&mut self, now: Instant) -> StepOutcome {
        let frame = match self.source.next_frame() {
            Ok(frame) => frame,
            Err(err) => {
                self.consecutive_failures += 1;
                debug!(
                    "camera {}: read failure {}/{}: {:#}",
                    self.camera_id, self.consecutive_failures, self.config.failure_threshold, err
                );
                if self.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        "camera {}: {} consecutive read failures, releasing source",
                        self.camera_id, self.consecutive_failures
                    );
                    self.source.release();
                    self.consecutive_failures = 0;
                    lock_state(&self.state).statistics.active = false;
                    return StepOutcome::NeedsReacquire;
                }
                return StepOutcome::ReadFailed;
            }
        };

        self.consecutive_failures = 0;
        let selected = (self.frame_index + self.config.camera_offset * self.camera_id as u64)
            % self.config.detection_interval
            == 0;
        self.frame_index += 1;

        // The raw frame is published every tick, evaluated or not.
        {
            let mut state = lock_state(&self.state);
            state.latest_frame = Some(frame.clone());
            state.statistics.frames_captured += 1;
            state.statistics.active = true;
            state.statistics.source = self.source.stats();
        }

        if selected {
            self.evaluate(&frame, now);
        }

        StepOutcome::Captured { evaluated: selected }
    }

    fn evaluate(&mut self, frame: &crate::frame::Frame, now: Instant) {
        let started = Instant::now();
        let batch = match self.cascade.evaluate(frame) {
            Ok(batch) => batch,
            Err(err) => {
                warn!(
                    "camera {}: inference failure, cycle skipped: {:#}",
                    self.camera_id, err
                );
                if self.config.streak_on_error == StreakOnError::Reset {
                    self.debouncer.reset_streak();
                }
                let mut state = lock_state(&self.state);
                state.statistics.inference_failures += 1;
                state.statistics.violation_streak = self.debouncer.streak();
                return;
            }
        };
        let elapsed = started.elapsed();
        if elapsed > self.config.slow_cycle_warn {
            warn!(
                "camera {}: detection took {}ms",
                self.camera_id,
                elapsed.as_millis()
            );
        }

        let violation_fire = self.debouncer.observe(batch.has_violation, now);
        let dwell_fire = self.dwell.observe(batch.has_obstacle, now);

        let annotated = annotate(frame, self.cascade.zones(), &batch.detections);

        if violation_fire == DebounceOutcome::Fired {
            self.violation_sequence += 1;
            self.alerts.send(AlertEvent::Violation(ViolationAlert {
                camera_id: self.camera_id,
                camera_name: self.camera_name.clone(),
                fired_at: SystemTime::now(),
                sequence: self.violation_sequence,
                frame: frame.clone(),
                annotated: annotated.clone(),
                detections: batch.detections.clone(),
            }));
        }
        if dwell_fire == DwellOutcome::Fired {
            self.obstacle_sequence += 1;
            self.alerts.send(AlertEvent::Obstacle(ObstacleAlert {
                camera_id: self.camera_id,
                camera_name: self.camera_name.clone(),
                fired_at: SystemTime::now(),
                sequence: self.obstacle_sequence,
                dwell: self.dwell.dwell(now).unwrap_or_default(),
                frame: frame.clone(),
                annotated: annotated.clone(),
                detections: batch.detections.clone(),
            }));
        }

        let mut state = lock_state(&self.state);
        state.latest_annotated = Some(annotated);
        state.latest_detections = batch.detections;
        let stats = &mut state.statistics;
        stats.frames_evaluated += 1;
        if batch.has_violation {
            stats.violation_frames += 1;
        }
        stats.violation_streak = self.debouncer.streak();
        stats.obstacle_present = batch.has_obstacle;
        stats.obstacle_dwell = self.dwell.dwell(now);
        stats.violation_alerts = self.violation_sequence;
        stats.obstacle_alerts = self.obstacle_sequence;
    }

    /// Blocking loop until `stop` is raised. Consumes the worker; the final
    /// counters go out on `done`.
    pub fn run(mut self, stop: Arc<AtomicBool>, done: mpsc::Sender<WorkerReport>) {
        while !stop.load(Ordering::Relaxed) {
            if let Err(err) = self.connect() {
                warn!(
                    "camera {}: source unavailable, retrying in {:?}: {:#}",
                    self.camera_id, self.config.reconnect_backoff, err
                );
                self.sleep_interruptibly(self.config.reconnect_backoff, &stop);
                continue;
            }

            let mut window_start = Instant::now();
            let mut window_frames: u64 = 0;

            while !stop.load(Ordering::Relaxed) {
                match self.step(Instant::now()) {
                    StepOutcome::Captured { .. } => {
                        window_frames += 1;
                        if window_start.elapsed() >= self.config.fps_log_interval {
                            let fps = window_frames as f32
                                / window_start.elapsed().as_secs_f32().max(f32::EPSILON);
                            info!("camera {}: {:.1} fps", self.camera_id, fps);
                            lock_state(&self.state).statistics.fps = fps;
                            window_start = Instant::now();
                            window_frames = 0;
                        }
                        thread::sleep(self.config.tick_sleep);
                    }
                    StepOutcome::ReadFailed => {
                        thread::sleep(self.config.retry_sleep);
                    }
                    StepOutcome::NeedsReacquire => {
                        self.sleep_interruptibly(self.config.reconnect_backoff, &stop);
                        break;
                    }
                }
            }
        }

        self.source.release();
        let report = {
            let mut state = lock_state(&self.state);
            state.statistics.active = false;
            let stats = &state.statistics;
            WorkerReport {
                camera_id: self.camera_id,
                frames_captured: stats.frames_captured,
                frames_evaluated: stats.frames_evaluated,
                inference_failures: stats.inference_failures,
                violation_alerts: stats.violation_alerts,
                obstacle_alerts: stats.obstacle_alerts,
            }
        };
        info!(
            "camera {}: stopped after {} frames ({} evaluated)",
            self.camera_id, report.frames_captured, report.frames_evaluated
        );
        // A closed channel means the manager gave up waiting.
        let _ = done.send(report);
    }

    fn sleep_interruptibly(&self, total: Duration, stop: &AtomicBool) {
        let deadline = Instant::now() + total;
        while Instant::now() < deadline && !stop.load(Ordering::Relaxed) {
            thread::sleep(self.config.tick_sleep.min(Duration::from_millis(50)));
        }
    }
}
