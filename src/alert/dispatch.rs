//! Alert dispatch.
//!
//! Workers produce [`AlertEvent`]s and send them over an mpsc channel; a
//! dedicated dispatcher thread drains the channel and runs each configured
//! sink. Sink failures are logged and never propagate back to a worker.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::alert::{AlertEvent, ObstacleAlert, ViolationAlert};
use crate::frame::Frame;

/// A consumer of fired alerts. Runs on the dispatcher thread.
pub trait AlertSink: Send {
    fn name(&self) -> &str;
    fn on_violation(&mut self, alert: &ViolationAlert) -> Result<()>;
    fn on_obstacle(&mut self, alert: &ObstacleAlert) -> Result<()>;
}

/// Hands alert events from workers to the dispatcher thread.
#[derive(Clone)]
pub struct AlertHandle {
    tx: mpsc::Sender<AlertEvent>,
}

impl AlertHandle {
    pub fn send(&self, event: AlertEvent) {
        // A closed channel means the dispatcher is gone during shutdown.
        if self.tx.send(event).is_err() {
            warn!("alert dispatcher is down, event dropped");
        }
    }
}

pub struct AlertDispatcher {
    tx: Option<mpsc::Sender<AlertEvent>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AlertDispatcher {
    /// Spawn the dispatcher thread over the given sinks.
    pub fn start(mut sinks: Vec<Box<dyn AlertSink>>) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<AlertEvent>();
        let thread = thread::Builder::new()
            .name("alert-dispatch".to_string())
            .spawn(move || {
                while let Ok(event) = rx.recv() {
                    for sink in sinks.iter_mut() {
                        let result = match &event {
                            AlertEvent::Violation(alert) => sink.on_violation(alert),
                            AlertEvent::Obstacle(alert) => sink.on_obstacle(alert),
                        };
                        if let Err(err) = result {
                            error!(
                                "alert sink {} failed for camera {}: {:#}",
                                sink.name(),
                                event.camera_id(),
                                err
                            );
                        }
                    }
                }
            })
            .context("spawn alert dispatcher thread")?;

        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> AlertHandle {
        AlertHandle {
            tx: self
                .tx
                .as_ref()
                .cloned()
                .unwrap_or_else(|| mpsc::channel().0),
        }
    }

    /// Close the channel and wait for queued events to drain.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the last sender ends the recv loop once workers' clones
        // are gone too.
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("alert dispatcher thread panicked");
            }
        }
    }
}

impl Drop for AlertDispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ----------------------------------------------------------------------------
// Built-in sinks
// ----------------------------------------------------------------------------

/// Logs each alert. Always configured.
pub struct LogSink;

impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn on_violation(&mut self, alert: &ViolationAlert) -> Result<()> {
        info!(
            "camera {} ({}): violation alert #{}, {} violating item(s)",
            alert.camera_id,
            alert.camera_name,
            alert.sequence,
            alert.detections.iter().filter(|d| d.is_violation).count()
        );
        Ok(())
    }

    fn on_obstacle(&mut self, alert: &ObstacleAlert) -> Result<()> {
        info!(
            "camera {} ({}): obstacle alert #{}, dwell {}s",
            alert.camera_id,
            alert.camera_name,
            alert.sequence,
            alert.dwell.as_secs()
        );
        Ok(())
    }
}

/// Persists the original and annotated frames of each alert as JPEGs under
/// `<root>/original` and `<root>/annotated`.
pub struct ImageSink {
    root: PathBuf,
}

impl ImageSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn save_pair(&self, base: &str, frame: &Frame, annotated: &Frame) -> Result<()> {
        write_jpeg(
            &self.root.join("original").join(format!("{base}_orig.jpg")),
            frame,
        )?;
        write_jpeg(
            &self.root.join("annotated").join(format!("{base}_anno.jpg")),
            annotated,
        )?;
        Ok(())
    }
}

impl AlertSink for ImageSink {
    fn name(&self) -> &str {
        "image"
    }

    fn on_violation(&mut self, alert: &ViolationAlert) -> Result<()> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let base = format!("cam{}_ng{}_{}", alert.camera_id, alert.sequence, stamp);
        self.save_pair(&base, &alert.frame, &alert.annotated)?;
        info!("camera {}: saved violation images ({base})", alert.camera_id);
        Ok(())
    }

    fn on_obstacle(&mut self, alert: &ObstacleAlert) -> Result<()> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let base = format!(
            "cam{}_obstacle{}_dur{}s_{}",
            alert.camera_id,
            alert.sequence,
            alert.dwell.as_secs(),
            stamp
        );
        self.save_pair(&base, &alert.frame, &alert.annotated)?;
        info!("camera {}: saved obstacle images ({base})", alert.camera_id);
        Ok(())
    }
}

fn write_jpeg(path: &Path, frame: &Frame) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create alert image directory {}", parent.display()))?;
    }
    let image = image::RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
        .context("frame buffer does not match its dimensions")?;
    image
        .save_with_format(path, image::ImageFormat::Jpeg)
        .with_context(|| format!("write alert image {}", path.display()))?;
    Ok(())
}
