//! sitewatchd - safety monitoring daemon
//!
//! Loads configuration, starts one worker per camera, and runs until
//! Ctrl-C. With the default configuration every camera is a `stub://`
//! source wired to scripted models, so the daemon exercises the whole
//! pipeline without cameras or model weights; point `SITEWATCH_CONFIG`
//! at a real deployment to change that.

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;

use sitewatch::detect::stub::PulseObstacles;
use sitewatch::detect::stub::{FixedClassifier, ScriptStep, ScriptedItems, ScriptedSubjects};
use sitewatch::{BBox, Config, Manager, ModelSet};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    log::info!(
        "sitewatchd {}: {} camera(s), detection every {} frame(s)",
        env!("CARGO_PKG_VERSION"),
        config.cameras.len(),
        config.detection.detection_interval
    );

    let manager = Manager::from_config(&config, |camera| Ok(demo_models(camera.id)))?;

    let stop = manager.stop_signal();
    ctrlc::set_handler(move || {
        log::info!("shutdown requested");
        stop.store(true, Ordering::Relaxed);
    })?;

    let stop = manager.stop_signal();
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(200));
    }

    let reports = manager.stop(Duration::from_secs(10));
    for report in reports {
        log::info!(
            "camera {}: {} frames, {} evaluated, {} violation / {} obstacle alert(s)",
            report.camera_id,
            report.frames_captured,
            report.frames_evaluated,
            report.violation_alerts,
            report.obstacle_alerts
        );
    }
    Ok(())
}

/// Scripted stand-ins for real models: one subject wearing a non-compliant
/// helmet, and an obstacle that appears in bursts to drive the dwell path.
fn demo_models(camera_id: usize) -> ModelSet {
    ModelSet {
        subjects: Box::new(ScriptedSubjects::new(vec![ScriptStep::one(
            BBox::new(200, 120, 360, 420),
            "person",
            0.87,
        )])),
        items: Box::new(ScriptedItems::new(vec![ScriptStep::one(
            BBox::new(40, 10, 110, 80),
            "head",
            0.81,
        )])),
        classifier: Box::new(FixedClassifier::new("non-safety-helmet", 0.9)),
        obstacles: Box::new(PulseObstacles::new(
            BBox::new(420, 300, 560, 430),
            600 + camera_id as u64 * 120,
            450,
        )),
    }
}
