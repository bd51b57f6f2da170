//! Temporal behavior of the violation and obstacle paths, driven through a
//! real worker over scripted sources and models with a mocked clock.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::Result;

use sitewatch::detect::stub::{
    EmptyModel, FixedClassifier, ScriptStep, ScriptedItems, ScriptedObstacles, ScriptedSubjects,
};
use sitewatch::{
    AlertDebouncer, AlertDispatcher, AlertSink, BBox, CameraWorker, CascadeConfig,
    DetectionCascade, DwellTracker, ModelSet, ObstacleAlert, SharedFrameStore, SourceConfig,
    StubSource, ViolationAlert, WorkerConfig, ZoneFilter,
};

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn take(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl AlertSink for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }
    fn on_violation(&mut self, alert: &ViolationAlert) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("violation#{}", alert.sequence));
        Ok(())
    }
    fn on_obstacle(&mut self, alert: &ObstacleAlert) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("obstacle@{}s", alert.dwell.as_secs()));
        Ok(())
    }
}

fn subject_step() -> ScriptStep {
    ScriptStep::one(BBox::new(100, 100, 200, 300), "person", 0.9)
}

/// Subjects are present on `true` frames and absent on `false` frames, so
/// each flag becomes one evaluated frame's violation state.
fn violation_models(flags: &[bool]) -> ModelSet {
    let steps = flags
        .iter()
        .map(|&v| if v { subject_step() } else { ScriptStep::none() })
        .collect();
    ModelSet {
        subjects: Box::new(ScriptedSubjects::new(steps)),
        items: Box::new(ScriptedItems::new(vec![ScriptStep::one(
            BBox::new(10, 10, 40, 40),
            "head",
            0.8,
        )])),
        classifier: Box::new(FixedClassifier::new("non-safety-helmet", 0.9)),
        obstacles: Box::new(ScriptedObstacles::new(vec![])),
    }
}

fn obstacle_models(flags: &[bool]) -> ModelSet {
    let steps = flags
        .iter()
        .map(|&present| {
            if present {
                ScriptStep::one(BBox::new(50, 50, 150, 150), "pallet", 0.9)
            } else {
                ScriptStep::none()
            }
        })
        .collect();
    ModelSet {
        subjects: Box::new(ScriptedSubjects::new(vec![])),
        items: Box::new(ScriptedItems::new(vec![])),
        classifier: Box::new(EmptyModel),
        obstacles: Box::new(ScriptedObstacles::new(steps)),
    }
}

struct Harness {
    worker: CameraWorker,
    dispatcher: AlertDispatcher,
    recorder: Recorder,
    store: SharedFrameStore,
}

fn harness(models: ModelSet, debouncer: AlertDebouncer, dwell: DwellTracker) -> Harness {
    let recorder = Recorder::default();
    let dispatcher =
        AlertDispatcher::start(vec![Box::new(recorder.clone())]).expect("dispatcher");
    let store = SharedFrameStore::new([(0, "test".to_string())]);
    let worker = CameraWorker::new(
        0,
        "test".to_string(),
        WorkerConfig {
            detection_interval: 1,
            camera_offset: 0,
            ..WorkerConfig::default()
        },
        Box::new(StubSource::new(SourceConfig {
            url: "stub://scenario".to_string(),
            target_fps: 10,
            width: 320,
            height: 240,
        })),
        DetectionCascade::new(CascadeConfig::default(), ZoneFilter::default(), models),
        debouncer,
        dwell,
        store.state(0).expect("state"),
        dispatcher.handle(),
    );
    Harness {
        worker,
        dispatcher,
        recorder,
        store,
    }
}

/// Run `frames` evaluated frames at one second apart.
fn drive(h: &mut Harness, frames: usize) {
    h.worker.connect().expect("connect");
    let start = Instant::now();
    for i in 0..frames {
        h.worker.step(start + Duration::from_secs(i as u64));
    }
}

#[test]
fn one_clean_frame_splits_two_incidents() {
    // T=3, cooldown 5s, 1s per evaluated frame. The clean fourth frame ends
    // the first incident, so both completed streaks emit.
    let flags = [true, true, true, false, true, true, true];
    let mut h = harness(
        violation_models(&flags),
        AlertDebouncer::new(3, Duration::from_secs(5)),
        DwellTracker::new(Duration::from_secs(60), Duration::from_secs(300)),
    );
    drive(&mut h, flags.len());
    drop(h.worker);
    h.dispatcher.stop();

    assert_eq!(
        h.recorder.take(),
        vec!["violation#1".to_string(), "violation#2".to_string()]
    );
}

#[test]
fn streak_one_short_of_threshold_never_fires() {
    let flags = [true, true, false, true, true, false, true, true];
    let mut h = harness(
        violation_models(&flags),
        AlertDebouncer::new(3, Duration::from_secs(5)),
        DwellTracker::new(Duration::from_secs(60), Duration::from_secs(300)),
    );
    drive(&mut h, flags.len());
    drop(h.worker);
    h.dispatcher.stop();

    assert!(h.recorder.take().is_empty());
    let stats = h.store.statistics(0).expect("stats");
    assert_eq!(stats.violation_frames, 6);
    assert_eq!(stats.violation_alerts, 0);
}

#[test]
fn unbroken_violation_run_respects_the_cooldown() {
    let flags = [true; 9];
    let mut h = harness(
        violation_models(&flags),
        AlertDebouncer::new(3, Duration::from_secs(5)),
        DwellTracker::new(Duration::from_secs(60), Duration::from_secs(300)),
    );
    drive(&mut h, flags.len());
    drop(h.worker);
    h.dispatcher.stop();

    // Streaks complete at 2s, 5s, 8s; the middle one lands inside the
    // cooldown window and is suppressed.
    assert_eq!(
        h.recorder.take(),
        vec!["violation#1".to_string(), "violation#2".to_string()]
    );
}

#[test]
fn unclassifiable_item_never_contributes_a_violation() {
    // Subject and item are present on every frame, but the classifier
    // returns nothing usable.
    let models = ModelSet {
        subjects: Box::new(ScriptedSubjects::new(vec![subject_step()])),
        items: Box::new(ScriptedItems::new(vec![ScriptStep::one(
            BBox::new(10, 10, 40, 40),
            "head",
            0.8,
        )])),
        classifier: Box::new(EmptyModel),
        obstacles: Box::new(ScriptedObstacles::new(vec![])),
    };
    let mut h = harness(
        models,
        AlertDebouncer::new(1, Duration::from_secs(0)),
        DwellTracker::new(Duration::from_secs(60), Duration::from_secs(300)),
    );
    drive(&mut h, 5);
    drop(h.worker);
    h.dispatcher.stop();

    assert!(h.recorder.take().is_empty());
    let stats = h.store.statistics(0).expect("stats");
    assert_eq!(stats.frames_evaluated, 5);
    assert_eq!(stats.violation_frames, 0);
}

#[test]
fn obstacle_fires_after_dwell_threshold_and_resets_on_clearing() {
    // Present 0..=61s, gone at 62s, back 63..=70s. Only the first stretch
    // crosses the 60s threshold.
    let mut flags = vec![true; 62];
    flags.push(false);
    flags.extend(std::iter::repeat(true).take(8));

    let mut h = harness(
        obstacle_models(&flags),
        AlertDebouncer::new(3, Duration::from_secs(5)),
        DwellTracker::new(Duration::from_secs(60), Duration::from_secs(300)),
    );
    drive(&mut h, flags.len());
    drop(h.worker);
    h.dispatcher.stop();

    assert_eq!(h.recorder.take(), vec!["obstacle@60s".to_string()]);
    let stats = h.store.statistics(0).expect("stats");
    assert!(stats.obstacle_present);
    // Dwell restarted when the obstacle cleared at 62s.
    assert_eq!(stats.obstacle_dwell, Some(Duration::from_secs(7)));
}
