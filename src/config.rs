use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{self, CascadeConfig};
use crate::geometry::{Zone, ZoneFilter};
use crate::ingest::SourceConfig;
use crate::worker::{StreakOnError, WorkerConfig};

const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_DETECTION_INTERVAL: u64 = 10;
const DEFAULT_CAMERA_OFFSET: u64 = 5;
const DEFAULT_NMS_IOU: f32 = 0.45;
const DEFAULT_VIOLATION_PATTERN: &str = "non-safety";
const DEFAULT_VIOLATION_THRESHOLD: u32 = 3;
const DEFAULT_VIOLATION_COOLDOWN_S: u64 = 5;
const DEFAULT_OBSTACLE_THRESHOLD_S: u64 = 60;
const DEFAULT_OBSTACLE_COOLDOWN_S: u64 = 300;
const DEFAULT_FAILURE_THRESHOLD: u32 = 10;
const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 2_000;
const DEFAULT_RETRY_SLEEP_MS: u64 = 100;
const DEFAULT_TICK_SLEEP_MS: u64 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_IMAGE_DIR: &str = "alerts";
const DEFAULT_CAMERA_URL: &str = "stub://camera-0";

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    cameras: Option<Vec<CameraConfigFile>>,
    detection: Option<DetectionConfigFile>,
    alerts: Option<AlertConfigFile>,
    runtime: Option<RuntimeConfigFile>,
}

#[derive(Debug, Deserialize)]
struct CameraConfigFile {
    id: usize,
    name: Option<String>,
    url: String,
    zones: Option<Vec<Zone>>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    subject_confidence: Option<f32>,
    item_confidence: Option<f32>,
    classification_confidence: Option<f32>,
    obstacle_confidence: Option<f32>,
    subject_stage: Option<bool>,
    obstacle_stage: Option<bool>,
    non_primary_subject_classes: Option<Vec<String>>,
    class_map: Option<HashMap<String, Vec<String>>>,
    violation_pattern: Option<String>,
    nms_enabled: Option<bool>,
    nms_iou_threshold: Option<f32>,
    detection_interval: Option<u64>,
    camera_offset: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    violation_threshold: Option<u32>,
    violation_cooldown_s: Option<u64>,
    obstacle_threshold_s: Option<u64>,
    obstacle_cooldown_s: Option<u64>,
    save_images: Option<bool>,
    image_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RuntimeConfigFile {
    failure_threshold: Option<u32>,
    reconnect_backoff_ms: Option<u64>,
    retry_sleep_ms: Option<u64>,
    tick_sleep_ms: Option<u64>,
    streak_on_error: Option<StreakOnError>,
}

/// One camera as configured.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub id: usize,
    pub name: String,
    pub url: String,
    pub zones: Vec<Zone>,
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
}

impl CameraConfig {
    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            url: self.url.clone(),
            target_fps: self.target_fps,
            width: self.width,
            height: self.height,
        }
    }

    pub fn zone_filter(&self) -> ZoneFilter {
        ZoneFilter::new(self.zones.clone())
    }
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub subject_confidence: f32,
    pub item_confidence: f32,
    pub classification_confidence: f32,
    pub obstacle_confidence: f32,
    pub subject_stage: bool,
    pub obstacle_stage: bool,
    pub non_primary_subject_classes: Vec<String>,
    pub class_map: HashMap<String, Vec<String>>,
    pub violation_pattern: String,
    pub nms_enabled: bool,
    pub nms_iou_threshold: f32,
    pub detection_interval: u64,
    pub camera_offset: u64,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub violation_threshold: u32,
    pub violation_cooldown: Duration,
    pub obstacle_threshold: Duration,
    pub obstacle_cooldown: Duration,
    pub save_images: bool,
    pub image_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub failure_threshold: u32,
    pub reconnect_backoff: Duration,
    pub retry_sleep: Duration,
    pub tick_sleep: Duration,
    pub streak_on_error: StreakOnError,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cameras: Vec<CameraConfig>,
    pub detection: DetectionSettings,
    pub alerts: AlertSettings,
    pub runtime: RuntimeSettings,
}

impl Config {
    /// Load from the file named by `SITEWATCH_CONFIG` (defaults apply when
    /// unset), then env overrides, then validation.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SITEWATCH_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        // No cameras section at all means a single synthetic camera, so the
        // daemon runs out of the box. An explicitly empty list is rejected
        // in validate().
        let camera_files = file.cameras.unwrap_or_else(|| {
            vec![CameraConfigFile {
                id: 0,
                name: None,
                url: DEFAULT_CAMERA_URL.to_string(),
                zones: None,
                width: None,
                height: None,
                target_fps: None,
            }]
        });
        let cameras = camera_files
            .into_iter()
            .map(|camera| CameraConfig {
                name: camera.name.unwrap_or_else(|| format!("camera-{}", camera.id)),
                id: camera.id,
                url: camera.url,
                zones: camera.zones.unwrap_or_default(),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
            })
            .collect();

        let detection_file = file.detection.unwrap_or_default();
        let detection = DetectionSettings {
            subject_confidence: detection_file.subject_confidence.unwrap_or(DEFAULT_CONFIDENCE),
            item_confidence: detection_file.item_confidence.unwrap_or(DEFAULT_CONFIDENCE),
            classification_confidence: detection_file
                .classification_confidence
                .unwrap_or(DEFAULT_CONFIDENCE),
            obstacle_confidence: detection_file
                .obstacle_confidence
                .unwrap_or(DEFAULT_CONFIDENCE),
            subject_stage: detection_file.subject_stage.unwrap_or(true),
            obstacle_stage: detection_file.obstacle_stage.unwrap_or(true),
            non_primary_subject_classes: detection_file
                .non_primary_subject_classes
                .unwrap_or_else(|| vec!["forklift".to_string()]),
            class_map: detection_file
                .class_map
                .unwrap_or_else(detect::default_class_map),
            violation_pattern: detection_file
                .violation_pattern
                .unwrap_or_else(|| DEFAULT_VIOLATION_PATTERN.to_string()),
            nms_enabled: detection_file.nms_enabled.unwrap_or(true),
            nms_iou_threshold: detection_file.nms_iou_threshold.unwrap_or(DEFAULT_NMS_IOU),
            detection_interval: detection_file
                .detection_interval
                .unwrap_or(DEFAULT_DETECTION_INTERVAL),
            camera_offset: detection_file.camera_offset.unwrap_or(DEFAULT_CAMERA_OFFSET),
        };

        let alerts_file = file.alerts.unwrap_or_default();
        let alerts = AlertSettings {
            violation_threshold: alerts_file
                .violation_threshold
                .unwrap_or(DEFAULT_VIOLATION_THRESHOLD),
            violation_cooldown: Duration::from_secs(
                alerts_file
                    .violation_cooldown_s
                    .unwrap_or(DEFAULT_VIOLATION_COOLDOWN_S),
            ),
            obstacle_threshold: Duration::from_secs(
                alerts_file
                    .obstacle_threshold_s
                    .unwrap_or(DEFAULT_OBSTACLE_THRESHOLD_S),
            ),
            obstacle_cooldown: Duration::from_secs(
                alerts_file
                    .obstacle_cooldown_s
                    .unwrap_or(DEFAULT_OBSTACLE_COOLDOWN_S),
            ),
            save_images: alerts_file.save_images.unwrap_or(true),
            image_dir: alerts_file
                .image_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGE_DIR)),
        };

        let runtime_file = file.runtime.unwrap_or_default();
        let runtime = RuntimeSettings {
            failure_threshold: runtime_file
                .failure_threshold
                .unwrap_or(DEFAULT_FAILURE_THRESHOLD),
            reconnect_backoff: Duration::from_millis(
                runtime_file
                    .reconnect_backoff_ms
                    .unwrap_or(DEFAULT_RECONNECT_BACKOFF_MS),
            ),
            retry_sleep: Duration::from_millis(
                runtime_file.retry_sleep_ms.unwrap_or(DEFAULT_RETRY_SLEEP_MS),
            ),
            tick_sleep: Duration::from_millis(
                runtime_file.tick_sleep_ms.unwrap_or(DEFAULT_TICK_SLEEP_MS),
            ),
            streak_on_error: runtime_file.streak_on_error.unwrap_or_default(),
        };

        Self {
            cameras,
            detection,
            alerts,
            runtime,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("SITEWATCH_IMAGE_DIR") {
            if !dir.trim().is_empty() {
                self.alerts.image_dir = PathBuf::from(dir);
            }
        }
        if let Ok(pattern) = std::env::var("SITEWATCH_VIOLATION_PATTERN") {
            if !pattern.trim().is_empty() {
                self.detection.violation_pattern = pattern;
            }
        }
        if let Ok(interval) = std::env::var("SITEWATCH_DETECTION_INTERVAL") {
            let parsed: u64 = interval
                .parse()
                .map_err(|_| anyhow!("SITEWATCH_DETECTION_INTERVAL must be an integer"))?;
            self.detection.detection_interval = parsed;
        }
        if let Ok(url) = std::env::var("SITEWATCH_CAMERA_URL") {
            if !url.trim().is_empty() {
                if let Some(camera) = self.cameras.first_mut() {
                    camera.url = url;
                }
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(anyhow!("at least one camera must be configured"));
        }
        let mut seen = std::collections::HashSet::new();
        for camera in &self.cameras {
            if !seen.insert(camera.id) {
                return Err(anyhow!("duplicate camera id {}", camera.id));
            }
            if camera.url.trim().is_empty() {
                return Err(anyhow!("camera {}: url must not be empty", camera.id));
            }
            for zone in &camera.zones {
                if zone.points.len() < 3 {
                    return Err(anyhow!(
                        "camera {}: zone has {} points, need at least 3",
                        camera.id,
                        zone.points.len()
                    ));
                }
            }
        }
        if self.detection.detection_interval == 0 {
            return Err(anyhow!("detection_interval must be greater than zero"));
        }
        if self.alerts.violation_threshold == 0 {
            return Err(anyhow!("violation_threshold must be greater than zero"));
        }
        for threshold in [
            self.detection.subject_confidence,
            self.detection.item_confidence,
            self.detection.classification_confidence,
            self.detection.obstacle_confidence,
        ] {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(anyhow!("confidence thresholds must be within [0, 1]"));
            }
        }
        // Fail early on a bad pattern instead of at first evaluation.
        detect::compile_violation_pattern(&self.detection.violation_pattern)?;
        Ok(())
    }

    pub fn cascade_config(&self) -> Result<CascadeConfig> {
        Ok(CascadeConfig {
            subject_confidence: self.detection.subject_confidence,
            item_confidence: self.detection.item_confidence,
            classification_confidence: self.detection.classification_confidence,
            obstacle_confidence: self.detection.obstacle_confidence,
            subject_stage: self.detection.subject_stage,
            obstacle_stage: self.detection.obstacle_stage,
            non_primary_subject_classes: self.detection.non_primary_subject_classes.clone(),
            class_map: self.detection.class_map.clone(),
            violation_pattern: detect::compile_violation_pattern(
                &self.detection.violation_pattern,
            )?,
            nms_enabled: self.detection.nms_enabled,
            nms_iou_threshold: self.detection.nms_iou_threshold,
        })
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            detection_interval: self.detection.detection_interval,
            camera_offset: self.detection.camera_offset,
            failure_threshold: self.runtime.failure_threshold,
            reconnect_backoff: self.runtime.reconnect_backoff,
            retry_sleep: self.runtime.retry_sleep,
            tick_sleep: self.runtime.tick_sleep,
            streak_on_error: self.runtime.streak_on_error,
            ..WorkerConfig::default()
        }
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
