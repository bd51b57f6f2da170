use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use sitewatch::config::Config;
use sitewatch::worker::StreakOnError;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SITEWATCH_CONFIG",
        "SITEWATCH_IMAGE_DIR",
        "SITEWATCH_VIOLATION_PATTERN",
        "SITEWATCH_DETECTION_INTERVAL",
        "SITEWATCH_CAMERA_URL",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "cameras": [
                {
                    "id": 0,
                    "name": "loading-dock",
                    "url": "stub://dock",
                    "zones": [
                        {
                            "role": "inclusion",
                            "points": [
                                {"x": 0, "y": 0},
                                {"x": 600, "y": 0},
                                {"x": 600, "y": 400},
                                {"x": 0, "y": 400}
                            ]
                        }
                    ]
                },
                {"id": 1, "url": "stub://aisle"}
            ],
            "detection": {
                "subject_confidence": 0.6,
                "detection_interval": 8,
                "subject_stage": true
            },
            "alerts": {
                "violation_threshold": 4,
                "violation_cooldown_s": 10,
                "obstacle_threshold_s": 30,
                "save_images": false
            },
            "runtime": {
                "failure_threshold": 5,
                "streak_on_error": "reset"
            }
        }"#,
    );

    std::env::set_var("SITEWATCH_CONFIG", file.path());
    std::env::set_var("SITEWATCH_DETECTION_INTERVAL", "12");
    std::env::set_var("SITEWATCH_VIOLATION_PATTERN", "^non-");

    let cfg = Config::load().expect("load config");

    assert_eq!(cfg.cameras.len(), 2);
    assert_eq!(cfg.cameras[0].name, "loading-dock");
    assert_eq!(cfg.cameras[0].zones.len(), 1);
    // Unnamed cameras get a generated name.
    assert_eq!(cfg.cameras[1].name, "camera-1");

    assert_eq!(cfg.detection.subject_confidence, 0.6);
    // Env wins over the file.
    assert_eq!(cfg.detection.detection_interval, 12);
    assert_eq!(cfg.detection.violation_pattern, "^non-");

    assert_eq!(cfg.alerts.violation_threshold, 4);
    assert_eq!(cfg.alerts.violation_cooldown, Duration::from_secs(10));
    assert_eq!(cfg.alerts.obstacle_threshold, Duration::from_secs(30));
    assert!(!cfg.alerts.save_images);

    assert_eq!(cfg.runtime.failure_threshold, 5);
    assert_eq!(cfg.runtime.streak_on_error, StreakOnError::Reset);

    clear_env();
}

#[test]
fn defaults_apply_when_sections_are_missing() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{"cameras": [{"id": 0, "url": "stub://only"}]}"#);
    std::env::set_var("SITEWATCH_CONFIG", file.path());

    let cfg = Config::load().expect("load config");
    assert_eq!(cfg.detection.detection_interval, 10);
    assert_eq!(cfg.detection.camera_offset, 5);
    assert_eq!(cfg.alerts.violation_threshold, 3);
    assert_eq!(cfg.alerts.violation_cooldown, Duration::from_secs(5));
    assert_eq!(cfg.alerts.obstacle_threshold, Duration::from_secs(60));
    assert_eq!(cfg.alerts.obstacle_cooldown, Duration::from_secs(300));
    assert_eq!(cfg.runtime.streak_on_error, StreakOnError::Freeze);
    assert!(cfg.detection.class_map.contains_key("head"));

    clear_env();
}

#[test]
fn no_config_file_yields_a_single_stub_camera() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = Config::load().expect("load defaults");
    assert_eq!(cfg.cameras.len(), 1);
    assert!(cfg.cameras[0].url.starts_with("stub://"));
}

#[test]
fn rejects_cameraless_and_malformed_configs() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let empty = write_config(r#"{"cameras": []}"#);
    std::env::set_var("SITEWATCH_CONFIG", empty.path());
    assert!(Config::load().is_err(), "no cameras must be rejected");

    let dup = write_config(
        r#"{"cameras": [{"id": 0, "url": "stub://a"}, {"id": 0, "url": "stub://b"}]}"#,
    );
    std::env::set_var("SITEWATCH_CONFIG", dup.path());
    assert!(Config::load().is_err(), "duplicate ids must be rejected");

    let thin_zone = write_config(
        r#"{
            "cameras": [{
                "id": 0,
                "url": "stub://a",
                "zones": [{"role": "inclusion", "points": [{"x": 0, "y": 0}, {"x": 1, "y": 1}]}]
            }]
        }"#,
    );
    std::env::set_var("SITEWATCH_CONFIG", thin_zone.path());
    assert!(Config::load().is_err(), "2-point zones must be rejected");

    let bad_pattern = write_config(
        r#"{
            "cameras": [{"id": 0, "url": "stub://a"}],
            "detection": {"violation_pattern": "(unclosed"}
        }"#,
    );
    std::env::set_var("SITEWATCH_CONFIG", bad_pattern.path());
    assert!(Config::load().is_err(), "invalid regex must be rejected");

    clear_env();
}
