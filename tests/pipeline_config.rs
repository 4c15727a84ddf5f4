use std::sync::Mutex;

use tempfile::NamedTempFile;

use camtrap::config::PipelineConfig;
use camtrap::AnimalFlagPolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CAMTRAP_CONFIG",
        "CAMTRAP_MODEL",
        "CAMTRAP_BIND",
        "CAMTRAP_FORCE_CPU",
        "CAMTRAP_OUTPUT_THRESHOLD",
        "CAMTRAP_RENDER_THRESHOLD",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "model_path": "/models/md_v4.1.0.onnx",
        "bind_addr": "tcp://0.0.0.0:6000",
        "gate_animal_flag_by_threshold": true,
        "thresholds": { "output": 0.2, "render": 0.5 },
        "model_input": { "width": 1280, "height": 960 },
        "alert": { "frequency_hz": 3000, "duration_ms": 250 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("CAMTRAP_CONFIG", file.path());
    std::env::set_var("CAMTRAP_MODEL", "stub://override");
    std::env::set_var("CAMTRAP_FORCE_CPU", "1");
    std::env::set_var("CAMTRAP_RENDER_THRESHOLD", "0.9");

    let cfg = PipelineConfig::load().expect("load config");

    assert_eq!(cfg.model_path, "stub://override");
    assert_eq!(cfg.bind_addr, "tcp://0.0.0.0:6000");
    assert!(cfg.force_cpu);
    assert_eq!(cfg.thresholds.output, 0.2);
    assert_eq!(cfg.thresholds.render, 0.9);
    assert_eq!(cfg.model_input.width, 1280);
    assert_eq!(cfg.model_input.height, 960);
    assert_eq!(cfg.alert_tone.frequency_hz, 3000);
    assert_eq!(cfg.alert_tone.duration_ms, 250);
    assert_eq!(cfg.flag_policy, AnimalFlagPolicy::IncludedOnly);
    assert_eq!(cfg.detection_filter().output_threshold(), 0.2);

    clear_env();
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PipelineConfig::load().expect("load defaults");
    assert_eq!(cfg.model_path, "md_v4.1.0.onnx");
    assert_eq!(cfg.bind_addr, "tcp://0.0.0.0:5555");
    assert_eq!(cfg.thresholds.output, 0.1);
    assert_eq!(cfg.thresholds.render, 0.85);
    assert_eq!(cfg.flag_policy, AnimalFlagPolicy::AnyRawSlot);
    assert!(!cfg.force_cpu);
}

#[test]
fn rejects_invalid_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAMTRAP_FORCE_CPU", "maybe");
    assert!(PipelineConfig::load().is_err());
    clear_env();

    std::env::set_var("CAMTRAP_OUTPUT_THRESHOLD", "1.2");
    assert!(PipelineConfig::load().is_err());
    clear_env();

    std::env::set_var("CAMTRAP_BIND", "udp://0.0.0.0:5555");
    assert!(PipelineConfig::load().is_err());
    clear_env();
}

#[test]
fn command_line_overrides_are_validated_after_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CAMTRAP_OUTPUT_THRESHOLD", "1.5");
    let mut cfg = PipelineConfig::load_unvalidated().expect("unvalidated load");
    assert_eq!(cfg.thresholds.output, 1.5);
    assert!(cfg.validate().is_err());

    cfg.thresholds.output = 0.3;
    cfg.validate().expect("override fixes the threshold");
    assert_eq!(cfg.detection_filter().output_threshold(), 0.3);

    cfg.thresholds.render = -0.5;
    assert!(cfg.validate().is_err());

    clear_env();
}

#[test]
fn rejects_malformed_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, b"{ not json").expect("write config");

    let err = PipelineConfig::load_from(file.path()).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}
