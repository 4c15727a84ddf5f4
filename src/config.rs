use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::alert::AlertTone;
use crate::detect::{AnimalFlagPolicy, DetectionFilter, DEFAULT_OUTPUT_CONFIDENCE_THRESHOLD};
use crate::transport::{parse_endpoint, DEFAULT_PORT};

const DEFAULT_MODEL_PATH: &str = "md_v4.1.0.onnx";
const DEFAULT_BIND_ADDR: &str = "tcp://0.0.0.0:5555";
const DEFAULT_RENDER_THRESHOLD: f64 = 0.85;
const DEFAULT_MODEL_WIDTH: u32 = 640;
const DEFAULT_MODEL_HEIGHT: u32 = 480;
const DEFAULT_ALERT_FREQUENCY_HZ: u32 = 2500;
const DEFAULT_ALERT_DURATION_MS: u64 = 500;

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    model_path: Option<String>,
    bind_addr: Option<String>,
    force_cpu: Option<bool>,
    gate_animal_flag_by_threshold: Option<bool>,
    thresholds: Option<ThresholdConfigFile>,
    model_input: Option<ModelInputConfigFile>,
    alert: Option<AlertConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdConfigFile {
    output: Option<f64>,
    render: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelInputConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    frequency_hz: Option<u32>,
    duration_ms: Option<u64>,
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model file, or `stub://...` for the stub backend.
    pub model_path: String,
    /// Frame transport listen endpoint (`tcp://host:port`).
    pub bind_addr: String,
    /// Force CPU execution of the detection backend.
    pub force_cpu: bool,
    pub thresholds: ThresholdSettings,
    pub model_input: ModelInputSettings,
    pub flag_policy: AnimalFlagPolicy,
    pub alert_tone: AlertTone,
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdSettings {
    /// Exclusive minimum confidence for a detection to be reported.
    pub output: f64,
    /// Minimum confidence for a detection to be drawn.
    pub render: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct ModelInputSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        // Defaults cannot fail validation.
        Self::from_file(PipelineConfigFile::default())
    }
}

impl PipelineConfig {
    /// Load from `CAMTRAP_CONFIG` (if set), apply `CAMTRAP_*` overrides, validate.
    pub fn load() -> Result<Self> {
        let cfg = Self::load_unvalidated()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Same as [`PipelineConfig::load`] without the final range checks.
    ///
    /// Callers that layer further overrides on top (command-line flags) must
    /// call [`PipelineConfig::validate`] once they are applied.
    pub fn load_unvalidated() -> Result<Self> {
        let config_path = std::env::var("CAMTRAP_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        Ok(cfg)
    }

    /// Load from an explicit file, then apply environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut cfg = Self::from_file(read_config_file(path)?);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Self {
        let thresholds = ThresholdSettings {
            output: file
                .thresholds
                .as_ref()
                .and_then(|t| t.output)
                .unwrap_or(DEFAULT_OUTPUT_CONFIDENCE_THRESHOLD),
            render: file
                .thresholds
                .as_ref()
                .and_then(|t| t.render)
                .unwrap_or(DEFAULT_RENDER_THRESHOLD),
        };
        let model_input = ModelInputSettings {
            width: file
                .model_input
                .as_ref()
                .and_then(|m| m.width)
                .unwrap_or(DEFAULT_MODEL_WIDTH),
            height: file
                .model_input
                .as_ref()
                .and_then(|m| m.height)
                .unwrap_or(DEFAULT_MODEL_HEIGHT),
        };
        let alert_tone = AlertTone {
            frequency_hz: file
                .alert
                .as_ref()
                .and_then(|a| a.frequency_hz)
                .unwrap_or(DEFAULT_ALERT_FREQUENCY_HZ),
            duration_ms: file
                .alert
                .as_ref()
                .and_then(|a| a.duration_ms)
                .unwrap_or(DEFAULT_ALERT_DURATION_MS),
        };
        let flag_policy = if file.gate_animal_flag_by_threshold.unwrap_or(false) {
            AnimalFlagPolicy::IncludedOnly
        } else {
            AnimalFlagPolicy::AnyRawSlot
        };
        Self {
            model_path: file
                .model_path
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
            bind_addr: file
                .bind_addr
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            force_cpu: file.force_cpu.unwrap_or(false),
            thresholds,
            model_input,
            flag_policy,
            alert_tone,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("CAMTRAP_MODEL") {
            if !path.trim().is_empty() {
                self.model_path = path;
            }
        }
        if let Ok(addr) = std::env::var("CAMTRAP_BIND") {
            if !addr.trim().is_empty() {
                self.bind_addr = addr;
            }
        }
        if let Ok(value) = std::env::var("CAMTRAP_FORCE_CPU") {
            self.force_cpu = parse_flag(&value)
                .ok_or_else(|| anyhow!("CAMTRAP_FORCE_CPU must be 0/1/true/false"))?;
        }
        if let Ok(value) = std::env::var("CAMTRAP_OUTPUT_THRESHOLD") {
            self.thresholds.output = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAMTRAP_OUTPUT_THRESHOLD must be a number"))?;
        }
        if let Ok(value) = std::env::var("CAMTRAP_RENDER_THRESHOLD") {
            self.thresholds.render = value
                .trim()
                .parse()
                .map_err(|_| anyhow!("CAMTRAP_RENDER_THRESHOLD must be a number"))?;
        }
        Ok(())
    }

    /// Check ranges and the bind address. Called by the loaders; binaries
    /// that override fields from the command line call it again.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("output threshold", self.thresholds.output),
            ("render threshold", self.thresholds.render),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.model_input.width == 0 || self.model_input.height == 0 {
            return Err(anyhow!("model input dimensions must be non-zero"));
        }
        if self.alert_tone.duration_ms == 0 {
            return Err(anyhow!("alert duration must be greater than zero"));
        }
        if self.model_path.trim().is_empty() {
            return Err(anyhow!("model path must not be empty"));
        }
        parse_endpoint(&self.bind_addr, DEFAULT_PORT)?;
        Ok(())
    }

    /// Filter configured with the output threshold and flag policy.
    pub fn detection_filter(&self) -> DetectionFilter {
        DetectionFilter::new(self.thresholds.output).with_flag_policy(self.flag_policy)
    }
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_detector_constants() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.thresholds.output, 0.1);
        assert_eq!(cfg.thresholds.render, 0.85);
        assert_eq!(cfg.flag_policy, AnimalFlagPolicy::AnyRawSlot);
        assert_eq!(cfg.alert_tone.frequency_hz, 2500);
        assert!(!cfg.force_cpu);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_flag_accepts_common_spellings() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("-1"), None);
    }

    #[test]
    fn validate_rejects_out_of_range_threshold() {
        let mut cfg = PipelineConfig::default();
        cfg.thresholds.output = 1.5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_bind_addr() {
        let cfg = PipelineConfig {
            bind_addr: "udp://0.0.0.0:5555".to_string(),
            ..PipelineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
