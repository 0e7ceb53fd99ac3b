use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::quality::Registry;
use crate::quality::labels::{LabelError, LabelMapping};
use crate::quality::snr::SnrConfig;

/// Sampling rate of the chest-strap recorder the study used.
pub const DEFAULT_SAMPLING_RATE: f64 = 130.0;
/// Sessions with fewer samples are skipped without a report.
pub const DEFAULT_MIN_SAMPLES: usize = 600;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("sampling rate must be a positive number of Hz, got {0}")]
    SamplingRate(f64),
    #[error("minimum sample count must be at least 1")]
    MinSamples,
    #[error("label mapping: {0}")]
    Labels(#[from] LabelError),
}

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the config file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Dataset root (used when `evaluate` has no `--input`).
    pub input_dir: Option<PathBuf>,
    /// Where reports are written. Defaults to the dataset root.
    pub output_dir: Option<PathBuf>,
    /// Samples per second, applied to every session.
    pub sampling_rate: f64,
    /// Number of parallel workers. 0 = auto-detect (all available cores).
    pub workers: usize,
    /// Minimum number of samples for a session to be scored.
    pub min_samples: usize,
    /// Extra or overriding label scores, each in [0, 1].
    pub labels: BTreeMap<String, f64>,
    /// Band used by the SNR estimate.
    pub snr: SnrConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            input_dir: None,
            output_dir: None,
            sampling_rate: DEFAULT_SAMPLING_RATE,
            workers: 0,
            min_samples: DEFAULT_MIN_SAMPLES,
            labels: BTreeMap::new(),
            snr: SnrConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load config from an explicit path, or `~/.config/ecg-quality/config.toml`.
    /// Returns default config if the file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load(explicit: Option<&Path>) -> Self {
        let config_path = explicit.map(Path::to_path_buf).or_else(Self::config_path);
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<AppConfig>(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Resolve worker count: 0 → all available cores (min 1).
    pub fn resolve_workers(&self) -> usize {
        resolve_workers(self.workers)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

pub fn resolve_workers(requested: usize) -> usize {
    if requested > 0 {
        requested
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Read-only settings shared by every evaluation task.
pub struct EvaluationSettings {
    pub sampling_rate: f64,
    pub min_samples: usize,
    pub workers: usize,
    pub registry: Registry,
    pub labels: LabelMapping,
}

impl EvaluationSettings {
    /// Validate the inputs and check the label mapping covers the registry.
    pub fn new(
        sampling_rate: f64,
        min_samples: usize,
        workers: usize,
        registry: Registry,
        labels: LabelMapping,
    ) -> Result<Self, ConfigError> {
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(ConfigError::SamplingRate(sampling_rate));
        }
        if min_samples == 0 {
            return Err(ConfigError::MinSamples);
        }
        labels.validate(&registry)?;
        Ok(Self {
            sampling_rate,
            min_samples,
            workers: resolve_workers(workers),
            registry,
            labels,
        })
    }

    /// Standard registry and label table from the application config.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.sampling_rate,
            config.min_samples,
            config.workers,
            Registry::standard(&config.snr),
            LabelMapping::with_overrides(&config.labels)?,
        )
    }
}
