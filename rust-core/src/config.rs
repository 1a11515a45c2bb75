//! Application configuration
//!
//! Everything is optional in the TOML file; missing keys fall back to the
//! bench setup the tool was written for (Dev1/ai1, differential, 100 kS/s,
//! one-second finite acquisitions).

use crate::daq::{Backend, SampleMode, SignalConfig, TerminalConfig};
use crate::spectrum::SpectrumConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Largest finite acquisition accepted, 16 Mi samples
pub const MAX_SAMPLES_PER_CHANNEL: usize = 1 << 24;

/// Upper bound on timeouts and on the length of one acquisition (one day)
pub const MAX_DURATION_SECS: f64 = 86_400.0;

/// Seconds to a `Duration`, clamped to `[0, MAX_DURATION_SECS]`; NaN maps to zero
pub(crate) fn bounded_duration(secs: f64) -> Duration {
    if secs.is_nan() {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_DURATION_SECS)).unwrap_or(Duration::ZERO)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Channel and sample clock settings handed to the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Driver-visible task name
    pub task_name: String,

    /// Physical channel, e.g. `Dev1/ai1`
    pub physical_channel: String,

    pub terminal: TerminalConfig,

    /// Expected input range in volts
    pub min_voltage: f64,
    pub max_voltage: f64,

    /// Sample clock rate in Hz
    pub sample_rate: f64,

    /// Samples acquired per finite acquisition
    pub samples_per_channel: usize,

    pub sample_mode: SampleMode,

    /// Timeout for waiting on and reading an acquisition
    pub timeout_secs: f64,

    /// Re-arm after each acquisition until stopped
    pub repeat: bool,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            task_name: "signal_task".to_string(),
            physical_channel: "Dev1/ai1".to_string(),
            terminal: TerminalConfig::Differential,
            min_voltage: -5.0,
            max_voltage: 5.0,
            sample_rate: 100_000.0,
            samples_per_channel: 100_000,
            sample_mode: SampleMode::Finite,
            timeout_secs: 10.0,
            repeat: true,
        }
    }
}

impl AcquisitionConfig {
    pub fn timeout(&self) -> Duration {
        bounded_duration(self.timeout_secs)
    }

    /// Duration of one acquisition in seconds
    pub fn acquisition_secs(&self) -> f64 {
        self.samples_per_channel as f64 / self.sample_rate
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.physical_channel.trim().is_empty() {
            return Err(ConfigError::Invalid("physical_channel is empty".into()));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sample_rate must be positive (got {})",
                self.sample_rate
            )));
        }
        if !(2..=MAX_SAMPLES_PER_CHANNEL).contains(&self.samples_per_channel) {
            return Err(ConfigError::Invalid(format!(
                "samples_per_channel must be between 2 and {} (got {})",
                MAX_SAMPLES_PER_CHANNEL, self.samples_per_channel
            )));
        }
        if self.acquisition_secs() > MAX_DURATION_SECS {
            return Err(ConfigError::Invalid(format!(
                "one acquisition would take {} s, longer than {} s",
                self.acquisition_secs(),
                MAX_DURATION_SECS
            )));
        }
        if !(self.min_voltage < self.max_voltage) {
            return Err(ConfigError::Invalid(format!(
                "voltage range [{}, {}] is empty",
                self.min_voltage, self.max_voltage
            )));
        }
        if !(self.timeout_secs > 0.0 && self.timeout_secs <= MAX_DURATION_SECS) {
            return Err(ConfigError::Invalid(format!(
                "timeout_secs must be in (0, {}] (got {})",
                MAX_DURATION_SECS, self.timeout_secs
            )));
        }
        if self.sample_mode != SampleMode::Finite {
            return Err(ConfigError::Invalid(
                "only finite acquisitions are supported".into(),
            ));
        }
        Ok(())
    }
}

/// Backend selection and backend specific settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: Backend,

    /// Input device name for the sound-card backend (default device if unset)
    pub input_device: Option<String>,

    /// Signal produced by the simulated backend
    pub simulated: SignalConfig,
}

/// Thread pool sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker threads; 0 picks the available parallelism
    pub threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { threads: 0 }
    }
}

impl WorkerConfig {
    /// Thread count to spawn, never below 2
    pub fn resolved_threads(&self) -> usize {
        let threads = if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2)
        } else {
            self.threads
        };
        threads.max(2)
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub acquisition: AcquisitionConfig,
    pub device: DeviceConfig,
    pub spectrum: SpectrumConfig,
    pub workers: WorkerConfig,
}

impl AppConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let text = self.to_toml_string()?;
        std::fs::write(path, text).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.acquisition.validate()?;
        self.device.simulated.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::{MagnitudeScale, WindowType};

    #[test]
    fn test_defaults_match_bench_setup() {
        let config = AppConfig::default();

        assert_eq!(config.acquisition.task_name, "signal_task");
        assert_eq!(config.acquisition.physical_channel, "Dev1/ai1");
        assert_eq!(config.acquisition.terminal, TerminalConfig::Differential);
        assert_eq!(config.acquisition.sample_rate, 100_000.0);
        assert_eq!(config.acquisition.samples_per_channel, 100_000);
        assert!((config.acquisition.acquisition_secs() - 1.0).abs() < 1e-12);
        assert!(config.acquisition.repeat);
        assert_eq!(config.device.backend, Backend::Simulated);
        assert_eq!(config.spectrum.window, WindowType::Rectangular);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [acquisition]
            physical_channel = "Dev2/ai0"
            sample_rate = 50000.0
            samples_per_channel = 25000

            [spectrum]
            window = "hann"
            scale = "decibel"
            "#,
        )
        .unwrap();

        assert_eq!(config.acquisition.physical_channel, "Dev2/ai0");
        assert_eq!(config.acquisition.task_name, "signal_task");
        assert_eq!(config.acquisition.samples_per_channel, 25_000);
        assert_eq!(config.spectrum.window, WindowType::Hann);
        assert_eq!(config.spectrum.scale, MagnitudeScale::Decibel);
        assert_eq!(config.workers, WorkerConfig::default());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            "[acquisition]\nsample_rate = 0.0",
            "[acquisition]\nsamples_per_channel = 1",
            "[acquisition]\nmin_voltage = 2.0\nmax_voltage = 2.0",
            "[acquisition]\ntimeout_secs = -1.0",
            "[acquisition]\nphysical_channel = \" \"",
            "[acquisition]\nsample_mode = \"continuous\"",
            "[acquisition]\ntimeout_secs = 1e20",
            "[acquisition]\ntimeout_secs = inf",
            "[acquisition]\nsamples_per_channel = 4611686018427387904",
            "[acquisition]\nsamples_per_channel = 16777217",
            "[acquisition]\nsample_rate = 1e-300",
        ];

        for text in bad {
            assert!(
                matches!(AppConfig::from_toml_str(text), Err(ConfigError::Invalid(_))),
                "accepted: {text}"
            );
        }
    }

    #[test]
    fn test_limits_are_accepted() {
        let mut config = AppConfig::default();
        config.acquisition.samples_per_channel = MAX_SAMPLES_PER_CHANNEL;
        config.acquisition.timeout_secs = MAX_DURATION_SECS;
        assert!(config.validate().is_ok());
        assert_eq!(
            config.acquisition.timeout(),
            Duration::from_secs(MAX_DURATION_SECS as u64)
        );
    }

    #[test]
    fn test_bounded_duration() {
        assert_eq!(bounded_duration(0.25), Duration::from_millis(250));
        assert_eq!(bounded_duration(1e20), Duration::from_secs(86_400));
        assert_eq!(bounded_duration(f64::INFINITY), Duration::from_secs(86_400));
        assert_eq!(bounded_duration(-3.0), Duration::ZERO);
        assert_eq!(bounded_duration(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            AppConfig::from_toml_str("[acquisition]\nsample_rate = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.toml");

        let mut config = AppConfig::default();
        config.acquisition.samples_per_channel = 2048;
        config.acquisition.repeat = false;
        config.device.simulated.noise_amplitude = 0.0;
        config.workers.threads = 3;

        config.save(&path).unwrap();
        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_worker_threads_floor() {
        assert_eq!(WorkerConfig { threads: 1 }.resolved_threads(), 2);
        assert_eq!(WorkerConfig { threads: 6 }.resolved_threads(), 6);
        assert!(WorkerConfig::default().resolved_threads() >= 2);
    }
}
