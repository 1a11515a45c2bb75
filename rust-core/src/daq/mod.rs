//! Analog input tasks
//!
//! A task owns one voltage channel configured for finite, sample-clocked
//! acquisition. The hardware driver, the simulator and the sound-card
//! backend all sit behind [`AnalogInputTask`].

pub mod simulated;

#[cfg(feature = "nidaqmx")]
pub mod nidaqmx;

#[cfg(feature = "soundcard")]
pub mod buffer;
#[cfg(feature = "soundcard")]
pub mod soundcard;

use crate::config::{bounded_duration, AcquisitionConfig, DeviceConfig};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub use simulated::{SignalConfig, SimulatedTask};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DaqError {
    #[error("DAQ driver error {code}: {message}")]
    Driver { code: i32, message: String },

    #[error("Timed out waiting for the acquisition to finish")]
    Timeout,

    #[error("Task is in the wrong state: {0}")]
    InvalidState(&'static str),

    #[error("Device runs at {actual} Hz but {requested} Hz was requested")]
    UnsupportedSampleRate { requested: f64, actual: f64 },

    #[error("No input device found")]
    NoDevice,

    #[error("Input stream error: {0}")]
    Stream(String),

    #[error("The {0} backend is not compiled into this build")]
    BackendUnavailable(&'static str),

    #[error("Invalid task parameter: {0}")]
    InvalidParameter(String),
}

/// Input terminal configuration of the voltage channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalConfig {
    /// Let the driver pick
    Default,
    /// Referenced single-ended
    Rse,
    /// Non-referenced single-ended
    Nrse,
    #[default]
    Differential,
    PseudoDifferential,
}

/// Sample clock mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleMode {
    /// Acquire `samples_per_channel` samples and stop
    #[default]
    Finite,
    /// Acquire until stopped
    Continuous,
}

/// Which driver backs a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Simulated,
    NiDaqmx,
    SoundCard,
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Simulated => "simulated",
            Backend::NiDaqmx => "nidaqmx",
            Backend::SoundCard => "soundcard",
        }
    }
}

impl FromStr for Backend {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulated" | "sim" => Ok(Backend::Simulated),
            "nidaqmx" | "daqmx" | "ni" => Ok(Backend::NiDaqmx),
            "soundcard" | "audio" => Ok(Backend::SoundCard),
            other => Err(DaqError::InvalidParameter(format!(
                "unknown backend '{}' (expected simulated, nidaqmx or soundcard)",
                other
            ))),
        }
    }
}

/// Static description of a configured task
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    pub name: String,
    pub physical_channel: String,
    pub sample_rate: f64,
    pub samples_per_channel: usize,
    pub backend: Backend,
}

impl TaskInfo {
    pub fn from_config(config: &AcquisitionConfig, backend: Backend) -> Self {
        Self {
            name: config.task_name.clone(),
            physical_channel: config.physical_channel.clone(),
            sample_rate: config.sample_rate,
            samples_per_channel: config.samples_per_channel,
            backend,
        }
    }

    /// Length of one finite acquisition, saturating at one day
    pub fn acquisition_time(&self) -> Duration {
        bounded_duration(self.samples_per_channel as f64 / self.sample_rate)
    }
}

/// A single-channel analog input task
pub trait AnalogInputTask: Send {
    /// Arm the task and begin sampling
    fn start(&mut self) -> Result<(), DaqError>;

    /// Block until the finite acquisition has completed
    fn wait_until_done(&mut self, timeout: Duration) -> Result<(), DaqError>;

    /// Read up to `buffer.len()` samples, returning the count read
    fn read(&mut self, buffer: &mut [f64], timeout: Duration) -> Result<usize, DaqError>;

    /// Disarm the task; a no-op when already stopped
    fn stop(&mut self) -> Result<(), DaqError>;

    /// Task description
    fn info(&self) -> &TaskInfo;
}

/// Create and configure a task for the selected backend
pub fn open_task(
    acquisition: &AcquisitionConfig,
    device: &DeviceConfig,
) -> Result<Box<dyn AnalogInputTask>, DaqError> {
    log::info!(
        "Opening {} task '{}' on {} ({} samples @ {} Hz)",
        device.backend.name(),
        acquisition.task_name,
        acquisition.physical_channel,
        acquisition.samples_per_channel,
        acquisition.sample_rate
    );

    match device.backend {
        Backend::Simulated => Ok(Box::new(SimulatedTask::new(
            acquisition,
            device.simulated.clone(),
        )?)),

        #[cfg(feature = "nidaqmx")]
        Backend::NiDaqmx => Ok(Box::new(nidaqmx::NiTask::new(acquisition)?)),
        #[cfg(not(feature = "nidaqmx"))]
        Backend::NiDaqmx => Err(DaqError::BackendUnavailable("nidaqmx")),

        #[cfg(feature = "soundcard")]
        Backend::SoundCard => Ok(Box::new(soundcard::SoundCardTask::new(
            acquisition,
            device.input_device.as_deref(),
        )?)),
        #[cfg(not(feature = "soundcard"))]
        Backend::SoundCard => Err(DaqError::BackendUnavailable("soundcard")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_simulated_task() {
        let acquisition = AcquisitionConfig::default();
        let device = DeviceConfig::default();

        let task = open_task(&acquisition, &device).unwrap();
        assert_eq!(task.info().name, "signal_task");
        assert_eq!(task.info().physical_channel, "Dev1/ai1");
        assert_eq!(task.info().backend, Backend::Simulated);
        assert_eq!(task.info().acquisition_time(), Duration::from_secs(1));
    }

    #[test]
    fn test_acquisition_time_saturates() {
        let mut info = TaskInfo::from_config(&AcquisitionConfig::default(), Backend::Simulated);
        info.sample_rate = 1e-300;
        assert_eq!(info.acquisition_time(), Duration::from_secs(86_400));

        info.sample_rate = 0.0;
        assert_eq!(info.acquisition_time(), Duration::from_secs(86_400));
    }

    #[cfg(not(feature = "nidaqmx"))]
    #[test]
    fn test_missing_backend_is_reported() {
        let device = DeviceConfig {
            backend: Backend::NiDaqmx,
            ..DeviceConfig::default()
        };

        let err = open_task(&AcquisitionConfig::default(), &device)
            .err()
            .unwrap();
        assert_eq!(err, DaqError::BackendUnavailable("nidaqmx"));
    }

    #[test]
    fn test_terminal_config_names() {
        #[derive(Deserialize)]
        struct Holder {
            terminal: TerminalConfig,
            backend: Backend,
        }

        let parsed: Holder =
            toml::from_str("terminal = \"pseudo_differential\"\nbackend = \"nidaqmx\"").unwrap();
        assert_eq!(parsed.terminal, TerminalConfig::PseudoDifferential);
        assert_eq!(parsed.backend, Backend::NiDaqmx);
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Simulated".parse::<Backend>().unwrap(), Backend::Simulated);
        assert_eq!("nidaqmx".parse::<Backend>().unwrap(), Backend::NiDaqmx);
        assert_eq!(" audio ".parse::<Backend>().unwrap(), Backend::SoundCard);
        assert!(matches!(
            "scope".parse::<Backend>(),
            Err(DaqError::InvalidParameter(_))
        ));
    }
}
