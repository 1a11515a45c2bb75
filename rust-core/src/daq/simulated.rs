//! Simulated analog input
//!
//! Stands in for the DAQ board when no hardware is attached. The signal is
//! a sum of tones, an optional rectangular pulse train, a DC offset and
//! uniform noise, clipped to the channel's voltage range like an ADC would.
//! The sample clock keeps running across acquisitions so consecutive frames
//! are phase-continuous.

use super::{AnalogInputTask, Backend, DaqError, TaskInfo};
use crate::config::{AcquisitionConfig, ConfigError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::{Duration, Instant};

/// One sinusoidal component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    /// Frequency in Hz
    pub frequency: f64,
    /// Peak amplitude in volts
    pub amplitude: f64,
    /// Phase in radians
    #[serde(default)]
    pub phase: f64,
}

/// Rectangular pulse train from 0 V to `amplitude`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseTrain {
    /// Repetition rate in Hz
    pub frequency: f64,
    /// Fraction of each period spent high, in (0, 1)
    pub duty_cycle: f64,
    pub amplitude: f64,
}

/// Shape of the simulated input signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub tones: Vec<Tone>,
    pub pulse: Option<PulseTrain>,
    pub dc_offset: f64,
    /// Peak amplitude of uniform noise
    pub noise_amplitude: f64,
    pub seed: u64,
    /// Make `wait_until_done` take as long as the real acquisition would
    pub realtime: bool,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            tones: vec![Tone {
                frequency: 1_000.0,
                amplitude: 0.5,
                phase: 0.0,
            }],
            pulse: Some(PulseTrain {
                frequency: 50.0,
                duty_cycle: 0.2,
                amplitude: 1.0,
            }),
            dc_offset: 0.0,
            noise_amplitude: 0.05,
            seed: 0x5EED,
            realtime: true,
        }
    }
}

impl SignalConfig {
    /// A single noiseless tone, handy for tests
    pub fn pure_tone(frequency: f64, amplitude: f64) -> Self {
        Self {
            tones: vec![Tone {
                frequency,
                amplitude,
                phase: 0.0,
            }],
            pulse: None,
            dc_offset: 0.0,
            noise_amplitude: 0.0,
            seed: 0,
            realtime: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for tone in &self.tones {
            if !(tone.frequency.is_finite() && tone.frequency >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "tone frequency must be non-negative (got {})",
                    tone.frequency
                )));
            }
        }
        if let Some(pulse) = &self.pulse {
            if !(pulse.frequency.is_finite() && pulse.frequency > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "pulse frequency must be positive (got {})",
                    pulse.frequency
                )));
            }
            if !(pulse.duty_cycle > 0.0 && pulse.duty_cycle < 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "pulse duty_cycle must be in (0, 1) (got {})",
                    pulse.duty_cycle
                )));
            }
        }
        if !(self.noise_amplitude >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "noise_amplitude must be non-negative (got {})",
                self.noise_amplitude
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Idle,
    Running { started: Instant },
}

/// Analog input task backed by a signal generator
pub struct SimulatedTask {
    info: TaskInfo,
    signal: SignalConfig,
    min_voltage: f64,
    max_voltage: f64,
    rng: StdRng,
    state: TaskState,
    /// Samples generated for the current acquisition
    pending: Vec<f64>,
    /// Read cursor into `pending`
    cursor: usize,
    /// Absolute index of the next sample on the simulated clock
    clock: u64,
}

impl SimulatedTask {
    pub fn new(config: &AcquisitionConfig, signal: SignalConfig) -> Result<Self, DaqError> {
        config
            .validate()
            .map_err(|e| DaqError::InvalidParameter(e.to_string()))?;
        signal
            .validate()
            .map_err(|e| DaqError::InvalidParameter(e.to_string()))?;

        Ok(Self {
            info: TaskInfo::from_config(config, Backend::Simulated),
            rng: StdRng::seed_from_u64(signal.seed),
            signal,
            min_voltage: config.min_voltage,
            max_voltage: config.max_voltage,
            state: TaskState::Idle,
            pending: Vec::with_capacity(config.samples_per_channel),
            cursor: 0,
            clock: 0,
        })
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TaskState::Running { .. })
    }

    fn sample_at(&mut self, index: u64) -> f64 {
        let t = index as f64 / self.info.sample_rate;
        let mut value = self.signal.dc_offset;

        for tone in &self.signal.tones {
            value += tone.amplitude * (2.0 * PI * tone.frequency * t + tone.phase).sin();
        }

        if let Some(pulse) = &self.signal.pulse {
            let position = (index as f64 * pulse.frequency / self.info.sample_rate).fract();
            if position < pulse.duty_cycle {
                value += pulse.amplitude;
            }
        }

        if self.signal.noise_amplitude > 0.0 {
            let amp = self.signal.noise_amplitude;
            value += self.rng.random_range(-amp..=amp);
        }

        value.clamp(self.min_voltage, self.max_voltage)
    }

    fn generate(&mut self) {
        let n = self.info.samples_per_channel;
        let start = self.clock;
        self.pending.clear();
        for i in 0..n as u64 {
            let sample = self.sample_at(start + i);
            self.pending.push(sample);
        }
        self.clock += n as u64;
        self.cursor = 0;
    }
}

impl AnalogInputTask for SimulatedTask {
    fn start(&mut self) -> Result<(), DaqError> {
        if self.is_running() {
            return Err(DaqError::InvalidState("task is already running"));
        }
        self.generate();
        self.state = TaskState::Running {
            started: Instant::now(),
        };
        Ok(())
    }

    fn wait_until_done(&mut self, timeout: Duration) -> Result<(), DaqError> {
        let started = match self.state {
            TaskState::Running { started } => started,
            TaskState::Idle => return Err(DaqError::InvalidState("task is not running")),
        };

        if !self.signal.realtime {
            return Ok(());
        }

        let remaining = self
            .info
            .acquisition_time()
            .saturating_sub(started.elapsed());
        if remaining > timeout {
            std::thread::sleep(timeout);
            return Err(DaqError::Timeout);
        }
        std::thread::sleep(remaining);
        Ok(())
    }

    fn read(&mut self, buffer: &mut [f64], timeout: Duration) -> Result<usize, DaqError> {
        if !self.is_running() {
            return Err(DaqError::InvalidState("task is not running"));
        }
        self.wait_until_done(timeout)?;

        let available = &self.pending[self.cursor..];
        let n = buffer.len().min(available.len());
        buffer[..n].copy_from_slice(&available[..n]);
        self.cursor += n;
        Ok(n)
    }

    fn stop(&mut self) -> Result<(), DaqError> {
        self.state = TaskState::Idle;
        Ok(())
    }

    fn info(&self) -> &TaskInfo {
        &self.info
    }
}
