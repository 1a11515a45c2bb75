//! Pulse Visualizer - DAQ acquisition and spectrum core
//!
//! Repeated finite analog-input acquisitions, FFT magnitude spectra computed
//! on a worker pool, and an operator-facing session that ties them together.
//! Front ends (the egui binary, or Python through the `python` feature)
//! drive an [`AcquisitionSession`] and plot what it hands back.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![cfg_attr(feature = "python", allow(non_local_definitions))]

pub mod acquisition;
pub mod config;
pub mod daq;
pub mod pool;
pub mod session;
pub mod spectrum;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use acquisition::{Frame, FrameStats};
pub use config::{AppConfig, ConfigError};
pub use daq::{AnalogInputTask, Backend, DaqError};
pub use session::{AcquisitionSession, SessionError, SessionEvent, SessionState};
pub use spectrum::{MagnitudeScale, Spectrum, SpectrumAnalyzer, SpectrumConfig, WindowType};
