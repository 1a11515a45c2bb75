//! Spectral analysis with FFT

pub mod analysis;
pub mod fft;
pub mod windowing;
pub mod windows;
pub mod worker;

use thiserror::Error;

pub use analysis::{MagnitudeScale, Spectrum, SpectrumAnalyzer, SpectrumConfig};
pub use fft::FftEngine;
pub use windows::{generate_window, WindowType};
pub use worker::FourierWorker;

#[derive(Error, Debug)]
pub enum SpectrumError {
    #[error("FFT needs at least 2 samples (got {0})")]
    InvalidSize(usize),

    #[error("Sample rate must be positive (got {0})")]
    InvalidSampleRate(f64),

    #[error("FFT processing failed: {0}")]
    Fft(String),

    #[error("Analysis panicked")]
    Panicked,
}
