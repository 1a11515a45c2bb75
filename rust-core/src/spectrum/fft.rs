//! FFT engine using realfft for real-valued frames
//!
//! Frame lengths come straight from the acquisition settings, so sizes are
//! arbitrary (100 000 samples is typical) rather than powers of two.

use super::SpectrumError;
use num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// FFT engine for real-valued signals
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Reusable input buffer
    input_buffer: Vec<f64>,

    /// Reusable output buffer (complex spectrum)
    output_buffer: Vec<Complex<f64>>,

    /// Scratch space for the planner's algorithm
    scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples)
    pub fn new(fft_size: usize) -> Result<Self, SpectrumError> {
        if fft_size < 2 {
            return Err(SpectrumError::InvalidSize(fft_size));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        let input_buffer = r2c.make_input_vec();
        let output_buffer = r2c.make_output_vec();
        let scratch = r2c.make_scratch_vec();

        Ok(Self {
            fft_size,
            r2c,
            input_buffer,
            output_buffer,
            scratch,
        })
    }

    /// Run the forward transform and return the complex spectrum
    ///
    /// `signal` is zero-padded (or truncated) to `fft_size`.
    pub fn transform(&mut self, signal: &[f64]) -> Result<&[Complex<f64>], SpectrumError> {
        let copy_len = signal.len().min(self.fft_size);
        self.input_buffer[..copy_len].copy_from_slice(&signal[..copy_len]);
        if copy_len < self.fft_size {
            self.input_buffer[copy_len..].fill(0.0);
        }

        self.r2c
            .process_with_scratch(
                &mut self.input_buffer,
                &mut self.output_buffer,
                &mut self.scratch,
            )
            .map_err(|e| SpectrumError::Fft(e.to_string()))?;

        Ok(&self.output_buffer)
    }

    /// Compute the single-sided amplitude spectrum
    ///
    /// Every bin is scaled by 2/N, so a sine of amplitude A centred on a bin
    /// reads A. DC and Nyquist bins get the same factor.
    pub fn compute_amplitude(&mut self, signal: &[f64]) -> Result<Vec<f64>, SpectrumError> {
        let scale = 2.0 / self.fft_size as f64;
        Ok(self
            .transform(signal)?
            .iter()
            .map(|c| c.norm() * scale)
            .collect())
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Get number of frequency bins (fft_size/2 + 1 for real FFT)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// Frequency of `bin` in Hz
    pub fn bin_to_hz(&self, bin: usize, sample_rate: f64) -> f64 {
        bin as f64 * sample_rate / self.fft_size as f64
    }

    /// Frequency axis in Hz
    pub fn frequency_axis(&self, sample_rate: f64) -> Vec<f64> {
        (0..self.num_bins())
            .map(|bin| self.bin_to_hz(bin, sample_rate))
            .collect()
    }
}
