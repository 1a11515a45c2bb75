//! High-level spectrum analyzer
//!
//! Combines the FFT engine with windowing and amplitude scaling. One call
//! turns an acquired frame into the magnitude spectrum shown in the
//! frequency panel.

use super::fft::FftEngine;
use super::windowing::{apply_coefficients_inplace, coefficients_correction_factor};
use super::windows::{generate_window, WindowType};
use super::SpectrumError;
use crate::acquisition::Frame;
use serde::{Deserialize, Serialize};

/// Lowest amplitude represented in dB output
const DB_FLOOR: f64 = 1e-10;

/// Units of the magnitude axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MagnitudeScale {
    /// Volts (single-sided amplitude)
    #[default]
    Linear,
    /// dB relative to 1 V
    Decibel,
}

/// Spectrum analyzer configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Window applied before the transform
    pub window: WindowType,

    /// Magnitude axis units
    pub scale: MagnitudeScale,
}

/// Magnitude spectrum of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    /// Sequence number of the source frame
    pub sequence: u64,

    /// Bin frequencies in Hz
    pub frequencies: Vec<f64>,

    /// Bin magnitudes in the units given by `scale`
    pub magnitudes: Vec<f64>,

    /// Units of `magnitudes`
    pub scale: MagnitudeScale,
}

impl Spectrum {
    /// Strongest bin above DC as (frequency Hz, magnitude)
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.magnitudes
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, &m)| (self.frequencies[i], m))
    }

    /// Frequency resolution (bin spacing) in Hz
    pub fn resolution(&self) -> f64 {
        match self.frequencies.get(1) {
            Some(f) => *f,
            None => 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }
}

/// Frame-to-spectrum analyzer
///
/// The FFT plan and window coefficients are cached for the last frame
/// length and rebuilt when the length changes.
pub struct SpectrumAnalyzer {
    config: SpectrumConfig,
    fft_engine: Option<FftEngine>,
    window: Vec<f64>,
    correction_factor: f64,
    scratch: Vec<f64>,
}

impl SpectrumAnalyzer {
    /// Create new spectrum analyzer
    pub fn new(config: SpectrumConfig) -> Self {
        Self {
            config,
            fft_engine: None,
            window: Vec::new(),
            correction_factor: 1.0,
            scratch: Vec::new(),
        }
    }

    /// Analyze an acquired frame
    pub fn analyze_frame(&mut self, frame: &Frame) -> Result<Spectrum, SpectrumError> {
        self.analyze(frame.sequence, &frame.samples, frame.sample_rate)
    }

    /// Analyze raw samples acquired at `sample_rate`
    ///
    /// Magnitudes are |rfft(x)| · 2/N, corrected for the window's coherent
    /// gain and optionally converted to dB.
    pub fn analyze(
        &mut self,
        sequence: u64,
        samples: &[f64],
        sample_rate: f64,
    ) -> Result<Spectrum, SpectrumError> {
        if !(sample_rate > 0.0) {
            return Err(SpectrumError::InvalidSampleRate(sample_rate));
        }
        self.prepare(samples.len())?;

        self.scratch.clear();
        self.scratch.extend_from_slice(samples);
        if self.config.window != WindowType::Rectangular {
            apply_coefficients_inplace(&mut self.scratch, &self.window);
        }

        let engine = match self.fft_engine.as_mut() {
            Some(engine) => engine,
            None => return Err(SpectrumError::InvalidSize(samples.len())),
        };

        let mut magnitudes = engine.compute_amplitude(&self.scratch)?;
        if self.correction_factor != 1.0 {
            for m in magnitudes.iter_mut() {
                *m *= self.correction_factor;
            }
        }
        if self.config.scale == MagnitudeScale::Decibel {
            for m in magnitudes.iter_mut() {
                *m = amplitude_to_db(*m);
            }
        }

        Ok(Spectrum {
            sequence,
            frequencies: engine.frequency_axis(sample_rate),
            magnitudes,
            scale: self.config.scale,
        })
    }

    /// Replan for `len` samples if the cached plan does not match
    fn prepare(&mut self, len: usize) -> Result<(), SpectrumError> {
        let needs_new_fft = self
            .fft_engine
            .as_ref()
            .map_or(true, |engine| engine.fft_size() != len);

        if needs_new_fft {
            self.fft_engine = Some(FftEngine::new(len)?);
            self.rebuild_window(len);
        }
        Ok(())
    }

    fn rebuild_window(&mut self, len: usize) {
        self.window = generate_window(self.config.window, len);
        self.correction_factor = coefficients_correction_factor(&self.window);
    }

    /// Update configuration
    pub fn update_config(&mut self, config: SpectrumConfig) {
        let window_changed = config.window != self.config.window;
        self.config = config;

        if window_changed {
            if let Some(len) = self.fft_engine.as_ref().map(FftEngine::fft_size) {
                self.rebuild_window(len);
            }
        }
    }

    /// Get current configuration
    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    /// Frame length the analyzer is currently planned for
    pub fn planned_size(&self) -> Option<usize> {
        self.fft_engine.as_ref().map(FftEngine::fft_size)
    }
}

/// Convert an amplitude to dB re 1 V
pub fn amplitude_to_db(amplitude: f64) -> f64 {
    20.0 * amplitude.max(DB_FLOOR).log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(n: usize, rate: f64, freq: f64, amplitude: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / rate).sin())
            .collect()
    }

    #[test]
    fn test_analyzer_finds_tone() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default());

        // 1 s at 10 kHz, 1 kHz tone of 0.5 V
        let signal = tone(10_000, 10_000.0, 1000.0, 0.5);
        let spectrum = analyzer.analyze(3, &signal, 10_000.0).unwrap();

        assert_eq!(spectrum.sequence, 3);
        assert_eq!(spectrum.len(), 5001);
        assert!((spectrum.resolution() - 1.0).abs() < 1e-12);

        let (freq, magnitude) = spectrum.peak().unwrap();
        assert!((freq - 1000.0).abs() < 1e-9);
        assert!((magnitude - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_window_correction_preserves_tone_amplitude() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig {
            window: WindowType::Hann,
            scale: MagnitudeScale::Linear,
        });

        let signal = tone(4096, 4096.0, 256.0, 1.0);
        let spectrum = analyzer.analyze(0, &signal, 4096.0).unwrap();
        let (freq, magnitude) = spectrum.peak().unwrap();

        assert!((freq - 256.0).abs() < 1e-9);
        assert!((magnitude - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_analyzer_db() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig {
            window: WindowType::Rectangular,
            scale: MagnitudeScale::Decibel,
        });

        let signal = tone(1000, 1000.0, 100.0, 1.0);
        let spectrum = analyzer.analyze(0, &signal, 1000.0).unwrap();

        // 1 V tone reads 0 dB, silent bins are clamped at the floor
        assert!(spectrum.magnitudes[100].abs() < 1e-6);
        assert!(spectrum.magnitudes[300] >= -200.0 - 1e-9);
        assert_eq!(spectrum.scale, MagnitudeScale::Decibel);
    }

    #[test]
    fn test_replans_on_length_change() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default());

        analyzer.analyze(0, &vec![0.0; 256], 256.0).unwrap();
        assert_eq!(analyzer.planned_size(), Some(256));

        let spectrum = analyzer.analyze(1, &vec![0.0; 1000], 1000.0).unwrap();
        assert_eq!(analyzer.planned_size(), Some(1000));
        assert_eq!(spectrum.len(), 501);
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default());

        assert!(matches!(
            analyzer.analyze(0, &[1.0], 100.0),
            Err(SpectrumError::InvalidSize(1))
        ));
        assert!(matches!(
            analyzer.analyze(0, &[1.0, 2.0], 0.0),
            Err(SpectrumError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn test_peak_ignores_dc() {
        let spectrum = Spectrum {
            sequence: 0,
            frequencies: vec![0.0, 1.0, 2.0],
            magnitudes: vec![10.0, 0.2, 0.7],
            scale: MagnitudeScale::Linear,
        };
        assert_eq!(spectrum.peak(), Some((2.0, 0.7)));
    }
}
