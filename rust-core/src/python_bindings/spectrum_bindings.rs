//! Python bindings for spectrum analysis

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use numpy::{PyArray1, PyReadonlyArray1};
use crate::spectrum::{MagnitudeScale, SpectrumAnalyzer, SpectrumConfig, WindowType};

/// Window type enum exposed to Python
#[pyclass(name = "WindowType")]
#[derive(Clone, Copy)]
pub enum PyWindowType {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
}

impl From<PyWindowType> for WindowType {
    fn from(py_win: PyWindowType) -> Self {
        match py_win {
            PyWindowType::Rectangular => WindowType::Rectangular,
            PyWindowType::Hann => WindowType::Hann,
            PyWindowType::Hamming => WindowType::Hamming,
            PyWindowType::Blackman => WindowType::Blackman,
        }
    }
}

pub(crate) fn spectrum_config(window_type: PyWindowType, decibel: bool) -> SpectrumConfig {
    SpectrumConfig {
        window: window_type.into(),
        scale: if decibel {
            MagnitudeScale::Decibel
        } else {
            MagnitudeScale::Linear
        },
    }
}

/// Spectrum analyzer exposed to Python
#[pyclass(name = "SpectrumAnalyzer")]
pub struct PySpectrumAnalyzer {
    analyzer: SpectrumAnalyzer,
}

#[pymethods]
impl PySpectrumAnalyzer {
    /// Create a new spectrum analyzer
    ///
    /// Args:
    ///     window_type: Window applied before the FFT
    ///     decibel: Return magnitudes in dB instead of volts
    #[new]
    #[pyo3(signature = (window_type=PyWindowType::Rectangular, decibel=false))]
    fn new(window_type: PyWindowType, decibel: bool) -> Self {
        Self {
            analyzer: SpectrumAnalyzer::new(spectrum_config(window_type, decibel)),
        }
    }

    /// Magnitude spectrum of a frame
    ///
    /// Args:
    ///     signal: Voltage samples as numpy array
    ///     sample_rate: Sample rate in Hz
    ///
    /// Returns:
    ///     (frequencies, magnitudes) as numpy arrays
    fn analyze<'py>(
        &mut self,
        py: Python<'py>,
        signal: PyReadonlyArray1<f64>,
        sample_rate: f64,
    ) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<f64>)> {
        let samples = signal
            .as_slice()
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        let spectrum = self
            .analyzer
            .analyze(0, samples, sample_rate)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;

        Ok((
            PyArray1::from_vec(py, spectrum.frequencies),
            PyArray1::from_vec(py, spectrum.magnitudes),
        ))
    }

    /// Change window and scale
    #[pyo3(signature = (window_type=None, decibel=None))]
    fn update_config(&mut self, window_type: Option<PyWindowType>, decibel: Option<bool>) {
        let mut config = *self.analyzer.config();
        if let Some(win) = window_type {
            config.window = win.into();
        }
        if let Some(db) = decibel {
            config.scale = if db {
                MagnitudeScale::Decibel
            } else {
                MagnitudeScale::Linear
            };
        }
        self.analyzer.update_config(config);
    }

    /// Window name in use
    fn window_name(&self) -> &'static str {
        self.analyzer.config().window.name()
    }

    /// FFT size planned by the last call, if any
    fn planned_size(&self) -> Option<usize> {
        self.analyzer.planned_size()
    }
}
