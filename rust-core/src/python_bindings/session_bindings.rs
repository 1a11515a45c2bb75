//! Python bindings for the acquisition session

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;
use numpy::PyArray1;
use super::spectrum_bindings::{spectrum_config, PyWindowType};
use crate::config::{bounded_duration, AppConfig};
use crate::daq::Backend;
use crate::session::{AcquisitionSession, SessionError, SessionEvent};

fn session_error(e: SessionError) -> PyErr {
    match e {
        SessionError::Config(e) => PyValueError::new_err(e.to_string()),
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Acquisition session exposed to Python
///
/// Events come back from `poll` as dicts with a `kind` key:
/// `frame`, `spectrum`, `stopped` or `failed`.
#[pyclass(name = "AcquisitionSession", unsendable)]
pub struct PyAcquisitionSession {
    session: AcquisitionSession,
}

#[pymethods]
impl PyAcquisitionSession {
    /// Open a session
    ///
    /// Args:
    ///     config_path: TOML configuration file (defaults when omitted)
    ///     backend: "simulated", "nidaqmx" or "soundcard"
    ///     channel: Physical channel, e.g. "Dev1/ai1"
    ///     sample_rate: Sample clock rate in Hz
    ///     samples: Samples per acquisition
    ///     repeat: Re-arm after every acquisition until stopped
    #[new]
    #[pyo3(signature = (config_path=None, backend=None, channel=None, sample_rate=None, samples=None, repeat=None))]
    fn new(
        config_path: Option<&str>,
        backend: Option<&str>,
        channel: Option<String>,
        sample_rate: Option<f64>,
        samples: Option<usize>,
        repeat: Option<bool>,
    ) -> PyResult<Self> {
        let mut config = match config_path {
            Some(path) => AppConfig::load(path).map_err(|e| PyValueError::new_err(e.to_string()))?,
            None => AppConfig::default(),
        };

        if let Some(name) = backend {
            config.device.backend = name
                .parse::<Backend>()
                .map_err(|e| PyValueError::new_err(e.to_string()))?;
        }
        if let Some(channel) = channel {
            config.acquisition.physical_channel = channel;
        }
        if let Some(rate) = sample_rate {
            config.acquisition.sample_rate = rate;
        }
        if let Some(n) = samples {
            config.acquisition.samples_per_channel = n;
        }
        if let Some(repeat) = repeat {
            config.acquisition.repeat = repeat;
        }

        let session = AcquisitionSession::new(config).map_err(session_error)?;
        Ok(Self { session })
    }

    /// Launch the acquisition loop; False if one is already running
    fn start(&mut self) -> PyResult<bool> {
        self.session.start().map_err(session_error)
    }

    /// Stop after the frame in flight; False if nothing was running
    fn request_stop(&mut self) -> bool {
        self.session.request_stop()
    }

    /// Drain pending events, waiting up to `timeout` seconds for the first
    #[pyo3(signature = (timeout=0.0))]
    fn poll<'py>(&mut self, py: Python<'py>, timeout: f64) -> PyResult<Vec<&'py PyDict>> {
        let events = if timeout > 0.0 {
            self.session.poll_timeout(bounded_duration(timeout))
        } else {
            self.session.poll()
        };

        events.into_iter().map(|event| event_to_dict(py, event)).collect()
    }

    /// Change window and scale for spectra computed from now on
    #[pyo3(signature = (window_type=PyWindowType::Rectangular, decibel=false))]
    fn set_spectrum(&mut self, window_type: PyWindowType, decibel: bool) {
        self.session
            .set_spectrum_config(spectrum_config(window_type, decibel));
    }

    /// "Idle", "Running" or "Stopping"
    #[getter]
    fn state(&self) -> &'static str {
        self.session.state().label()
    }

    #[getter]
    fn frames_acquired(&self) -> u64 {
        self.session.frames_acquired()
    }

    #[getter]
    fn last_error(&self) -> Option<String> {
        self.session.last_error().map(str::to_owned)
    }

    #[getter]
    fn sample_rate(&self) -> f64 {
        self.session.task_info().sample_rate
    }

    /// Sample times of a full frame in seconds
    fn time_axis<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        PyArray1::from_slice(py, self.session.time_axis())
    }

    /// Bin frequencies of a full frame in Hz
    fn frequency_axis<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        PyArray1::from_slice(py, self.session.frequency_axis())
    }
}

fn event_to_dict(py: Python<'_>, event: SessionEvent) -> PyResult<&PyDict> {
    let dict = PyDict::new(py);
    match event {
        SessionEvent::FrameReady(frame) => {
            dict.set_item("kind", "frame")?;
            dict.set_item("sequence", frame.sequence)?;
            dict.set_item("sample_rate", frame.sample_rate)?;
            dict.set_item("acquired_at", frame.acquired_at.as_secs_f64())?;
            dict.set_item("time", PyArray1::from_vec(py, frame.time_axis()))?;
            dict.set_item("samples", PyArray1::from_slice(py, &frame.samples))?;
        }
        SessionEvent::SpectrumReady(spectrum) => {
            dict.set_item("kind", "spectrum")?;
            dict.set_item("sequence", spectrum.sequence)?;
            dict.set_item("frequencies", PyArray1::from_slice(py, &spectrum.frequencies))?;
            dict.set_item("magnitudes", PyArray1::from_slice(py, &spectrum.magnitudes))?;
        }
        SessionEvent::Stopped => {
            dict.set_item("kind", "stopped")?;
        }
        SessionEvent::Failed(message) => {
            dict.set_item("kind", "failed")?;
            dict.set_item("message", message)?;
        }
    }
    Ok(dict)
}
