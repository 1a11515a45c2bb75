//! PyO3 bindings for Python integration

use pyo3::prelude::*;

mod session_bindings;
mod spectrum_bindings;

/// Python module definition
#[pymodule]
fn pulse_visualizer(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<session_bindings::PyAcquisitionSession>()?;
    m.add_class::<spectrum_bindings::PySpectrumAnalyzer>()?;
    m.add_class::<spectrum_bindings::PyWindowType>()?;

    Ok(())
}
