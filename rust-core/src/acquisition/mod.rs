//! Finite acquisitions and the worker that repeats them

pub mod frame;
pub mod worker;

use crate::daq::DaqError;
use crate::spectrum::{Spectrum, SpectrumError};

pub use frame::{frequency_axis, time_axis, Frame, FrameStats};
pub use worker::{ReadDataWorker, SharedTask};

/// Messages sent from pool workers back to the session
#[derive(Debug)]
pub enum WorkerSignal {
    /// A frame was read from the task
    Measured(Frame),

    /// The Fourier worker finished a frame
    Fourier(Spectrum),

    /// The Fourier worker could not analyze frame `sequence`
    FourierFailed { sequence: u64, error: SpectrumError },

    /// The acquisition loop hit a driver error and stopped
    Failed(DaqError),

    /// The acquisition loop has exited
    Finished,
}
