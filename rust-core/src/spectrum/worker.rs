//! Fourier worker: turns one frame into one spectrum on a pool thread

use super::{SpectrumAnalyzer, SpectrumError};
use crate::acquisition::{Frame, WorkerSignal};
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};

/// Answers for a frame whose analysis unwound before it could reply
struct UnwindReply<'a> {
    sequence: u64,
    signals: &'a Sender<WorkerSignal>,
    armed: bool,
}

impl<'a> UnwindReply<'a> {
    fn new(sequence: u64, signals: &'a Sender<WorkerSignal>) -> Self {
        Self {
            sequence,
            signals,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for UnwindReply<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::error!("Spectrum of frame {} panicked", self.sequence);
            let _ = self.signals.send(WorkerSignal::FourierFailed {
                sequence: self.sequence,
                error: SpectrumError::Panicked,
            });
        }
    }
}

pub struct FourierWorker {
    frame: Arc<Frame>,
    analyzer: Arc<Mutex<SpectrumAnalyzer>>,
    signals: Sender<WorkerSignal>,
}

impl FourierWorker {
    pub fn new(
        frame: Arc<Frame>,
        analyzer: Arc<Mutex<SpectrumAnalyzer>>,
        signals: Sender<WorkerSignal>,
    ) -> Self {
        Self {
            frame,
            analyzer,
            signals,
        }
    }

    /// Analyze the frame and send exactly one reply, even if analysis panics
    pub fn run(self) {
        let reply = UnwindReply::new(self.frame.sequence, &self.signals);
        let result = match self.analyzer.lock() {
            Ok(mut analyzer) => analyzer.analyze_frame(&self.frame),
            // A panic mid-analysis leaves only cached plans behind
            Err(poisoned) => poisoned.into_inner().analyze_frame(&self.frame),
        };

        let signal = match result {
            Ok(spectrum) => WorkerSignal::Fourier(spectrum),
            Err(error) => {
                log::warn!("Spectrum of frame {} failed: {}", self.frame.sequence, error);
                WorkerSignal::FourierFailed {
                    sequence: self.frame.sequence,
                    error,
                }
            }
        };
        reply.disarm();
        let _ = self.signals.send(signal);
    }
}
