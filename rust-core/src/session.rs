//! Acquisition session
//!
//! Owns the task, the worker pool and the spectrum analyzer, and turns
//! worker signals into events for the front end. The front end calls
//! [`AcquisitionSession::poll`] from its own thread (the GUI loop), which is
//! also where Fourier jobs get dispatched: every measured frame is handed
//! to the pool as soon as it is seen.

use crate::acquisition::{
    frequency_axis, time_axis, Frame, ReadDataWorker, SharedTask, WorkerSignal,
};
use crate::config::{AppConfig, ConfigError, MAX_SAMPLES_PER_CHANNEL};
use crate::daq::{self, AnalogInputTask, DaqError, TaskInfo};
use crate::pool::{PoolError, WorkerPool};
use crate::spectrum::{FourierWorker, Spectrum, SpectrumAnalyzer, SpectrumConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Worker signals held for the front end before workers block on send
///
/// A front end that polls slowly paces the acquisition loop instead of
/// piling up frames.
pub const SIGNAL_QUEUE: usize = 16;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Daq(#[from] DaqError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Acquisition state as seen by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for START
    Idle,
    /// Acquisition loop is running
    Running,
    /// STOP pressed, waiting for the frame in flight
    Stopping,
}

impl SessionState {
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Running => "Running",
            SessionState::Stopping => "Stopping",
        }
    }
}

/// Something the front end should react to
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// New time-domain data
    FrameReady(Arc<Frame>),
    /// New frequency-domain data
    SpectrumReady(Arc<Spectrum>),
    /// The acquisition loop exited; START is available again
    Stopped,
    /// A driver or analysis error, already logged
    Failed(String),
}

pub struct AcquisitionSession {
    config: AppConfig,
    task: SharedTask,
    task_info: TaskInfo,
    pool: WorkerPool,
    analyzer: Arc<Mutex<SpectrumAnalyzer>>,
    signals_tx: Sender<WorkerSignal>,
    signals_rx: Receiver<WorkerSignal>,
    stop_requested: Arc<AtomicBool>,
    sequence: Arc<AtomicU64>,
    epoch: Instant,
    state: SessionState,
    pending_fourier: usize,
    frames_acquired: u64,
    latest_frame: Option<Arc<Frame>>,
    latest_spectrum: Option<Arc<Spectrum>>,
    last_error: Option<String>,
    time_axis: Vec<f64>,
    frequency_axis: Vec<f64>,
}

impl AcquisitionSession {
    /// Validate `config` and open the configured task
    pub fn new(config: AppConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let task = daq::open_task(&config.acquisition, &config.device)?;
        Self::with_task(config, task)
    }

    /// Build a session around an already opened task
    pub fn with_task(
        config: AppConfig,
        task: Box<dyn AnalogInputTask>,
    ) -> Result<Self, SessionError> {
        let task_info = task.info().clone();
        if !(2..=MAX_SAMPLES_PER_CHANNEL).contains(&task_info.samples_per_channel) {
            return Err(ConfigError::Invalid(format!(
                "task '{}' reads {} samples per frame, expected 2 to {}",
                task_info.name, task_info.samples_per_channel, MAX_SAMPLES_PER_CHANNEL
            ))
            .into());
        }
        let pool = WorkerPool::new("pulse-worker", config.workers.resolved_threads())?;
        let (signals_tx, signals_rx) = bounded(SIGNAL_QUEUE);

        let n = task_info.samples_per_channel;
        let rate = task_info.sample_rate;

        Ok(Self {
            analyzer: Arc::new(Mutex::new(SpectrumAnalyzer::new(config.spectrum))),
            config,
            task: Arc::new(Mutex::new(task)),
            task_info,
            pool,
            signals_tx,
            signals_rx,
            stop_requested: Arc::new(AtomicBool::new(false)),
            sequence: Arc::new(AtomicU64::new(0)),
            epoch: Instant::now(),
            state: SessionState::Idle,
            pending_fourier: 0,
            frames_acquired: 0,
            latest_frame: None,
            latest_spectrum: None,
            last_error: None,
            time_axis: time_axis(n, rate),
            frequency_axis: frequency_axis(n, rate),
        })
    }

    /// Launch the acquisition loop
    ///
    /// # Returns
    /// `false` if an acquisition is already running (the request is ignored)
    pub fn start(&mut self) -> Result<bool, SessionError> {
        if self.state != SessionState::Idle {
            return Ok(false);
        }

        self.stop_requested.store(false, Ordering::SeqCst);
        let worker = ReadDataWorker::new(
            Arc::clone(&self.task),
            Arc::clone(&self.stop_requested),
            Arc::clone(&self.sequence),
            self.signals_tx.clone(),
            self.config.acquisition.repeat,
            self.config.acquisition.timeout(),
            self.epoch,
        );
        self.pool.submit(move || worker.run())?;

        self.state = SessionState::Running;
        self.last_error = None;
        log::info!(
            "Acquisition started on {} ({})",
            self.task_info.physical_channel,
            self.task_info.backend.name()
        );
        Ok(true)
    }

    /// Ask the loop to stop after the frame in flight
    ///
    /// # Returns
    /// `false` if nothing was running
    pub fn request_stop(&mut self) -> bool {
        if self.state != SessionState::Running {
            return false;
        }
        self.stop_requested.store(true, Ordering::SeqCst);
        self.state = SessionState::Stopping;
        log::info!("Stop requested");
        true
    }

    /// Process every pending worker signal without blocking
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(signal) = self.signals_rx.try_recv() {
            self.handle(signal, &mut events);
        }
        events
    }

    /// Wait up to `timeout` for at least one signal, then drain the rest
    pub fn poll_timeout(&mut self, timeout: Duration) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match self.signals_rx.recv_timeout(timeout) {
            Ok(signal) => self.handle(signal, &mut events),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                return events
            }
        }
        events.extend(self.poll());
        events
    }

    fn handle(&mut self, signal: WorkerSignal, events: &mut Vec<SessionEvent>) {
        match signal {
            WorkerSignal::Measured(frame) => {
                self.frames_acquired += 1;
                let frame = Arc::new(frame);
                self.dispatch_fourier(&frame);
                self.latest_frame = Some(Arc::clone(&frame));
                events.push(SessionEvent::FrameReady(frame));
            }

            WorkerSignal::Fourier(spectrum) => {
                self.pending_fourier = self.pending_fourier.saturating_sub(1);
                let is_newer = self
                    .latest_spectrum
                    .as_ref()
                    .map_or(true, |latest| spectrum.sequence > latest.sequence);
                if is_newer {
                    let spectrum = Arc::new(spectrum);
                    self.latest_spectrum = Some(Arc::clone(&spectrum));
                    events.push(SessionEvent::SpectrumReady(spectrum));
                } else {
                    log::debug!("Discarding stale spectrum of frame {}", spectrum.sequence);
                }
            }

            WorkerSignal::FourierFailed { sequence, error } => {
                self.pending_fourier = self.pending_fourier.saturating_sub(1);
                let message = format!("Spectrum of frame {} failed: {}", sequence, error);
                self.last_error = Some(message.clone());
                events.push(SessionEvent::Failed(message));
            }

            WorkerSignal::Failed(error) => {
                let message = error.to_string();
                self.last_error = Some(message.clone());
                events.push(SessionEvent::Failed(message));
            }

            WorkerSignal::Finished => {
                self.state = SessionState::Idle;
                self.stop_requested.store(false, Ordering::SeqCst);
                events.push(SessionEvent::Stopped);
            }
        }
    }

    fn dispatch_fourier(&mut self, frame: &Arc<Frame>) {
        // One thread always belongs to the acquisition loop
        let max_pending = self.pool.thread_count().saturating_sub(1).max(1);
        if self.pending_fourier >= max_pending {
            log::warn!(
                "Fourier workers busy ({} running, {} queued), frame {} shown without a spectrum",
                self.pool.active_jobs(),
                self.pool.queued_jobs(),
                frame.sequence
            );
            return;
        }

        let worker = FourierWorker::new(
            Arc::clone(frame),
            Arc::clone(&self.analyzer),
            self.signals_tx.clone(),
        );
        match self.pool.submit(move || worker.run()) {
            Ok(()) => self.pending_fourier += 1,
            Err(e) => log::error!("Failed to queue Fourier worker: {}", e),
        }
    }

    /// Change window and scale for spectra computed from now on
    pub fn set_spectrum_config(&mut self, spectrum: SpectrumConfig) {
        match self.analyzer.lock() {
            Ok(mut analyzer) => analyzer.update_config(spectrum),
            Err(poisoned) => poisoned.into_inner().update_config(spectrum),
        }
        self.config.spectrum = spectrum;
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != SessionState::Idle
    }

    pub fn latest_frame(&self) -> Option<&Arc<Frame>> {
        self.latest_frame.as_ref()
    }

    pub fn latest_spectrum(&self) -> Option<&Arc<Spectrum>> {
        self.latest_spectrum.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn frames_acquired(&self) -> u64 {
        self.frames_acquired
    }

    /// Sample times of a full frame, in seconds
    pub fn time_axis(&self) -> &[f64] {
        &self.time_axis
    }

    /// Bin frequencies of a full frame's spectrum, in Hz
    pub fn frequency_axis(&self) -> &[f64] {
        &self.frequency_axis
    }

    pub fn task_info(&self) -> &TaskInfo {
        &self.task_info
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl Drop for AcquisitionSession {
    fn drop(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        // Disconnect the queue so workers blocked on a full one return
        let (_, detached) = bounded(0);
        drop(std::mem::replace(&mut self.signals_rx, detached));
        self.pool.shutdown();
    }
}
