//! Blocking acquisition loop
//!
//! Runs on a pool thread. Each pass arms the task, waits for the finite
//! acquisition to complete, reads the samples and publishes them as a
//! [`Frame`]. The loop re-arms until a stop is requested.

use super::{Frame, WorkerSignal};
use crate::daq::{AnalogInputTask, DaqError};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Shared handle to the session's task
pub type SharedTask = Arc<Mutex<Box<dyn AnalogInputTask>>>;

/// Why the loop ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    StopRequested,
    SingleShot,
    Disconnected,
}

/// Worker that reads frames from the task until told to stop
pub struct ReadDataWorker {
    task: SharedTask,
    stop_requested: Arc<AtomicBool>,
    sequence: Arc<AtomicU64>,
    signals: Sender<WorkerSignal>,
    repeat: bool,
    timeout: Duration,
    epoch: Instant,
}

impl ReadDataWorker {
    /// # Arguments
    /// * `task` - Configured task, locked for the lifetime of the loop
    /// * `stop_requested` - Checked after every published frame
    /// * `sequence` - Frame counter, shared so numbering continues across runs
    /// * `signals` - Where frames and the final status are sent
    /// * `repeat` - Re-arm after each acquisition
    /// * `timeout` - Bound on waiting for and reading one acquisition
    /// * `epoch` - Reference instant for `Frame::acquired_at`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        task: SharedTask,
        stop_requested: Arc<AtomicBool>,
        sequence: Arc<AtomicU64>,
        signals: Sender<WorkerSignal>,
        repeat: bool,
        timeout: Duration,
        epoch: Instant,
    ) -> Self {
        Self {
            task,
            stop_requested,
            sequence,
            signals,
            repeat,
            timeout,
            epoch,
        }
    }

    /// Run the loop to completion; always ends with [`WorkerSignal::Finished`]
    pub fn run(self) {
        match self.task.lock() {
            Ok(mut task) => match self.acquire_loop(&mut **task) {
                Ok(exit) => log::info!("Acquisition finished ({:?})", exit),
                Err(e) => {
                    log::error!("Acquisition failed: {}", e);
                    if let Err(stop_err) = task.stop() {
                        log::warn!("Failed to stop task after error: {}", stop_err);
                    }
                    let _ = self.signals.send(WorkerSignal::Failed(e));
                }
            },
            Err(_) => {
                let _ = self
                    .signals
                    .send(WorkerSignal::Failed(DaqError::InvalidState("task lock poisoned")));
            }
        }

        let _ = self.signals.send(WorkerSignal::Finished);
    }

    fn acquire_loop(&self, task: &mut dyn AnalogInputTask) -> Result<Exit, DaqError> {
        let samples_per_channel = task.info().samples_per_channel;
        let sample_rate = task.info().sample_rate;

        loop {
            task.start()?;
            task.wait_until_done(self.timeout)?;

            let mut samples = vec![0.0; samples_per_channel];
            let read = task.read(&mut samples, self.timeout)?;
            if read < samples_per_channel {
                log::warn!(
                    "Short read: {} of {} samples",
                    read,
                    samples_per_channel
                );
                samples.truncate(read);
            }

            let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
            log::debug!("Frame {} acquired ({} samples)", sequence, samples.len());

            let frame = Frame {
                sequence,
                sample_rate,
                samples,
                acquired_at: self.epoch.elapsed(),
            };

            if self.signals.send(WorkerSignal::Measured(frame)).is_err() {
                task.stop()?;
                return Ok(Exit::Disconnected);
            }

            if self.stop_requested.load(Ordering::SeqCst) {
                task.stop()?;
                return Ok(Exit::StopRequested);
            }
            if !self.repeat {
                task.stop()?;
                return Ok(Exit::SingleShot);
            }

            task.stop()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AcquisitionConfig;
    use crate::daq::{SignalConfig, SimulatedTask, TaskInfo};
    use crossbeam_channel::{bounded, unbounded};

    fn shared_task(samples: usize) -> SharedTask {
        let config = AcquisitionConfig {
            sample_rate: 1000.0,
            samples_per_channel: samples,
            ..AcquisitionConfig::default()
        };
        let task = SimulatedTask::new(&config, SignalConfig::pure_tone(10.0, 1.0)).unwrap();
        Arc::new(Mutex::new(Box::new(task)))
    }

    fn worker(
        task: SharedTask,
        stop: Arc<AtomicBool>,
        repeat: bool,
    ) -> (ReadDataWorker, crossbeam_channel::Receiver<WorkerSignal>) {
        let (tx, rx) = unbounded();
        (worker_with_sender(task, stop, repeat, tx), rx)
    }

    fn worker_with_sender(
        task: SharedTask,
        stop: Arc<AtomicBool>,
        repeat: bool,
        tx: Sender<WorkerSignal>,
    ) -> ReadDataWorker {
        ReadDataWorker::new(
            task,
            stop,
            Arc::new(AtomicU64::new(0)),
            tx,
            repeat,
            Duration::from_secs(1),
            Instant::now(),
        )
    }

    #[test]
    fn test_single_shot() {
        let (worker, rx) = worker(shared_task(100), Arc::new(AtomicBool::new(false)), false);
        worker.run();

        let signals: Vec<_> = rx.try_iter().collect();
        assert_eq!(signals.len(), 2);
        match &signals[0] {
            WorkerSignal::Measured(frame) => {
                assert_eq!(frame.sequence, 0);
                assert_eq!(frame.len(), 100);
                assert_eq!(frame.sample_rate, 1000.0);
            }
            other => panic!("unexpected signal {:?}", other),
        }
        assert!(matches!(signals[1], WorkerSignal::Finished));
    }

    #[test]
    fn test_stop_request_is_honored_after_frame() {
        // Stop already requested: exactly one frame is still delivered
        let (worker, rx) = worker(shared_task(10), Arc::new(AtomicBool::new(true)), true);
        worker.run();

        let signals: Vec<_> = rx.try_iter().collect();
        assert_eq!(signals.len(), 2);
        assert!(matches!(signals[0], WorkerSignal::Measured(_)));
        assert!(matches!(signals[1], WorkerSignal::Finished));
    }

    #[test]
    fn test_repeats_until_stopped() {
        let stop = Arc::new(AtomicBool::new(false));
        let task = shared_task(10);
        // Rendezvous channel keeps the worker in lock-step with the reader
        let (tx, rx) = bounded(0);
        let worker = worker_with_sender(Arc::clone(&task), Arc::clone(&stop), true, tx);

        let handle = std::thread::spawn(move || worker.run());

        let mut frames = 0;
        loop {
            match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
                WorkerSignal::Measured(frame) => {
                    assert_eq!(frame.sequence, frames);
                    frames += 1;
                    if frames == 3 {
                        stop.store(true, Ordering::SeqCst);
                    }
                }
                WorkerSignal::Finished => break,
                other => panic!("unexpected signal {:?}", other),
            }
        }
        handle.join().unwrap();

        // At most one frame in flight when the stop landed
        assert!(frames == 3 || frames == 4);

        // Task is left stopped and can be re-armed
        let mut guard = task.lock().unwrap();
        guard.start().unwrap();
    }

    struct FailingTask {
        info: TaskInfo,
        starts: usize,
        stopped: Arc<AtomicBool>,
    }

    impl AnalogInputTask for FailingTask {
        fn start(&mut self) -> Result<(), DaqError> {
            self.starts += 1;
            self.stopped.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn wait_until_done(&mut self, _timeout: Duration) -> Result<(), DaqError> {
            Err(DaqError::Driver {
                code: -200279,
                message: "buffer overwritten".into(),
            })
        }

        fn read(&mut self, _buffer: &mut [f64], _timeout: Duration) -> Result<usize, DaqError> {
            unreachable!()
        }

        fn stop(&mut self) -> Result<(), DaqError> {
            self.stopped.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn info(&self) -> &TaskInfo {
            &self.info
        }
    }

    #[test]
    fn test_driver_error_stops_task_and_reports() {
        let stopped = Arc::new(AtomicBool::new(false));
        let task = FailingTask {
            info: TaskInfo::from_config(
                &AcquisitionConfig::default(),
                crate::daq::Backend::Simulated,
            ),
            starts: 0,
            stopped: Arc::clone(&stopped),
        };
        let shared: SharedTask = Arc::new(Mutex::new(Box::new(task)));
        let (worker, rx) = worker(shared, Arc::new(AtomicBool::new(false)), true);
        worker.run();

        let signals: Vec<_> = rx.try_iter().collect();
        assert_eq!(signals.len(), 2);
        match &signals[0] {
            WorkerSignal::Failed(DaqError::Driver { code, .. }) => assert_eq!(*code, -200279),
            other => panic!("unexpected signal {:?}", other),
        }
        assert!(matches!(signals[1], WorkerSignal::Finished));
        assert!(stopped.load(Ordering::SeqCst));
    }
}
