//! Fixed-size worker pool
//!
//! Jobs are boxed closures pulled from a shared crossbeam queue by a set of
//! named threads. Long-running jobs (the acquisition loop) and short ones
//! (Fourier transforms) share the pool, so sessions size it with at least
//! two threads.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Worker pool is shut down")]
    ShutDown,

    #[error("Worker pool needs at least one thread")]
    NoThreads,
}

/// Thread pool executing submitted closures
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    active: Arc<AtomicUsize>,
    queued: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `threads` workers named `{name}-{index}`
    pub fn new(name: &str, threads: usize) -> Result<Self, PoolError> {
        if threads == 0 {
            return Err(PoolError::NoThreads);
        }

        let (sender, receiver) = unbounded::<Job>();
        let active = Arc::new(AtomicUsize::new(0));
        let queued = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let active = Arc::clone(&active);
            let queued = Arc::clone(&queued);
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", name, index))
                .spawn(move || worker_loop(receiver, active, queued))?;
            workers.push(handle);
        }

        log::debug!("Started worker pool '{}' with {} threads", name, threads);

        Ok(Self {
            sender: Some(sender),
            workers,
            active,
            queued,
        })
    }

    /// Queue a job for execution
    pub fn submit<F>(&self, job: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::ShutDown)?;
        self.queued.fetch_add(1, Ordering::SeqCst);
        sender.send(Box::new(job)).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            PoolError::ShutDown
        })
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Jobs currently executing
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Jobs submitted but not yet picked up
    pub fn queued_jobs(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Stop accepting jobs, finish the queued ones and join every thread
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("Worker thread panicked outside a job");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Receiver<Job>, active: Arc<AtomicUsize>, queued: Arc<AtomicUsize>) {
    while let Ok(job) = receiver.recv() {
        queued.fetch_sub(1, Ordering::SeqCst);
        active.fetch_add(1, Ordering::SeqCst);
        if catch_unwind(AssertUnwindSafe(job)).is_err() {
            log::error!(
                "Job panicked on {}",
                std::thread::current().name().unwrap_or("worker")
            );
        }
        active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Duration;

    #[test]
    fn test_runs_jobs() {
        let pool = WorkerPool::new("test", 3).unwrap();
        let (tx, rx) = unbounded();

        for i in 0..10 {
            let tx = tx.clone();
            pool.submit(move || tx.send(i).unwrap()).unwrap();
        }

        let mut results: Vec<i32> = (0..10)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        results.sort();
        assert_eq!(results, (0..10).collect::<Vec<_>>());
        assert_eq!(pool.thread_count(), 3);
    }

    #[test]
    fn test_long_job_does_not_block_others() {
        let pool = WorkerPool::new("test", 2).unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = unbounded();

        pool.submit(move || {
            let _ = release_rx.recv();
        })
        .unwrap();
        pool.submit(move || done_tx.send("short").unwrap()).unwrap();

        assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), "short");
        assert!(pool.active_jobs() >= 1);
        release_tx.send(()).unwrap();
    }

    #[test]
    fn test_survives_panicking_job() {
        let pool = WorkerPool::new("test", 1).unwrap();
        let (tx, rx) = unbounded();

        pool.submit(|| panic!("boom")).unwrap();
        pool.submit(move || tx.send(1).unwrap()).unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 1);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let mut pool = WorkerPool::new("test", 1).unwrap();
        let (tx, rx) = unbounded();

        for i in 0..5 {
            let tx = tx.clone();
            pool.submit(move || tx.send(i).unwrap()).unwrap();
        }
        pool.shutdown();

        assert_eq!(rx.try_iter().count(), 5);
        assert!(matches!(pool.submit(|| {}), Err(PoolError::ShutDown)));
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(matches!(WorkerPool::new("test", 0), Err(PoolError::NoThreads)));
    }
}
