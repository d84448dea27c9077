//! Owned, explicitly shut down worker pool.
//!
//! The pool is handed to the dependency manager rather than created inside
//! it, so tests and embedding applications control how many threads exist
//! and when they stop. Dropping the pool shuts it down and joins every
//! worker.

use log::{debug, error};
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Fallback size when the platform cannot report its parallelism.
const FALLBACK_WORKERS: usize = 4;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Returned when a job is submitted after shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("worker pool is shut down")]
pub struct PoolClosed;

/// A fixed-size pool of named worker threads fed from one queue.
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` workers (at least one).
    ///
    /// # Errors
    ///
    /// Returns the I/O error if a worker thread cannot be spawned; workers
    /// spawned before the failure are shut down.
    pub fn new(size: usize) -> io::Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(size),
        };

        for id in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("hoist-worker-{id}"))
                .spawn(move || worker_loop(id, &receiver))?;
            pool.workers.push(handle);
        }

        debug!("started worker pool with {size} threads");
        Ok(pool)
    }

    /// Spawn one worker per available hardware thread.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_available_parallelism() -> io::Result<Self> {
        Self::new(available_workers())
    }

    /// Number of live workers.
    #[must_use]
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue `job` for execution on the next free worker.
    ///
    /// A panicking job is logged and does not take its worker down.
    ///
    /// # Errors
    ///
    /// Returns [`PoolClosed`] after [`Self::shutdown`].
    pub fn execute<F>(&self, job: F) -> Result<(), PoolClosed>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolClosed)?;
        sender.send(Box::new(job)).map_err(|_| PoolClosed)
    }

    /// Stop accepting jobs, let queued jobs finish, and join every worker.
    ///
    /// Calling this more than once is a no-op.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
        debug!("worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Hardware parallelism, or a small fixed count when it is unknown.
#[must_use]
pub fn available_workers() -> usize {
    thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(FALLBACK_WORKERS)
}

fn worker_loop(id: usize, receiver: &Mutex<Receiver<Job>>) {
    loop {
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(job) = next else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!("job on hoist-worker-{id} panicked");
        }
    }
}
