//! Bounded FIFO worker pool for bulk verification.
//!
//! A fixed set of worker threads pulls queued tasks in submission order; at
//! most `workers` verifications are in flight at once. Results travel back
//! over oneshot channels so async callers can await them. A panicking task
//! is caught at the pool boundary and surfaces as a `system_error` record;
//! it never poisons the pool or the submitter's batch.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot;

use crate::report::{self, ResultRecord};

/// One unit of work: the address (kept for failure routing) and the
/// verification closure.
pub struct VerifyTask {
    pub email: String,
    pub run: Box<dyn FnOnce() -> ResultRecord + Send + 'static>,
}

impl VerifyTask {
    pub fn new<F>(email: impl Into<String>, run: F) -> Self
    where
        F: FnOnce() -> ResultRecord + Send + 'static,
    {
        Self {
            email: email.into(),
            run: Box::new(run),
        }
    }
}

struct QueuedTask {
    task: VerifyTask,
    reply: oneshot::Sender<ResultRecord>,
}

pub struct WorkerPool {
    sender: Mutex<Option<Sender<QueuedTask>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    stopping: Arc<AtomicBool>,
    workers: usize,
}

impl WorkerPool {
    /// Spawn a pool with the default sizing, `max(2, min(4, cpus − 1))`.
    pub fn new() -> io::Result<Self> {
        Self::with_workers(default_workers())
    }

    pub fn with_workers(workers: usize) -> io::Result<Self> {
        let workers = workers.max(1);
        let (sender, receiver) = channel::<QueuedTask>();
        let receiver = Arc::new(Mutex::new(receiver));
        let stopping = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let receiver = Arc::clone(&receiver);
            let stopping = Arc::clone(&stopping);
            let handle = thread::Builder::new()
                .name(format!("verify-worker-{index}"))
                .spawn(move || worker_loop(&receiver, &stopping))?;
            handles.push(handle);
        }

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
            stopping,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Queue a task. The returned receiver resolves with the task's record,
    /// or errors if the pool is terminated before the task runs.
    pub fn submit(&self, task: VerifyTask) -> oneshot::Receiver<ResultRecord> {
        let (reply, result) = oneshot::channel();
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match sender.as_ref() {
            Some(sender) => {
                // A send failure means the workers are gone; dropping
                // `reply` rejects the future.
                let _ = sender.send(QueuedTask { task, reply });
            }
            None => drop(reply),
        }
        result
    }

    /// Stop accepting work, reject everything still queued, and join the
    /// workers. In-flight tasks run to their natural completion.
    pub fn terminate(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handles: Vec<JoinHandle<()>> = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                tracing::error!("verify worker thread panicked");
            }
        }
    }
}

/// Default sizing per the deployment contract: at least two workers, at
/// most four, leaving one core for the server itself.
pub fn default_workers() -> usize {
    let cpus = thread::available_parallelism().map(usize::from).unwrap_or(4);
    cpus.saturating_sub(1).clamp(2, 4)
}

fn worker_loop(receiver: &Mutex<Receiver<QueuedTask>>, stopping: &AtomicBool) {
    loop {
        let queued = {
            let guard = receiver.lock().unwrap_or_else(PoisonError::into_inner);
            guard.recv()
        };
        let Ok(QueuedTask { task, reply }) = queued else {
            return;
        };
        if stopping.load(Ordering::SeqCst) {
            // Queue is being drained; reject instead of running.
            drop(reply);
            continue;
        }

        let email = task.email;
        let record = match panic::catch_unwind(AssertUnwindSafe(task.run)) {
            Ok(record) => record,
            Err(_) => {
                tracing::error!(email = %email, "verification task panicked");
                report::system_error_record(&email)
            }
        };
        let _ = reply.send(record);
    }
}
