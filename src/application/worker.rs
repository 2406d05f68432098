use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread;

use parking_lot::Mutex;

use crate::domain::AppError;

type Job = Box<dyn FnOnce() + Send + 'static>;

static WORKER_COUNT: AtomicUsize = AtomicUsize::new(1);

/// Single background thread fed by a bounded queue.
///
/// Submissions never block: a full queue or a shut down worker rejects the job.
pub struct Worker {
    sender: Mutex<Option<SyncSender<Job>>>,
}

impl Worker {
    pub fn spawn(capacity: usize) -> Result<Self, AppError> {
        let (sender, receiver) = mpsc::sync_channel::<Job>(capacity);
        let name = format!(
            "UpdateWorker #{}",
            WORKER_COUNT.fetch_add(1, Ordering::SeqCst)
        );
        thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        log::error!("{}: background job panicked", name);
                    }
                }
                log::debug!("{} stopped", name);
            })
            .map_err(|e| AppError::Io(format!("Failed to start worker thread: {}", e)))?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
        })
    }

    pub fn execute(&self, job: impl FnOnce() + Send + 'static) -> Result<(), AppError> {
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(AppError::WorkerShutdown)?;
        sender.try_send(Box::new(job)).map_err(|e| match e {
            TrySendError::Full(_) => AppError::QueueFull,
            TrySendError::Disconnected(_) => AppError::WorkerShutdown,
        })
    }

    /// Stops accepting work. Jobs already queued still run.
    pub fn shutdown(&self) {
        self.sender.lock().take();
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }
}
