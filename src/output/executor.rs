//! Background task runner: inline or one FIFO worker thread.
//!
//! Callers only see [`TaskExecutor::dispatch`] and [`TaskExecutor::drain`].
//! A failure inside a job is not lost: the executor keeps the first error
//! and hands it back from the next `drain`.

use crate::export_error::ExportError;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

/// A unit of deferred work.
pub trait Task: Send {
    fn run(self: Box<Self>) -> Result<(), ExportError>;
}

impl<F> Task for F
where
    F: FnOnce() -> Result<(), ExportError> + Send,
{
    fn run(self: Box<Self>) -> Result<(), ExportError> {
        (*self)()
    }
}

pub trait TaskExecutor: Send {
    /// Submit a job. Jobs run in submission order.
    fn dispatch(&mut self, task: Box<dyn Task>) -> Result<(), ExportError>;
    /// Block until every submitted job has finished; return the first
    /// failure since the previous drain.
    fn drain(&mut self) -> Result<(), ExportError>;
    /// Whether `dispatch` returns before the job has run.
    fn is_async(&self) -> bool;
}

/// Runs each job on the caller's thread inside `dispatch`.
#[derive(Debug, Default)]
pub struct InlineExecutor {
    failed: Option<ExportError>,
}

impl InlineExecutor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TaskExecutor for InlineExecutor {
    fn dispatch(&mut self, task: Box<dyn Task>) -> Result<(), ExportError> {
        if let Err(e) = task.run() {
            log::debug!("inline write job failed: {e}");
            self.failed.get_or_insert(e);
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), ExportError> {
        self.failed.take().map_or(Ok(()), Err)
    }

    fn is_async(&self) -> bool {
        false
    }
}

#[derive(Default)]
struct Progress {
    pending: usize,
    failed: Option<ExportError>,
}

#[derive(Default)]
struct Shared {
    progress: Mutex<Progress>,
    idle: Condvar,
}

/// One dedicated worker thread consuming a FIFO queue.
pub struct WorkerExecutor {
    sender: Option<mpsc::Sender<Box<dyn Task>>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl WorkerExecutor {
    pub fn spawn(name: &str) -> Result<Self, ExportError> {
        let (sender, receiver) = mpsc::channel::<Box<dyn Task>>();
        let shared = Arc::new(Shared::default());
        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                for task in receiver {
                    let outcome = task.run();
                    let mut progress = worker_shared.progress.lock();
                    if let Err(e) = outcome {
                        progress.failed.get_or_insert(e);
                    }
                    progress.pending -= 1;
                    if progress.pending == 0 {
                        worker_shared.idle.notify_all();
                    }
                }
            })?;
        log::info!("started background writer thread `{name}`");
        Ok(Self {
            sender: Some(sender),
            shared,
            worker: Some(worker),
        })
    }

    /// Jobs submitted but not yet finished.
    pub fn pending(&self) -> usize {
        self.shared.progress.lock().pending
    }

    fn worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl TaskExecutor for WorkerExecutor {
    fn dispatch(&mut self, task: Box<dyn Task>) -> Result<(), ExportError> {
        let sender = self.sender.as_ref().ok_or(ExportError::WorkerDisconnected)?;
        self.shared.progress.lock().pending += 1;
        if sender.send(task).is_err() {
            self.shared.progress.lock().pending -= 1;
            return Err(ExportError::WorkerDisconnected);
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<(), ExportError> {
        let mut progress = self.shared.progress.lock();
        while progress.pending > 0 {
            if !self.worker_alive() {
                return Err(ExportError::WorkerDisconnected);
            }
            // Timed so a worker that dies mid-job cannot hang the caller.
            self.shared
                .idle
                .wait_for(&mut progress, std::time::Duration::from_millis(50));
        }
        progress.failed.take().map_or(Ok(()), Err)
    }

    fn is_async(&self) -> bool {
        true
    }
}

impl Drop for WorkerExecutor {
    fn drop(&mut self) {
        if let Err(e) = self.drain() {
            log::warn!("background writer finished with error: {e}");
        }
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("background writer thread panicked");
            }
        }
        log::debug!("background writer thread stopped");
    }
}
