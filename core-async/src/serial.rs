//! # Serial Executor
//!
//! A single logical worker that runs submitted jobs one at a time, in
//! submission order.
//!
//! ## Overview
//!
//! Jobs are boxed futures pushed through an unbounded channel to one spawned
//! task. A job only starts once the previous one has fully completed, which
//! gives every job a strict happens-before relationship with the jobs
//! submitted before it.
//!
//! The sender half sits behind a mutex together with the closed flag
//! (`None` once shut down). Submitting after [`SerialExecutor::shutdown`]
//! is a silent no-op that returns `false`, so callers racing a shutdown never
//! observe an error.
//!
//! A job that panics is logged and the worker moves on to the next job.
//!
//! ## Usage
//!
//! ```rust
//! use core_async::serial::SerialExecutor;
//!
//! # async fn example() {
//! let executor = SerialExecutor::spawn("indexer");
//!
//! executor.submit(async { /* first */ });
//! let answer = executor.run(async { 40 + 2 }).await;
//! assert_eq!(answer, Some(42));
//!
//! executor.shutdown().await;
//! assert!(!executor.submit(async {}));
//! # }
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Mutex, PoisonError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

type Job = BoxFuture<'static, ()>;

/// Single-worker, strictly ordered job queue.
pub struct SerialExecutor {
    name: String,
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SerialExecutor {
    /// Spawn the worker task on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn(name: impl Into<String>) -> Self {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();

        let worker_name = name.clone();
        let worker = crate::task::spawn(async move {
            while let Some(job) = receiver.recv().await {
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    error!(executor = %worker_name, "Serial job panicked");
                }
            }
            debug!(executor = %worker_name, "Serial executor drained");
        });

        Self {
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Name given at construction, used in log fields.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a job.
    ///
    /// Returns `false` without running the job when the executor has been
    /// shut down.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => {
                if sender.send(job.boxed()).is_err() {
                    debug!(executor = %self.name, "Worker gone, dropping job");
                    return false;
                }
                true
            }
            None => {
                debug!(executor = %self.name, "Executor closed, dropping job");
                false
            }
        }
    }

    /// Enqueue a job and wait for its output.
    ///
    /// Returns `None` if the executor is closed or the job panicked.
    pub async fn run<F, T>(&self, job: F) -> Option<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let accepted = self.submit(async move {
            let output = job.await;
            let _ = tx.send(output);
        });

        if !accepted {
            return None;
        }

        rx.await.ok()
    }

    /// Wait until every job submitted before this call has completed.
    pub async fn drain(&self) {
        self.run(async {}).await;
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Close the queue and wait for already-queued jobs to finish.
    ///
    /// Idempotent.
    pub async fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(executor = %self.name, "Serial worker terminated abnormally: {}", e);
            }
        }
    }
}

impl std::fmt::Debug for SerialExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialExecutor")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
