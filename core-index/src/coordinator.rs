//! # Sync Coordinator
//!
//! Schedules index passes onto a single serial worker.
//!
//! ## Overview
//!
//! Change notifications arrive from arbitrary threads and are coalesced: at
//! most one delta pass is queued at a time, and notifications that arrive
//! while a delta pass is running produce exactly one follow-up pass.
//!
//! ```text
//!             notify_change                job starts
//!   ┌──────┐ ─────────────> ┌───────────┐ ───────────> ┌─────────┐
//!   │ Idle │                │ Scheduled │              │ Running │
//!   └──────┘ <───────────── └───────────┘ <─────────── └─────────┘
//!            no pending change       pending change set
//! ```
//!
//! Full passes are enqueued explicitly on the same worker, so a full pass
//! and a delta pass never run at the same time. The job that finds no full
//! update recorded in the watermark runs the first-run full pass instead of
//! a delta pass.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_index::SyncCoordinator;
//!
//! let coordinator = SyncCoordinator::new(
//!     config, source, builder, index, watermark_store, clock, Some(event_bus),
//! )?;
//! coordinator.start();
//!
//! // From any thread, whenever the source changed:
//! coordinator.notify_change();
//!
//! // Periodically:
//! coordinator.schedule_full_update_if_due();
//!
//! coordinator.shutdown().await;
//! ```

use bridge_traits::{Clock, DocumentBuilder, IndexClient, SourceAdapter, Watermark, WatermarkStore};
use core_async::serial::SerialExecutor;
use core_async::sync::{oneshot, CancellationToken};
use core_runtime::config::IndexerConfig;
use core_runtime::events::EventBus;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::error::{IndexError, Result};
use crate::pass::PassRunner;
use crate::stats::UpdateStats;

const WORKER_NAME: &str = "index-sync";

/// Delta scheduling state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaState {
    /// No delta pass queued or running
    Idle,
    /// A delta pass is queued but has not started
    Scheduled,
    /// A delta pass is running on the worker
    Running,
}

struct Debounce {
    state: DeltaState,
    pending_change: bool,
}

struct Inner {
    executor: SerialExecutor,
    runner: PassRunner,
    debounce: Mutex<Debounce>,
    /// Parent of every token the coordinator creates itself
    shutdown: CancellationToken,
    queued_jobs: AtomicUsize,
}

impl Inner {
    fn debounce(&self) -> MutexGuard<'_, Debounce> {
        self.debounce.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Limit for a full pass given the stored watermark.
    fn full_limit(&self, watermark: &Watermark) -> usize {
        let config = self.runner.config();
        if watermark.has_full_update() {
            config.full_update_indexing_limit
        } else {
            config.first_run_indexing_limit
        }
    }
}

/// Counts a job from submission until its future is dropped.
struct QueuedJob(Arc<Inner>);

impl Drop for QueuedJob {
    fn drop(&mut self) {
        self.0.queued_jobs.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Submit a job built by `job` to the worker.
///
/// Returns `false` when the worker is shut down.
fn enqueue<F>(inner: &Arc<Inner>, job: F) -> bool
where
    F: FnOnce(Arc<Inner>) -> BoxFuture<'static, ()>,
{
    inner.queued_jobs.fetch_add(1, Ordering::SeqCst);
    let guard = QueuedJob(inner.clone());
    let future = job(inner.clone());

    inner.executor.submit(async move {
        let _guard = guard;
        future.await;
    })
}

fn delta_job(inner: Arc<Inner>) -> BoxFuture<'static, ()> {
    async move {
        {
            let mut debounce = inner.debounce();
            debounce.state = DeltaState::Running;
            debounce.pending_change = false;
        }

        let first_run = match inner.runner.load_watermark().await {
            Ok(watermark) => !watermark.has_full_update(),
            // The delta pass reports the load failure itself.
            Err(_) => false,
        };

        if first_run {
            info!("No full update recorded, running first-run full pass");
            let token = inner.shutdown.child_token();
            let limit = inner.runner.config().first_run_indexing_limit;
            inner.runner.run_full(limit, &token).await;
        } else {
            let report = inner.runner.run_delta().await;
            if report.needs_full_pass {
                let token = inner.shutdown.child_token();
                let limit = inner.runner.config().full_update_indexing_limit;
                enqueue(&inner, move |inner| full_job(inner, limit, token));
            }
        }

        let mut debounce = inner.debounce();
        if debounce.pending_change && enqueue(&inner, delta_job) {
            debounce.state = DeltaState::Scheduled;
        } else {
            debounce.state = DeltaState::Idle;
        }
    }
    .boxed()
}

fn full_job(inner: Arc<Inner>, limit: usize, token: CancellationToken) -> BoxFuture<'static, ()> {
    async move {
        inner.runner.run_full(limit, &token).await;
    }
    .boxed()
}

/// Full pass that only runs when the stored watermark says one is due.
fn full_if_due_job(inner: Arc<Inner>) -> BoxFuture<'static, ()> {
    async move {
        let watermark = match inner.runner.load_watermark().await {
            Ok(watermark) => watermark,
            Err(e) => {
                warn!(error = %e, "Cannot load watermark, skipping full update check");
                return;
            }
        };

        let now = inner.runner.clock().unix_timestamp_millis();
        let interval = inner.runner.config().full_update_interval_ms();
        let elapsed = now.saturating_sub(watermark.last_full_update_ms);
        if elapsed < interval {
            debug!(elapsed_ms = elapsed, interval_ms = interval, "Full update not due");
            return;
        }

        let token = inner.shutdown.child_token();
        let limit = inner.full_limit(&watermark);
        inner.runner.run_full(limit, &token).await;
    }
    .boxed()
}

fn first_run_job(inner: Arc<Inner>) -> BoxFuture<'static, ()> {
    async move {
        match inner.runner.load_watermark().await {
            Ok(watermark) if watermark.has_full_update() => {
                debug!("Full update already recorded, nothing to do at start");
            }
            Ok(_) => {
                let token = inner.shutdown.child_token();
                let limit = inner.runner.config().first_run_indexing_limit;
                inner.runner.run_full(limit, &token).await;
            }
            Err(e) => warn!(error = %e, "Cannot load watermark at start"),
        }
    }
    .boxed()
}

/// Entry point of the index sync engine.
///
/// Cloning yields another handle to the same worker.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    /// Validate `config` and spawn the worker.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(
        config: IndexerConfig,
        source: Arc<dyn SourceAdapter>,
        builder: Arc<dyn DocumentBuilder>,
        index: Arc<dyn IndexClient>,
        watermark_store: Arc<dyn WatermarkStore>,
        clock: Arc<dyn Clock>,
        event_bus: Option<Arc<EventBus>>,
    ) -> Result<Self> {
        config.validate()?;

        let mut runner = PassRunner::new(config, source, builder, index, watermark_store, clock);
        if let Some(event_bus) = event_bus {
            runner = runner.with_event_bus(event_bus);
        }

        info!("Starting index sync coordinator");

        Ok(Self {
            inner: Arc::new(Inner {
                executor: SerialExecutor::spawn(WORKER_NAME),
                runner,
                debounce: Mutex::new(Debounce {
                    state: DeltaState::Idle,
                    pending_change: false,
                }),
                shutdown: CancellationToken::new(),
                queued_jobs: AtomicUsize::new(0),
            }),
        })
    }

    pub fn config(&self) -> &IndexerConfig {
        self.inner.runner.config()
    }

    pub fn delta_state(&self) -> DeltaState {
        self.inner.debounce().state
    }

    /// Jobs submitted to the worker that have not finished yet.
    pub fn queued_jobs(&self) -> usize {
        self.inner.queued_jobs.load(Ordering::SeqCst)
    }

    /// Record that the source changed. Callable from any thread.
    pub fn notify_change(&self) {
        let mut debounce = self.inner.debounce();
        debounce.pending_change = true;

        if debounce.state == DeltaState::Idle {
            if enqueue(&self.inner, delta_job) {
                debounce.state = DeltaState::Scheduled;
            }
        } else {
            debug!(state = ?debounce.state, "Delta pass already pending, coalescing change");
        }
    }

    /// Enqueue the first-run full pass if no full update was ever recorded.
    pub fn start(&self) -> bool {
        enqueue(&self.inner, first_run_job)
    }

    /// Run a full pass on the worker and wait for its statistics.
    ///
    /// A pass that fails or is cancelled still yields `Ok`; its outcome is
    /// recorded in the returned statistics.
    pub async fn run_full_update(&self, token: CancellationToken) -> Result<UpdateStats> {
        let (tx, rx) = oneshot::channel();
        let accepted = enqueue(&self.inner, move |inner| {
            async move {
                let limit = inner.runner.config().full_update_indexing_limit;
                let report = inner.runner.run_full(limit, &token).await;
                let _ = tx.send(report.stats);
            }
            .boxed()
        });

        if !accepted {
            return Err(IndexError::WorkerClosed);
        }
        rx.await.map_err(|_| IndexError::WorkerClosed)
    }

    /// Enqueue a full pass without waiting for it.
    pub fn schedule_full_update(&self, token: CancellationToken) -> bool {
        let limit = self.config().full_update_indexing_limit;
        enqueue(&self.inner, move |inner| full_job(inner, limit, token))
    }

    /// Enqueue a full pass that runs if `full_update_interval` has elapsed
    /// since the last one.
    pub fn schedule_full_update_if_due(&self) -> bool {
        enqueue(&self.inner, full_if_due_job)
    }

    /// Zero the stored watermark after the index was wiped.
    ///
    /// Runs on the worker, after every pass queued before it.
    pub async fn reset_watermarks(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let accepted = enqueue(&self.inner, move |inner| {
            async move {
                let _ = tx.send(inner.runner.reset_watermarks().await);
            }
            .boxed()
        });

        if !accepted {
            return Err(IndexError::WorkerClosed);
        }
        rx.await.map_err(|_| IndexError::WorkerClosed)?
    }

    /// Wait until no job is queued or running, including follow-up jobs
    /// enqueued by the jobs themselves.
    pub async fn wait_for_idle(&self) {
        while self.queued_jobs() > 0 && !self.inner.executor.is_closed() {
            self.inner.executor.drain().await;
        }
    }

    /// Cancel coordinator-created passes and stop the worker once queued jobs
    /// have run. Later enqueues are silently dropped.
    pub async fn shutdown(&self) {
        info!("Shutting down index sync coordinator");
        self.inner.shutdown.cancel();
        self.inner.executor.shutdown().await;
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("delta_state", &self.delta_state())
            .field("queued_jobs", &self.queued_jobs())
            .finish()
    }
}
