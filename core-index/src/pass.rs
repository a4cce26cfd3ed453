//! # Pass Runner
//!
//! Executes one delta or full pass end to end. The runner itself holds no
//! mutable state: every pass loads the watermark, owns a fresh [`Batcher`]
//! and [`UpdateStats`], and persists the watermark before returning. The
//! coordinator guarantees passes never overlap.
//!
//! ## Delta pass
//!
//! 1. Load the watermark
//! 2. Remove ids deleted since `last_delta_delete_ms`
//! 3. Index ids updated since `last_delta_update_ms`, at most
//!    `delta_update_indexing_limit` of them
//! 4. Persist the watermark
//!
//! Both delta watermarks move to the newest timestamp the source reported
//! as soon as the ids are fetched. A call-level failure later in the pass
//! does not roll them back: the pass is recorded as failed and the next pass
//! starts from the advanced watermark.
//!
//! ## Full pass
//!
//! Lists every source id and every index id, removes what the index holds
//! but the source does not, and re-indexes every source id. All three
//! watermark fields move to the time the pass started, whether the pass ran
//! to the end or failed partway. Only a cancelled pass leaves them alone.

use bridge_traits::{
    Clock, DocumentBuilder, IndexClient, SourceAdapter, Watermark, WatermarkStore,
};
use core_async::sync::CancellationToken;
use core_runtime::config::IndexerConfig;
use core_runtime::events::{CoreEvent, EventBus, IndexEvent};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::batcher::{record_removals, Batcher};
use crate::error::{IndexError, Result};
use crate::stats::{PassKind, PassOutcome, UpdateStats};

/// Statistics of a finished pass plus follow-up hints for the scheduler.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub stats: UpdateStats,
    /// The delta query returned as many ids as it was allowed to, so the
    /// source may hold more changes than this pass saw.
    pub needs_full_pass: bool,
}

impl PassReport {
    fn new(stats: UpdateStats) -> Self {
        Self {
            stats,
            needs_full_pass: false,
        }
    }
}

pub struct PassRunner {
    source: Arc<dyn SourceAdapter>,
    builder: Arc<dyn DocumentBuilder>,
    index: Arc<dyn IndexClient>,
    watermarks: Arc<dyn WatermarkStore>,
    clock: Arc<dyn Clock>,
    event_bus: Option<Arc<EventBus>>,
    config: IndexerConfig,
}

impl PassRunner {
    pub fn new(
        config: IndexerConfig,
        source: Arc<dyn SourceAdapter>,
        builder: Arc<dyn DocumentBuilder>,
        index: Arc<dyn IndexClient>,
        watermarks: Arc<dyn WatermarkStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            builder,
            index,
            watermarks,
            clock,
            event_bus: None,
            config,
        }
    }

    /// Publish pass events on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub async fn load_watermark(&self) -> Result<Watermark> {
        Ok(self.watermarks.load().await?)
    }

    /// Zero the stored watermark so the next pass is a first-run full pass.
    pub async fn reset_watermarks(&self) -> Result<()> {
        self.watermarks.persist(&Watermark::default()).await?;
        info!("Index watermarks reset");
        self.emit(IndexEvent::WatermarksReset);
        Ok(())
    }

    // ========================================================================
    // Delta
    // ========================================================================

    #[instrument(skip_all, fields(kind = "delta"))]
    pub async fn run_delta(&self) -> PassReport {
        let mut report = PassReport::new(self.begin(PassKind::Delta));

        let mut watermark = match self.watermarks.load().await {
            Ok(watermark) => watermark,
            Err(e) => {
                report.stats.record_call_failure(&IndexError::from(e));
                report.stats = self.end(report.stats);
                return report;
            }
        };

        let mut batcher = self.batcher();
        if let Err(e) = self
            .delta_steps(&mut watermark, &mut batcher, &mut report)
            .await
        {
            batcher.clear();
            warn!(pass_id = %report.stats.pass_id, error = %e, "Delta pass aborted");
            report.stats.record_call_failure(&e);
        }

        self.persist(&watermark, &mut report.stats).await;
        report.stats = self.end(report.stats);
        report
    }

    async fn delta_steps(
        &self,
        watermark: &mut Watermark,
        batcher: &mut Batcher,
        report: &mut PassReport,
    ) -> Result<()> {
        let stats = &mut report.stats;

        let deleted = self
            .source
            .get_deleted_ids(watermark.last_delta_delete_ms)
            .await?;
        watermark.advance_delta_delete(deleted.new_watermark_ms);
        debug!(count = deleted.ids.len(), "Fetched deleted ids");
        self.remove_ids(&deleted.ids, stats, None).await?;

        let limit = self.config.delta_update_indexing_limit;
        let updated = self
            .source
            .get_updated_ids(watermark.last_delta_update_ms, limit)
            .await?;
        watermark.advance_delta_update(updated.new_watermark_ms);
        debug!(count = updated.ids.len(), "Fetched updated ids");

        if updated.ids.len() >= limit {
            info!(
                limit,
                "Delta query hit its limit, a full pass will follow"
            );
            report.needs_full_pass = true;
        }

        self.index_ids(&updated.ids, batcher, stats, None).await
    }

    // ========================================================================
    // Full
    // ========================================================================

    /// Reconcile the whole index against at most `limit` source ids.
    ///
    /// `token` is checked between batches; a cancelled pass keeps the stored
    /// watermark untouched, a failed one still advances it.
    #[instrument(skip_all, fields(kind = "full", limit = limit))]
    pub async fn run_full(&self, limit: usize, token: &CancellationToken) -> PassReport {
        let mut report = PassReport::new(self.begin(PassKind::Full));
        let started_ms = self.clock.unix_timestamp_millis();

        let mut watermark = match self.watermarks.load().await {
            Ok(watermark) => watermark,
            Err(e) => {
                report.stats.record_call_failure(&IndexError::from(e));
                report.stats = self.end(report.stats);
                return report;
            }
        };

        let reached = Watermark {
            last_full_update_ms: started_ms,
            last_delta_update_ms: started_ms,
            last_delta_delete_ms: started_ms,
        };

        let mut batcher = self.batcher();
        match self
            .full_steps(limit, token, &mut batcher, &mut report.stats)
            .await
        {
            Ok(()) => {
                watermark.advance(&reached);
                self.persist(&watermark, &mut report.stats).await;
            }
            Err(IndexError::Cancelled) => {
                batcher.clear();
                info!(pass_id = %report.stats.pass_id, "Full pass cancelled");
                report.stats.mark_cancelled();
            }
            Err(e) => {
                batcher.clear();
                warn!(pass_id = %report.stats.pass_id, error = %e, "Full pass aborted");
                report.stats.record_call_failure(&e);
                watermark.advance(&reached);
                self.persist(&watermark, &mut report.stats).await;
            }
        }

        report.stats = self.end(report.stats);
        report
    }

    async fn full_steps(
        &self,
        limit: usize,
        token: &CancellationToken,
        batcher: &mut Batcher,
        stats: &mut UpdateStats,
    ) -> Result<()> {
        let source_ids = self.source.get_all_ids(limit).await?;
        let index_ids = self.index.list_all_ids().await?;
        debug!(
            source = source_ids.len(),
            index = index_ids.len(),
            "Listed ids for reconciliation"
        );

        let present: HashSet<&str> = source_ids.iter().map(String::as_str).collect();
        let unmatched: Vec<String> = index_ids
            .into_iter()
            .filter(|id| !present.contains(id.as_str()))
            .collect();

        if source_ids.len() >= limit {
            // Best effort: a truncated listing cannot tell stale ids from
            // ids past the limit, so nothing is removed.
            stats.unreconciled_ids = unmatched.len() as u64;
            warn!(
                limit,
                unreconciled = unmatched.len(),
                "Source listing hit the limit, skipping stale id removal"
            );
        } else {
            self.remove_ids(&unmatched, stats, Some(token)).await?;
        }

        self.index_ids(&source_ids, batcher, stats, Some(token)).await
    }

    // ========================================================================
    // Shared steps
    // ========================================================================

    fn batcher(&self) -> Batcher {
        Batcher::new(
            self.index.clone(),
            self.config.diff_batch_size,
            self.config.write_batch_size,
        )
    }

    async fn remove_ids(
        &self,
        ids: &[String],
        stats: &mut UpdateStats,
        token: Option<&CancellationToken>,
    ) -> Result<()> {
        for chunk in ids.chunks(self.config.write_batch_size.max(1)) {
            check_cancelled(token)?;
            let results = self.index.batch_remove(chunk.to_vec()).await?;
            record_removals(chunk, &results, stats);
        }
        Ok(())
    }

    async fn index_ids(
        &self,
        ids: &[String],
        batcher: &mut Batcher,
        stats: &mut UpdateStats,
        token: Option<&CancellationToken>,
    ) -> Result<()> {
        for chunk in ids.chunks(self.config.diff_batch_size.max(1)) {
            check_cancelled(token)?;

            for record in self.source.read_records(chunk).await? {
                match self.builder.build(&record) {
                    Ok(document) => batcher.add(document, stats).await?,
                    Err(e) => {
                        warn!(doc_id = %record.id, error = %e, "Failed to build document");
                        stats.record_update_failure(e.failure_code());
                    }
                }
            }
        }

        check_cancelled(token)?;
        batcher.flush(stats).await
    }

    async fn persist(&self, watermark: &Watermark, stats: &mut UpdateStats) {
        match self.watermarks.persist(watermark).await {
            Ok(()) => debug!(?watermark, "Persisted watermark"),
            Err(e) => {
                error!(error = %e, "Failed to persist watermark");
                stats.failure_codes.insert(e.failure_code());
            }
        }
    }

    // ========================================================================
    // Reporting
    // ========================================================================

    fn begin(&self, kind: PassKind) -> UpdateStats {
        let stats = UpdateStats::new(kind, self.clock.now());
        debug!(pass_id = %stats.pass_id, kind = %kind, "Index pass started");
        self.emit(IndexEvent::PassStarted {
            pass_id: stats.pass_id.to_string(),
            kind: kind.to_string(),
        });
        stats
    }

    fn end(&self, mut stats: UpdateStats) -> UpdateStats {
        stats.finish(self.clock.now());

        let failure_codes: Vec<&str> = stats.failure_codes.iter().map(|c| c.as_str()).collect();
        if stats.has_failures() || !stats.is_completed() {
            warn!(
                pass_id = %stats.pass_id,
                kind = %stats.kind,
                outcome = ?stats.outcome,
                updates_succeeded = stats.updates_succeeded,
                updates_failed = stats.updates_failed,
                updates_skipped = stats.updates_skipped,
                deletes_succeeded = stats.deletes_succeeded,
                deletes_failed = stats.deletes_failed,
                failure_codes = ?failure_codes,
                duration_ms = stats.duration_ms(),
                "Index pass finished with failures"
            );
        } else {
            info!(
                pass_id = %stats.pass_id,
                kind = %stats.kind,
                updates_succeeded = stats.updates_succeeded,
                updates_skipped = stats.updates_skipped,
                deletes_succeeded = stats.deletes_succeeded,
                unreconciled_ids = stats.unreconciled_ids,
                duration_ms = stats.duration_ms(),
                "Index pass finished"
            );
        }

        let pass_id = stats.pass_id.to_string();
        let kind = stats.kind.to_string();
        let summary = stats.summary();
        self.emit(match &stats.outcome {
            PassOutcome::Failed { message } => IndexEvent::PassFailed {
                pass_id,
                kind,
                message: message.clone(),
                stats: summary,
            },
            PassOutcome::Cancelled => IndexEvent::PassFailed {
                pass_id,
                kind,
                message: IndexError::Cancelled.to_string(),
                stats: summary,
            },
            PassOutcome::Running | PassOutcome::Completed => IndexEvent::PassCompleted {
                pass_id,
                kind,
                stats: summary,
            },
        });

        stats
    }

    fn emit(&self, event: IndexEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Index(event)).ok();
        }
    }
}

fn check_cancelled(token: Option<&CancellationToken>) -> Result<()> {
    match token {
        Some(token) if token.is_cancelled() => Err(IndexError::Cancelled),
        _ => Ok(()),
    }
}
