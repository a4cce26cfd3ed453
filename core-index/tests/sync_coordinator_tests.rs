//! Integration tests for the sync coordinator
//!
//! These tests drive the whole engine against an in-memory index, a file
//! watermark store and a scripted source:
//! - Fingerprint skip and creation timestamp stability
//! - Full reconciliation of stale and missing ids
//! - Debounce coalescing of change notifications
//! - Watermark advancement after partial and call-level failures
//! - First-run, reset, size-limit fallback and periodic full passes
//! - Cancellation and shutdown

use async_trait::async_trait;
use bridge_desktop::{FileWatermarkStore, MemoryIndex};
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    ChangedIds, FailureCode, ManualClock, PropertyValue, SourceAdapter, SourceRecord, Watermark,
    WatermarkStore,
};
use core_async::sync::{CancellationToken, Notify};
use core_index::{DeltaState, FieldDocumentBuilder, IndexError, PassOutcome, SyncCoordinator};
use core_runtime::config::IndexerConfig;
use core_runtime::events::{CoreEvent, EventBus, IndexEvent, PassSummary, Receiver};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Scripted Source
// ============================================================================

#[derive(Default)]
struct SourceState {
    records: BTreeMap<String, SourceRecord>,
    deleted: Vec<(String, i64)>,
    fail_updates: bool,
    updated_calls: usize,
}

/// Blocks `get_updated_ids` until released, while `blocking` is set.
#[derive(Default)]
struct Gate {
    blocking: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[derive(Default)]
struct ScriptedSource {
    state: Mutex<SourceState>,
    gate: Gate,
}

impl ScriptedSource {
    fn upsert(&self, record: SourceRecord) {
        let mut state = self.state.lock().unwrap();
        state.records.insert(record.id.clone(), record);
    }

    /// Delete `id` and log the deletion at `timestamp_ms`.
    fn delete(&self, id: &str, timestamp_ms: i64) {
        let mut state = self.state.lock().unwrap();
        state.records.remove(id);
        state.deleted.push((id.to_string(), timestamp_ms));
    }

    /// Drop `id` without a deletion log entry, as if the log was lost.
    fn forget(&self, id: &str) {
        self.state.lock().unwrap().records.remove(id);
    }

    fn fail_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_updates = fail;
    }

    fn updated_calls(&self) -> usize {
        self.state.lock().unwrap().updated_calls
    }

    fn block_updates(&self, block: bool) {
        self.gate.blocking.store(block, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    async fn get_updated_ids(&self, since_ms: i64, limit: usize) -> BridgeResult<ChangedIds> {
        let changed = {
            let mut state = self.state.lock().unwrap();
            state.updated_calls += 1;
            if state.fail_updates {
                return Err(BridgeError::SourceUnavailable("records offline".into()));
            }

            let mut changed: Vec<(i64, String)> = state
                .records
                .values()
                .filter(|record| record.last_updated_ms > since_ms)
                .map(|record| (record.last_updated_ms, record.id.clone()))
                .collect();
            changed.sort();
            changed.truncate(limit);
            changed
        };

        if self.gate.blocking.load(Ordering::SeqCst) {
            self.gate.entered.notify_one();
            self.gate.release.notified().await;
        }

        Ok(ChangedIds {
            new_watermark_ms: changed.last().map_or(since_ms, |(ts, _)| *ts),
            ids: changed.into_iter().map(|(_, id)| id).collect(),
        })
    }

    async fn get_deleted_ids(&self, since_ms: i64) -> BridgeResult<ChangedIds> {
        let state = self.state.lock().unwrap();
        let deleted: Vec<&(String, i64)> = state
            .deleted
            .iter()
            .filter(|(_, ts)| *ts > since_ms)
            .collect();

        Ok(ChangedIds {
            new_watermark_ms: deleted.iter().map(|(_, ts)| *ts).max().unwrap_or(since_ms),
            ids: deleted.into_iter().map(|(id, _)| id.clone()).collect(),
        })
    }

    async fn get_all_ids(&self, limit: usize) -> BridgeResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        Ok(state.records.keys().take(limit).cloned().collect())
    }

    async fn read_records(&self, ids: &[String]) -> BridgeResult<Vec<SourceRecord>> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| state.records.get(id).cloned())
            .collect())
    }
}

// ============================================================================
// Harness
// ============================================================================

struct TempDir(PathBuf);

impl TempDir {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("index-sync-test-{}", uuid::Uuid::new_v4())))
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}

struct Harness {
    source: Arc<ScriptedSource>,
    index: Arc<MemoryIndex>,
    watermarks: Arc<FileWatermarkStore>,
    clock: Arc<ManualClock>,
    events: Receiver<CoreEvent>,
    coordinator: SyncCoordinator,
    _dir: TempDir,
}

impl Harness {
    fn new(config: IndexerConfig) -> Self {
        let dir = TempDir::new();
        let source = Arc::new(ScriptedSource::default());
        let index = Arc::new(MemoryIndex::with_page_size(2));
        let watermarks = Arc::new(FileWatermarkStore::with_path(dir.0.join("watermark.json")));
        let clock = Arc::new(ManualClock::new(1_000));
        let event_bus = Arc::new(EventBus::new(256));
        let events = event_bus.subscribe();

        let builder = FieldDocumentBuilder::new("contacts", "Person")
            .contact_point_field("email")
            .additional_name_field("nickname");

        let coordinator = SyncCoordinator::new(
            config,
            source.clone(),
            Arc::new(builder),
            index.clone(),
            watermarks.clone(),
            clock.clone(),
            Some(event_bus),
        )
        .unwrap();

        Self {
            source,
            index,
            watermarks,
            clock,
            events,
            coordinator,
            _dir: dir,
        }
    }

    async fn watermark(&self) -> Watermark {
        self.watermarks.load().await.unwrap()
    }

    /// Seed a watermark that records a completed full pass at `ms`.
    async fn seed_watermark(&self, ms: i64) {
        self.watermarks
            .persist(&Watermark {
                last_full_update_ms: ms,
                last_delta_update_ms: ms,
                last_delta_delete_ms: ms,
            })
            .await
            .unwrap();
    }

    async fn full_pass(&self) -> core_index::UpdateStats {
        self.coordinator
            .run_full_update(CancellationToken::new())
            .await
            .unwrap()
    }

    async fn notify_and_wait(&self) {
        self.coordinator.notify_change();
        self.coordinator.wait_for_idle().await;
    }

    fn drain_events(&mut self) -> Vec<IndexEvent> {
        let mut events = Vec::new();
        while let Ok(CoreEvent::Index(event)) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn started_kinds(&mut self) -> Vec<String> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                IndexEvent::PassStarted { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }
}

fn config() -> IndexerConfig {
    IndexerConfig::builder()
        .diff_batch_size(2)
        .write_batch_size(2)
        .first_run_indexing_limit(100)
        .full_update_indexing_limit(1_000)
        .delta_update_indexing_limit(100)
        .full_update_interval(Duration::from_secs(60 * 60))
        .build()
        .unwrap()
}

fn record(id: &str, updated_ms: i64, name: &str) -> SourceRecord {
    SourceRecord::new(id, updated_ms)
        .with_field("name", [name])
        .with_field("email", [format!("{}@example.com", id)])
}

fn last_summary(events: &[IndexEvent]) -> Option<(bool, PassSummary)> {
    events.iter().rev().find_map(|event| match event {
        IndexEvent::PassCompleted { stats, .. } => Some((true, stats.clone())),
        IndexEvent::PassFailed { stats, .. } => Some((false, stats.clone())),
        _ => None,
    })
}

// ============================================================================
// Fingerprints
// ============================================================================

#[core_async::test]
async fn test_unchanged_documents_are_not_rewritten() {
    let h = Harness::new(config());
    for (id, name) in [("a", "Ada"), ("b", "Barbara"), ("c", "Claude")] {
        h.source.upsert(record(id, 100, name));
    }

    let first = h.full_pass().await;
    assert!(first.is_completed());
    assert_eq!(first.updates_succeeded, 3);
    assert_eq!(h.index.len(), 3);

    h.index.clear_calls();
    let second = h.full_pass().await;

    assert!(second.is_completed());
    assert_eq!(second.updates_skipped, 3);
    assert_eq!(second.updates_succeeded, 0);
    assert!(h.index.put_calls().is_empty());
}

#[core_async::test]
async fn test_creation_timestamp_survives_reindex() {
    let h = Harness::new(config());
    h.source.upsert(record("a", 100, "Ada"));
    h.full_pass().await;
    assert_eq!(h.index.get("a").unwrap().creation_timestamp_ms, 100);

    h.clock.set_millis(5_000);
    h.source.upsert(record("a", 2_000, "Ada King"));
    h.notify_and_wait().await;

    let doc = h.index.get("a").unwrap();
    assert_eq!(doc.creation_timestamp_ms, 100);
    assert_eq!(doc.properties["name"], vec![PropertyValue::from("Ada King")]);
    assert_eq!(doc.score, 2);

    // Touched but unchanged: no write at all.
    h.index.clear_calls();
    h.source.upsert(record("a", 3_000, "Ada King"));
    h.notify_and_wait().await;

    assert!(!h.index.was_put("a"));
    assert_eq!(h.index.get("a").unwrap().creation_timestamp_ms, 100);
    assert_eq!(h.watermark().await.last_delta_update_ms, 3_000);
}

// ============================================================================
// Full reconciliation
// ============================================================================

#[core_async::test]
async fn test_full_pass_reconciles_id_sets() {
    let h = Harness::new(config());
    for id in ["a", "b", "c"] {
        h.source.upsert(record(id, 100, id));
    }
    h.full_pass().await;
    assert_eq!(h.index.ids(), vec!["a", "b", "c"]);

    h.source.forget("a");
    h.source.upsert(record("d", 100, "d"));
    h.index.clear_calls();

    let stats = h.full_pass().await;

    assert_eq!(h.index.ids(), vec!["b", "c", "d"]);
    assert_eq!(h.index.remove_calls(), vec![vec!["a".to_string()]]);
    assert_eq!(h.index.put_calls(), vec![vec!["d".to_string()]]);
    assert_eq!(stats.deletes_succeeded, 1);
    assert_eq!(stats.updates_succeeded, 1);
    assert_eq!(stats.updates_skipped, 2);
}

#[core_async::test]
async fn test_full_pass_advances_all_watermarks_to_start_time() {
    let h = Harness::new(config());
    h.source.upsert(record("a", 100, "Ada"));
    h.clock.set_millis(42_000);

    h.full_pass().await;

    assert_eq!(
        h.watermark().await,
        Watermark {
            last_full_update_ms: 42_000,
            last_delta_update_ms: 42_000,
            last_delta_delete_ms: 42_000,
        }
    );
}

// ============================================================================
// Delta passes
// ============================================================================

#[core_async::test]
async fn test_delta_pass_applies_deletes_then_updates() {
    let h = Harness::new(config());
    h.source.upsert(record("a", 100, "Ada"));
    h.source.upsert(record("b", 100, "Barbara"));
    h.full_pass().await;

    h.source.delete("a", 1_500);
    h.source.upsert(record("c", 1_600, "Claude"));
    h.notify_and_wait().await;

    assert_eq!(h.index.ids(), vec!["b", "c"]);
    let watermark = h.watermark().await;
    assert_eq!(watermark.last_delta_delete_ms, 1_500);
    assert_eq!(watermark.last_delta_update_ms, 1_600);
    assert_eq!(watermark.last_full_update_ms, 1_000);
}

#[core_async::test]
async fn test_notifications_while_scheduled_coalesce() {
    let h = Harness::new(config());
    h.seed_watermark(1_000).await;

    for _ in 0..5 {
        h.coordinator.notify_change();
    }
    assert_eq!(h.coordinator.delta_state(), DeltaState::Scheduled);
    assert_eq!(h.coordinator.queued_jobs(), 1);

    h.coordinator.wait_for_idle().await;

    assert_eq!(h.source.updated_calls(), 1);
    assert_eq!(h.coordinator.delta_state(), DeltaState::Idle);
}

#[core_async::test]
async fn test_notifications_while_running_trigger_one_more_pass() {
    let h = Harness::new(config());
    h.seed_watermark(1_000).await;
    h.source.upsert(record("a", 1_500, "Ada"));

    h.source.block_updates(true);
    h.coordinator.notify_change();
    h.source.gate.entered.notified().await;
    assert_eq!(h.coordinator.delta_state(), DeltaState::Running);

    h.source.upsert(record("b", 1_600, "Barbara"));
    for _ in 0..10 {
        h.coordinator.notify_change();
    }
    assert_eq!(h.coordinator.delta_state(), DeltaState::Running);

    h.source.block_updates(false);
    h.source.gate.release.notify_one();
    h.coordinator.wait_for_idle().await;

    assert_eq!(h.source.updated_calls(), 2);
    assert_eq!(h.coordinator.delta_state(), DeltaState::Idle);
    assert_eq!(h.index.ids(), vec!["a", "b"]);
}

#[core_async::test]
async fn test_truncated_delta_falls_back_to_full_pass() {
    let config = IndexerConfig::builder()
        .diff_batch_size(2)
        .write_batch_size(2)
        .delta_update_indexing_limit(2)
        .build()
        .unwrap();
    let mut h = Harness::new(config);
    h.seed_watermark(1_000).await;
    h.clock.set_millis(10_000);
    for i in 1..=5 {
        h.source.upsert(record(&format!("r{}", i), 1_000 + i * 100, "x"));
    }

    h.notify_and_wait().await;

    assert_eq!(h.started_kinds(), vec!["delta", "full"]);
    assert_eq!(h.index.len(), 5);
    assert_eq!(h.watermark().await.last_full_update_ms, 10_000);
}

// ============================================================================
// Failures
// ============================================================================

#[core_async::test]
async fn test_watermark_moves_forward_after_partial_failure() {
    let mut h = Harness::new(config());
    h.seed_watermark(1_000).await;
    h.source.upsert(record("x", 1_500, "Xavier"));
    h.source.upsert(record("y", 1_600, "Yvonne"));
    h.index.fail_put("x", FailureCode::OutOfSpace);

    h.notify_and_wait().await;

    assert_eq!(h.watermark().await.last_delta_update_ms, 1_600);
    assert!(h.index.get("x").is_none());
    assert!(h.index.get("y").is_some());

    let (completed, summary) = last_summary(&h.drain_events()).unwrap();
    assert!(completed);
    assert_eq!(summary.updates_failed, 1);
    assert_eq!(summary.updates_succeeded, 1);
    assert_eq!(summary.failure_codes, vec!["out_of_space"]);

    // A call-level failure aborts the pass but still advances the watermark.
    h.source.upsert(record("z", 1_700, "Zoe"));
    h.index.fail_next_call(FailureCode::Io);
    h.notify_and_wait().await;

    assert_eq!(h.watermark().await.last_delta_update_ms, 1_700);
    assert!(h.index.get("z").is_none());
    let (completed, summary) = last_summary(&h.drain_events()).unwrap();
    assert!(!completed);
    assert_eq!(summary.failure_codes, vec!["io"]);

    // Nothing new: the watermark stays put.
    h.notify_and_wait().await;
    assert_eq!(h.watermark().await.last_delta_update_ms, 1_700);
}

#[core_async::test]
async fn test_source_failure_is_recorded() {
    let mut h = Harness::new(config());
    h.seed_watermark(1_000).await;
    h.source.upsert(record("a", 100, "Ada"));
    h.source.delete("gone", 1_200);
    h.source.fail_updates(true);

    h.notify_and_wait().await;

    let (completed, summary) = last_summary(&h.drain_events()).unwrap();
    assert!(!completed);
    assert_eq!(summary.failure_codes, vec!["source_unavailable"]);
    assert_eq!(summary.deletes_succeeded, 1);

    let watermark = h.watermark().await;
    assert_eq!(watermark.last_delta_delete_ms, 1_200);
    assert_eq!(watermark.last_delta_update_ms, 1_000);
}

// ============================================================================
// First run, reset, periodic full passes
// ============================================================================

#[core_async::test]
async fn test_start_runs_first_run_pass_once() {
    let config = IndexerConfig::builder()
        .first_run_indexing_limit(3)
        .build()
        .unwrap();
    let mut h = Harness::new(config);
    h.index
        .insert(bridge_traits::Document::new("contacts", "Person", "zz-stale"));
    for i in 0..5 {
        h.source.upsert(record(&format!("r{}", i), 100, "x"));
    }

    assert!(h.coordinator.start());
    h.coordinator.wait_for_idle().await;

    // Listing hit the limit: indexed the first three, removed nothing.
    assert_eq!(h.index.ids(), vec!["r0", "r1", "r2", "zz-stale"]);
    assert_eq!(h.watermark().await.last_full_update_ms, 1_000);

    assert!(h.coordinator.start());
    h.coordinator.wait_for_idle().await;
    assert_eq!(h.started_kinds(), vec!["full"]);
}

#[core_async::test]
async fn test_truncated_full_pass_counts_unreconciled_ids() {
    let config = IndexerConfig::builder()
        .first_run_indexing_limit(3)
        .full_update_indexing_limit(3)
        .build()
        .unwrap();
    let mut h = Harness::new(config);
    h.index
        .insert(bridge_traits::Document::new("contacts", "Person", "r4"));
    h.index
        .insert(bridge_traits::Document::new("contacts", "Person", "zz-stale"));
    for i in 0..5 {
        h.source.upsert(record(&format!("r{}", i), 100, "x"));
    }

    let stats = h.full_pass().await;

    assert!(stats.is_completed());
    assert_eq!(stats.unreconciled_ids, 2);
    assert_eq!(stats.deletes_succeeded, 0);
    assert!(h.index.get("zz-stale").is_some());

    let (completed, summary) = last_summary(&h.drain_events()).unwrap();
    assert!(completed);
    assert_eq!(summary.unreconciled_ids, 2);
}

#[core_async::test]
async fn test_change_before_any_full_update_runs_full_pass() {
    let mut h = Harness::new(config());
    h.source.upsert(record("a", 100, "Ada"));

    h.notify_and_wait().await;

    assert_eq!(h.started_kinds(), vec!["full"]);
    assert!(h.index.get("a").is_some());
    assert!(h.watermark().await.has_full_update());
}

#[core_async::test]
async fn test_reset_watermarks_forces_full_pass() {
    let mut h = Harness::new(config());
    h.source.upsert(record("a", 100, "Ada"));
    h.full_pass().await;
    h.drain_events();

    h.coordinator.reset_watermarks().await.unwrap();
    assert_eq!(h.watermark().await, Watermark::default());
    assert!(h
        .drain_events()
        .contains(&IndexEvent::WatermarksReset));

    h.clock.set_millis(2_000);
    h.notify_and_wait().await;

    assert_eq!(h.started_kinds(), vec!["full"]);
    assert_eq!(h.watermark().await.last_full_update_ms, 2_000);
}

#[core_async::test]
async fn test_full_update_runs_only_when_due() {
    let mut h = Harness::new(config());
    h.source.upsert(record("a", 100, "Ada"));
    h.full_pass().await;
    h.drain_events();

    let interval = h.coordinator.config().full_update_interval_ms();
    h.clock.set_millis(1_000 + interval - 1);
    assert!(h.coordinator.schedule_full_update_if_due());
    h.coordinator.wait_for_idle().await;
    assert!(h.started_kinds().is_empty());

    h.clock.set_millis(1_000 + interval);
    assert!(h.coordinator.schedule_full_update_if_due());
    h.coordinator.wait_for_idle().await;

    assert_eq!(h.started_kinds(), vec!["full"]);
    assert_eq!(h.watermark().await.last_full_update_ms, 1_000 + interval);
}

// ============================================================================
// Cancellation & shutdown
// ============================================================================

#[core_async::test]
async fn test_cancelled_full_pass_leaves_watermark() {
    let h = Harness::new(config());
    h.source.upsert(record("a", 100, "Ada"));

    let token = CancellationToken::new();
    token.cancel();
    let stats = h.coordinator.run_full_update(token).await.unwrap();

    assert_eq!(stats.outcome, PassOutcome::Cancelled);
    assert!(h.index.is_empty());
    assert_eq!(h.watermark().await, Watermark::default());
}

#[core_async::test]
async fn test_failed_full_pass_still_advances_watermark() {
    let mut h = Harness::new(config());
    h.clock.set_millis(5_000);
    h.source.upsert(record("a", 100, "Ada"));
    h.index.fail_next_call(FailureCode::Io);

    // First-run full pass, aborted by the failing put.
    h.notify_and_wait().await;

    let events = h.drain_events();
    let (completed, summary) = last_summary(&events).unwrap();
    assert!(!completed);
    assert_eq!(summary.failure_codes, vec!["io"]);
    assert!(h.index.is_empty());
    assert_eq!(
        h.watermark().await,
        Watermark {
            last_full_update_ms: 5_000,
            last_delta_update_ms: 5_000,
            last_delta_delete_ms: 5_000,
        }
    );

    // The next change runs a delta pass rather than repeating the full pass.
    h.clock.set_millis(6_000);
    h.source.upsert(record("b", 5_500, "Barbara"));
    h.notify_and_wait().await;

    assert_eq!(h.started_kinds(), vec!["delta"]);
    assert!(h.index.get("b").is_some());
    assert_eq!(h.watermark().await.last_full_update_ms, 5_000);
}

#[core_async::test]
async fn test_enqueue_after_shutdown_is_noop() {
    let h = Harness::new(config());
    h.coordinator.shutdown().await;

    h.coordinator.notify_change();
    assert_eq!(h.coordinator.delta_state(), DeltaState::Idle);
    assert_eq!(h.coordinator.queued_jobs(), 0);
    assert!(!h.coordinator.start());
    assert!(!h
        .coordinator
        .schedule_full_update(CancellationToken::new()));

    let result = h.coordinator.run_full_update(CancellationToken::new()).await;
    assert!(matches!(result, Err(IndexError::WorkerClosed)));
    assert!(h.coordinator.reset_watermarks().await.is_err());

    h.coordinator.wait_for_idle().await;
}
