//! # Batcher
//!
//! Two-level buffer between the document builder and the index.
//!
//! ## Overview
//!
//! Built documents first collect in the *diff list*. Once it holds
//! `diff_batch_size` documents, the stored fingerprints of all of them are
//! fetched with a single projected read and every document is run through
//! [`fingerprint::prepare`](crate::fingerprint::prepare). Unchanged documents
//! are counted as skipped; the rest move to the *write list*, which is
//! written with one `batch_put` once it holds `write_batch_size` documents.
//!
//! ```text
//! add ──> [diff list] ──diff round──> [write list] ──batch_put──> index
//!              │                           │
//!              └──── flush drains both ────┘
//! ```
//!
//! Because a whole diff round lands in the write list before the size check,
//! the write list may briefly hold up to `diff_batch_size + write_batch_size - 1`
//! documents.
//!
//! All methods take `&mut self` and are awaited in sequence by the pass that
//! owns the batcher, so at most one diff-then-write pipeline is in flight.

use bridge_traits::{
    BatchResult, Document, FailureCode, IndexClient, CREATION_TIMESTAMP_FIELD, FINGERPRINT_FIELD,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::fingerprint::{self, StoredFingerprint};
use crate::stats::UpdateStats;

/// Fields fetched for each diff round.
const DIFF_PROJECTION: &[&str] = &[FINGERPRINT_FIELD, CREATION_TIMESTAMP_FIELD];

pub struct Batcher {
    index: Arc<dyn IndexClient>,
    diff_batch_size: usize,
    write_batch_size: usize,
    pending: Vec<Document>,
    ready: Vec<Document>,
    diff_rounds: usize,
}

impl Batcher {
    pub fn new(index: Arc<dyn IndexClient>, diff_batch_size: usize, write_batch_size: usize) -> Self {
        let diff_batch_size = diff_batch_size.max(1);
        let write_batch_size = write_batch_size.max(1);
        Self {
            index,
            diff_batch_size,
            write_batch_size,
            pending: Vec::with_capacity(diff_batch_size),
            ready: Vec::with_capacity(diff_batch_size + write_batch_size),
            diff_rounds: 0,
        }
    }

    /// Documents waiting for a diff round.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Changed documents waiting to be written.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    /// Diff rounds performed since construction.
    pub fn diff_rounds(&self) -> usize {
        self.diff_rounds
    }

    /// Buffer a document, running a diff round and a write when the
    /// respective thresholds are reached.
    ///
    /// A call-level index failure is returned as is; the buffered documents
    /// are left in place for the caller to [`clear`](Self::clear).
    pub async fn add(&mut self, document: Document, stats: &mut UpdateStats) -> Result<()> {
        self.pending.push(document);

        if self.pending.len() >= self.diff_batch_size {
            self.diff_pending(stats).await?;

            if self.ready.len() >= self.write_batch_size {
                self.write_ready(stats).await?;
            }
        }

        Ok(())
    }

    /// Diff and write everything buffered, regardless of thresholds.
    pub async fn flush(&mut self, stats: &mut UpdateStats) -> Result<()> {
        if !self.pending.is_empty() {
            self.diff_pending(stats).await?;
        }
        if !self.ready.is_empty() {
            self.write_ready(stats).await?;
        }
        Ok(())
    }

    /// Drop everything buffered.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() || !self.ready.is_empty() {
            debug!(
                pending = self.pending.len(),
                ready = self.ready.len(),
                "Discarding buffered documents"
            );
        }
        self.pending.clear();
        self.ready.clear();
    }

    async fn diff_pending(&mut self, stats: &mut UpdateStats) -> Result<()> {
        let ids: Vec<String> = self.pending.iter().map(|doc| doc.id.clone()).collect();
        let stored = self.index.get_by_id_projected(&ids, DIFF_PROJECTION).await?;
        self.diff_rounds += 1;

        let stored = match_stored(&ids, stored);
        let mut skipped = 0u64;

        for mut document in self.pending.drain(..) {
            let previous = stored.get(&document.id).cloned();
            if fingerprint::prepare(&mut document, previous).needs_write() {
                self.ready.push(document);
            } else {
                skipped += 1;
            }
        }

        stats.updates_skipped += skipped;
        debug!(
            round = self.diff_rounds,
            checked = ids.len(),
            skipped,
            ready = self.ready.len(),
            "Diff round complete"
        );
        Ok(())
    }

    async fn write_ready(&mut self, stats: &mut UpdateStats) -> Result<()> {
        let documents = std::mem::take(&mut self.ready);
        let ids: Vec<String> = documents.iter().map(|doc| doc.id.clone()).collect();
        let results = self.index.batch_put(documents).await?;

        for id in &ids {
            match results.get(id) {
                Some(Ok(())) => stats.updates_succeeded += 1,
                Some(Err(failure)) => {
                    warn!(doc_id = %id, code = %failure.code, "Index write failed: {}", failure.message);
                    stats.record_update_failure(failure.code);
                }
                None => {
                    warn!(doc_id = %id, "Index returned no result for document");
                    stats.record_update_failure(FailureCode::Unknown);
                }
            }
        }

        debug!(written = ids.len(), "Wrote batch to index");
        Ok(())
    }
}

/// Pair each requested id with its stored fingerprint.
///
/// Slots are positional. When the index returns the wrong number of slots
/// the positions are not trusted and returned documents are matched by id
/// instead; ids left without a match are written as new.
fn match_stored(
    ids: &[String],
    stored: Vec<Option<Document>>,
) -> HashMap<String, StoredFingerprint> {
    if stored.len() == ids.len() {
        return ids
            .iter()
            .zip(stored)
            .filter_map(|(id, slot)| slot.map(|doc| (id.clone(), StoredFingerprint::from(doc))))
            .collect();
    }

    let matched: HashMap<String, StoredFingerprint> = stored
        .into_iter()
        .flatten()
        .map(|doc| (doc.id.clone(), StoredFingerprint::from(doc)))
        .collect();
    warn!(
        requested = ids.len(),
        matched = matched.len(),
        "Projected read returned a mismatched number of slots, matching by id"
    );
    matched
}

/// Tally a `batch_remove` result into `stats`.
pub(crate) fn record_removals(ids: &[String], results: &BatchResult, stats: &mut UpdateStats) {
    for id in ids {
        match results.get(id) {
            Some(Ok(())) => stats.deletes_succeeded += 1,
            Some(Err(failure)) => {
                warn!(doc_id = %id, code = %failure.code, "Index removal failed: {}", failure.message);
                stats.record_delete_failure(failure.code);
            }
            None => stats.record_delete_failure(FailureCode::Unknown),
        }
    }
}
