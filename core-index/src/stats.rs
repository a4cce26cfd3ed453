//! # Pass Statistics
//!
//! Identifiers, kinds and per-pass counters of index sync passes.
//!
//! A fresh [`UpdateStats`] is created when a pass starts, filled in while the
//! pass runs on the worker and handed back to the caller once it ends. It is
//! never shared between passes.

use bridge_traits::FailureCode;
use chrono::{DateTime, Utc};
use core_runtime::events::PassSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::IndexError;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for one pass, used to correlate logs and events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PassId(Uuid);

impl PassId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PassId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Kind & Outcome
// ============================================================================

/// Which reconciliation a pass performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    /// Time-filtered pass over ids changed since the watermark
    Delta,
    /// Reconciliation of every source id against every index id
    Full,
}

impl PassKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Delta => "delta",
            PassKind::Full => "full",
        }
    }
}

impl FromStr for PassKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "delta" => Ok(PassKind::Delta),
            "full" => Ok(PassKind::Full),
            _ => Err(format!("unknown pass kind: {}", s)),
        }
    }
}

impl std::fmt::Display for PassKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a pass ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassOutcome {
    /// Still running
    Running,
    /// Ran to the end; per-id failures may still be recorded
    Completed,
    /// Aborted on a call-level failure
    Failed { message: String },
    /// Stopped between batches by its cancellation token
    Cancelled,
}

// ============================================================================
// Update Stats
// ============================================================================

/// Counters of one pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStats {
    pub pass_id: PassId,
    pub kind: PassKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: PassOutcome,
    pub updates_succeeded: u64,
    pub updates_failed: u64,
    /// Documents whose fingerprint matched the indexed copy
    pub updates_skipped: u64,
    pub deletes_succeeded: u64,
    pub deletes_failed: u64,
    /// Index ids a truncated full pass could not check against the source
    pub unreconciled_ids: u64,
    /// Deduplicated failure codes seen during the pass
    pub failure_codes: BTreeSet<FailureCode>,
}

impl UpdateStats {
    pub fn new(kind: PassKind, started_at: DateTime<Utc>) -> Self {
        Self {
            pass_id: PassId::new(),
            kind,
            started_at,
            finished_at: None,
            outcome: PassOutcome::Running,
            updates_succeeded: 0,
            updates_failed: 0,
            updates_skipped: 0,
            deletes_succeeded: 0,
            deletes_failed: 0,
            unreconciled_ids: 0,
            failure_codes: BTreeSet::new(),
        }
    }

    pub fn record_update_failure(&mut self, code: FailureCode) {
        self.updates_failed += 1;
        self.failure_codes.insert(code);
    }

    pub fn record_delete_failure(&mut self, code: FailureCode) {
        self.deletes_failed += 1;
        self.failure_codes.insert(code);
    }

    /// Record a call-level failure that aborted the pass.
    ///
    /// `Unknown` is only added when no more specific code was seen.
    pub fn record_call_failure(&mut self, error: &IndexError) {
        let code = error.failure_code();
        if code != FailureCode::Unknown {
            self.failure_codes.insert(code);
        } else if self.failure_codes.is_empty() {
            self.failure_codes.insert(FailureCode::Unknown);
        }
        self.outcome = PassOutcome::Failed {
            message: error.to_string(),
        };
    }

    pub fn mark_cancelled(&mut self) {
        self.outcome = PassOutcome::Cancelled;
    }

    /// Stamp the end time; a still-running outcome becomes `Completed`.
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
        if self.outcome == PassOutcome::Running {
            self.outcome = PassOutcome::Completed;
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == PassOutcome::Completed
    }

    pub fn has_failures(&self) -> bool {
        self.updates_failed > 0 || self.deletes_failed > 0 || !self.failure_codes.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds().max(0) as u64)
            .unwrap_or(0)
    }

    /// Flattened copy for the event bus.
    pub fn summary(&self) -> PassSummary {
        PassSummary {
            updates_succeeded: self.updates_succeeded,
            updates_failed: self.updates_failed,
            updates_skipped: self.updates_skipped,
            deletes_succeeded: self.deletes_succeeded,
            deletes_failed: self.deletes_failed,
            unreconciled_ids: self.unreconciled_ids,
            failure_codes: self
                .failure_codes
                .iter()
                .map(|code| code.as_str().to_string())
                .collect(),
            duration_ms: self.duration_ms(),
        }
    }
}
