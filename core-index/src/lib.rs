//! # Core Index
//!
//! Incremental synchronization of a searchable document index with a
//! source-of-truth record store.
//!
//! ## Overview
//!
//! The engine keeps the index consistent with the source without
//! re-indexing everything on every change:
//!
//! - **Delta passes** pick up records changed or deleted since the stored
//!   watermark.
//! - **Full passes** reconcile the complete id sets, removing index entries
//!   whose source record is gone.
//! - **Fingerprints** (SHA-256 over the canonical properties) let unchanged
//!   documents skip the write entirely.
//!
//! All passes run on one serial worker owned by the [`SyncCoordinator`],
//! which also debounces change notifications.
//!
//! ## Components
//!
//! - [`SyncCoordinator`] - Debounced scheduling of delta and full passes
//! - [`PassRunner`] - Executes a single pass and persists the watermark
//! - [`Batcher`] - Two-stage diff/write buffer in front of the index
//! - [`fingerprint`] - Canonical hashing and skip/update/insert decisions
//! - [`FieldDocumentBuilder`] - Field-mapping `DocumentBuilder`
//! - [`UpdateStats`] - Per-pass counters and outcome
//!
//! ## Example
//!
//! ```rust,ignore
//! use core_index::{FieldDocumentBuilder, SyncCoordinator};
//! use core_runtime::config::IndexerConfig;
//! use std::sync::Arc;
//!
//! let builder = FieldDocumentBuilder::new("contacts", "Person")
//!     .contact_point_field("email")
//!     .additional_name_field("nickname");
//!
//! let coordinator = SyncCoordinator::new(
//!     IndexerConfig::default(),
//!     source,
//!     Arc::new(builder),
//!     index,
//!     Arc::new(FileWatermarkStore::new()),
//!     Arc::new(SystemClock),
//!     None,
//! )?;
//!
//! coordinator.start();
//! coordinator.notify_change();
//! coordinator.wait_for_idle().await;
//! ```

pub mod batcher;
pub mod builder;
pub mod coordinator;
pub mod error;
pub mod fingerprint;
pub mod pass;
pub mod stats;

pub use batcher::Batcher;
pub use builder::FieldDocumentBuilder;
pub use coordinator::{DeltaState, SyncCoordinator};
pub use error::{IndexError, Result};
pub use fingerprint::{DiffDecision, FingerprintError, StoredFingerprint};
pub use pass::{PassReport, PassRunner};
pub use stats::{PassId, PassKind, PassOutcome, UpdateStats};
