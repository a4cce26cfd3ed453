//! # Index Bridge Traits
//!
//! Contracts between the sync engine and the stores it connects.
//!
//! ## Overview
//!
//! The engine in `core-index` never talks to a concrete record store or index
//! directly. Everything it needs from the outside world is expressed as a
//! trait in this crate, so hosts can plug in their own storage and tests can
//! plug in fakes.
//!
//! ## Traits
//!
//! ### Stores
//! - [`SourceAdapter`](source::SourceAdapter) - Changed, deleted and present ids of the source of truth
//! - [`IndexClient`](index::IndexClient) - Batched put/remove/get/list against the index
//! - [`WatermarkStore`](watermark::WatermarkStore) - Durable sync progress
//!
//! ### Conversion
//! - [`DocumentBuilder`](source::DocumentBuilder) - Raw record to canonical [`Document`](document::Document)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Reference Implementations
//!
//! | Trait | Implementation | Crate |
//! |-------|----------------|-------|
//! | `WatermarkStore` | `FileWatermarkStore` | `bridge-desktop` |
//! | `IndexClient` | `MemoryIndex` | `bridge-desktop` |
//! | `DocumentBuilder` | `FieldDocumentBuilder` | `core-index` |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type.
//! Implementations should convert store-specific errors into it, keeping the
//! [`FailureCode`](index::FailureCode) as precise as possible since the engine
//! aggregates codes per pass.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared with the
//! engine's worker task behind an `Arc`.

pub mod document;
pub mod error;
pub mod index;
pub mod source;
pub mod time;
pub mod watermark;

pub use error::BridgeError;

// Re-export commonly used types
pub use document::{
    Document, Properties, PropertyValue, ADDITIONAL_NAMES_PROPERTY, CONTACT_POINTS_PROPERTY,
    CREATION_TIMESTAMP_FIELD, FINGERPRINT_FIELD,
};
pub use index::{BatchResult, FailureCode, IdPage, IndexClient, IndexFailure, OpResult};
pub use source::{ChangedIds, DocumentBuilder, SourceAdapter, SourceRecord};
pub use time::{Clock, ManualClock, SystemClock};
pub use watermark::{Watermark, WatermarkStore};
