//! Source Store Abstractions
//!
//! The record store is the source of truth. The engine only ever asks it
//! three questions (what changed, what was deleted, what exists) and reads
//! the raw records it decided to index.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::Document;
use crate::error::Result;

/// Raw record read from the source store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    /// Logical last-modified timestamp in milliseconds
    pub last_updated_ms: i64,
    /// Field name → raw values
    pub fields: BTreeMap<String, Vec<String>>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>, last_updated_ms: i64) -> Self {
        Self {
            id: id.into(),
            last_updated_ms,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

/// Ids reported by a time-filtered query plus the watermark they reach
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedIds {
    /// Ids ordered by change time, oldest first
    pub ids: Vec<String>,
    /// Highest change timestamp actually observed. Equals the `since` value
    /// passed in when nothing changed.
    pub new_watermark_ms: i64,
}

/// Source store query trait
///
/// Implementations wrap the concrete record store (contacts provider, CRM
/// table, ...). Every call may hit the network or disk.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::source::SourceAdapter;
///
/// async fn changed(source: &dyn SourceAdapter, since: i64) -> Result<usize> {
///     let changed = source.get_updated_ids(since, 1000).await?;
///     Ok(changed.ids.len())
/// }
/// ```
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Ids updated strictly after `since_ms`, oldest first, at most `limit`.
    ///
    /// Because ids are ordered by change time, the returned prefix is safe to
    /// index on its own; `new_watermark_ms` is the newest timestamp within
    /// that prefix.
    async fn get_updated_ids(&self, since_ms: i64, limit: usize) -> Result<ChangedIds>;

    /// Ids deleted strictly after `since_ms`.
    async fn get_deleted_ids(&self, since_ms: i64) -> Result<ChangedIds>;

    /// Every id currently present, without time filtering, at most `limit`.
    async fn get_all_ids(&self, limit: usize) -> Result<Vec<String>>;

    /// Raw records for `ids`. Ids deleted in the meantime are simply absent
    /// from the result.
    async fn read_records(&self, ids: &[String]) -> Result<Vec<SourceRecord>>;
}

/// Converts raw records into canonical documents
///
/// Builders must be deterministic: the same record always yields the same
/// properties, otherwise fingerprint dedup never kicks in.
pub trait DocumentBuilder: Send + Sync {
    fn build(&self, record: &SourceRecord) -> Result<Document>;
}
