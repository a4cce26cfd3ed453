//! # Indexer Configuration Module
//!
//! Tunables for the index sync engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `IndexerConfig`. Every field has a default, so an empty builder yields a
//! usable configuration; `build()` validates the result and fails fast on
//! incoherent values.
//!
//! | Field | Default |
//! |-------|---------|
//! | `diff_batch_size` | 50 |
//! | `write_batch_size` | 50 |
//! | `first_run_indexing_limit` | 1 000 |
//! | `full_update_interval` | 30 days |
//! | `full_update_indexing_limit` | 10 000 |
//! | `delta_update_indexing_limit` | 1 000 |
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::IndexerConfig;
//! use std::time::Duration;
//!
//! let config = IndexerConfig::builder()
//!     .diff_batch_size(25)
//!     .full_update_interval(Duration::from_secs(7 * 24 * 60 * 60))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.write_batch_size, 50);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::IndexerConfig;
//!
//! let config = IndexerConfig::builder()
//!     .write_batch_size(0)
//!     .build()
//!     .expect("Should fail - zero batch size");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_DIFF_BATCH_SIZE: usize = 50;
pub const DEFAULT_WRITE_BATCH_SIZE: usize = 50;
pub const DEFAULT_FIRST_RUN_INDEXING_LIMIT: usize = 1_000;
pub const DEFAULT_FULL_UPDATE_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const DEFAULT_FULL_UPDATE_INDEXING_LIMIT: usize = 10_000;
pub const DEFAULT_DELTA_UPDATE_INDEXING_LIMIT: usize = 1_000;

/// Upper bound for either batch size; index stores reject larger batches.
const MAX_BATCH_SIZE: usize = 10_000;

/// Configuration for the sync coordinator and its batcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Documents buffered before their stored fingerprints are fetched
    pub diff_batch_size: usize,

    /// Changed documents buffered before they are written to the index
    pub write_batch_size: usize,

    /// Maximum documents indexed by the very first pass (or after a reset)
    pub first_run_indexing_limit: usize,

    /// Minimum time between periodic full passes
    pub full_update_interval: Duration,

    /// Maximum source ids listed by a full pass
    pub full_update_indexing_limit: usize,

    /// Maximum changed ids processed by one delta pass
    pub delta_update_indexing_limit: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            diff_batch_size: DEFAULT_DIFF_BATCH_SIZE,
            write_batch_size: DEFAULT_WRITE_BATCH_SIZE,
            first_run_indexing_limit: DEFAULT_FIRST_RUN_INDEXING_LIMIT,
            full_update_interval: DEFAULT_FULL_UPDATE_INTERVAL,
            full_update_indexing_limit: DEFAULT_FULL_UPDATE_INDEXING_LIMIT,
            delta_update_indexing_limit: DEFAULT_DELTA_UPDATE_INDEXING_LIMIT,
        }
    }
}

impl IndexerConfig {
    /// Creates a new builder seeded with the defaults.
    pub fn builder() -> IndexerConfigBuilder {
        IndexerConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Batch sizes are non-zero and at most 10 000
    /// - Every indexing limit is non-zero
    /// - The first-run limit does not exceed the full-update limit
    /// - The full-update interval is non-zero
    pub fn validate(&self) -> Result<()> {
        for (name, size) in [
            ("Diff batch size", self.diff_batch_size),
            ("Write batch size", self.write_batch_size),
        ] {
            if size == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
            if size > MAX_BATCH_SIZE {
                return Err(Error::Config(format!(
                    "{} exceeds maximum of {}",
                    name, MAX_BATCH_SIZE
                )));
            }
        }

        for (name, limit) in [
            ("First-run indexing limit", self.first_run_indexing_limit),
            ("Full update indexing limit", self.full_update_indexing_limit),
            ("Delta update indexing limit", self.delta_update_indexing_limit),
        ] {
            if limit == 0 {
                return Err(Error::Config(format!("{} must be greater than 0", name)));
            }
        }

        if self.first_run_indexing_limit > self.full_update_indexing_limit {
            return Err(Error::Config(format!(
                "First-run indexing limit ({}) cannot exceed the full update indexing limit ({})",
                self.first_run_indexing_limit, self.full_update_indexing_limit
            )));
        }

        if self.full_update_interval.is_zero() {
            return Err(Error::Config(
                "Full update interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Full update interval in milliseconds, saturating at `i64::MAX`.
    pub fn full_update_interval_ms(&self) -> i64 {
        i64::try_from(self.full_update_interval.as_millis()).unwrap_or(i64::MAX)
    }
}

#[derive(Default)]
pub struct IndexerConfigBuilder {
    diff_batch_size: Option<usize>,
    write_batch_size: Option<usize>,
    first_run_indexing_limit: Option<usize>,
    full_update_interval: Option<Duration>,
    full_update_indexing_limit: Option<usize>,
    delta_update_indexing_limit: Option<usize>,
}

impl IndexerConfigBuilder {
    /// Sets how many documents are buffered before a diff round.
    ///
    /// Default: 50
    pub fn diff_batch_size(mut self, size: usize) -> Self {
        self.diff_batch_size = Some(size);
        self
    }

    /// Sets how many changed documents are buffered before an index write.
    ///
    /// Default: 50
    pub fn write_batch_size(mut self, size: usize) -> Self {
        self.write_batch_size = Some(size);
        self
    }

    pub fn first_run_indexing_limit(mut self, limit: usize) -> Self {
        self.first_run_indexing_limit = Some(limit);
        self
    }

    /// Sets the minimum time between periodic full passes.
    ///
    /// Default: 30 days
    pub fn full_update_interval(mut self, interval: Duration) -> Self {
        self.full_update_interval = Some(interval);
        self
    }

    pub fn full_update_indexing_limit(mut self, limit: usize) -> Self {
        self.full_update_indexing_limit = Some(limit);
        self
    }

    pub fn delta_update_indexing_limit(mut self, limit: usize) -> Self {
        self.delta_update_indexing_limit = Some(limit);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<IndexerConfig> {
        let config = IndexerConfig {
            diff_batch_size: self.diff_batch_size.unwrap_or(DEFAULT_DIFF_BATCH_SIZE),
            write_batch_size: self.write_batch_size.unwrap_or(DEFAULT_WRITE_BATCH_SIZE),
            first_run_indexing_limit: self
                .first_run_indexing_limit
                .unwrap_or(DEFAULT_FIRST_RUN_INDEXING_LIMIT),
            full_update_interval: self
                .full_update_interval
                .unwrap_or(DEFAULT_FULL_UPDATE_INTERVAL),
            full_update_indexing_limit: self
                .full_update_indexing_limit
                .unwrap_or(DEFAULT_FULL_UPDATE_INDEXING_LIMIT),
            delta_update_indexing_limit: self
                .delta_update_indexing_limit
                .unwrap_or(DEFAULT_DELTA_UPDATE_INDEXING_LIMIT),
        };

        // Validate the configuration
        config.validate()?;

        Ok(config)
    }
}
