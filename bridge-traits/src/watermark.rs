//! Sync Watermarks
//!
//! The durable progress marker of the sync engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Timestamps (milliseconds) of the last successful sync steps.
///
/// A value of `0` means the step never happened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watermark {
    pub last_full_update_ms: i64,
    pub last_delta_update_ms: i64,
    pub last_delta_delete_ms: i64,
}

impl Watermark {
    /// Whether a full pass has ever completed.
    pub fn has_full_update(&self) -> bool {
        self.last_full_update_ms > 0
    }

    /// Move every field forward to `other` where `other` is newer.
    pub fn advance(&mut self, other: &Watermark) {
        self.last_full_update_ms = self.last_full_update_ms.max(other.last_full_update_ms);
        self.last_delta_update_ms = self.last_delta_update_ms.max(other.last_delta_update_ms);
        self.last_delta_delete_ms = self.last_delta_delete_ms.max(other.last_delta_delete_ms);
    }

    pub fn advance_delta_update(&mut self, timestamp_ms: i64) {
        self.last_delta_update_ms = self.last_delta_update_ms.max(timestamp_ms);
    }

    pub fn advance_delta_delete(&mut self, timestamp_ms: i64) {
        self.last_delta_delete_ms = self.last_delta_delete_ms.max(timestamp_ms);
    }

    pub fn advance_full_update(&mut self, timestamp_ms: i64) {
        self.last_full_update_ms = self.last_full_update_ms.max(timestamp_ms);
    }
}

/// Durable storage for the watermark
///
/// Persist must be atomic: a crash mid-write leaves either the old or the new
/// value, never a torn one.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Load the stored watermark; a store that was never written yields
    /// `Watermark::default()`.
    async fn load(&self) -> Result<Watermark>;

    async fn persist(&self, watermark: &Watermark) -> Result<()>;
}
