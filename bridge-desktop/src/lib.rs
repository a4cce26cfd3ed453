//! # Desktop Bridge Implementations
//!
//! Default implementations of the index bridge traits for desktop hosts
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `WatermarkStore` as an atomically replaced JSON file using `tokio::fs`
//! - `IndexClient` as an ordered in-memory map with paginated id listing
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileWatermarkStore, MemoryIndex};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let watermarks = Arc::new(FileWatermarkStore::new());
//!     let index = Arc::new(MemoryIndex::new());
//!
//!     // Hand both to the sync coordinator
//! }
//! ```

mod memory_index;
mod watermark_store;

pub use memory_index::MemoryIndex;
pub use watermark_store::FileWatermarkStore;
