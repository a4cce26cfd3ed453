//! Workspace placeholder crate.
//!
//! Re-exports the sync engine so host applications can depend on
//! `index-sync-workspace` alone. The `desktop-shims` feature additionally
//! exposes the file-backed watermark store and in-memory index from
//! `bridge-desktop`.

pub use core_index::*;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;
