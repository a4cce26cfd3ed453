//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the index sync engine:
//! - `tracing-subscriber` setup for hosts
//! - Indexer configuration
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that `core-index` depends on:
//! configuration validation and event broadcasting. Hosts call
//! [`logging::init_logging`] once at startup to see the engine's `tracing`
//! output.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{IndexerConfig, IndexerConfigBuilder};
pub use error::{Error, Result};
