//! # Logging
//!
//! `tracing-subscriber` setup for hosts that embed the index sync engine.
//!
//! The engine only emits `tracing` events. Pass start and finish are logged
//! at `info` (or `warn` when the pass recorded failures), per-document index
//! failures at `warn`, watermark persistence failures at `error` and diff or
//! write rounds at `debug`. Every delta and full pass runs inside its own
//! span.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use tracing::Level;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Json)
//!         .with_level(Level::DEBUG)
//!         .with_pass_spans(true),
//! )?;
//! ```
//!
//! ## Filtering
//!
//! The first of these wins:
//! 1. [`LoggingConfig::filter`]
//! 2. The `RUST_LOG` environment variable
//! 3. [`LoggingConfig::default_directives`]: workspace crates at the
//!    configured level, everything else at `warn`

use crate::error::{Error, Result};
use std::io;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Targets the default filter opens up to the configured level.
const WORKSPACE_TARGETS: &[&str] = &[
    "index_sync_workspace",
    "core_index",
    "core_runtime",
    "core_async",
    "bridge_traits",
    "bridge_desktop",
];

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, human-readable
    Pretty,
    /// One JSON object per event
    Json,
    /// Single-line, human-readable
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        #[cfg(debug_assertions)]
        return Self::Pretty;

        #[cfg(not(debug_assertions))]
        return Self::Json;
    }
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(Error::Config(format!("Unknown log format: {}", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level of the workspace crates under the default directives
    pub level: Level,
    /// Directives replacing both `RUST_LOG` and the defaults
    pub filter: Option<String>,
    /// Log each pass span when it closes, with its busy and idle time
    pub pass_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: Level::INFO,
            filter: None,
            pass_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_pass_spans(mut self, enable: bool) -> Self {
        self.pass_spans = enable;
        self
    }

    /// `warn` for everything, the configured level for workspace crates.
    pub fn default_directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        std::iter::once("warn".to_string())
            .chain(
                WORKSPACE_TARGETS
                    .iter()
                    .map(|target| format!("{}={}", target, level)),
            )
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`Error::Config`] if the filter does not parse or a global
/// subscriber is already installed.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;

    tracing_subscriber::registry()
        .with(fmt_layer(&config))
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(filter) => filter.clone(),
        None => match EnvFilter::try_from_default_env() {
            Ok(filter) => return Ok(filter),
            Err(_) => config.default_directives(),
        },
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Config(format!("Invalid log filter '{}': {}", directives, e)))
}

fn fmt_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let span_events = if config.pass_spans {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_span_events(span_events)
        .with_writer(io::stdout);

    match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    }
}
