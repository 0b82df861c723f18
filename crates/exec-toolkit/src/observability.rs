//! # Observability
//!
//! Provides a simple, configurable interface for installing a `tracing`
//! subscriber that captures what the orchestrator does: handle settlements,
//! step progress, deadlines and the profiler's measurements.
//!
//! Library code only emits events; applications opt in by calling [`init`]
//! once at startup.

use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Invalid log filter directive: {0}")]
    Filter(#[from] ParseError),

    #[error("Could not open log file {path:?}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,
}

/// Configuration for initializing the observability system.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// The maximum level captured for this crate.
    pub level: Level,
    /// Where events are written.
    pub target: LogTarget,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            target: LogTarget::default(),
        }
    }
}

impl ObservabilityConfig {
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_target(mut self, target: LogTarget) -> Self {
        self.target = target;
        self
    }

    /// The filter directive enabling this crate at the configured level.
    pub fn directive(&self) -> String {
        format!("exec_toolkit={}", self.level)
    }
}

/// Defines the output target for logs.
#[derive(Debug, Clone, Default)]
pub enum LogTarget {
    /// Log to the console (stdout).
    #[default]
    Console,
    /// Log to a file, truncating it.
    File(PathBuf),
}

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` is honoured for other crates; the directive for this crate comes
/// from `config`. Calling this a second time, or after another subscriber was
/// installed, returns [`ObservabilityError::AlreadyInitialized`].
pub fn init(config: ObservabilityConfig) -> Result<(), ObservabilityError> {
    let filter = EnvFilter::from_default_env().add_directive(config.directive().parse()?);
    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match config.target {
        LogTarget::Console => {
            let layer = fmt::layer().with_writer(std::io::stdout);
            subscriber.with(layer).try_init()
        }
        LogTarget::File(path) => {
            let file = std::fs::File::create(&path)
                .map_err(|source| ObservabilityError::LogFile { path, source })?;
            let layer = fmt::layer().with_ansi(false).with_writer(file);
            subscriber.with(layer).try_init()
        }
    };

    installed.map_err(|_| ObservabilityError::AlreadyInitialized)
}
