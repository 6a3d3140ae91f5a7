//! Logging setup for docrag binaries and tests.
//!
//! Spans and events go to stderr through `tracing-subscriber`, filtered by
//! `RUST_LOG` (default `info`). [`init_with_storage`] additionally captures
//! every span carrying a `session.id` field in a [`SharedTraceStorage`].

pub mod memory;

#[cfg(test)]
mod test_capture;
#[cfg(test)]
mod test_serialization;

pub use memory::{EventData, InMemoryTraceLayer, SharedTraceStorage, SpanData, SpanStatus};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as log_fmt};

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to install global subscriber: {0}")]
    Init(String),

    #[error("unknown log format '{0}', expected 'pretty' or 'json'")]
    UnknownFormat(String),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(TelemetryError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber with human-readable output.
pub fn init_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    init_with_format(service_name, LogFormat::Pretty)
}

/// Install the global subscriber with the given output format.
pub fn init_with_format(service_name: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    let result = match format {
        LogFormat::Pretty => registry
            .with(log_fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(log_fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::debug!(service = service_name, %format, "telemetry initialized");
    Ok(())
}

/// Install the global subscriber and capture session-scoped spans in `storage`.
pub fn init_with_storage(
    service_name: &str,
    storage: Arc<SharedTraceStorage>,
) -> Result<(), TelemetryError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(log_fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(InMemoryTraceLayer::new(storage))
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::debug!(service = service_name, "telemetry initialized with span capture");
    Ok(())
}
