//! Process-wide tracing setup shared by ledgerly binaries and tests.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Tracing subscriber configuration (filters, formatting).
pub mod tracing;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output for local development.
    Pretty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown log format '{0}' (expected 'json' or 'pretty')")]
pub struct UnknownLogFormat(pub String);

impl FromStr for LogFormat {
    type Err = UnknownLogFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(UnknownLogFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Json => f.write_str("json"),
            LogFormat::Pretty => f.write_str("pretty"),
        }
    }
}

/// Initialize JSON tracing. Safe to call more than once; later calls are
/// no-ops.
pub fn init() {
    tracing::init_with(LogFormat::Json);
}

/// Initialize tracing with an explicit format. Safe to call more than once.
pub fn init_with(format: LogFormat) {
    tracing::init_with(format);
}
