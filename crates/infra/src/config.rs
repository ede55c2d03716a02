//! Runtime configuration read from `LEDGERLY_*` environment variables.

use thiserror::Error;

use ledgerly_accounting::ValidationPolicy;
use ledgerly_observability::LogFormat;

pub const AMOUNT_SCALE_VAR: &str = "LEDGERLY_AMOUNT_SCALE";
pub const ALLOW_EMPTY_ENTRIES_VAR: &str = "LEDGERLY_ALLOW_EMPTY_ENTRIES";
pub const LOG_FORMAT_VAR: &str = "LEDGERLY_LOG_FORMAT";

/// Largest supported number of decimal places for line amounts.
pub const MAX_AMOUNT_SCALE: u32 = 8;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("LEDGERLY_AMOUNT_SCALE must be an integer between 0 and 8, got '{0}'")]
    InvalidAmountScale(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Decimal places line amounts are rounded to when added.
    pub amount_scale: u32,
    /// Whether an entry with no lines may be validated.
    pub allow_empty_entries: bool,
    pub log_format: LogFormat,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            amount_scale: 2,
            allow_empty_entries: false,
            log_format: LogFormat::Json,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset keys take the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let amount_scale = match lookup(AMOUNT_SCALE_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|scale| *scale <= MAX_AMOUNT_SCALE)
                .ok_or(ConfigError::InvalidAmountScale(raw))?,
            None => defaults.amount_scale,
        };

        let allow_empty_entries = match lookup(ALLOW_EMPTY_ENTRIES_VAR) {
            Some(raw) => raw.trim().to_ascii_lowercase().parse::<bool>().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "LEDGERLY_ALLOW_EMPTY_ENTRIES is not a boolean; using false");
                defaults.allow_empty_entries
            }),
            None => defaults.allow_empty_entries,
        };

        let log_format = match lookup(LOG_FORMAT_VAR) {
            Some(raw) => raw.parse::<LogFormat>().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to json logs");
                defaults.log_format
            }),
            None => defaults.log_format,
        };

        Ok(Self {
            amount_scale,
            allow_empty_entries,
            log_format,
        })
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            allow_empty: self.allow_empty_entries,
        }
    }
}
