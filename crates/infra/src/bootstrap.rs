//! Process startup: configuration, tracing and service wiring.

use anyhow::Context;

use crate::config::LedgerConfig;
use crate::service::InMemoryLedgerService;

/// Read configuration from the environment, install tracing, and build an
/// in-memory ledger service.
pub fn bootstrap() -> anyhow::Result<InMemoryLedgerService> {
    let config = LedgerConfig::from_env().context("invalid ledger configuration")?;
    Ok(bootstrap_with(config))
}

pub fn bootstrap_with(config: LedgerConfig) -> InMemoryLedgerService {
    ledgerly_observability::init_with(config.log_format);

    tracing::info!(
        amount_scale = config.amount_scale,
        allow_empty_entries = config.allow_empty_entries,
        log_format = %config.log_format,
        "ledger service starting"
    );

    InMemoryLedgerService::in_memory(config)
}
