//! Infrastructure layer: event store, command dispatch, read models and the
//! ledger service that wires them together.

pub mod bootstrap;
pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod service;

pub use bootstrap::{bootstrap, bootstrap_with};
pub use config::{ConfigError, LedgerConfig};
pub use service::{InMemoryLedgerService, LedgerService, NewEntry, ServiceError, ValidationOutcome};
