//! Ledger event plumbing: the event contract, tenant-scoped envelopes,
//! command targeting and the pub/sub bus.

pub mod bus;
pub mod command;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use command::Command;
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use tenant::TenantScoped;
