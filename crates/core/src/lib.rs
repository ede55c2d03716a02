//! Pure domain primitives shared by every ledgerly crate: identifiers, the
//! domain error, aggregate and entity traits, and the `Money` amount type.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, TenantId, UserId};
pub use money::Money;
pub use value_object::ValueObject;
