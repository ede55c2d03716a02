//! Value object trait: equality by value, not identity.
//!
//! Amounts and accounting periods are value objects: two `Money` values of
//! `100.00` are interchangeable, whereas two accounts with the same name but
//! different numbers are not.

/// Marker trait for immutable, value-compared domain types.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
