//! Audit and compliance module: scored audits, risk bucketing and
//! per-country compliance obligations.
//!
//! Plain entities with deterministic helpers; no IO.

pub mod audit;
pub mod compliance;
pub mod risk;
pub mod score;

pub use audit::{Audit, AuditId, AuditStatus, AuditType, Finding};
pub use compliance::{ComplianceId, ComplianceRecord, ComplianceStatus, CountryCode};
pub use risk::{RiskAssessment, RiskLevel};
pub use score::{AuditRating, AuditScores, Score};
