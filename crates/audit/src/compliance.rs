use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerly_core::{DomainError, DomainResult, Entity, TenantId};

use crate::risk::RiskLevel;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComplianceId(Uuid);

impl ComplianceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ComplianceId {
    fn default() -> Self {
        Self::new()
    }
}

/// ISO 3166-1 alpha-2 country code, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub fn new(raw: &str) -> DomainResult<Self> {
        let code = raw.trim().to_ascii_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation(format!(
                "country code must be two letters (got '{raw}')"
            )));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CountryCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<CountryCode> for String {
    fn from(value: CountryCode) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Pending,
    Compliant,
    NonCompliant,
    Waived,
}

/// A dated regulatory obligation of a company in one country
/// (VAT return, statutory filing...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRecord {
    id: ComplianceId,
    tenant_id: TenantId,
    country: CountryCode,
    requirement: String,
    due_date: NaiveDate,
    status: ComplianceStatus,
    risk: RiskLevel,
    note: Option<String>,
}

impl ComplianceRecord {
    pub fn new(
        tenant_id: TenantId,
        country: CountryCode,
        requirement: impl Into<String>,
        due_date: NaiveDate,
        risk: RiskLevel,
    ) -> DomainResult<Self> {
        let requirement = requirement.into();
        if requirement.trim().is_empty() {
            return Err(DomainError::validation("requirement must not be empty"));
        }
        Ok(Self {
            id: ComplianceId::new(),
            tenant_id,
            country,
            requirement,
            due_date,
            status: ComplianceStatus::Pending,
            risk,
            note: None,
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn country(&self) -> &CountryCode {
        &self.country
    }

    pub fn requirement(&self) -> &str {
        &self.requirement
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn status(&self) -> ComplianceStatus {
        self.status
    }

    pub fn risk(&self) -> RiskLevel {
        self.risk
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// Still pending after its due date.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status == ComplianceStatus::Pending && today > self.due_date
    }

    pub fn mark_compliant(&mut self) -> DomainResult<()> {
        self.transition(ComplianceStatus::Compliant, None)
    }

    pub fn mark_non_compliant(&mut self, note: impl Into<String>) -> DomainResult<()> {
        self.transition(ComplianceStatus::NonCompliant, Some(note.into()))
    }

    /// Waivers need a justification.
    pub fn waive(&mut self, justification: impl Into<String>) -> DomainResult<()> {
        let justification = justification.into();
        if justification.trim().is_empty() {
            return Err(DomainError::validation("waiver requires a justification"));
        }
        self.transition(ComplianceStatus::Waived, Some(justification))
    }

    fn transition(&mut self, to: ComplianceStatus, note: Option<String>) -> DomainResult<()> {
        if matches!(self.status, ComplianceStatus::Compliant | ComplianceStatus::Waived) {
            return Err(DomainError::invariant(format!(
                "record is already {:?}",
                self.status
            )));
        }
        self.status = to;
        if note.is_some() {
            self.note = note;
        }
        Ok(())
    }
}

impl Entity for ComplianceRecord {
    type Id = ComplianceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn vat_return() -> ComplianceRecord {
        ComplianceRecord::new(
            TenantId::new(),
            CountryCode::new("fr").unwrap(),
            "Monthly VAT return (CA3)",
            date(2024, 4, 24),
            RiskLevel::Medium,
        )
        .unwrap()
    }

    #[test]
    fn country_code_is_normalized_and_validated() {
        assert_eq!(CountryCode::new(" de ").unwrap().as_str(), "DE");
        assert!(CountryCode::new("FRA").is_err());
        assert!(CountryCode::new("1A").is_err());
    }

    #[test]
    fn pending_record_is_overdue_after_due_date() {
        let mut rec = vat_return();
        assert!(!rec.is_overdue(date(2024, 4, 24)));
        assert!(rec.is_overdue(date(2024, 4, 25)));

        rec.mark_compliant().unwrap();
        assert!(!rec.is_overdue(date(2024, 5, 1)));
    }

    #[test]
    fn non_compliant_can_still_be_remediated() {
        let mut rec = vat_return();
        rec.mark_non_compliant("filed late").unwrap();
        assert_eq!(rec.note(), Some("filed late"));
        rec.mark_compliant().unwrap();
        assert_eq!(rec.status(), ComplianceStatus::Compliant);
        assert!(rec.waive("n/a").is_err());
    }

    #[test]
    fn waiver_needs_justification() {
        let mut rec = vat_return();
        assert!(rec.waive(" ").is_err());
        rec.waive("Below registration threshold").unwrap();
        assert_eq!(rec.status(), ComplianceStatus::Waived);
    }
}
