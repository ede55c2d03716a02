use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerly_core::{DomainError, DomainResult, Entity, TenantId, UserId};

use crate::risk::RiskLevel;
use crate::score::{AuditRating, AuditScores};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditId(Uuid);

impl AuditId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AuditId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditType {
    Internal,
    External,
    Financial,
    Compliance,
}

/// `Planned -> InProgress -> Completed`; `Cancelled` from either open state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub severity: RiskLevel,
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    id: AuditId,
    tenant_id: TenantId,
    title: String,
    audit_type: AuditType,
    status: AuditStatus,
    lead_auditor: UserId,
    planned_for: NaiveDate,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    scores: Option<AuditScores>,
    findings: Vec<Finding>,
}

impl Audit {
    pub fn plan(
        tenant_id: TenantId,
        title: impl Into<String>,
        audit_type: AuditType,
        lead_auditor: UserId,
        planned_for: NaiveDate,
    ) -> DomainResult<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("audit title must not be empty"));
        }

        Ok(Self {
            id: AuditId::new(),
            tenant_id,
            title,
            audit_type,
            status: AuditStatus::Planned,
            lead_auditor,
            planned_for,
            started_at: None,
            completed_at: None,
            scores: None,
            findings: Vec::new(),
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn audit_type(&self) -> AuditType {
        self.audit_type
    }

    pub fn status(&self) -> AuditStatus {
        self.status
    }

    pub fn lead_auditor(&self) -> UserId {
        self.lead_auditor
    }

    pub fn planned_for(&self) -> NaiveDate {
        self.planned_for
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn scores(&self) -> Option<&AuditScores> {
        self.scores.as_ref()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn open_findings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| !f.resolved)
    }

    pub fn start(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != AuditStatus::Planned {
            return Err(DomainError::invariant(format!(
                "cannot start an audit that is {:?}",
                self.status
            )));
        }
        self.status = AuditStatus::InProgress;
        self.started_at = Some(at);
        Ok(())
    }

    pub fn record_finding(&mut self, title: impl Into<String>, severity: RiskLevel) -> DomainResult<()> {
        if self.status != AuditStatus::InProgress {
            return Err(DomainError::invariant("findings can only be recorded while in progress"));
        }
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DomainError::validation("finding title must not be empty"));
        }
        self.findings.push(Finding {
            title,
            severity,
            resolved: false,
        });
        Ok(())
    }

    /// Mark finding `index` (0-based) resolved.
    pub fn resolve_finding(&mut self, index: usize) -> DomainResult<()> {
        let finding = self.findings.get_mut(index).ok_or(DomainError::NotFound)?;
        finding.resolved = true;
        Ok(())
    }

    pub fn complete(&mut self, scores: AuditScores, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != AuditStatus::InProgress {
            return Err(DomainError::invariant(format!(
                "cannot complete an audit that is {:?}",
                self.status
            )));
        }
        self.scores = Some(scores);
        self.status = AuditStatus::Completed;
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        match self.status {
            AuditStatus::Planned | AuditStatus::InProgress => {
                self.status = AuditStatus::Cancelled;
                Ok(())
            }
            other => Err(DomainError::invariant(format!("cannot cancel an audit that is {other:?}"))),
        }
    }

    /// Overall weighted score, once scores are recorded.
    pub fn calculate_overall_score(&self) -> Option<rust_decimal::Decimal> {
        self.scores.as_ref().map(AuditScores::calculate_overall_score)
    }

    pub fn rating(&self) -> Option<AuditRating> {
        self.scores.as_ref().map(AuditScores::rating)
    }
}

impl Entity for Audit {
    type Id = AuditId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
