use serde::{Deserialize, Serialize};

use ledgerly_core::{DomainResult, ValueObject};

use crate::score::Score;

/// Risk bucket derived from likelihood x impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Bucket a 1..=25 risk score: 1-4 low, 5-9 medium, 10-15 high, 16+ critical.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=4 => RiskLevel::Low,
            5..=9 => RiskLevel::Medium,
            10..=15 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn requires_escalation(self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub likelihood: Score,
    pub impact: Score,
}

impl ValueObject for RiskAssessment {}

impl RiskAssessment {
    pub fn new(likelihood: u8, impact: u8) -> DomainResult<Self> {
        Ok(Self {
            likelihood: Score::new(likelihood)?,
            impact: Score::new(impact)?,
        })
    }

    pub fn score(&self) -> u8 {
        self.likelihood.get() * self.impact.get()
    }

    pub fn level(&self) -> RiskLevel {
        RiskLevel::from_score(self.score())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_cover_the_matrix() {
        assert_eq!(RiskAssessment::new(1, 1).unwrap().level(), RiskLevel::Low);
        assert_eq!(RiskAssessment::new(2, 2).unwrap().level(), RiskLevel::Low);
        assert_eq!(RiskAssessment::new(1, 5).unwrap().level(), RiskLevel::Medium);
        assert_eq!(RiskAssessment::new(3, 3).unwrap().level(), RiskLevel::Medium);
        assert_eq!(RiskAssessment::new(2, 5).unwrap().level(), RiskLevel::High);
        assert_eq!(RiskAssessment::new(3, 5).unwrap().level(), RiskLevel::High);
        assert_eq!(RiskAssessment::new(4, 4).unwrap().level(), RiskLevel::Critical);
        assert_eq!(RiskAssessment::new(5, 5).unwrap().score(), 25);
    }

    #[test]
    fn only_high_and_critical_escalate() {
        assert!(!RiskLevel::Medium.requires_escalation());
        assert!(RiskLevel::High.requires_escalation());
        assert!(RiskLevel::Critical.requires_escalation());
    }

    #[test]
    fn out_of_range_inputs_fail() {
        assert!(RiskAssessment::new(0, 3).is_err());
        assert!(RiskAssessment::new(3, 6).is_err());
    }
}
