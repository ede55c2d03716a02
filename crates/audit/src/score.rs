//! Weighted audit scoring.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use ledgerly_core::{DomainError, DomainResult, ValueObject};

/// Assessment on a 1 (poor) to 5 (excellent) scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl ValueObject for Score {}

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> DomainResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::validation(format!(
                "score must be between {} and {} (got {value})",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(value: Score) -> Self {
        value.0
    }
}

/// Rating bucket for an overall audit score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditRating {
    Unsatisfactory,
    NeedsImprovement,
    Satisfactory,
    Good,
    Excellent,
}

impl AuditRating {
    /// Bucket a 1.00..=5.00 overall score.
    pub fn from_score(overall: Decimal) -> Self {
        if overall >= Decimal::new(450, 2) {
            AuditRating::Excellent
        } else if overall >= Decimal::new(350, 2) {
            AuditRating::Good
        } else if overall >= Decimal::new(250, 2) {
            AuditRating::Satisfactory
        } else if overall >= Decimal::new(150, 2) {
            AuditRating::NeedsImprovement
        } else {
            AuditRating::Unsatisfactory
        }
    }
}

/// The three assessed dimensions of an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditScores {
    pub compliance: Score,
    pub control_effectiveness: Score,
    pub documentation: Score,
}

impl ValueObject for AuditScores {}

impl AuditScores {
    /// Weights in percent: compliance, controls, documentation.
    pub const WEIGHTS: [u32; 3] = [40, 35, 25];

    pub fn new(compliance: u8, control_effectiveness: u8, documentation: u8) -> DomainResult<Self> {
        Ok(Self {
            compliance: Score::new(compliance)?,
            control_effectiveness: Score::new(control_effectiveness)?,
            documentation: Score::new(documentation)?,
        })
    }

    /// Weighted mean of the three scores, two decimals, midpoint away from zero.
    pub fn calculate_overall_score(&self) -> Decimal {
        let [wc, we, wd] = Self::WEIGHTS;
        let weighted = u32::from(self.compliance.get()) * wc
            + u32::from(self.control_effectiveness.get()) * we
            + u32::from(self.documentation.get()) * wd;

        (Decimal::from(weighted) / Decimal::from(100))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn rating(&self) -> AuditRating {
        AuditRating::from_score(self.calculate_overall_score())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn score_outside_range_is_rejected() {
        assert!(Score::new(0).is_err());
        assert!(Score::new(6).is_err());
        assert_eq!(Score::new(3).unwrap().get(), 3);
    }

    #[test]
    fn overall_score_is_weighted() {
        let s = AuditScores::new(5, 4, 3).unwrap();
        // 5*0.40 + 4*0.35 + 3*0.25 = 2.00 + 1.40 + 0.75
        assert_eq!(s.calculate_overall_score(), dec!(4.15));
        assert_eq!(s.rating(), AuditRating::Good);
    }

    #[test]
    fn extremes_map_to_outer_buckets() {
        assert_eq!(AuditScores::new(5, 5, 5).unwrap().rating(), AuditRating::Excellent);
        assert_eq!(AuditScores::new(1, 1, 1).unwrap().rating(), AuditRating::Unsatisfactory);
        assert_eq!(AuditScores::new(1, 1, 1).unwrap().calculate_overall_score(), dec!(1.00));
    }

    #[test]
    fn bucket_boundaries_are_inclusive() {
        assert_eq!(AuditRating::from_score(dec!(4.50)), AuditRating::Excellent);
        assert_eq!(AuditRating::from_score(dec!(4.49)), AuditRating::Good);
        assert_eq!(AuditRating::from_score(dec!(3.50)), AuditRating::Good);
        assert_eq!(AuditRating::from_score(dec!(2.50)), AuditRating::Satisfactory);
        assert_eq!(AuditRating::from_score(dec!(1.50)), AuditRating::NeedsImprovement);
        assert_eq!(AuditRating::from_score(dec!(1.49)), AuditRating::Unsatisfactory);
    }

    #[test]
    fn mixed_triple_lands_in_middle_bucket() {
        // 3*0.40 + 2*0.35 + 4*0.25 = 1.20 + 0.70 + 1.00
        let s = AuditScores::new(3, 2, 4).unwrap();
        assert_eq!(s.calculate_overall_score(), dec!(2.90));
        assert_eq!(s.rating(), AuditRating::Satisfactory);
    }

    #[test]
    fn deserialization_validates_range() {
        let bad: Result<AuditScores, _> = serde_json::from_str(
            r#"{"compliance":7,"control_effectiveness":3,"documentation":3}"#,
        );
        assert!(bad.is_err());
    }

    proptest! {
        #[test]
        fn overall_score_stays_in_range_and_is_deterministic(c in 1u8..=5, e in 1u8..=5, d in 1u8..=5) {
            let s = AuditScores::new(c, e, d).unwrap();
            let overall = s.calculate_overall_score();
            prop_assert!(overall >= dec!(1) && overall <= dec!(5));
            prop_assert_eq!(overall, AuditScores::new(c, e, d).unwrap().calculate_overall_score());
            prop_assert_eq!(s.rating(), AuditRating::from_score(overall));
        }
    }
}
