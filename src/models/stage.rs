//! Static pipeline taxonomy: the ordered stages, the intra-stage statuses,
//! offer statuses, final outcomes and rejection reasons, plus the rules that
//! tie them together. Topology changes are made here and nowhere else.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Applied,
    Screening,
    Interview,
    Offer,
    Closed,
}

/// Pipeline order. The first element is where every application starts.
pub const STAGE_ORDER: [Stage; 5] = [
    Stage::Applied,
    Stage::Screening,
    Stage::Interview,
    Stage::Offer,
    Stage::Closed,
];

impl Stage {
    pub fn first() -> Stage {
        STAGE_ORDER[0]
    }

    pub fn position(self) -> usize {
        match self {
            Stage::Applied => 0,
            Stage::Screening => 1,
            Stage::Interview => 2,
            Stage::Offer => 3,
            Stage::Closed => 4,
        }
    }

    /// Entering this stage requires a non-null offer status.
    pub fn requires_offer_status(self) -> bool {
        matches!(self, Stage::Offer)
    }

    /// Entering this stage requires a non-null final outcome.
    pub fn requires_final_outcome(self) -> bool {
        matches!(self, Stage::Closed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Applied => "applied",
            Stage::Screening => "screening",
            Stage::Interview => "interview",
            Stage::Offer => "offer",
            Stage::Closed => "closed",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Applied => "Postulación recibida",
            Stage::Screening => "Revisión de perfil",
            Stage::Interview => "Entrevistas",
            Stage::Offer => "Oferta",
            Stage::Closed => "Cierre",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    InProgress,
    OnHold,
    Completed,
    DiscardedInStage,
}

pub const STAGE_STATUSES: [StageStatus; 5] = [
    StageStatus::Pending,
    StageStatus::InProgress,
    StageStatus::OnHold,
    StageStatus::Completed,
    StageStatus::DiscardedInStage,
];

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::OnHold => "on_hold",
            StageStatus::Completed => "completed",
            StageStatus::DiscardedInStage => "discarded_in_stage",
        }
    }

    pub fn is_discarded(self) -> bool {
        matches!(self, StageStatus::DiscardedInStage)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Drafted,
    Extended,
    Accepted,
    Declined,
    Rescinded,
}

pub const OFFER_STATUSES: [OfferStatus; 5] = [
    OfferStatus::Drafted,
    OfferStatus::Extended,
    OfferStatus::Accepted,
    OfferStatus::Declined,
    OfferStatus::Rescinded,
];

impl OfferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OfferStatus::Drafted => "drafted",
            OfferStatus::Extended => "extended",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Declined => "declined",
            OfferStatus::Rescinded => "rescinded",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalOutcome {
    Hired,
    Withdrawn,
    Rejected,
    CandidateDeclined,
}

pub const FINAL_OUTCOMES: [FinalOutcome; 4] = [
    FinalOutcome::Hired,
    FinalOutcome::Withdrawn,
    FinalOutcome::Rejected,
    FinalOutcome::CandidateDeclined,
];

impl FinalOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            FinalOutcome::Hired => "hired",
            FinalOutcome::Withdrawn => "withdrawn",
            FinalOutcome::Rejected => "rejected",
            FinalOutcome::CandidateDeclined => "candidate_declined",
        }
    }

    pub fn is_rejection(self) -> bool {
        matches!(self, FinalOutcome::Rejected | FinalOutcome::CandidateDeclined)
    }

    /// Rejection reasons that may accompany this outcome. Empty for outcomes
    /// that are not rejections.
    pub fn valid_reasons(self) -> &'static [RejectionReason] {
        match self {
            FinalOutcome::Rejected => &[
                RejectionReason::SkillsMismatch,
                RejectionReason::InsufficientExperience,
                RejectionReason::FailedAssessment,
                RejectionReason::CultureFit,
                RejectionReason::PositionFilled,
                RejectionReason::SalaryExpectations,
            ],
            FinalOutcome::CandidateDeclined => &[
                RejectionReason::SalaryExpectations,
                RejectionReason::AcceptedOtherOffer,
                RejectionReason::Relocation,
                RejectionReason::PersonalReasons,
            ],
            FinalOutcome::Hired | FinalOutcome::Withdrawn => &[],
        }
    }

    pub fn accepts_reason(self, reason: RejectionReason) -> bool {
        self.valid_reasons().contains(&reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    SkillsMismatch,
    InsufficientExperience,
    FailedAssessment,
    CultureFit,
    PositionFilled,
    SalaryExpectations,
    AcceptedOtherOffer,
    Relocation,
    PersonalReasons,
}

impl RejectionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionReason::SkillsMismatch => "skills_mismatch",
            RejectionReason::InsufficientExperience => "insufficient_experience",
            RejectionReason::FailedAssessment => "failed_assessment",
            RejectionReason::CultureFit => "culture_fit",
            RejectionReason::PositionFilled => "position_filled",
            RejectionReason::SalaryExpectations => "salary_expectations",
            RejectionReason::AcceptedOtherOffer => "accepted_other_offer",
            RejectionReason::Relocation => "relocation",
            RejectionReason::PersonalReasons => "personal_reasons",
        }
    }
}

/// Raised when a stored or submitted name is not part of the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: '{value}'")]
pub struct UnknownTaxonomyValue {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! taxonomy_names {
    ($ty:ty, $kind:literal, $all:expr) => {
        impl FromStr for $ty {
            type Err = UnknownTaxonomyValue;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $all.iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| UnknownTaxonomyValue {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

const REJECTION_REASONS: [RejectionReason; 9] = [
    RejectionReason::SkillsMismatch,
    RejectionReason::InsufficientExperience,
    RejectionReason::FailedAssessment,
    RejectionReason::CultureFit,
    RejectionReason::PositionFilled,
    RejectionReason::SalaryExpectations,
    RejectionReason::AcceptedOtherOffer,
    RejectionReason::Relocation,
    RejectionReason::PersonalReasons,
];

taxonomy_names!(Stage, "stage", STAGE_ORDER);
taxonomy_names!(StageStatus, "stage status", STAGE_STATUSES);
taxonomy_names!(OfferStatus, "offer status", OFFER_STATUSES);
taxonomy_names!(FinalOutcome, "final outcome", FINAL_OUTCOMES);
taxonomy_names!(RejectionReason, "rejection reason", REJECTION_REASONS);

#[derive(Debug, Clone, Serialize)]
pub struct StageDefinition {
    pub stage: Stage,
    pub position: usize,
    pub label: &'static str,
    pub requires_offer_status: bool,
    pub requires_final_outcome: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeDefinition {
    pub outcome: FinalOutcome,
    pub is_rejection: bool,
    pub valid_reasons: Vec<RejectionReason>,
}

/// Dictionary view of the whole taxonomy, served to clients that render
/// stage pickers.
#[derive(Debug, Clone, Serialize)]
pub struct TaxonomyDictionary {
    pub stages: Vec<StageDefinition>,
    pub stage_statuses: Vec<StageStatus>,
    pub offer_statuses: Vec<OfferStatus>,
    pub final_outcomes: Vec<OutcomeDefinition>,
}

pub fn dictionary() -> TaxonomyDictionary {
    TaxonomyDictionary {
        stages: STAGE_ORDER
            .iter()
            .map(|&stage| StageDefinition {
                stage,
                position: stage.position(),
                label: stage.label(),
                requires_offer_status: stage.requires_offer_status(),
                requires_final_outcome: stage.requires_final_outcome(),
            })
            .collect(),
        stage_statuses: STAGE_STATUSES.to_vec(),
        offer_statuses: OFFER_STATUSES.to_vec(),
        final_outcomes: FINAL_OUTCOMES
            .iter()
            .map(|&outcome| OutcomeDefinition {
                outcome,
                is_rejection: outcome.is_rejection(),
                valid_reasons: outcome.valid_reasons().to_vec(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_order_matches_positions() {
        for (idx, stage) in STAGE_ORDER.iter().enumerate() {
            assert_eq!(stage.position(), idx);
        }
        assert_eq!(Stage::first(), Stage::Applied);
    }

    #[test]
    fn only_offer_and_closed_carry_requirements() {
        let offer: Vec<_> = STAGE_ORDER.iter().filter(|s| s.requires_offer_status()).collect();
        let closing: Vec<_> = STAGE_ORDER.iter().filter(|s| s.requires_final_outcome()).collect();
        assert_eq!(offer, vec![&Stage::Offer]);
        assert_eq!(closing, vec![&Stage::Closed]);
    }

    #[test]
    fn non_rejection_outcomes_have_no_reasons() {
        assert!(FinalOutcome::Hired.valid_reasons().is_empty());
        assert!(FinalOutcome::Withdrawn.valid_reasons().is_empty());
        assert!(FinalOutcome::Rejected.accepts_reason(RejectionReason::CultureFit));
        assert!(!FinalOutcome::CandidateDeclined.accepts_reason(RejectionReason::CultureFit));
        assert!(FinalOutcome::CandidateDeclined.accepts_reason(RejectionReason::SalaryExpectations));
    }

    #[test]
    fn parses_wire_names() {
        assert_eq!("interview".parse::<Stage>(), Ok(Stage::Interview));
        assert_eq!(
            "discarded_in_stage".parse::<StageStatus>(),
            Ok(StageStatus::DiscardedInStage)
        );
        let err = "onboarding".parse::<Stage>().unwrap_err();
        assert_eq!(err.kind, "stage");
        assert_eq!(err.value, "onboarding");
    }

    #[test]
    fn serde_uses_the_same_names_as_storage() {
        let json = serde_json::to_string(&RejectionReason::AcceptedOtherOffer).unwrap();
        assert_eq!(json, format!("\"{}\"", RejectionReason::AcceptedOtherOffer.as_str()));
    }

    #[test]
    fn dictionary_lists_every_stage_in_order() {
        let dict = dictionary();
        let stages: Vec<Stage> = dict.stages.iter().map(|d| d.stage).collect();
        assert_eq!(stages, STAGE_ORDER.to_vec());
        assert_eq!(dict.final_outcomes.len(), 4);
    }
}
