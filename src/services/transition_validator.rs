//! Pure decision function for stage changes. Nothing here touches storage;
//! callers run it under whatever per-application lock their store provides.

use crate::models::application::ApplicationState;
use crate::models::stage::{FinalOutcome, RejectionReason, Stage};
use crate::models::stage_transition::ProposedState;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Application was discarded in stage '{stage}' and cannot change stage")]
    DiscardedApplicationImmutable { stage: Stage },

    #[error("Stage '{stage}' requires an offer status")]
    MissingOfferStatus { stage: Stage },

    #[error("Stage '{stage}' requires a final outcome")]
    MissingFinalOutcome { stage: Stage },

    #[error("Rejection reason '{reason}' is not valid for outcome {}", outcome_name(.outcome))]
    InvalidRejectionReason {
        reason: RejectionReason,
        outcome: Option<FinalOutcome>,
    },

    #[error("Unknown stage '{value}'")]
    UnknownStage { value: String },
}

fn outcome_name(outcome: &Option<FinalOutcome>) -> String {
    match outcome {
        Some(o) => format!("'{}'", o),
        None => "(none)".to_string(),
    }
}

impl TransitionError {
    /// Stable code identifying the rule that failed.
    pub fn rule(&self) -> &'static str {
        match self {
            TransitionError::DiscardedApplicationImmutable { .. } => {
                "discarded_application_immutable"
            }
            TransitionError::MissingOfferStatus { .. } => "missing_offer_status",
            TransitionError::MissingFinalOutcome { .. } => "missing_final_outcome",
            TransitionError::InvalidRejectionReason { .. } => "invalid_rejection_reason",
            TransitionError::UnknownStage { .. } => "unknown_stage",
        }
    }
}

/// Resolves a submitted stage name against the ordered stage sequence.
pub fn parse_stage(value: &str) -> Result<Stage, TransitionError> {
    value
        .trim()
        .parse::<Stage>()
        .map_err(|_| TransitionError::UnknownStage {
            value: value.to_string(),
        })
}

/// Checks a submitted state whose stage is still free text. The discard rule
/// is applied to the raw name first, so a discarded application reports
/// `discarded_application_immutable` even for a stage outside the sequence.
pub fn validate_request(
    current: &ApplicationState,
    proposed: &ProposedState,
) -> Result<ApplicationState, TransitionError> {
    if current.status.is_discarded() && proposed.stage.trim() != current.stage.as_str() {
        return Err(TransitionError::DiscardedApplicationImmutable {
            stage: current.stage,
        });
    }

    let stage = parse_stage(&proposed.stage)?;
    validate(
        current,
        &ApplicationState {
            stage,
            status: proposed.status,
            offer_status: proposed.offer_status,
            final_outcome: proposed.final_outcome,
            rejection_reason: proposed.rejection_reason,
        },
    )
}

/// Approves or rejects `proposed` as the next state of an application
/// currently in `current`. On success the returned tuple is exactly what gets
/// persisted.
///
/// Movement along the stage sequence is unrestricted in both directions, and
/// re-affirming the current stage is allowed (status-only updates).
pub fn validate(
    current: &ApplicationState,
    proposed: &ApplicationState,
) -> Result<ApplicationState, TransitionError> {
    if current.status.is_discarded() && proposed.stage != current.stage {
        return Err(TransitionError::DiscardedApplicationImmutable {
            stage: current.stage,
        });
    }

    if proposed.stage.requires_offer_status() && proposed.offer_status.is_none() {
        return Err(TransitionError::MissingOfferStatus {
            stage: proposed.stage,
        });
    }

    if proposed.stage.requires_final_outcome() && proposed.final_outcome.is_none() {
        return Err(TransitionError::MissingFinalOutcome {
            stage: proposed.stage,
        });
    }

    if let Some(reason) = proposed.rejection_reason {
        let valid = proposed
            .final_outcome
            .map(|outcome| outcome.accepts_reason(reason))
            .unwrap_or(false);
        if !valid {
            return Err(TransitionError::InvalidRejectionReason {
                reason,
                outcome: proposed.final_outcome,
            });
        }
    }

    Ok(*proposed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stage::{OfferStatus, StageStatus};
    use tokio_test::{assert_err, assert_ok};

    fn state(stage: Stage, status: StageStatus) -> ApplicationState {
        ApplicationState {
            stage,
            status,
            offer_status: None,
            final_outcome: None,
            rejection_reason: None,
        }
    }

    #[test]
    fn accepts_plain_forward_move() {
        let current = ApplicationState::initial();
        let proposed = state(Stage::Screening, StageStatus::Completed);
        assert_eq!(validate(&current, &proposed), Ok(proposed));
    }

    #[test]
    fn accepts_backward_move() {
        let current = state(Stage::Interview, StageStatus::InProgress);
        let proposed = state(Stage::Applied, StageStatus::Pending);
        assert_ok!(validate(&current, &proposed));
    }

    #[test]
    fn accepts_reaffirming_current_stage() {
        let current = state(Stage::Interview, StageStatus::Pending);
        let proposed = state(Stage::Interview, StageStatus::OnHold);
        assert_ok!(validate(&current, &proposed));
    }

    #[test]
    fn discarded_application_cannot_change_stage() {
        let current = state(Stage::Interview, StageStatus::DiscardedInStage);
        let mut proposed = state(Stage::Closed, StageStatus::Completed);
        proposed.final_outcome = Some(FinalOutcome::Rejected);

        let err = validate(&current, &proposed).unwrap_err();
        assert_eq!(
            err,
            TransitionError::DiscardedApplicationImmutable {
                stage: Stage::Interview
            }
        );
        assert_eq!(err.rule(), "discarded_application_immutable");
    }

    #[test]
    fn discarded_application_may_update_within_its_stage() {
        let current = state(Stage::Interview, StageStatus::DiscardedInStage);
        let proposed = state(Stage::Interview, StageStatus::DiscardedInStage);
        assert_ok!(validate(&current, &proposed));
    }

    #[test]
    fn discard_check_runs_before_field_checks() {
        let current = state(Stage::Screening, StageStatus::DiscardedInStage);
        let proposed = state(Stage::Offer, StageStatus::Pending);
        assert_eq!(
            validate(&current, &proposed).unwrap_err().rule(),
            "discarded_application_immutable"
        );
    }

    #[test]
    fn offer_stage_needs_offer_status() {
        let current = state(Stage::Interview, StageStatus::Completed);
        let mut proposed = state(Stage::Offer, StageStatus::Pending);
        assert_eq!(
            validate(&current, &proposed),
            Err(TransitionError::MissingOfferStatus { stage: Stage::Offer })
        );

        proposed.offer_status = Some(OfferStatus::Extended);
        assert_ok!(validate(&current, &proposed));
    }

    #[test]
    fn closed_stage_needs_final_outcome() {
        let current = state(Stage::Offer, StageStatus::Completed);
        let mut proposed = state(Stage::Closed, StageStatus::Completed);
        assert_eq!(
            validate(&current, &proposed),
            Err(TransitionError::MissingFinalOutcome {
                stage: Stage::Closed
            })
        );

        proposed.final_outcome = Some(FinalOutcome::Hired);
        assert_ok!(validate(&current, &proposed));
    }

    #[test]
    fn rejection_reason_is_optional() {
        let current = state(Stage::Interview, StageStatus::Completed);
        let mut proposed = state(Stage::Closed, StageStatus::Completed);
        proposed.final_outcome = Some(FinalOutcome::Rejected);
        assert_ok!(validate(&current, &proposed));
    }

    #[test]
    fn rejection_reason_must_match_outcome() {
        let current = state(Stage::Interview, StageStatus::Completed);
        let mut proposed = state(Stage::Closed, StageStatus::Completed);
        proposed.final_outcome = Some(FinalOutcome::CandidateDeclined);
        proposed.rejection_reason = Some(RejectionReason::FailedAssessment);
        let err = assert_err!(validate(&current, &proposed));
        assert_eq!(err.rule(), "invalid_rejection_reason");

        proposed.rejection_reason = Some(RejectionReason::AcceptedOtherOffer);
        assert_ok!(validate(&current, &proposed));
    }

    #[test]
    fn rejection_reason_without_rejection_outcome_is_invalid() {
        let current = state(Stage::Offer, StageStatus::Completed);
        let mut proposed = state(Stage::Closed, StageStatus::Completed);
        proposed.final_outcome = Some(FinalOutcome::Hired);
        proposed.rejection_reason = Some(RejectionReason::PositionFilled);
        assert_eq!(
            validate(&current, &proposed),
            Err(TransitionError::InvalidRejectionReason {
                reason: RejectionReason::PositionFilled,
                outcome: Some(FinalOutcome::Hired),
            })
        );
    }

    fn submitted(stage: &str, status: StageStatus) -> ProposedState {
        ProposedState {
            stage: stage.to_string(),
            status,
            offer_status: None,
            final_outcome: None,
            rejection_reason: None,
        }
    }

    #[test]
    fn discard_check_precedes_stage_lookup() {
        let current = state(Stage::Interview, StageStatus::DiscardedInStage);
        let err = validate_request(&current, &submitted("onboarding", StageStatus::Pending))
            .unwrap_err();
        assert_eq!(err.rule(), "discarded_application_immutable");

        assert_ok!(validate_request(
            &current,
            &submitted(" interview ", StageStatus::DiscardedInStage)
        ));
    }

    #[test]
    fn submitted_stage_is_resolved_before_field_checks() {
        let current = state(Stage::Applied, StageStatus::Pending);
        let err = validate_request(&current, &submitted("onboarding", StageStatus::Pending))
            .unwrap_err();
        assert_eq!(err.rule(), "unknown_stage");

        let err = validate_request(&current, &submitted("offer", StageStatus::Pending))
            .unwrap_err();
        assert_eq!(err, TransitionError::MissingOfferStatus { stage: Stage::Offer });

        let accepted = validate_request(&current, &submitted("screening", StageStatus::Completed));
        assert_eq!(accepted, Ok(state(Stage::Screening, StageStatus::Completed)));
    }

    #[test]
    fn unknown_stage_name_is_rejected() {
        assert_eq!(parse_stage(" offer "), Ok(Stage::Offer));
        let err = parse_stage("onboarding").unwrap_err();
        assert_eq!(err.rule(), "unknown_stage");
        assert_eq!(err.to_string(), "Unknown stage 'onboarding'");
    }
}
