use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::application::{Application, ApplicationState};
use super::stage::{FinalOutcome, OfferStatus, RejectionReason, Stage, StageStatus};

/// Immutable audit-trail entry. `from_stage` is `None` only for the record
/// written when the application is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTransitionRecord {
    pub id: Uuid,
    pub application_id: Uuid,
    /// Insertion order, used to break ties on `changed_at`.
    pub sequence: i64,
    pub from_stage: Option<Stage>,
    pub to_stage: Stage,
    pub status: StageStatus,
    pub offer_status: Option<OfferStatus>,
    pub final_outcome: Option<FinalOutcome>,
    pub rejection_reason: Option<RejectionReason>,
    pub changed_by: String,
    pub changed_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl StageTransitionRecord {
    /// Application state as it was right after this transition.
    pub fn resulting_state(&self) -> ApplicationState {
        ApplicationState {
            stage: self.to_stage,
            status: self.status,
            offer_status: self.offer_status,
            final_outcome: self.final_outcome,
            rejection_reason: self.rejection_reason,
        }
    }
}

/// A requested next state as submitted. The stage stays as text until it has
/// been checked against the application's current state.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedState {
    pub stage: String,
    pub status: StageStatus,
    pub offer_status: Option<OfferStatus>,
    pub final_outcome: Option<FinalOutcome>,
    pub rejection_reason: Option<RejectionReason>,
}

impl From<ApplicationState> for ProposedState {
    fn from(state: ApplicationState) -> Self {
        ProposedState {
            stage: state.stage.as_str().to_string(),
            status: state.status,
            offer_status: state.offer_status,
            final_outcome: state.final_outcome,
            rejection_reason: state.rejection_reason,
        }
    }
}

/// What a caller asks the store to commit: the proposed tuple plus the
/// attribution that ends up on the trail record.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub proposed: ProposedState,
    pub changed_by: String,
    pub notes: Option<String>,
}

/// Result of a committed transition: the new summary and the record that
/// produced it.
#[derive(Debug, Clone, Serialize)]
pub struct CommittedTransition {
    pub application: Application,
    pub transition: StageTransitionRecord,
}
