use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::{FinalOutcome, OfferStatus, RejectionReason, Stage, StageStatus};

/// The mutable part of an application: where it sits in the pipeline and the
/// auxiliary fields attached to that position. Transitions propose a full
/// replacement of this tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    pub stage: Stage,
    pub status: StageStatus,
    pub offer_status: Option<OfferStatus>,
    pub final_outcome: Option<FinalOutcome>,
    pub rejection_reason: Option<RejectionReason>,
}

impl ApplicationState {
    /// State of a freshly created application.
    pub fn initial() -> Self {
        Self {
            stage: Stage::first(),
            status: StageStatus::Pending,
            offer_status: None,
            final_outcome: None,
            rejection_reason: None,
        }
    }
}

/// One candidate's attempt at one job. The stage fields are a cache of the
/// tail of the application's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub current_stage: Stage,
    pub current_stage_status: StageStatus,
    pub offer_status: Option<OfferStatus>,
    pub final_outcome: Option<FinalOutcome>,
    pub final_rejection_reason: Option<RejectionReason>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn state(&self) -> ApplicationState {
        ApplicationState {
            stage: self.current_stage,
            status: self.current_stage_status,
            offer_status: self.offer_status,
            final_outcome: self.final_outcome,
            rejection_reason: self.final_rejection_reason,
        }
    }

    pub fn apply(&mut self, state: ApplicationState, at: DateTime<Utc>) {
        self.current_stage = state.stage;
        self.current_stage_status = state.status;
        self.offer_status = state.offer_status;
        self.final_outcome = state.final_outcome;
        self.final_rejection_reason = state.rejection_reason;
        self.updated_at = at;
    }
}

#[derive(Debug, Clone)]
pub struct NewApplication {
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    pub created_by: String,
    pub notes: Option<String>,
}
