use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::models::{
    application::NewApplication,
    email_notification::NewEmailNotification,
    stage::{FinalOutcome, OfferStatus, RejectionReason, StageStatus},
    stage_transition::{ProposedState, TransitionRequest},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApplicationPayload {
    pub candidate_id: Uuid,
    pub job_id: Uuid,
    #[validate(length(min = 1))]
    pub created_by: String,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub notes: Option<String>,
}

impl From<CreateApplicationPayload> for NewApplication {
    fn from(payload: CreateApplicationPayload) -> Self {
        NewApplication {
            candidate_id: payload.candidate_id,
            job_id: payload.job_id,
            created_by: payload.created_by,
            notes: payload.notes,
        }
    }
}

/// Body of a stage change request. `stage` is taken as free text and
/// resolved during validation, so names outside the pipeline are reported as
/// `unknown_stage`.
#[derive(Debug, Deserialize, Validate)]
pub struct StageChangePayload {
    pub stage: String,
    pub status: StageStatus,
    pub offer_status: Option<OfferStatus>,
    pub final_outcome: Option<FinalOutcome>,
    pub rejection_reason: Option<RejectionReason>,
    #[validate(length(min = 1))]
    pub changed_by: String,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub notes: Option<String>,
    /// When set, the candidate is notified at this address after the change
    /// is committed.
    #[validate(email)]
    pub notify_email: Option<String>,
}

impl StageChangePayload {
    pub fn to_request(&self) -> TransitionRequest {
        TransitionRequest {
            proposed: ProposedState {
                stage: self.stage.clone(),
                status: self.status,
                offer_status: self.offer_status,
                final_outcome: self.final_outcome,
                rejection_reason: self.rejection_reason,
            },
            changed_by: self.changed_by.clone(),
            notes: self.notes.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddNotePayload {
    #[serde(deserialize_with = "trim_string")]
    #[validate(length(min = 1))]
    pub author: String,
    #[serde(deserialize_with = "trim_string")]
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecordEmailPayload {
    #[validate(email)]
    pub recipient: String,
    #[validate(length(min = 1))]
    pub subject: String,
    #[serde(default, deserialize_with = "trim_optional_string")]
    pub error: Option<String>,
}

impl RecordEmailPayload {
    pub fn into_new(self, application_id: Uuid) -> NewEmailNotification {
        NewEmailNotification {
            application_id,
            recipient: self.recipient,
            subject: self.subject,
            error: self.error,
        }
    }
}

fn trim_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(s.trim().to_string())
}

// Trims strings and turns empty ones into None
fn trim_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}
