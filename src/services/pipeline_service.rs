use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::database::repository::PipelineRepository;
use crate::error::{Error, Result};
use crate::models::{
    application::{Application, NewApplication},
    email_notification::{EmailNotificationRecord, NewEmailNotification},
    recruiter_note::{NewRecruiterNote, RecruiterNote},
    stage_transition::{CommittedTransition, StageTransitionRecord, TransitionRequest},
};

/// Mutating entry points of the pipeline plus reads of the summary and trail.
#[derive(Clone)]
pub struct PipelineService {
    repo: Arc<dyn PipelineRepository>,
}

impl PipelineService {
    pub fn new(repo: Arc<dyn PipelineRepository>) -> Self {
        Self { repo }
    }

    pub async fn create_application(&self, new: NewApplication) -> Result<CommittedTransition> {
        let created = self.repo.create_application(new).await?;
        info!(
            application_id = %created.application.id,
            job_id = %created.application.job_id,
            candidate_id = %created.application.candidate_id,
            "Application created"
        );
        Ok(created)
    }

    /// Validates and commits a stage change. Nothing is appended unless the
    /// whole proposed tuple is accepted.
    pub async fn request_stage_change(
        &self,
        application_id: Uuid,
        request: TransitionRequest,
    ) -> Result<CommittedTransition> {
        let proposed_stage = request.proposed.stage.clone();
        match self.repo.commit_transition(application_id, request).await {
            Ok(committed) => {
                info!(
                    application_id = %application_id,
                    from = ?committed.transition.from_stage,
                    to = %committed.transition.to_stage,
                    status = %committed.transition.status,
                    changed_by = %committed.transition.changed_by,
                    "Stage transition accepted"
                );
                Ok(committed)
            }
            Err(Error::Transition(err)) => {
                warn!(
                    application_id = %application_id,
                    to = %proposed_stage,
                    rule = err.rule(),
                    "Stage transition rejected"
                );
                Err(Error::Transition(err))
            }
            Err(err) => Err(err),
        }
    }

    async fn require_application(&self, id: Uuid) -> Result<Application> {
        self.repo
            .get_application(id)
            .await?
            .ok_or_else(|| Error::NotFound("Application not found".to_string()))
    }

    /// Reads the summary, repairing it from the trail tail when the two
    /// disagree. The trail is authoritative.
    pub async fn get_application(&self, id: Uuid) -> Result<Application> {
        let application = self.require_application(id).await?;
        let history = self.repo.history_for(id).await?;

        match history.last() {
            Some(tail) if tail.resulting_state() != application.state() => {
                warn!(
                    application_id = %id,
                    cached_stage = %application.current_stage,
                    trail_stage = %tail.to_stage,
                    "Application summary diverged from audit trail, reconciling"
                );
                self.repo.reconcile_summary(id).await
            }
            _ => Ok(application),
        }
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<StageTransitionRecord>> {
        self.require_application(id).await?;
        self.repo.history_for(id).await
    }

    pub async fn list_for_job(&self, job_id: Uuid) -> Result<Vec<Application>> {
        self.repo.list_applications_for_job(job_id).await
    }

    pub async fn add_recruiter_note(
        &self,
        application_id: Uuid,
        author: String,
        content: String,
    ) -> Result<RecruiterNote> {
        self.require_application(application_id).await?;
        let note = self
            .repo
            .add_note(NewRecruiterNote {
                application_id,
                author,
                content,
            })
            .await?;
        info!(application_id = %application_id, note_id = %note.id, "Recruiter note added");
        Ok(note)
    }

    pub async fn record_email_notification(
        &self,
        email: NewEmailNotification,
    ) -> Result<EmailNotificationRecord> {
        self.require_application(email.application_id).await?;
        self.repo.append_email(email).await
    }
}
