use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    application::{Application, NewApplication},
    email_notification::{EmailNotificationRecord, NewEmailNotification},
    recruiter_note::{NewRecruiterNote, RecruiterNote},
    stage_transition::{CommittedTransition, StageTransitionRecord, TransitionRequest},
};

/// Record store for applications and their append-only side tables.
///
/// The stage trail has no update or delete path. New trail records are only
/// written by `create_application` and `commit_transition`, both of which
/// update the cached summary in the same atomic unit. Implementations must
/// serialize `commit_transition` per application; calls for different
/// applications may run in parallel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    /// Creates the application at the first stage and writes its first trail
    /// record.
    async fn create_application(&self, new: NewApplication) -> Result<CommittedTransition>;

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>>;

    async fn list_applications_for_job(&self, job_id: Uuid) -> Result<Vec<Application>>;

    /// Reads the current state under the application's lock, validates the
    /// request against it, appends the trail record and updates the summary.
    /// Validation failures leave both untouched.
    async fn commit_transition(
        &self,
        application_id: Uuid,
        request: TransitionRequest,
    ) -> Result<CommittedTransition>;

    /// Full trail for one application, ascending by `changed_at` then
    /// insertion order.
    async fn history_for(&self, application_id: Uuid) -> Result<Vec<StageTransitionRecord>>;

    /// Trail records of every application under a job, grouped by
    /// application and ascending within each group.
    async fn histories_for_job(&self, job_id: Uuid) -> Result<Vec<StageTransitionRecord>>;

    /// Rewrites the cached summary from the trail tail.
    async fn reconcile_summary(&self, application_id: Uuid) -> Result<Application>;

    async fn add_note(&self, note: NewRecruiterNote) -> Result<RecruiterNote>;

    async fn notes_for(&self, application_id: Uuid) -> Result<Vec<RecruiterNote>>;

    async fn append_email(&self, email: NewEmailNotification) -> Result<EmailNotificationRecord>;

    async fn emails_for(&self, application_id: Uuid) -> Result<Vec<EmailNotificationRecord>>;
}
