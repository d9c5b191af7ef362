use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::database::repository::PipelineRepository;
use crate::error::{Error, Result, StorageError};
use crate::models::{
    application::{Application, ApplicationState, NewApplication},
    email_notification::{EmailNotificationRecord, NewEmailNotification},
    recruiter_note::{NewRecruiterNote, RecruiterNote},
    stage::Stage,
    stage_transition::{CommittedTransition, StageTransitionRecord, TransitionRequest},
};
use crate::services::transition_validator::validate_request;
use crate::utils::time::{now, now_not_before};

struct ApplicationSlot {
    application: Application,
    history: Vec<StageTransitionRecord>,
}

#[derive(Clone)]
struct SlotHandle {
    job_id: Uuid,
    slot: Arc<Mutex<ApplicationSlot>>,
}

/// Process-local store. Each application owns its own async mutex, so
/// transitions on one application are serialized while different
/// applications proceed independently.
#[derive(Default)]
pub struct MemoryPipelineRepository {
    slots: RwLock<HashMap<Uuid, SlotHandle>>,
    notes: Mutex<Vec<RecruiterNote>>,
    emails: Mutex<Vec<EmailNotificationRecord>>,
    sequence: AtomicI64,
}

impl MemoryPipelineRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_sequence(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn handle(&self, id: Uuid) -> Result<SlotHandle> {
        self.slots
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Application {} not found", id)))
    }

    fn record(
        &self,
        application_id: Uuid,
        from_stage: Option<Stage>,
        state: &ApplicationState,
        changed_by: String,
        notes: Option<String>,
        changed_at: DateTime<Utc>,
    ) -> StageTransitionRecord {
        StageTransitionRecord {
            id: Uuid::new_v4(),
            application_id,
            sequence: self.next_sequence(),
            from_stage,
            to_stage: state.stage,
            status: state.status,
            offer_status: state.offer_status,
            final_outcome: state.final_outcome,
            rejection_reason: state.rejection_reason,
            changed_by,
            changed_at,
            notes,
        }
    }

    /// Overwrites the cached summary without touching the trail, leaving the
    /// application in the state a failed summary write would.
    #[cfg(test)]
    pub(crate) async fn overwrite_summary(&self, id: Uuid, state: ApplicationState) {
        let handle = self.handle(id).await.expect("application exists");
        let mut slot = handle.slot.lock().await;
        slot.application.apply(state, now());
    }

    /// Moves the latest trail timestamp forward, as if it had been written by
    /// a clock running ahead of this one.
    #[cfg(test)]
    pub(crate) async fn shift_latest_record(&self, id: Uuid, by: chrono::Duration) {
        let handle = self.handle(id).await.expect("application exists");
        let mut slot = handle.slot.lock().await;
        if let Some(last) = slot.history.last_mut() {
            last.changed_at = last.changed_at + by;
        }
    }
}

fn sorted(mut history: Vec<StageTransitionRecord>) -> Vec<StageTransitionRecord> {
    history.sort_by(|a, b| {
        a.changed_at
            .cmp(&b.changed_at)
            .then(a.sequence.cmp(&b.sequence))
    });
    history
}

#[async_trait]
impl PipelineRepository for MemoryPipelineRepository {
    async fn create_application(&self, new: NewApplication) -> Result<CommittedTransition> {
        let created_at = now();
        let initial = ApplicationState::initial();
        let id = Uuid::new_v4();
        let application = Application {
            id,
            candidate_id: new.candidate_id,
            job_id: new.job_id,
            current_stage: initial.stage,
            current_stage_status: initial.status,
            offer_status: None,
            final_outcome: None,
            final_rejection_reason: None,
            created_at,
            updated_at: created_at,
        };
        let transition = self.record(id, None, &initial, new.created_by, new.notes, created_at);

        let slot = ApplicationSlot {
            application: application.clone(),
            history: vec![transition.clone()],
        };
        self.slots.write().await.insert(
            id,
            SlotHandle {
                job_id: new.job_id,
                slot: Arc::new(Mutex::new(slot)),
            },
        );

        Ok(CommittedTransition {
            application,
            transition,
        })
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        let handle = match self.slots.read().await.get(&id) {
            Some(handle) => handle.clone(),
            None => return Ok(None),
        };
        let slot = handle.slot.lock().await;
        Ok(Some(slot.application.clone()))
    }

    async fn list_applications_for_job(&self, job_id: Uuid) -> Result<Vec<Application>> {
        let handles: Vec<SlotHandle> = self
            .slots
            .read()
            .await
            .values()
            .filter(|h| h.job_id == job_id)
            .cloned()
            .collect();

        let mut applications = Vec::with_capacity(handles.len());
        for handle in handles {
            applications.push(handle.slot.lock().await.application.clone());
        }
        applications.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(applications)
    }

    async fn commit_transition(
        &self,
        application_id: Uuid,
        request: TransitionRequest,
    ) -> Result<CommittedTransition> {
        let handle = self.handle(application_id).await?;
        let mut slot = handle.slot.lock().await;

        let current = slot.application.state();
        let accepted = validate_request(&current, &request.proposed)?;

        let latest = slot.history.iter().map(|r| r.changed_at).max();
        let transition = self.record(
            application_id,
            Some(current.stage),
            &accepted,
            request.changed_by,
            request.notes,
            now_not_before(latest),
        );
        slot.history.push(transition.clone());
        slot.application.apply(accepted, transition.changed_at);

        Ok(CommittedTransition {
            application: slot.application.clone(),
            transition,
        })
    }

    async fn history_for(&self, application_id: Uuid) -> Result<Vec<StageTransitionRecord>> {
        let handle = self.handle(application_id).await?;
        let slot = handle.slot.lock().await;
        Ok(sorted(slot.history.clone()))
    }

    async fn histories_for_job(&self, job_id: Uuid) -> Result<Vec<StageTransitionRecord>> {
        let mut records = Vec::new();
        for application in self.list_applications_for_job(job_id).await? {
            records.extend(self.history_for(application.id).await?);
        }
        Ok(records)
    }

    async fn reconcile_summary(&self, application_id: Uuid) -> Result<Application> {
        let handle = self.handle(application_id).await?;
        let mut slot = handle.slot.lock().await;
        let tail = sorted(slot.history.clone()).pop().ok_or_else(|| {
            StorageError::Corrupt(format!("Application {} has no trail", application_id))
        })?;
        slot.application.apply(tail.resulting_state(), now());
        Ok(slot.application.clone())
    }

    async fn add_note(&self, note: NewRecruiterNote) -> Result<RecruiterNote> {
        self.handle(note.application_id).await?;
        let note = RecruiterNote {
            id: Uuid::new_v4(),
            application_id: note.application_id,
            author: note.author,
            content: note.content,
            created_at: now(),
        };
        self.notes.lock().await.push(note.clone());
        Ok(note)
    }

    async fn notes_for(&self, application_id: Uuid) -> Result<Vec<RecruiterNote>> {
        let notes = self.notes.lock().await;
        Ok(notes
            .iter()
            .filter(|n| n.application_id == application_id)
            .cloned()
            .collect())
    }

    async fn append_email(&self, email: NewEmailNotification) -> Result<EmailNotificationRecord> {
        self.handle(email.application_id).await?;
        let record = EmailNotificationRecord {
            id: Uuid::new_v4(),
            application_id: email.application_id,
            recipient: email.recipient,
            subject: email.subject,
            success: email.error.is_none(),
            error: email.error,
            sent_at: now(),
        };
        self.emails.lock().await.push(record.clone());
        Ok(record)
    }

    async fn emails_for(&self, application_id: Uuid) -> Result<Vec<EmailNotificationRecord>> {
        let emails = self.emails.lock().await;
        Ok(emails
            .iter()
            .filter(|e| e.application_id == application_id)
            .cloned()
            .collect())
    }
}
