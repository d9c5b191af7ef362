//! Postgres-backed record store. Queries are runtime-checked so the crate
//! builds without a live database. Taxonomy values are stored as their
//! snake_case names and parsed back on read.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::repository::PipelineRepository;
use crate::error::{Error, Result, StorageError};
use crate::models::{
    application::{Application, ApplicationState, NewApplication},
    email_notification::{EmailNotificationRecord, NewEmailNotification},
    recruiter_note::{NewRecruiterNote, RecruiterNote},
    stage::{Stage, UnknownTaxonomyValue},
    stage_transition::{CommittedTransition, StageTransitionRecord, TransitionRequest},
};
use crate::services::transition_validator::validate_request;
use crate::utils::time::{now, now_not_before};

const APPLICATION_COLUMNS: &str = "id, candidate_id, job_id, current_stage, current_stage_status, \
     offer_status, final_outcome, final_rejection_reason, created_at, updated_at";

const TRANSITION_COLUMNS: &str = "id, application_id, sequence, from_stage, to_stage, status, \
     offer_status, final_outcome, rejection_reason, changed_by, changed_at, notes";

#[derive(FromRow)]
struct ApplicationRow {
    id: Uuid,
    candidate_id: Uuid,
    job_id: Uuid,
    current_stage: String,
    current_stage_status: String,
    offer_status: Option<String>,
    final_outcome: Option<String>,
    final_rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = StorageError;

    fn try_from(row: ApplicationRow) -> std::result::Result<Self, Self::Error> {
        Ok(Application {
            id: row.id,
            candidate_id: row.candidate_id,
            job_id: row.job_id,
            current_stage: row.current_stage.parse()?,
            current_stage_status: row.current_stage_status.parse()?,
            offer_status: parse_optional(row.offer_status)?,
            final_outcome: parse_optional(row.final_outcome)?,
            final_rejection_reason: parse_optional(row.final_rejection_reason)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct TransitionRow {
    id: Uuid,
    application_id: Uuid,
    sequence: i64,
    from_stage: Option<String>,
    to_stage: String,
    status: String,
    offer_status: Option<String>,
    final_outcome: Option<String>,
    rejection_reason: Option<String>,
    changed_by: String,
    changed_at: DateTime<Utc>,
    notes: Option<String>,
}

impl TryFrom<TransitionRow> for StageTransitionRecord {
    type Error = StorageError;

    fn try_from(row: TransitionRow) -> std::result::Result<Self, Self::Error> {
        Ok(StageTransitionRecord {
            id: row.id,
            application_id: row.application_id,
            sequence: row.sequence,
            from_stage: parse_optional(row.from_stage)?,
            to_stage: row.to_stage.parse()?,
            status: row.status.parse()?,
            offer_status: parse_optional(row.offer_status)?,
            final_outcome: parse_optional(row.final_outcome)?,
            rejection_reason: parse_optional(row.rejection_reason)?,
            changed_by: row.changed_by,
            changed_at: row.changed_at,
            notes: row.notes,
        })
    }
}

#[derive(FromRow)]
struct NoteRow {
    id: Uuid,
    application_id: Uuid,
    author: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<NoteRow> for RecruiterNote {
    fn from(row: NoteRow) -> Self {
        RecruiterNote {
            id: row.id,
            application_id: row.application_id,
            author: row.author,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct EmailRow {
    id: Uuid,
    application_id: Uuid,
    recipient: String,
    subject: String,
    error: Option<String>,
    sent_at: DateTime<Utc>,
}

impl From<EmailRow> for EmailNotificationRecord {
    fn from(row: EmailRow) -> Self {
        EmailNotificationRecord {
            id: row.id,
            application_id: row.application_id,
            recipient: row.recipient,
            subject: row.subject,
            success: row.error.is_none(),
            error: row.error,
            sent_at: row.sent_at,
        }
    }
}

fn parse_optional<T>(value: Option<String>) -> std::result::Result<Option<T>, StorageError>
where
    T: FromStr<Err = UnknownTaxonomyValue>,
{
    value
        .map(|v| v.parse::<T>())
        .transpose()
        .map_err(StorageError::from)
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = StorageError>,
{
    rows.into_iter()
        .map(|row| T::try_from(row).map_err(Error::from))
        .collect()
}

#[derive(Clone)]
pub struct PgPipelineRepository {
    pool: PgPool,
    lock_timeout_ms: u64,
}

impl PgPipelineRepository {
    pub fn new(pool: PgPool, lock_timeout_ms: u64) -> Self {
        Self {
            pool,
            lock_timeout_ms,
        }
    }

    /// Opens a transaction whose row locks give up after the configured
    /// timeout instead of waiting indefinitely.
    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

async fn lock_application(conn: &mut PgConnection, id: Uuid) -> Result<Application> {
    let row = sqlx::query_as::<_, ApplicationRow>(&format!(
        "SELECT {} FROM pipeline_applications WHERE id = $1 FOR UPDATE",
        APPLICATION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Application {} not found", id)))?;
    Ok(Application::try_from(row)?)
}

async fn insert_transition(
    conn: &mut PgConnection,
    application_id: Uuid,
    from_stage: Option<Stage>,
    state: &ApplicationState,
    changed_by: &str,
    notes: Option<&str>,
    changed_at: DateTime<Utc>,
) -> Result<StageTransitionRecord> {
    let row = sqlx::query_as::<_, TransitionRow>(&format!(
        r#"
        INSERT INTO stage_transitions (
            id, application_id, from_stage, to_stage, status,
            offer_status, final_outcome, rejection_reason,
            changed_by, changed_at, notes
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING {}
        "#,
        TRANSITION_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(application_id)
    .bind(from_stage.map(Stage::as_str))
    .bind(state.stage.as_str())
    .bind(state.status.as_str())
    .bind(state.offer_status.map(|v| v.as_str()))
    .bind(state.final_outcome.map(|v| v.as_str()))
    .bind(state.rejection_reason.map(|v| v.as_str()))
    .bind(changed_by)
    .bind(changed_at)
    .bind(notes)
    .fetch_one(&mut *conn)
    .await?;
    Ok(StageTransitionRecord::try_from(row)?)
}

async fn write_summary(
    conn: &mut PgConnection,
    application_id: Uuid,
    state: &ApplicationState,
    updated_at: DateTime<Utc>,
) -> Result<Application> {
    let row = sqlx::query_as::<_, ApplicationRow>(&format!(
        r#"
        UPDATE pipeline_applications
        SET current_stage = $1, current_stage_status = $2, offer_status = $3,
            final_outcome = $4, final_rejection_reason = $5, updated_at = $6
        WHERE id = $7
        RETURNING {}
        "#,
        APPLICATION_COLUMNS
    ))
    .bind(state.stage.as_str())
    .bind(state.status.as_str())
    .bind(state.offer_status.map(|v| v.as_str()))
    .bind(state.final_outcome.map(|v| v.as_str()))
    .bind(state.rejection_reason.map(|v| v.as_str()))
    .bind(updated_at)
    .bind(application_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(Application::try_from(row)?)
}

async fn latest_changed_at(
    conn: &mut PgConnection,
    application_id: Uuid,
) -> Result<Option<DateTime<Utc>>> {
    let latest = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT MAX(changed_at) FROM stage_transitions WHERE application_id = $1",
    )
    .bind(application_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(latest)
}

async fn fetch_history(conn: &mut PgConnection, application_id: Uuid) -> Result<Vec<StageTransitionRecord>> {
    let rows = sqlx::query_as::<_, TransitionRow>(&format!(
        "SELECT {} FROM stage_transitions WHERE application_id = $1 ORDER BY changed_at ASC, sequence ASC",
        TRANSITION_COLUMNS
    ))
    .bind(application_id)
    .fetch_all(&mut *conn)
    .await?;
    convert_all(rows)
}

#[async_trait]
impl PipelineRepository for PgPipelineRepository {
    async fn create_application(&self, new: NewApplication) -> Result<CommittedTransition> {
        let mut tx = self.begin().await?;
        let initial = ApplicationState::initial();
        let created_at = now();
        let id = Uuid::new_v4();

        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            r#"
            INSERT INTO pipeline_applications (
                id, candidate_id, job_id, current_stage, current_stage_status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING {}
            "#,
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .bind(new.candidate_id)
        .bind(new.job_id)
        .bind(initial.stage.as_str())
        .bind(initial.status.as_str())
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await?;
        let application = Application::try_from(row)?;

        let transition = insert_transition(
            &mut tx,
            id,
            None,
            &initial,
            &new.created_by,
            new.notes.as_deref(),
            created_at,
        )
        .await?;

        tx.commit().await?;
        Ok(CommittedTransition {
            application,
            transition,
        })
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM pipeline_applications WHERE id = $1",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Application::try_from).transpose()?)
    }

    async fn list_applications_for_job(&self, job_id: Uuid) -> Result<Vec<Application>> {
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM pipeline_applications WHERE job_id = $1 ORDER BY created_at ASC",
            APPLICATION_COLUMNS
        ))
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn commit_transition(
        &self,
        application_id: Uuid,
        request: TransitionRequest,
    ) -> Result<CommittedTransition> {
        let mut tx = self.begin().await?;
        let current = lock_application(&mut tx, application_id).await?;

        // Dropping the transaction on a validation failure rolls back the lock.
        let accepted = validate_request(&current.state(), &request.proposed)?;

        // Another instance's clock may be ahead of ours.
        let changed_at = now_not_before(latest_changed_at(&mut tx, application_id).await?);
        let transition = insert_transition(
            &mut tx,
            application_id,
            Some(current.current_stage),
            &accepted,
            &request.changed_by,
            request.notes.as_deref(),
            changed_at,
        )
        .await?;
        let application = write_summary(&mut tx, application_id, &accepted, changed_at).await?;

        tx.commit().await?;
        Ok(CommittedTransition {
            application,
            transition,
        })
    }

    async fn history_for(&self, application_id: Uuid) -> Result<Vec<StageTransitionRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_history(&mut conn, application_id).await
    }

    async fn histories_for_job(&self, job_id: Uuid) -> Result<Vec<StageTransitionRecord>> {
        let rows = sqlx::query_as::<_, TransitionRow>(
            r#"
            SELECT t.id, t.application_id, t.sequence, t.from_stage, t.to_stage, t.status,
                   t.offer_status, t.final_outcome, t.rejection_reason,
                   t.changed_by, t.changed_at, t.notes
            FROM stage_transitions t
            JOIN pipeline_applications a ON a.id = t.application_id
            WHERE a.job_id = $1
            ORDER BY t.application_id, t.changed_at ASC, t.sequence ASC
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn reconcile_summary(&self, application_id: Uuid) -> Result<Application> {
        let mut tx = self.begin().await?;
        lock_application(&mut tx, application_id).await?;
        let tail = fetch_history(&mut tx, application_id)
            .await?
            .pop()
            .ok_or_else(|| {
                StorageError::Corrupt(format!("Application {} has no trail", application_id))
            })?;
        let application =
            write_summary(&mut tx, application_id, &tail.resulting_state(), now()).await?;
        tx.commit().await?;
        Ok(application)
    }

    async fn add_note(&self, note: NewRecruiterNote) -> Result<RecruiterNote> {
        let row = sqlx::query_as::<_, NoteRow>(
            r#"
            INSERT INTO recruiter_notes (id, application_id, author, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, application_id, author, content, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(note.application_id)
        .bind(&note.author)
        .bind(&note.content)
        .bind(now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn notes_for(&self, application_id: Uuid) -> Result<Vec<RecruiterNote>> {
        let rows = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT id, application_id, author, content, created_at
            FROM recruiter_notes
            WHERE application_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(RecruiterNote::from).collect())
    }

    async fn append_email(&self, email: NewEmailNotification) -> Result<EmailNotificationRecord> {
        let row = sqlx::query_as::<_, EmailRow>(
            r#"
            INSERT INTO email_notifications (id, application_id, recipient, subject, error, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, application_id, recipient, subject, error, sent_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email.application_id)
        .bind(&email.recipient)
        .bind(&email.subject)
        .bind(&email.error)
        .bind(now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn emails_for(&self, application_id: Uuid) -> Result<Vec<EmailNotificationRecord>> {
        let rows = sqlx::query_as::<_, EmailRow>(
            r#"
            SELECT id, application_id, recipient, subject, error, sent_at
            FROM email_notifications
            WHERE application_id = $1
            ORDER BY sent_at ASC
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(EmailNotificationRecord::from).collect())
    }
}
