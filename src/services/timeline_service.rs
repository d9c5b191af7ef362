//! Read-only projections over an application's audit trail: time spent in
//! each stage occurrence, time since the last move, and the merged feed of
//! transitions, recruiter notes and outbound emails.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::database::repository::PipelineRepository;
use crate::error::{Error, Result};
use crate::models::{
    email_notification::EmailNotificationRecord, recruiter_note::RecruiterNote, stage::Stage,
    stage_transition::StageTransitionRecord,
};
use crate::utils::time::humanize_duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOccurrence {
    pub stage: Stage,
    pub entered_at: DateTime<Utc>,
    /// `None` while the application is still in this occurrence.
    pub exited_at: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub duration: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageDurationReport {
    pub application_id: Uuid,
    pub occurrences: Vec<StageOccurrence>,
    pub since_last_transition_seconds: Option<i64>,
    pub since_last_transition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineKind {
    Stage,
    Note,
    Email,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TimelinePayload {
    Stage(StageTransitionRecord),
    Note(RecruiterNote),
    Email(EmailNotificationRecord),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEntry {
    pub kind: TimelineKind,
    pub timestamp: DateTime<Utc>,
    pub payload: TimelinePayload,
}

impl From<StageTransitionRecord> for TimelineEntry {
    fn from(record: StageTransitionRecord) -> Self {
        TimelineEntry {
            kind: TimelineKind::Stage,
            timestamp: record.changed_at,
            payload: TimelinePayload::Stage(record),
        }
    }
}

impl From<RecruiterNote> for TimelineEntry {
    fn from(note: RecruiterNote) -> Self {
        TimelineEntry {
            kind: TimelineKind::Note,
            timestamp: note.created_at,
            payload: TimelinePayload::Note(note),
        }
    }
}

impl From<EmailNotificationRecord> for TimelineEntry {
    fn from(email: EmailNotificationRecord) -> Self {
        TimelineEntry {
            kind: TimelineKind::Email,
            timestamp: email.sent_at,
            payload: TimelinePayload::Email(email),
        }
    }
}

/// Measures the stage occurrence that starts at `history[index]`.
///
/// The exit is the nearest later record whose `from_stage` is that stage, so
/// a stage that is revisited is measured once per visit. A status-only record
/// (same stage on both sides) closes the running occurrence and opens a new
/// one. Without an exit the occurrence runs until `now`.
pub fn occurrence_at(
    history: &[StageTransitionRecord],
    index: usize,
    now: DateTime<Utc>,
) -> Option<StageOccurrence> {
    let entry = history.get(index)?;
    let stage = entry.to_stage;
    let exited_at = history[index + 1..]
        .iter()
        .find(|r| r.from_stage == Some(stage))
        .map(|r| r.changed_at);

    let elapsed = exited_at.unwrap_or(now) - entry.changed_at;
    Some(StageOccurrence {
        stage,
        entered_at: entry.changed_at,
        exited_at,
        duration_seconds: elapsed.num_seconds().max(0),
        duration: humanize_duration(elapsed),
    })
}

/// Every stage occurrence in an ascending history, oldest first.
pub fn stage_occurrences(
    history: &[StageTransitionRecord],
    now: DateTime<Utc>,
) -> Vec<StageOccurrence> {
    (0..history.len())
        .filter_map(|index| occurrence_at(history, index, now))
        .collect()
}

pub fn time_since_last_transition(
    history: &[StageTransitionRecord],
    now: DateTime<Utc>,
) -> Option<chrono::Duration> {
    history.last().map(|last| now - last.changed_at)
}

/// Merges the three append-only sources, most recent first. The sort is
/// stable, so equal timestamps keep transitions before notes before emails
/// and each source's own order.
pub fn build_timeline(
    transitions: Vec<StageTransitionRecord>,
    notes: Vec<RecruiterNote>,
    emails: Vec<EmailNotificationRecord>,
) -> Vec<TimelineEntry> {
    let mut entries: Vec<TimelineEntry> = transitions
        .into_iter()
        .map(TimelineEntry::from)
        .chain(notes.into_iter().map(TimelineEntry::from))
        .chain(emails.into_iter().map(TimelineEntry::from))
        .collect();
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    entries
}

#[derive(Clone)]
pub struct TimelineService {
    repo: Arc<dyn PipelineRepository>,
}

impl TimelineService {
    pub fn new(repo: Arc<dyn PipelineRepository>) -> Self {
        Self { repo }
    }

    async fn ensure_exists(&self, application_id: Uuid) -> Result<()> {
        self.repo
            .get_application(application_id)
            .await?
            .ok_or_else(|| Error::NotFound("Application not found".to_string()))?;
        Ok(())
    }

    pub async fn application_timeline(&self, application_id: Uuid) -> Result<Vec<TimelineEntry>> {
        self.ensure_exists(application_id).await?;
        let transitions = self.repo.history_for(application_id).await?;
        let notes = self.repo.notes_for(application_id).await?;
        let emails = self.repo.emails_for(application_id).await?;
        Ok(build_timeline(transitions, notes, emails))
    }

    pub async fn stage_durations(
        &self,
        application_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StageDurationReport> {
        self.ensure_exists(application_id).await?;
        let history = self.repo.history_for(application_id).await?;
        let since_last = time_since_last_transition(&history, now);

        Ok(StageDurationReport {
            application_id,
            occurrences: stage_occurrences(&history, now),
            since_last_transition_seconds: since_last.map(|d| d.num_seconds().max(0)),
            since_last_transition: since_last.map(humanize_duration),
        })
    }
}
