use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::database::repository::PipelineRepository;
use crate::error::Result;
use crate::models::email_notification::{EmailNotificationRecord, NewEmailNotification};
use crate::models::stage_transition::CommittedTransition;

/// Sends stage-change notifications through the outbound mail gateway and
/// records every attempt, successful or not.
#[derive(Clone)]
pub struct NotificationService {
    repo: Arc<dyn PipelineRepository>,
    client: Client,
    target_url: Option<String>,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn PipelineRepository>,
        target_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            repo,
            client,
            target_url,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.target_url.is_some()
    }

    /// Returns `None` when no gateway is configured, in which case nothing is
    /// sent and nothing is recorded.
    pub async fn notify_stage_change(
        &self,
        recipient: &str,
        committed: &CommittedTransition,
    ) -> Result<Option<EmailNotificationRecord>> {
        let Some(url) = self.target_url.as_deref() else {
            return Ok(None);
        };

        let transition = &committed.transition;
        let subject = format!(
            "Tu postulación avanzó a: {}",
            transition.to_stage.label()
        );
        let payload = json!({
            "to": recipient,
            "subject": subject,
            "application_id": committed.application.id,
            "stage": transition.to_stage,
            "status": transition.status,
            "changed_at": transition.changed_at,
        });

        let error = match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => None,
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                Some(format!("Gateway responded {}: {}", status, body))
            }
            Err(err) => Some(err.to_string()),
        };

        if let Some(ref err) = error {
            tracing::warn!(
                application_id = %committed.application.id,
                error = %err,
                "Stage change notification failed"
            );
        }

        let record = self
            .repo
            .append_email(NewEmailNotification {
                application_id: committed.application.id,
                recipient: recipient.to_string(),
                subject,
                error,
            })
            .await?;
        Ok(Some(record))
    }
}
