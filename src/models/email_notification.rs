use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outbound notification written by the mail sender after every attempt,
/// successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailNotificationRecord {
    pub id: Uuid,
    pub application_id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub success: bool,
    pub error: Option<String>,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEmailNotification {
    pub application_id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub error: Option<String>,
}
