use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::models::stage::UnknownTaxonomyValue;
use crate::services::transition_validator::TransitionError;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the durable store. Kept apart from validation failures so a
/// client can tell "your request was invalid" from "please retry".
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Application is locked by a concurrent change")]
    LockContention,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code())
            .map(|code| code.into_owned());
        // lock_not_available, serialization_failure, deadlock_detected
        if matches!(code.as_deref(), Some("55P03" | "40001" | "40P01")) {
            return StorageError::LockContention;
        }

        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Unavailable(err.to_string())
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StorageError::Corrupt(err.to_string())
            }
            other => StorageError::Database(other),
        }
    }
}

impl From<UnknownTaxonomyValue> for StorageError {
    fn from(err: UnknownTaxonomyValue) -> Self {
        StorageError::Corrupt(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) | Error::Validation(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Transition(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Reqwest(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = match &self {
            Error::Transition(err) => json!({ "error": err.to_string(), "rule": err.rule() }),
            Error::Storage(err) => {
                tracing::error!(error = %err, "Storage failure");
                json!({ "error": err.to_string(), "retryable": true })
            }
            Error::Config(_) | Error::Internal(_) => {
                tracing::error!(error = %self, "Internal failure");
                json!({ "error": "An unexpected error occurred" })
            }
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Storage(StorageError::from(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::stage::Stage;

    #[test]
    fn validation_and_storage_errors_map_to_distinct_statuses() {
        let invalid = Error::from(TransitionError::MissingOfferStatus { stage: Stage::Offer });
        let storage = Error::from(StorageError::LockContention);
        assert_eq!(invalid.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(storage.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn row_not_found_becomes_not_found() {
        let err = Error::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn pool_timeout_is_unavailable() {
        let err = Error::from(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, Error::Storage(StorageError::Unavailable(_))));
    }

    #[test]
    fn unknown_taxonomy_value_in_storage_is_corrupt() {
        let err: StorageError = "onboarding"
            .parse::<Stage>()
            .map_err(StorageError::from)
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }
}
