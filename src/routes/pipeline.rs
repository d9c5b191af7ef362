use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::pipeline_dto::{
        AddNotePayload, CreateApplicationPayload, RecordEmailPayload, StageChangePayload,
    },
    error::Result,
    models::stage,
    utils::time::now,
    AppState,
};

#[axum::debug_handler]
pub async fn get_taxonomy() -> impl IntoResponse {
    Json(stage::dictionary())
}

#[axum::debug_handler]
pub async fn create_application(
    State(state): State<AppState>,
    Json(payload): Json<CreateApplicationPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let created = state.pipeline_service.create_application(payload.into()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[axum::debug_handler]
pub async fn get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let application = state.pipeline_service.get_application(id).await?;
    Ok(Json(application))
}

/// Returns the updated application together with the appended trail record,
/// so callers need no follow-up read.
#[axum::debug_handler]
pub async fn request_stage_change(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<StageChangePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let request = payload.to_request();
    let committed = state
        .pipeline_service
        .request_stage_change(id, request)
        .await?;

    if let Some(recipient) = payload.notify_email {
        if state.notification_service.is_enabled() {
            let notifier = state.notification_service.clone();
            let committed = committed.clone();
            tokio::spawn(async move {
                if let Err(e) = notifier.notify_stage_change(&recipient, &committed).await {
                    tracing::error!(
                        application_id = %committed.application.id,
                        error = ?e,
                        "Failed to record stage change notification"
                    );
                }
            });
        }
    }

    Ok(Json(committed))
}

#[axum::debug_handler]
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let history = state.pipeline_service.history(id).await?;
    Ok(Json(history))
}

#[axum::debug_handler]
pub async fn get_application_timeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let timeline = state.timeline_service.application_timeline(id).await?;
    Ok(Json(timeline))
}

#[axum::debug_handler]
pub async fn get_stage_durations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let report = state.timeline_service.stage_durations(id, now()).await?;
    Ok(Json(report))
}

#[axum::debug_handler]
pub async fn add_recruiter_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddNotePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let note = state
        .pipeline_service
        .add_recruiter_note(id, payload.author, payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

#[axum::debug_handler]
pub async fn record_email_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordEmailPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let record = state
        .pipeline_service
        .record_email_notification(payload.into_new(id))
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[axum::debug_handler]
pub async fn list_job_applications(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let applications = state.pipeline_service.list_for_job(job_id).await?;
    Ok(Json(applications))
}

#[axum::debug_handler]
pub async fn get_pipeline_funnel(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let funnel = state.funnel_service.funnel_for_job(job_id).await?;
    Ok(Json(funnel))
}
