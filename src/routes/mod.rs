pub mod health;
pub mod pipeline;

use axum::{
    routing::{get, post},
    Router,
};

use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/pipeline/taxonomy", get(pipeline::get_taxonomy))
        .route("/api/applications", post(pipeline::create_application))
        .route("/api/applications/:id", get(pipeline::get_application))
        .route(
            "/api/applications/:id/stage",
            post(pipeline::request_stage_change),
        )
        .route("/api/applications/:id/history", get(pipeline::get_history))
        .route(
            "/api/applications/:id/timeline",
            get(pipeline::get_application_timeline),
        )
        .route(
            "/api/applications/:id/durations",
            get(pipeline::get_stage_durations),
        )
        .route(
            "/api/applications/:id/notes",
            post(pipeline::add_recruiter_note),
        )
        .route(
            "/api/applications/:id/emails",
            post(pipeline::record_email_notification),
        )
        .route(
            "/api/jobs/:id/applications",
            get(pipeline::list_job_applications),
        )
        .route("/api/jobs/:id/funnel", get(pipeline::get_pipeline_funnel))
        .with_state(state)
}
