use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use recruiting_pipeline::{
    config::Config, database::memory::MemoryPipelineRepository, routes, AppState,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;
use uuid::Uuid;

fn setup_app() -> Router {
    let config = Config::from_lookup(|name| match name {
        "SERVER_ADDRESS" => Some("127.0.0.1:0".to_string()),
        "STORE_BACKEND" => Some("memory".to_string()),
        _ => None,
    })
    .expect("config");
    let repo = Arc::new(MemoryPipelineRepository::new());
    let state = AppState::new(repo, &config).expect("state");
    routes::router(state)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<JsonValue>) -> (StatusCode, JsonValue) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_application(app: &Router, job_id: Uuid) -> String {
    let (status, body) = call(
        app,
        "POST",
        "/api/applications",
        Some(json!({
            "candidate_id": Uuid::new_v4(),
            "job_id": job_id,
            "created_by": "recruiter-1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["application"]["id"].as_str().unwrap().to_string()
}

async fn move_to(app: &Router, id: &str, body: JsonValue) -> (StatusCode, JsonValue) {
    call(app, "POST", &format!("/api/applications/{}/stage", id), Some(body)).await
}

async fn history(app: &Router, id: &str) -> Vec<JsonValue> {
    let (status, body) = call(app, "GET", &format!("/api/applications/{}/history", id), None).await;
    assert_eq!(status, StatusCode::OK);
    body.as_array().unwrap().clone()
}

#[tokio::test]
async fn plain_move_is_accepted_and_appended() {
    let app = setup_app();
    let id = create_application(&app, Uuid::new_v4()).await;

    let (status, body) = move_to(
        &app,
        &id,
        json!({ "stage": "screening", "status": "completed", "changed_by": "recruiter-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["application"]["current_stage"], "screening");
    assert_eq!(body["transition"]["from_stage"], "applied");

    let trail = history(&app, &id).await;
    assert_eq!(trail.len(), 2);
    assert!(trail[0]["from_stage"].is_null());

    let (_, app_body) = call(&app, "GET", &format!("/api/applications/{}", id), None).await;
    assert_eq!(app_body["current_stage"], "screening");
    assert_eq!(app_body["current_stage_status"], "completed");
}

#[tokio::test]
async fn offer_stage_without_offer_status_is_rejected() {
    let app = setup_app();
    let id = create_application(&app, Uuid::new_v4()).await;

    let (status, body) = move_to(
        &app,
        &id,
        json!({ "stage": "offer", "status": "pending", "changed_by": "recruiter-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["rule"], "missing_offer_status");

    assert_eq!(history(&app, &id).await.len(), 1);
    let (_, app_body) = call(&app, "GET", &format!("/api/applications/{}", id), None).await;
    assert_eq!(app_body["current_stage"], "applied");
    assert!(app_body["offer_status"].is_null());
}

#[tokio::test]
async fn discarded_application_cannot_move() {
    let app = setup_app();
    let id = create_application(&app, Uuid::new_v4()).await;

    let (status, _) = move_to(
        &app,
        &id,
        json!({ "stage": "interview", "status": "discarded_in_stage", "changed_by": "recruiter-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = move_to(
        &app,
        &id,
        json!({
            "stage": "closed",
            "status": "completed",
            "final_outcome": "rejected",
            "changed_by": "recruiter-1"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["rule"], "discarded_application_immutable");

    let (status, body) = move_to(
        &app,
        &id,
        json!({ "stage": "onboarding", "status": "pending", "changed_by": "recruiter-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["rule"], "discarded_application_immutable");
    assert_eq!(history(&app, &id).await.len(), 2);
}

#[tokio::test]
async fn closing_validates_outcome_and_reason() {
    let app = setup_app();
    let id = create_application(&app, Uuid::new_v4()).await;

    let (status, body) = move_to(
        &app,
        &id,
        json!({ "stage": "closed", "status": "completed", "changed_by": "r" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["rule"], "missing_final_outcome");

    let (status, body) = move_to(
        &app,
        &id,
        json!({
            "stage": "closed",
            "status": "completed",
            "final_outcome": "rejected",
            "rejection_reason": "accepted_other_offer",
            "changed_by": "r"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["rule"], "invalid_rejection_reason");

    let (status, body) = move_to(
        &app,
        &id,
        json!({
            "stage": "closed",
            "status": "completed",
            "final_outcome": "rejected",
            "rejection_reason": "skills_mismatch",
            "changed_by": "r"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["application"]["final_rejection_reason"], "skills_mismatch");
}

#[tokio::test]
async fn unknown_stage_and_missing_application() {
    let app = setup_app();
    let id = create_application(&app, Uuid::new_v4()).await;

    let (status, body) = move_to(
        &app,
        &id,
        json!({ "stage": "onboarding", "status": "pending", "changed_by": "r" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["rule"], "unknown_stage");

    let (status, _) = move_to(
        &app,
        &Uuid::new_v4().to_string(),
        json!({ "stage": "screening", "status": "pending", "changed_by": "r" }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = move_to(
        &app,
        &id,
        json!({ "stage": "screening", "status": "pending", "changed_by": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn repeated_transition_appends_without_changing_state() {
    let app = setup_app();
    let id = create_application(&app, Uuid::new_v4()).await;
    let change = json!({
        "stage": "offer",
        "status": "in_progress",
        "offer_status": "extended",
        "changed_by": "r"
    });

    let (_, first) = move_to(&app, &id, change.clone()).await;
    let (_, second) = move_to(&app, &id, change).await;
    for field in ["current_stage", "current_stage_status", "offer_status", "final_outcome"] {
        assert_eq!(first["application"][field], second["application"][field]);
    }
    assert_eq!(history(&app, &id).await.len(), 3);
}

#[tokio::test]
async fn revisited_stage_durations_use_nearest_exit() {
    let app = setup_app();
    let id = create_application(&app, Uuid::new_v4()).await;
    for body in [
        json!({ "stage": "screening", "status": "in_progress", "changed_by": "r" }),
        json!({ "stage": "interview", "status": "in_progress", "changed_by": "r" }),
        json!({ "stage": "screening", "status": "in_progress", "changed_by": "r" }),
        json!({ "stage": "offer", "status": "pending", "offer_status": "drafted", "changed_by": "r" }),
    ] {
        let (status, _) = move_to(&app, &id, body).await;
        assert_eq!(status, StatusCode::OK);
    }
    let trail = history(&app, &id).await;

    let (status, report) =
        call(&app, "GET", &format!("/api/applications/{}/durations", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let occurrences = report["occurrences"].as_array().unwrap();
    assert_eq!(occurrences.len(), 5);

    let screening: Vec<&JsonValue> = occurrences
        .iter()
        .filter(|o| o["stage"] == "screening")
        .collect();
    assert_eq!(screening.len(), 2);
    assert_eq!(screening[0]["exited_at"], trail[2]["changed_at"]);
    assert_eq!(screening[1]["exited_at"], trail[4]["changed_at"]);
    assert!(occurrences[4]["exited_at"].is_null());
    assert!(report["since_last_transition"].is_string());
}

#[tokio::test]
async fn timeline_merges_sources_most_recent_first() {
    let app = setup_app();
    let id = create_application(&app, Uuid::new_v4()).await;

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/applications/{}/emails", id),
        Some(json!({ "recipient": "candidate@example.com", "subject": "Recibimos tu postulación" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, note) = call(
        &app,
        "POST",
        &format!("/api/applications/{}/notes", id),
        Some(json!({ "author": "ana", "content": "Perfil sólido en backend" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(note["author"], "ana");

    move_to(
        &app,
        &id,
        json!({ "stage": "screening", "status": "pending", "changed_by": "ana" }),
    )
    .await;

    let (status, timeline) =
        call(&app, "GET", &format!("/api/applications/{}/timeline", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = timeline.as_array().unwrap();
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0]["kind"], "stage");
    assert_eq!(entries[0]["payload"]["to_stage"], "screening");
    assert_eq!(entries[3]["kind"], "stage");

    let kinds: Vec<&str> = entries.iter().map(|e| e["kind"].as_str().unwrap()).collect();
    assert!(kinds.contains(&"note"));
    assert!(kinds.contains(&"email"));

    let timestamps: Vec<String> = entries
        .iter()
        .map(|e| e["timestamp"].as_str().unwrap().to_string())
        .collect();
    let parsed: Vec<chrono::DateTime<chrono::Utc>> = timestamps
        .iter()
        .map(|t| t.parse().unwrap())
        .collect();
    assert!(parsed.windows(2).all(|w| w[0] >= w[1]));

    // notes never move the application
    assert_eq!(history(&app, &id).await.len(), 2);
}

#[tokio::test]
async fn blank_note_is_rejected() {
    let app = setup_app();
    let id = create_application(&app, Uuid::new_v4()).await;

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/applications/{}/notes", id),
        Some(json!({ "author": "ana", "content": "    " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, timeline) =
        call(&app, "GET", &format!("/api/applications/{}/timeline", id), None).await;
    assert_eq!(timeline.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn funnel_reports_conversion_per_stage() {
    let app = setup_app();
    let job_id = Uuid::new_v4();

    for i in 0..10 {
        let id = create_application(&app, job_id).await;
        if i < 6 {
            move_to(
                &app,
                &id,
                json!({ "stage": "screening", "status": "completed", "changed_by": "r" }),
            )
            .await;
        }
        if i < 3 {
            move_to(
                &app,
                &id,
                json!({ "stage": "interview", "status": "pending", "changed_by": "r" }),
            )
            .await;
        }
    }
    // another job's applicants stay out of this funnel
    create_application(&app, Uuid::new_v4()).await;

    let (status, funnel) = call(&app, "GET", &format!("/api/jobs/{}/funnel", job_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(funnel["total_applicants"], 10);

    let stages = funnel["stages"].as_array().unwrap();
    assert_eq!(stages[0]["reached"], 10);
    assert_eq!(stages[1]["reached"], 6);
    assert_eq!(stages[2]["reached"], 3);
    assert_eq!(stages[1]["conversion_from_previous"], 60.0);
    assert_eq!(stages[2]["conversion_from_previous"], 50.0);
    assert_eq!(stages[2]["conversion_from_total"], 30.0);

    let (_, listed) =
        call(&app, "GET", &format!("/api/jobs/{}/applications", job_id), None).await;
    assert_eq!(listed.as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn taxonomy_and_health_are_served() {
    let app = setup_app();
    let (status, taxonomy) = call(&app, "GET", "/api/pipeline/taxonomy", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(taxonomy["stages"][3]["stage"], "offer");
    assert_eq!(taxonomy["stages"][3]["requires_offer_status"], true);
    assert_eq!(taxonomy["stages"][4]["requires_final_outcome"], true);

    let (status, health) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
}
