use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use insights_analytics::{EventQuery, EventWarehouse, FixtureWarehouse};
use insights_api::rest::SESSION_HEADER;
use insights_api::{ApiServer, AppState};
use insights_cache::CachedWarehouse;
use insights_core::config::PipelineConfig;
use insights_platform::{PasswordGate, SessionManager};
use insights_reporting::DashboardPipeline;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceExt;

const EVENTS: &str = r#"[
    {"event_date": "2025-01-01", "event_time": "08:00:00", "event_name": "first_visit", "raw_user_id": "u1",
     "utm_term": "seguro vida", "phrase": "quero proteger minha familia", "profile": {"renda": "alta"}},
    {"event_date": "2025-01-01", "event_time": "08:01:00", "event_name": "Etapa - 0 - Iniciar", "raw_user_id": "u1",
     "utm_term": "seguro vida", "phrase": "quero proteger minha familia", "profile": {"renda": "alta"}},
    {"event_date": "2025-01-02", "event_time": "08:02:00", "event_name": "envio_leads_leadster", "raw_user_id": "u1",
     "utm_term": "seguro vida", "phrase": "quero proteger minha familia", "profile": {"renda": "alta"}},
    {"event_date": "2025-01-02", "event_time": "10:00:00", "event_name": "first_visit", "raw_user_id": "u2",
     "profile": {"renda": "baixa"}},
    {"event_date": "2025-01-02", "event_time": "10:00:00", "event_name": "first_visit", "raw_user_id": "unknown"}
]"#;

struct Harness {
    app: Router,
    _fixture: tempfile::NamedTempFile,
}

fn harness(contents: Option<&str>) -> Harness {
    let fixture = tempfile::NamedTempFile::new().unwrap();
    let path = match contents {
        Some(text) => {
            std::fs::write(fixture.path(), text).unwrap();
            fixture.path().to_path_buf()
        }
        None => "/nonexistent/events.json".into(),
    };
    let query =
        EventQuery::new("events", NaiveDate::from_ymd_opt(2024, 12, 12).unwrap(), "orbital").unwrap();
    let state = AppState {
        sessions: Arc::new(SessionManager::new(PasswordGate::new("orbital"))),
        source: Arc::new(CachedWarehouse::new(
            EventWarehouse::Fixture(FixtureWarehouse::new(path)),
            query,
        )),
        pipeline: Arc::new(DashboardPipeline::from_config(&PipelineConfig::default()).unwrap()),
        node_id: "test-node".into(),
        start_time: Instant::now(),
    };
    Harness {
        app: ApiServer::router(state),
        _fixture: fixture,
    }
}

async fn call(app: &Router, method: &str, uri: &str, session: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(id) = session {
        req = req.header(SESSION_HEADER, id);
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn unlocked_session(app: &Router) -> String {
    let (status, body) = call(app, "POST", "/v1/sessions", None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["session_id"].as_str().unwrap().to_string();
    let (status, _) = call(
        app,
        "POST",
        &format!("/v1/sessions/{id}/login"),
        None,
        Some(json!({"password": "orbital"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    id
}

#[tokio::test]
async fn test_password_gate() {
    let h = harness(Some(EVENTS));
    let (_, body) = call(&h.app, "POST", "/v1/sessions", None, None).await;
    let id = body["session_id"].as_str().unwrap().to_string();
    let login = format!("/v1/sessions/{id}/login");

    let (status, body) = call(&h.app, "POST", &login, None, Some(json!({"password": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["authenticated"], false);

    let (status, body) = call(&h.app, "POST", &login, None, Some(json!({"password": "guess"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Senha incorreta. Tente novamente.");
    assert!(!body.to_string().contains("orbital"));

    let (status, _) = call(&h.app, "POST", "/v1/dashboard", Some(&id), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&h.app, "POST", &login, None, Some(json!({"password": "orbital"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
}

#[tokio::test]
async fn test_dashboard_requires_session_header() {
    let h = harness(Some(EVENTS));
    let (status, body) = call(&h.app, "POST", "/v1/dashboard", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");

    let stranger = uuid::Uuid::new_v4().to_string();
    let (status, _) = call(&h.app, "GET", "/v1/dashboard/options", Some(&stranger), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_dashboard_report() {
    let h = harness(Some(EVENTS));
    let id = unlocked_session(&h.app).await;

    let (status, report) = call(
        &h.app,
        "POST",
        "/v1/dashboard",
        Some(&id),
        Some(json!({"events": ["Todos"], "terms": ["Todos"], "profile_attribute": "renda"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["tracked_users"], 2);
    assert_eq!(report["events"].as_array().unwrap().len(), 4);
    assert_eq!(report["funnel"][0]["label"], "Iniciar Forms");
    assert_eq!(report["funnel"][0]["users"], 1);
    assert_eq!(report["funnel"][4]["users"], 1);
    assert_eq!(report["top_phrase_words"][0]["word"], "quero");
    assert_eq!(report["profile"]["conversion"][0]["value"], "alta");
    assert_eq!(report["profile"]["conversion"][0]["conversion_rate"], 100.0);
}

#[tokio::test]
async fn test_options_and_bad_requests() {
    let h = harness(Some(EVENTS));
    let id = unlocked_session(&h.app).await;

    let (status, opts) = call(&h.app, "GET", "/v1/dashboard/options", Some(&id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(opts["event_choices"][0], "Todos");
    assert_eq!(opts["event_choices"][1], "Default");
    assert_eq!(opts["min_date"], "2025-01-01");
    assert_eq!(opts["max_date"], "2025-01-02");

    let (status, _) = call(
        &h.app,
        "POST",
        "/v1/dashboard",
        Some(&id),
        Some(json!({"profile_attribute": "shoe_size"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &h.app,
        "POST",
        "/v1/dashboard",
        Some(&id),
        Some(json!({"start": "2025-01-05", "end": "2025-01-01"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_warehouse_failure_is_a_server_error() {
    let h = harness(None);
    let id = unlocked_session(&h.app).await;
    let (status, body) = call(&h.app, "POST", "/v1/dashboard", Some(&id), Some(json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "warehouse_failed");

    let (status, _) = call(&h.app, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_cache_invalidation_and_health() {
    let h = harness(Some(EVENTS));
    let id = unlocked_session(&h.app).await;
    call(&h.app, "POST", "/v1/dashboard", Some(&id), Some(json!({}))).await;

    let (_, health) = call(&h.app, "GET", "/health", None, None).await;
    assert_eq!(health["backend"], "fixture");
    assert_eq!(health["events_cached"], true);

    let (status, body) = call(&h.app, "POST", "/v1/cache/invalidate", Some(&id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, health) = call(&h.app, "GET", "/health", None, None).await;
    assert_eq!(health["events_cached"], false);

    let (status, _) = call(&h.app, "DELETE", &format!("/v1/sessions/{id}"), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&h.app, "POST", "/v1/dashboard", Some(&id), Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
