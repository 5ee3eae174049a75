//! REST handlers for the dashboard: sessions and password gate, dashboard
//! panels, cache control, and operational probes.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use insights_cache::CachedWarehouse;
use insights_core::{InsightsError, ProfileAttribute};
use insights_platform::{AuthOutcome, Session, SessionManager};
use insights_reporting::{DashboardPipeline, DashboardQuery, DashboardReport, FilterOptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

/// Header carrying the client's session id.
pub const SESSION_HEADER: &str = "x-session-id";

const LOCKED_MESSAGE: &str = "Aguardando inserção da senha correta para acessar o conteúdo...";

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub source: Arc<CachedWarehouse>,
    pub pipeline: Arc<DashboardPipeline>,
    pub node_id: String,
    pub start_time: Instant,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Handler error carrying the HTTP status it maps to.
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<InsightsError> for ApiError {
    fn from(e: InsightsError) -> Self {
        match e {
            InsightsError::Unauthenticated | InsightsError::UnknownSession(_) => {
                Self::new(StatusCode::UNAUTHORIZED, "unauthenticated", LOCKED_MESSAGE)
            }
            InsightsError::InvalidDateRange { .. } | InsightsError::UnknownAttribute(_) => {
                Self::new(StatusCode::BAD_REQUEST, "invalid_request", e.to_string())
            }
            InsightsError::Warehouse(_) => {
                error!(error = %e, "Warehouse failure aborted the request");
                metrics::counter!("api.errors").increment(1);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "warehouse_failed",
                    "Warehouse query failed",
                )
            }
            other => {
                error!(error = %other, "Request failed");
                metrics::counter!("api.errors").increment(1);
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal processing error",
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Resolve the caller's session from the request headers.
fn session_from(state: &AppState, headers: &HeaderMap) -> Result<Session, ApiError> {
    let id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or(InsightsError::Unauthenticated)?;
    state
        .sessions
        .get(id)
        .ok_or_else(|| InsightsError::UnknownSession(id.to_string()).into())
}

#[derive(Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub authenticated: bool,
    pub message: String,
}

/// POST /v1/sessions: open a locked session.
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionResponse>) {
    let session = state.sessions.create_session();
    (
        StatusCode::CREATED,
        Json(SessionResponse {
            session_id: session.session_id,
            authenticated: false,
            message: LOCKED_MESSAGE.to_string(),
        }),
    )
}

#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

/// POST /v1/sessions/:id/login: submit the dashboard password.
pub async fn login(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<LoginRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let outcome = state.sessions.login(session_id, &request.password)?;
    let status = match outcome {
        AuthOutcome::Granted => StatusCode::OK,
        AuthOutcome::Empty => StatusCode::BAD_REQUEST,
        AuthOutcome::Rejected => StatusCode::UNAUTHORIZED,
    };
    let authenticated = state
        .sessions
        .get(session_id)
        .is_some_and(|s| s.authenticated);
    Ok((
        status,
        Json(SessionResponse {
            session_id,
            authenticated,
            message: outcome.message().to_string(),
        }),
    ))
}

/// DELETE /v1/sessions/:id: end a session.
pub async fn logout(State(state): State<AppState>, Path(session_id): Path<Uuid>) -> StatusCode {
    if state.sessions.revoke(session_id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// GET /v1/dashboard/options: sidebar choices.
pub async fn dashboard_options(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<FilterOptions>, ApiError> {
    let session = session_from(&state, &headers)?;
    if !session.authenticated {
        return Err(InsightsError::Unauthenticated.into());
    }
    let records = state.source.records().await?;
    Ok(Json(state.pipeline.options(&session, &records)?))
}

/// Dashboard request body. Missing selections fall back to the widget defaults.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardRequest {
    #[serde(default)]
    pub events: Option<Vec<String>>,
    #[serde(default)]
    pub terms: Option<Vec<String>>,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
    #[serde(default)]
    pub profile_attribute: Option<String>,
}

impl TryFrom<DashboardRequest> for DashboardQuery {
    type Error = InsightsError;

    fn try_from(request: DashboardRequest) -> Result<Self, Self::Error> {
        let defaults = DashboardQuery::default();
        Ok(DashboardQuery {
            events: request.events.unwrap_or(defaults.events),
            terms: request.terms.unwrap_or(defaults.terms),
            start: request.start,
            end: request.end,
            profile_attribute: request
                .profile_attribute
                .as_deref()
                .map(str::parse::<ProfileAttribute>)
                .transpose()?,
        })
    }
}

/// POST /v1/dashboard: run the pipeline for the given selections.
pub async fn dashboard(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<DashboardRequest>,
) -> Result<Json<DashboardReport>, ApiError> {
    let session = session_from(&state, &headers)?;
    if !session.authenticated {
        warn!(session_id = %session.session_id, "Dashboard requested by locked session");
        return Err(InsightsError::Unauthenticated.into());
    }
    let query = DashboardQuery::try_from(request)?;
    let records = state.source.records().await?;
    Ok(Json(state.pipeline.run(&session, &records, &query)?))
}

#[derive(Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub removed: usize,
}

/// POST /v1/cache/invalidate: force the next request to refetch.
pub async fn invalidate_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let session = session_from(&state, &headers)?;
    if !session.authenticated {
        return Err(InsightsError::Unauthenticated.into());
    }
    Ok(Json(InvalidateResponse {
        removed: state.source.invalidate().await,
    }))
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
    pub backend: String,
    pub events_cached: bool,
}

/// GET /health: Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        backend: state.source.warehouse().backend_name().to_string(),
        events_cached: state.source.is_cached(),
    })
}

/// GET /ready: 200 once the warehouse answers.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.source.warehouse().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            warn!(error = %e, "Warehouse not reachable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// GET /live: Liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}
