use crate::hub::{Hub, MetricsSnapshot};
use crate::message::Message;
use crate::session::{SessionError, SessionRegistry};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// State for the admin API.
#[derive(Clone)]
pub struct AdminAppState {
    pub hub: Hub,
    pub sessions: SessionRegistry,
    /// Required bearer token for mutating endpoints. None = unrestricted.
    pub admin_token: Option<String>,
}

#[derive(Deserialize)]
pub struct IssueSessionRequest {
    pub user_id: u64,
}

#[derive(Deserialize)]
pub struct NotifyRequest {
    pub title: String,
    pub body: String,
}

#[derive(Deserialize)]
pub struct EventRequest {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    metrics: MetricsSnapshot,
    client_count: usize,
    sessions: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

pub fn create_admin_router(state: AdminAppState) -> Router {
    Router::new()
        .route("/api/admin/stats", get(get_stats))
        .route("/api/admin/rooms", get(get_rooms))
        .route("/api/admin/sessions", post(issue_session))
        .route("/api/admin/sessions/:token", delete(revoke_session))
        .route("/api/admin/notify", post(notify))
        .route("/api/admin/events", post(publish_event))
        .with_state(Arc::new(state))
}

/// GET /api/admin/stats — hub counters plus live registry size.
async fn get_stats(State(state): State<Arc<AdminAppState>>) -> Response {
    // Query first so the gauges include every request submitted before it
    let client_count = state.hub.client_count().await;
    let stats = StatsResponse {
        metrics: state.hub.metrics().snapshot(),
        client_count,
        sessions: state.sessions.count(),
    };
    Json(stats).into_response()
}

/// GET /api/admin/rooms
async fn get_rooms(State(state): State<Arc<AdminAppState>>) -> Response {
    Json(state.hub.rooms().await).into_response()
}

/// POST /api/admin/sessions — issue a connect token for a user.
async fn issue_session(
    State(state): State<Arc<AdminAppState>>,
    headers: HeaderMap,
    Json(req): Json<IssueSessionRequest>,
) -> Response {
    if !validate_admin_token(&headers, &state.admin_token) {
        return unauthorized();
    }

    match state.sessions.issue(req.user_id) {
        Ok(session) => {
            info!(user_id = session.user_id, "Session issued");
            (StatusCode::CREATED, Json(session)).into_response()
        }
        Err(e @ SessionError::AnonymousUser) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// DELETE /api/admin/sessions/:token — revoke a connect token.
///
/// Connections already opened with the token stay up; only new connects are refused.
async fn revoke_session(
    State(state): State<Arc<AdminAppState>>,
    headers: HeaderMap,
    Path(token): Path<String>,
) -> Response {
    if !validate_admin_token(&headers, &state.admin_token) {
        return unauthorized();
    }

    if state.sessions.revoke(&token) {
        info!("Session revoked");
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "session not found".to_string(),
            }),
        )
            .into_response()
    }
}

/// POST /api/admin/notify — broadcast a notification to every client.
async fn notify(
    State(state): State<Arc<AdminAppState>>,
    headers: HeaderMap,
    Json(req): Json<NotifyRequest>,
) -> Response {
    if !validate_admin_token(&headers, &state.admin_token) {
        return unauthorized();
    }

    let msg = Message::notification(&req.title, &req.body);
    let id = msg.id.clone();
    state.hub.publish(msg).await;

    (StatusCode::ACCEPTED, Json(json!({ "id": id }))).into_response()
}

/// POST /api/admin/events — broadcast a named event to every client.
async fn publish_event(
    State(state): State<Arc<AdminAppState>>,
    headers: HeaderMap,
    Json(req): Json<EventRequest>,
) -> Response {
    if !validate_admin_token(&headers, &state.admin_token) {
        return unauthorized();
    }
    if req.event.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "event name is required".to_string(),
            }),
        )
            .into_response();
    }

    let msg = Message::event(req.event, req.payload);
    let id = msg.id.clone();
    state.hub.publish(msg).await;

    (StatusCode::ACCEPTED, Json(json!({ "id": id }))).into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "Unauthorized".to_string(),
        }),
    )
        .into_response()
}

/// Returns true if the bearer token in `Authorization` matches the expected admin token.
/// Returns true (no restriction) when `expected` is None.
fn validate_admin_token(headers: &HeaderMap, expected: &Option<String>) -> bool {
    let Some(expected_token) = expected else {
        return true;
    };

    match crate::auth::extract_bearer_token(headers) {
        Ok(token) => &token == expected_token,
        Err(_) => false,
    }
}
