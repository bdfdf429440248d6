//! HTTP surface: a thin transport over the session manager. Routes accept
//! and return the contracts types; expected failures map to JSON
//! `ApiError` payloads, and only genuine internal breaks become 500s.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use contracts::{ApiError, CommandOutcome, ErrorCode, Event, SessionConfig, Snapshot};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::{GameSession, SessionError, SessionManager};

const DEFAULT_EVENT_PAGE: usize = 100;
const MAX_EVENT_PAGE: usize = 1_000;

#[derive(Debug)]
pub enum ServerError {
    Io(std::io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "server io error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<std::io::Error> for ServerError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Clone)]
struct AppState {
    manager: Arc<Mutex<SessionManager>>,
}

#[derive(Debug)]
struct HttpApiError {
    status: StatusCode,
    error: ApiError,
}

impl HttpApiError {
    fn session_not_found(session_id: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: ApiError::new(
                ErrorCode::SessionNotFound,
                "no such session",
                Some(format!("session_id={session_id}")),
            ),
        }
    }

    fn from_session(err: SessionError) -> Self {
        match err {
            SessionError::AlreadyExists(session_id) => Self {
                status: StatusCode::CONFLICT,
                error: ApiError::new(
                    ErrorCode::SessionAlreadyExists,
                    "session_id already exists",
                    Some(format!("session_id={session_id}")),
                ),
            },
            SessionError::NotFound(session_id) => Self::session_not_found(&session_id),
            SessionError::Persistence(err) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: ApiError::new(
                    ErrorCode::InternalError,
                    "persistence operation failed",
                    Some(err.to_string()),
                ),
            },
        }
    }
}

impl IntoResponse for HttpApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

pub async fn serve(addr: SocketAddr, manager: SessionManager) -> Result<(), ServerError> {
    let state = AppState {
        manager: Arc::new(Mutex::new(manager)),
    };
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/sessions", post(create_session).get(list_sessions))
        .route(
            "/api/v1/sessions/{session_id}",
            delete(destroy_session),
        )
        .route(
            "/api/v1/sessions/{session_id}/command",
            post(submit_command),
        )
        .route(
            "/api/v1/sessions/{session_id}/snapshot",
            get(get_snapshot),
        )
        .route("/api/v1/sessions/{session_id}/events", get(get_events))
        .route("/api/v1/health", get(get_health))
        .layer(middleware::from_fn(cors_middleware))
        .with_state(state)
}

async fn cors_middleware(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = Response::new(axum::body::Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(
        HeaderName::from_static("access-control-allow-origin"),
        HeaderValue::from_static("*"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-methods"),
        HeaderValue::from_static("GET,POST,OPTIONS,DELETE"),
    );
    headers.insert(
        HeaderName::from_static("access-control-allow-headers"),
        HeaderValue::from_static("*"),
    );
}

async fn find_session(
    state: &AppState,
    session_id: &str,
) -> Result<Arc<Mutex<GameSession>>, HttpApiError> {
    let manager = state.manager.lock().await;
    manager
        .get(session_id)
        .ok_or_else(|| HttpApiError::session_not_found(session_id))
}

#[derive(Debug, Default, Deserialize)]
struct CreateSessionRequest {
    config: Option<SessionConfig>,
}

#[derive(Debug, Serialize)]
struct CreateSessionResponse {
    session_id: String,
    snapshot: Snapshot,
}

async fn create_session(
    State(state): State<AppState>,
    payload: Option<Json<CreateSessionRequest>>,
) -> Result<Json<CreateSessionResponse>, HttpApiError> {
    let config = payload
        .and_then(|Json(request)| request.config)
        .unwrap_or_default();

    let handle = {
        let mut manager = state.manager.lock().await;
        manager
            .create_session(config)
            .map_err(HttpApiError::from_session)?
    };

    let snapshot = handle.lock().await.snapshot(true);
    Ok(Json(CreateSessionResponse {
        session_id: snapshot.session_id.clone(),
        snapshot,
    }))
}

#[derive(Debug, Serialize)]
struct SessionListResponse {
    sessions: Vec<String>,
}

async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    let manager = state.manager.lock().await;
    Json(SessionListResponse {
        sessions: manager.session_ids(),
    })
}

async fn destroy_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, HttpApiError> {
    let mut manager = state.manager.lock().await;
    manager
        .destroy_session(&session_id)
        .map_err(HttpApiError::from_session)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    text: String,
}

async fn submit_command(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<CommandRequest>,
) -> Result<Json<CommandOutcome>, HttpApiError> {
    let handle = find_session(&state, &session_id).await?;
    let outcome = handle.lock().await.process_input(&request.text).await;
    Ok(Json(outcome))
}

#[derive(Debug, Default, Deserialize)]
struct SnapshotQuery {
    force: Option<bool>,
}

async fn get_snapshot(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Json<Snapshot>, HttpApiError> {
    let handle = find_session(&state, &session_id).await?;
    let snapshot = handle.lock().await.snapshot(query.force.unwrap_or(false));
    Ok(Json(snapshot))
}

#[derive(Debug, Default, Deserialize)]
struct EventsQuery {
    after: Option<u64>,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EventsResponse {
    events: Vec<Event>,
}

async fn get_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, HttpApiError> {
    let handle = find_session(&state, &session_id).await?;
    let session = handle.lock().await;

    let after = query.after.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_PAGE).min(MAX_EVENT_PAGE);
    let events = session
        .state()
        .events()
        .into_iter()
        .filter(|event| event.sequence > after)
        .take(limit)
        .cloned()
        .collect();
    Ok(Json(EventsResponse { events }))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    llm_reachable: bool,
}

async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let manager = state.manager.lock().await;
    let llm_reachable = manager.llm_reachable().await;
    Json(HealthResponse {
        status: "ok",
        llm_reachable,
    })
}
