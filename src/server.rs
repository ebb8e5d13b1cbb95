//! HTTP server exposing sessions and the detection feed.
//!
//! This module provides an HTTP server that:
//! - Creates, patches and ends study sessions
//! - Records observed focus states onto a session timeline
//! - Runs the simulated detector on demand
//! - Recomputes the current session's totals in the background
//!
//! # Architecture
//!
//! ```text
//! Dashboard ──→ /api/sessions ──→ SessionStore ──→ aggregate()
//!     │                               ↑
//!     └─────→ /api/detect ──→ DetectionService
//! ```

use crate::clock::{system_clock, SharedClock};
use crate::client::{
    DetectRequest, DetectResponse, ErrorResponse, HealthResponse, RecordResponse, TimelineQuery,
    TriggerRequest,
};
use crate::core::aggregation::SessionStats;
use crate::core::timeline::TimelinePoint;
use crate::detection::{
    DetectionSample, DetectionService, Frame, DEFAULT_HISTORY_CAPACITY, DEFAULT_PROCESSING_DELAY,
};
use crate::schedule::spawn_periodic;
use crate::session::{
    create_shared_store, NewSession, NewSessionEvent, Session, SessionEvent, SessionPatch,
    SharedSessionStore, StoreError,
};
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// How often the current session's totals are recomputed
    pub stats_interval: Duration,
    /// Artificial per-frame detection delay
    pub processing_delay: Duration,
    /// Detector seed; random when absent
    pub seed: Option<u64>,
    /// Number of detection samples kept in history
    pub history_capacity: usize,
}

impl ServerConfig {
    /// Create a new server configuration with default timings.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            stats_interval: Duration::from_secs(5),
            processing_delay: DEFAULT_PROCESSING_DELAY,
            seed: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Build from the persisted configuration.
    pub fn from_config(config: &crate::Config) -> Self {
        Self {
            port: config.server_port,
            stats_interval: config.stats_interval,
            processing_delay: config.processing_delay(),
            seed: config.seed,
            history_capacity: config.history_capacity,
        }
    }
}

/// Shared server state
pub struct ServerState {
    store: SharedSessionStore,
    detector: DetectionService,
    transparency: SharedTransparencyLog,
    frame_sequence: AtomicU64,
    clock: SharedClock,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: &ServerConfig, clock: SharedClock) -> Self {
        let detector = match config.seed {
            Some(seed) => DetectionService::with_seed(clock.clone(), seed),
            None => DetectionService::new(clock.clone()),
        }
        .with_processing_delay(config.processing_delay)
        .with_history_capacity(config.history_capacity);

        Self {
            store: create_shared_store(clock.clone()),
            detector,
            transparency: create_shared_log(),
            frame_sequence: AtomicU64::new(0),
            clock,
        }
    }

    pub fn store(&self) -> &SharedSessionStore {
        &self.store
    }

    pub fn transparency(&self) -> &SharedTransparencyLog {
        &self.transparency
    }

    /// Recompute the totals of the current session, if it is still running.
    async fn refresh_current(&self) {
        let mut store = self.store.write().await;
        let Some(id) = store.current_session().filter(|s| s.is_active()).map(|s| s.id) else {
            return;
        };
        if let Err(e) = store.refresh_stats(id) {
            tracing::warn!("Failed to refresh session stats: {}", e);
        }
    }

    fn next_frame(&self) -> Frame {
        let sequence = self.frame_sequence.fetch_add(1, Ordering::Relaxed);
        Frame::blank(sequence, self.clock.now())
    }
}

/// An error mapped onto an HTTP status and a machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_REQUEST",
            message: message.into(),
        }
    }

    fn no_current_session() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NO_ACTIVE_SESSION",
            message: "no session has been started".to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let (status, code) = match err {
            StoreError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            StoreError::NoActiveSession => (StatusCode::CONFLICT, "NO_ACTIVE_SESSION"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::invalid_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Parse a JSON body that may be left out entirely.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::invalid_request(e.to_string()))
}

fn session_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|e| ApiError::invalid_request(e.body_text()))
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/sessions
async fn create_session(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let request: NewSession = optional_body(&body)?;
    let session = state.store.write().await.create_session(request.user_id);
    state.transparency.record_session_started();
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/sessions/current
async fn current_session(State(state): State<Arc<ServerState>>) -> ApiResult<Session> {
    let store = state.store.read().await;
    store
        .current_session()
        .cloned()
        .map(Json)
        .ok_or_else(ApiError::no_current_session)
}

/// GET /api/sessions/:id
async fn get_session(
    State(state): State<Arc<ServerState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Session> {
    let id = session_id(id)?;
    let store = state.store.read().await;
    store
        .get_session(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| StoreError::SessionNotFound(id).into())
}

/// PATCH /api/sessions/:id
async fn patch_session(
    State(state): State<Arc<ServerState>>,
    id: Result<Path<Uuid>, PathRejection>,
    patch: Result<Json<SessionPatch>, JsonRejection>,
) -> ApiResult<Session> {
    let id = session_id(id)?;
    let Json(patch) = patch?;
    let session = state.store.write().await.update_session(id, &patch)?;
    Ok(Json(session))
}

/// POST /api/sessions/:id/end
async fn end_session(
    State(state): State<Arc<ServerState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Session> {
    let id = session_id(id)?;
    let mut store = state.store.write().await;
    if store.get_session(id).is_none() {
        return Err(StoreError::SessionNotFound(id).into());
    }
    Ok(Json(store.end_session(id)?))
}

/// Record `state` on a session and report what happened.
async fn record_observation(
    state: &ServerState,
    id: Uuid,
    observed: crate::detection::FocusState,
    confidence: f64,
) -> Result<RecordResponse, ApiError> {
    let mut store = state.store.write().await;
    if store.get_session(id).is_none() {
        return Err(StoreError::SessionNotFound(id).into());
    }

    let event = store.record_state(id, observed, confidence)?;
    if event.is_some() {
        state.transparency.record_transition();
    }
    let session = store
        .get_session(id)
        .cloned()
        .ok_or(StoreError::SessionNotFound(id))?;

    Ok(RecordResponse {
        recorded: event.is_some(),
        event,
        session,
    })
}

/// POST /api/sessions/:id/events
///
/// Applies the recording policy: an event is appended only when the state
/// differs from the session's current state.
async fn post_event(
    State(state): State<Arc<ServerState>>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<NewSessionEvent>, JsonRejection>,
) -> ApiResult<RecordResponse> {
    let id = session_id(id)?;
    let Json(body) = body?;
    Ok(Json(record_observation(&state, id, body.state, body.confidence).await?))
}

/// GET /api/sessions/:id/events
async fn list_events(
    State(state): State<Arc<ServerState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<Vec<SessionEvent>> {
    let id = session_id(id)?;
    Ok(Json(state.store.read().await.events(id)?))
}

/// GET /api/sessions/:id/stats
async fn session_stats(
    State(state): State<Arc<ServerState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> ApiResult<SessionStats> {
    let id = session_id(id)?;
    Ok(Json(state.store.read().await.stats(id)?))
}

/// Default spacing of timeline points.
const DEFAULT_TIMELINE_STEP_SECS: u64 = 60;

/// GET /api/sessions/:id/timeline?step=<seconds>
async fn session_timeline(
    State(state): State<Arc<ServerState>>,
    id: Result<Path<Uuid>, PathRejection>,
    query: Result<Query<TimelineQuery>, QueryRejection>,
) -> ApiResult<Vec<TimelinePoint>> {
    let id = session_id(id)?;
    let Query(query) = query.map_err(|e| ApiError::invalid_request(e.body_text()))?;
    let step = timeline_step(query.step)?;
    Ok(Json(state.store.read().await.timeline(id, step)?))
}

fn timeline_step(step: Option<u64>) -> Result<chrono::Duration, ApiError> {
    match step.unwrap_or(DEFAULT_TIMELINE_STEP_SECS) {
        0 => Err(ApiError::invalid_request("step must be at least one second")),
        secs => i64::try_from(secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| ApiError::invalid_request("step is too large")),
    }
}

/// POST /api/detect
///
/// Classifies one synthetic frame. With a `sessionId` in the body the
/// sample is also recorded to that session.
async fn detect(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> ApiResult<DetectResponse> {
    let request: DetectRequest = optional_body(&body)?;

    let frame = state.next_frame();
    let sample = state.detector.process_frame(&frame).await;
    state.transparency.record_frame_analyzed();

    let record = match request.session_id {
        Some(id) => Some(record_observation(&state, id, sample.state, sample.confidence).await?),
        None => None,
    };

    Ok(Json(DetectResponse { sample, record }))
}

/// GET /api/detect/history
async fn detection_history(
    State(state): State<Arc<ServerState>>,
) -> Json<Vec<DetectionSample>> {
    Json(state.detector.history())
}

/// POST /api/detect/trigger
async fn trigger(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<TriggerRequest>, JsonRejection>,
) -> ApiResult<DetectionSample> {
    let Json(body) = body?;
    tracing::info!(state = %body.state, "Forcing detector state");
    Ok(Json(state.detector.trigger_state(body.state)))
}

/// POST /api/detect/reset
async fn reset_detector(State(state): State<Arc<ServerState>>) -> StatusCode {
    state.detector.reset();
    StatusCode::NO_CONTENT
}

/// Build the router over `state`.
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/current", get(current_session))
        .route("/api/sessions/:id", get(get_session).patch(patch_session))
        .route("/api/sessions/:id/end", post(end_session))
        .route("/api/sessions/:id/events", post(post_event).get(list_events))
        .route("/api/sessions/:id/stats", get(session_stats))
        .route("/api/sessions/:id/timeline", get(session_timeline))
        .route("/api/detect", post(detect))
        .route("/api/detect/history", get(detection_history))
        .route("/api/detect/trigger", post(trigger))
        .route("/api/detect/reset", post(reset_detector))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    run_with_clock(config, system_clock()).await
}

/// Run the HTTP server against an explicit clock.
pub async fn run_with_clock(
    config: ServerConfig,
    clock: SharedClock,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config, clock));
    let app = router(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Study companion server listening on http://{}", actual_addr);

    let refresher = {
        let state = state.clone();
        spawn_periodic(config.stats_interval, move || {
            let state = state.clone();
            async move { state.refresh_current().await }
        })
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
        refresher.shutdown().await;
    });

    Ok((actual_addr, shutdown_tx))
}
