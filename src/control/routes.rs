//! Control API route handlers.
//!
//! Commands arrive as JSON and are forwarded to the engine task through
//! its handle. State is shared via `Arc<ControlState>`.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::engine::service::EngineHandle;
use crate::engine::{Command, Response};
use crate::types::EngineError;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct ControlState {
    pub engine: EngineHandle,
    pub started_at: DateTime<Utc>,
}

impl ControlState {
    pub fn new(engine: EngineHandle) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<ControlState>;

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine_running: bool,
    pub uptime_secs: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// POST /api/command
///
/// Engine outcomes, failed ones included, are 200. Only a malformed
/// command (400) or a stopped engine (503) change the status.
pub async fn post_command(State(state): State<AppState>, body: Bytes) -> (StatusCode, Json<Response>) {
    let command: Command = match serde_json::from_slice(&body) {
        Ok(cmd) => cmd,
        Err(e) => {
            warn!(source = "engine", error = %e, "Rejected malformed command");
            let err = EngineError::InvalidRequest(e.to_string());
            return (StatusCode::BAD_REQUEST, Json(Response::failure(&err)));
        }
    };

    match state.engine.call(command).await {
        Ok(resp) => (StatusCode::OK, Json(resp)),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, Json(Response::failure(&e))),
    }
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine_running = !state.engine.is_closed();
    Json(HealthResponse {
        status: if engine_running { "ok" } else { "degraded" },
        engine_running,
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
