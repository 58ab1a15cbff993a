// src/api.rs
//! Observability surface of the daemon: liveness, per-adapter status,
//! and Prometheus metrics (merged in from `metrics::Metrics::router`).

use std::collections::BTreeMap;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};

use crate::scheduler::{AdapterStatus, StatusBoard};

#[derive(Clone)]
pub struct AppState {
    pub board: StatusBoard,
    pub started: DateTime<Utc>,
}

#[derive(serde::Serialize)]
struct StatusResponse {
    started: DateTime<Utc>,
    uptime_secs: i64,
    adapters: BTreeMap<String, AdapterStatus>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let now = Utc::now();
    Json(StatusResponse {
        started: state.started,
        uptime_secs: (now - state.started).num_seconds(),
        adapters: state.board.snapshot(),
    })
}
