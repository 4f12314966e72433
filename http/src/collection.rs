use crate::router::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde_json::{
    json,
    Value,
};
use unsplash_stats_collector::{
    CollectionState,
    StartOutcome,
};

pub async fn status(State(state): State<AppState>) -> Json<CollectionState> {
    Json(state.worker.snapshot())
}

/// Kicks off a run in the background. A run already in flight is left alone.
pub async fn start(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.worker.try_start() {
        StartOutcome::Started => (StatusCode::ACCEPTED, Json(json!({ "status": "started" }))),
        StartOutcome::AlreadyRunning => {
            debug!("collection requested while one is running");
            (StatusCode::OK, Json(json!({ "status": "already_running" })))
        }
    }
}
