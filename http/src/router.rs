use crate::{
    collection,
    exports,
};
use axum::{
    routing::get,
    Router,
};
use std::{
    path::PathBuf,
    sync::Arc,
};
use unsplash_stats_collector::CollectionWorker;

#[derive(Clone)]
pub struct AppState {
    pub worker: Arc<CollectionWorker>,
    pub database: PathBuf,
}

pub fn create_router(worker: Arc<CollectionWorker>, database: PathBuf) -> Router {
    let state = AppState { worker, database };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/collection", get(collection::status).post(collection::start))
        .route("/api/exports/{view}", get(exports::view))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}
