use crate::{
    error::AppError,
    router::AppState,
};
use axum::{
    extract::{
        Path,
        State,
    },
    Json,
};
use serde_json::Value;
use unsplash_stats_store::Store;

/// One of the history views as a JSON array. Empty until the first run has
/// been stored.
pub async fn view(State(state): State<AppState>, Path(view): Path<String>) -> Result<Json<Value>, AppError> {
    if !matches!(view.as_str(), "user-history" | "photo-history" | "photo-latest") {
        return Err(AppError::UnknownExport(view));
    }

    let database = state.database.clone();
    let rows = tokio::task::spawn_blocking(move || -> Result<Value, AppError> {
        let Some(store) = Store::open_existing(&database)? else {
            return Ok(Value::Array(Vec::new()));
        };
        let rows = match view.as_str() {
            "user-history" => serde_json::to_value(store.user_history()?),
            "photo-history" => serde_json::to_value(store.photo_history()?),
            _ => serde_json::to_value(store.photo_latest()?),
        };
        rows.map_err(|err| AppError::Store(err.into()))
    })
    .await??;

    Ok(Json(rows))
}
