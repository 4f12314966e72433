use axum::{
    http::StatusCode,
    response::{
        IntoResponse,
        Response,
    },
};
use unsplash_stats_store as store;

#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("There is no export named '{0}'")]
    UnknownExport(String),
    #[error("Reading the snapshot store failed: {0}")]
    Store(#[from] store::Error),
    #[error("The storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::UnknownExport(_) => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status().is_server_error() {
            error!("{self}");
        }
        (
            self.status(),
            axum::Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
