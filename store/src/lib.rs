//! SQLite persistence for collection runs and their snapshots.

#[macro_use]
extern crate tracing;

mod error;
mod export;
mod model;
mod schema;
mod store;

pub use error::{
    Error,
    Result,
};
pub use export::{
    export_json,
    ExportedFile,
    PHOTO_HISTORY_FILE,
    PHOTO_LATEST_FILE,
    USER_HISTORY_FILE,
};
pub use model::{
    format_collected_at,
    MetricTotals,
    NewRun,
    PhotoHistoryRow,
    PhotoLatestRow,
    PhotoSnapshot,
    RunRecord,
    UserHistoryRow,
    UserSnapshot,
};
pub use store::Store;
