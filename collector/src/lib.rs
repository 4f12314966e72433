//! Collection pipeline: builds a snapshot of an account's statistics and
//! commits it to the store.

#[macro_use]
extern crate tracing;

mod builder;
mod error;
pub mod extract;
mod settings;
pub mod throttle;
mod worker;

pub use builder::{
    collect_snapshot,
    CollectionResult,
};
pub use error::{
    Error,
    ErrorKind,
    Result,
};
pub use settings::CollectSettings;
pub use throttle::{
    ProgressEvent,
    ProgressObserver,
};
pub use worker::{
    CollectionState,
    CollectionWorker,
    Phase,
    StartOutcome,
};
