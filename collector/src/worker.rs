//! Background collection for long-lived processes.
//!
//! At most one run is in flight per [`CollectionWorker`]. Progress lands in a
//! [`CollectionState`] that is only ever replaced as a whole, so readers
//! always see a consistent copy.

use crate::{
    builder::{
        collect_snapshot,
        CollectionResult,
    },
    error::Result,
    settings::CollectSettings,
    throttle::{
        ProgressEvent,
        ProgressObserver,
    },
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    path::PathBuf,
    sync::{
        Arc,
        Mutex,
        MutexGuard,
        PoisonError,
    },
};
use strum::Display;
use tokio::task::JoinHandle;
use unsplash_stats_store::{
    export_json,
    ExportedFile,
    Store,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionState {
    pub phase: Phase,
    pub message: String,
    pub username: String,
    pub completed_calls: u64,
    pub expected_total_calls: Option<u64>,
    pub percent_complete: f64,
    pub last_endpoint: String,
    pub last_status_code: Option<u16>,
    pub rate_limited: bool,
    pub rate_limit_wait_seconds: Option<f64>,
    pub updated_at: String,
    /// Bumped after every successful run so readers know to reload data.
    pub refresh_token: u64,
}

impl CollectionState {
    pub fn idle(username: impl Into<String>) -> Self {
        Self {
            phase: Phase::Idle,
            message: "Ready.".to_string(),
            username: username.into(),
            completed_calls: 0,
            expected_total_calls: None,
            percent_complete: 0.0,
            last_endpoint: "-".to_string(),
            last_status_code: None,
            rate_limited: false,
            rate_limit_wait_seconds: None,
            updated_at: now(),
            refresh_token: 0,
        }
    }

    fn started(&self) -> Self {
        Self {
            phase: Phase::Running,
            message: format!("Collection started for @{}.", self.username),
            refresh_token: self.refresh_token,
            ..Self::idle(self.username.clone())
        }
    }

    fn progressed(&self, event: &ProgressEvent) -> Self {
        let percent_complete = event.percent_complete.unwrap_or(0.0).clamp(0.0, 100.0);
        let wait_seconds = event.rate_limit_wait.map(|wait| wait.as_secs_f64());

        let message = match (event.rate_limited, wait_seconds) {
            (true, Some(wait)) => format!("Rate limited at {}; waiting {wait:.2}s before retry.", event.path),
            (true, None) => format!("Rate limited at {}; retrying.", event.path),
            (false, _) => match event.expected_total_calls.filter(|expected| *expected > 0) {
                Some(expected) => format!(
                    "Collecting data: {}/{expected} ({percent_complete:.1}%).",
                    event.completed_calls
                ),
                None => format!("Collecting data: {} calls.", event.completed_calls),
            },
        };

        Self {
            phase: Phase::Running,
            message,
            completed_calls: event.completed_calls,
            expected_total_calls: event.expected_total_calls,
            percent_complete,
            last_endpoint: event.path.clone(),
            last_status_code: Some(event.status_code),
            rate_limited: event.rate_limited,
            rate_limit_wait_seconds: wait_seconds,
            updated_at: now(),
            ..self.clone()
        }
    }

    /// The run is stored even when `exported` failed, so the refresh token moves either way.
    fn completed(&self, result: &CollectionResult, exported: &Result<Vec<ExportedFile>>) -> Self {
        let percent_complete = match result.estimated_total_api_calls.filter(|expected| *expected > 0) {
            Some(expected) => (result.api_calls_made as f64 / expected as f64 * 100.0).min(100.0),
            None => 100.0,
        };

        let mut message = format!(
            "Collection complete for @{}: run {}, {} photos, {} API calls.",
            self.username, result.run_id, result.photos_saved, result.api_calls_made
        );
        match exported {
            Ok(exported) if !exported.is_empty() => {
                let files = exported
                    .iter()
                    .map(|file| {
                        let name = file
                            .path
                            .file_name()
                            .map(|name| name.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        format!("{name} ({} rows)", file.rows)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                message.push_str(&format!(" Exported {files}."));
            }
            Ok(_) => {}
            Err(err) => message.push_str(&format!(" Export failed: {err}.")),
        }

        Self {
            phase: Phase::Done,
            message,
            completed_calls: result.api_calls_made,
            expected_total_calls: result.estimated_total_api_calls,
            percent_complete,
            last_endpoint: "complete".to_string(),
            last_status_code: Some(200),
            rate_limited: false,
            rate_limit_wait_seconds: None,
            updated_at: now(),
            refresh_token: self.refresh_token + 1,
            ..self.clone()
        }
    }

    fn failed(&self, error: &dyn std::fmt::Display) -> Self {
        Self {
            phase: Phase::Error,
            message: format!("Collection failed: {error}"),
            rate_limited: false,
            rate_limit_wait_seconds: None,
            updated_at: now(),
            ..self.clone()
        }
    }
}

fn now() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Clone)]
struct SharedState(Arc<Mutex<CollectionState>>);

impl SharedState {
    fn lock(&self) -> MutexGuard<'_, CollectionState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn replace(&self, next: impl FnOnce(&CollectionState) -> CollectionState) {
        let mut state = self.lock();
        *state = next(&state);
    }
}

impl ProgressObserver for SharedState {
    fn on_progress(&self, event: &ProgressEvent) {
        self.replace(|state| state.progressed(event));
    }
}

/// Runs collections on a background task, one at a time.
pub struct CollectionWorker {
    settings: CollectSettings,
    state: SharedState,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CollectionWorker {
    pub fn new(settings: CollectSettings) -> Self {
        let state = CollectionState::idle(settings.username.clone());
        Self {
            settings,
            state: SharedState(Arc::new(Mutex::new(state))),
            task: Mutex::new(None),
        }
    }

    pub fn snapshot(&self) -> CollectionState {
        self.state.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Starts a run unless one is already in flight. Never waits.
    ///
    /// Must be called from within a tokio runtime.
    pub fn try_start(&self) -> StartOutcome {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|task| !task.is_finished()) {
            return StartOutcome::AlreadyRunning;
        }

        self.state.replace(CollectionState::started);

        let settings = self.settings.clone();
        let state = self.state.clone();
        *task = Some(tokio::spawn(async move {
            let outcome = run_and_export(&settings, Arc::new(state.clone())).await;
            match outcome {
                Ok((result, exported)) => state.replace(|current| current.completed(&result, &exported)),
                Err(err) => {
                    error!("collection failed: {err}");
                    state.replace(|current| current.failed(&err));
                }
            }
        }));

        info!(username = %self.settings.username, "collection started");
        StartOutcome::Started
    }

    /// Waits for the run in flight, if any, to finish.
    pub async fn wait(&self) {
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!("collection task ended abnormally: {err}");
                self.state.replace(|current| current.failed(&err));
            }
        }
    }
}

/// Export failures are handed back next to the stored run rather than replacing it.
async fn run_and_export(
    settings: &CollectSettings,
    progress: Arc<dyn ProgressObserver>,
) -> Result<(CollectionResult, Result<Vec<ExportedFile>>)> {
    let result = collect_snapshot(settings, Some(progress)).await?;

    let exported = match settings.export_dir.clone() {
        Some(export_dir) => export(settings.database.clone(), export_dir).await,
        None => Ok(Vec::new()),
    };
    if let Err(err) = &exported {
        warn!(run_id = result.run_id, "export after collection failed: {err}");
    }

    Ok((result, exported))
}

async fn export(database: PathBuf, export_dir: PathBuf) -> Result<Vec<ExportedFile>> {
    let exported = tokio::task::spawn_blocking(move || export_json(&Store::open(&database)?, &export_dir)).await??;
    Ok(exported)
}
