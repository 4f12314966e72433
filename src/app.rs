use crate::args::{
    Args,
    Command,
};
use color_eyre::Result;
use std::{
    path::Path,
    process::ExitCode,
    sync::Arc,
};
use unsplash_stats_collector::{
    collect_snapshot,
    CollectSettings,
    CollectionResult,
    CollectionWorker,
};
use unsplash_stats_config::Config;
use unsplash_stats_store::{
    export_json,
    ExportedFile,
    Store,
};

/// Invalid configuration or missing inputs.
const USAGE_ERROR: u8 = 2;

pub struct App {
    args: Args,
}

impl App {
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    pub async fn run(self) -> Result<ExitCode> {
        let config = match load_config(&self.args.command) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                return Ok(ExitCode::from(USAGE_ERROR));
            }
        };
        debug!(
            username = %config.username,
            database = %config.database_path().display(),
            "configuration loaded"
        );

        match self.args.command {
            Command::Collect { skip_export, .. } => collect(&config, skip_export).await,
            Command::Export { .. } => export(&config).await,
            Command::Serve { .. } => serve(config).await,
        }
    }
}

fn load_config(command: &Command) -> Result<Config> {
    let config = Config::new(command.overrides())?;
    config.validate()?;
    Ok(config)
}

async fn collect(config: &Config, skip_export: bool) -> Result<ExitCode> {
    if config.access_key().is_none() {
        eprintln!("UNSPLASH_ACCESS_KEY is required. Set the env var, add access_key to the config file or pass --access-key.");
        return Ok(ExitCode::from(USAGE_ERROR));
    }

    let settings = CollectSettings::from(config);
    let result = match collect_snapshot(&settings, None).await {
        Ok(result) => result,
        Err(err) => {
            error!(kind = %err.kind(), "collection failed: {err}");
            eprintln!("Collection failed ({}): {err}", err.kind());
            return Ok(ExitCode::FAILURE);
        }
    };
    print_summary(&result);

    if skip_export {
        return Ok(ExitCode::SUCCESS);
    }

    match write_exports(&settings.database, &config.export_dir).await {
        Ok(exported) => {
            print_exports(&exported);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Export failed: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_summary(result: &CollectionResult) {
    println!(
        "Collected run {} at {}. photos_seen={}, photos_saved={}, photo_errors={}",
        result.run_id, result.collected_at, result.photos_seen, result.photos_saved, result.photo_errors
    );
    if let Some(limit) = result.api_rate_limit_per_hour {
        println!("Unsplash rate limit: {limit} requests/hour");
    }
    if let Some(seconds) = result.throttle_interval_seconds {
        println!(
            "Applied throttle: one request every {seconds:.2}s (~{:.2} requests/hour)",
            result.throttle_target_requests_per_hour.unwrap_or_default()
        );
    }
}

fn print_exports(exported: &[ExportedFile]) {
    for file in exported {
        let name = file.path.file_name().unwrap_or(file.path.as_os_str());
        println!("Exported {} ({} rows)", name.to_string_lossy(), file.rows);
    }
}

async fn write_exports(database: &Path, export_dir: &Path) -> Result<Vec<ExportedFile>> {
    let database = database.to_path_buf();
    let export_dir = export_dir.to_path_buf();
    let exported = tokio::task::spawn_blocking(move || -> unsplash_stats_store::Result<_> {
        match Store::open_existing(&database)? {
            Some(store) => export_json(&store, &export_dir).map(Some),
            None => Ok(None),
        }
    })
    .await??;

    exported.ok_or_else(|| eyre::eyre!("database not found"))
}

async fn export(config: &Config) -> Result<ExitCode> {
    let database = config.database_path();
    if !database.is_file() {
        eprintln!("Database not found: {}", database.display());
        return Ok(ExitCode::from(USAGE_ERROR));
    }

    match write_exports(&database, &config.export_dir).await {
        Ok(exported) => {
            print_exports(&exported);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Export failed: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn serve(config: Config) -> Result<ExitCode> {
    let settings = CollectSettings::from(&config);
    let database = settings.database.clone();
    let worker = Arc::new(CollectionWorker::new(settings));

    unsplash_stats_http::serve(config.listen_address, worker, database).await?;
    Ok(ExitCode::SUCCESS)
}
