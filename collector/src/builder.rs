//! One complete collection cycle: account, account statistics, then the
//! statistics of every photo, committed to the store as a single run.

use crate::{
    error::{
        Error,
        Result,
    },
    extract::{
        as_int,
        as_object,
        as_text,
        metric_totals,
    },
    settings::CollectSettings,
    throttle::{
        interval_for_hourly_budget,
        requests_per_hour,
        PhotoCaps,
        ProgressObserver,
        ProgressTracker,
    },
};
use chrono::Utc;
use futures::TryStreamExt as _;
use serde::Serialize;
use serde_json::{
    json,
    Value,
};
use std::{
    collections::HashSet,
    sync::Arc,
};
use unsplash_stats_client::{
    PageOptions,
    Resolution,
    UnsplashClient,
};
use unsplash_stats_store::{
    format_collected_at,
    NewRun,
    PhotoSnapshot,
    Store,
    UserSnapshot,
};

/// Days of history requested from the statistics endpoints.
const STATISTICS_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionResult {
    pub run_id: i64,
    pub collected_at: String,
    pub photos_seen: usize,
    pub photos_saved: usize,
    pub photo_errors: usize,
    pub api_calls_made: u64,
    pub estimated_total_api_calls: Option<u64>,
    pub api_rate_limit_per_hour: Option<u32>,
    pub throttle_interval_seconds: Option<f64>,
    pub throttle_target_requests_per_hour: Option<f64>,
}

/// Runs a full collection and stores it.
///
/// Account level failures always abort. A failing photo aborts the run in
/// strict mode and is skipped otherwise. Nothing is written unless the whole
/// run succeeds.
pub async fn collect_snapshot(
    settings: &CollectSettings,
    progress: Option<Arc<dyn ProgressObserver>>,
) -> Result<CollectionResult> {
    let access_key = settings
        .access_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or(Error::MissingAccessKey)?;
    let username = settings.username.as_str();

    let caps = PhotoCaps {
        per_page: settings.per_page,
        max_photos: settings.max_photos,
        max_pages: settings.max_pages,
    };
    let tracker = Arc::new(ProgressTracker::new(username, caps, progress));
    let client = UnsplashClient::new(settings.client_config(access_key))?.with_observer(tracker.clone());
    let collected_at = Utc::now();

    info!(username, "starting collection");
    let user = client.get_account(username).await?;

    let mut throttle_interval = Some(client.min_request_interval()).filter(|interval| !interval.is_zero());
    let hourly_limit = client.rate_limit().limit;
    if let Some(auto_interval) = interval_for_hourly_budget(hourly_limit, settings.rate_limit_fraction) {
        let effective = client.min_request_interval().max(auto_interval);
        client.set_min_request_interval(effective);
        throttle_interval = Some(effective);
        info!(
            hourly_limit,
            fraction = settings.rate_limit_fraction,
            interval_secs = effective.as_secs_f64(),
            "throttling requests to the hourly budget"
        );
    }

    let user_stats = client
        .get_account_statistics(username, Resolution::Days, STATISTICS_DAYS)
        .await?;

    let mut photos_seen = 0;
    let mut photo_errors = 0;
    let mut photo_rows = Vec::new();
    let mut seen_ids = HashSet::new();

    let mut photos = client.iterate_account_photos(
        username,
        PageOptions {
            per_page: caps.per_page,
            max_pages: caps.max_pages,
            max_items: caps.max_photos,
        },
    );
    while let Some(photo) = photos.try_next().await? {
        // A new upload mid-run shifts the `latest` ordering onto the next page.
        if let Some(id) = photo_id(&photo) {
            if !seen_ids.insert(id.clone()) {
                debug!(username, photo_id = %id, "photo listed twice, skipping");
                continue;
            }
        }
        photos_seen += 1;

        match photo_snapshot(&client, photo).await {
            Ok(row) => photo_rows.push(row),
            Err(err) if settings.strict => return Err(err),
            Err(err) => {
                photo_errors += 1;
                warn!(username, "skipping photo: {err}");
            }
        }

        if !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }
    }
    drop(photos);

    let user = object_or_empty(user);
    let user_stats = object_or_empty(user_stats);
    let run = NewRun {
        username: username.to_string(),
        collected_at,
        user: UserSnapshot {
            username: username.to_string(),
            total_photos: as_int(user.get("total_photos")),
            total_likes: as_int(user.get("total_likes")),
            metrics: metric_totals(&user_stats),
            raw_json: json!({ "user": user, "statistics": user_stats }),
        },
        photos: photo_rows,
    };
    let photos_saved = run.photos.len();

    let database = settings.database.clone();
    let run_id = tokio::task::spawn_blocking(move || Store::open(&database)?.insert_run(&run)).await??;

    Ok(CollectionResult {
        run_id,
        collected_at: format_collected_at(collected_at),
        photos_seen,
        photos_saved,
        photo_errors,
        api_calls_made: client.request_count(),
        estimated_total_api_calls: tracker.expected_calls(),
        api_rate_limit_per_hour: client.rate_limit().limit,
        throttle_interval_seconds: throttle_interval.map(|interval| interval.as_secs_f64()),
        throttle_target_requests_per_hour: throttle_interval.and_then(requests_per_hour),
    })
}

fn object_or_empty(value: Value) -> Value {
    if value.is_object() {
        value
    } else {
        json!({})
    }
}

fn photo_id(photo: &Value) -> Option<String> {
    match photo.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

/// Fetches the statistics of one listed photo and turns both into a row.
async fn photo_snapshot(client: &UnsplashClient, photo: Value) -> Result<PhotoSnapshot> {
    let photo_id = photo_id(&photo).ok_or(Error::MissingPhotoId)?;

    let stats = client
        .get_photo_statistics(&photo_id, Resolution::Days, STATISTICS_DAYS)
        .await?;
    if !as_object(Some(&stats)).is_some_and(|stats| !stats.is_empty()) {
        return Err(Error::MissingStatistics { photo_id });
    }

    let description = as_text(photo.get("description"))
        .filter(|text| !text.is_empty())
        .or_else(|| as_text(photo.get("alt_description")));

    Ok(PhotoSnapshot {
        photo_slug: as_text(photo.get("slug")),
        photo_description: description,
        photo_created_at: as_text(photo.get("created_at")),
        photo_likes: as_int(photo.get("likes")),
        metrics: metric_totals(&stats),
        raw_json: json!({
            "photo": photo,
            "statistics": stats,
            "rate_limit_remaining": client.rate_limit().remaining,
        }),
        photo_id,
    })
}
