//! Request pacing derived from the hourly quota, and progress reporting.

use crate::extract::as_int;
use std::{
    sync::{
        atomic::{
            AtomicU64,
            Ordering,
        },
        Arc,
        Mutex,
        PoisonError,
    },
    time::Duration,
};
use unsplash_stats_client::{
    RequestEvent,
    RequestObserver,
};

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Spacing that keeps a run within `fraction` of the hourly quota.
///
/// `None` when the quota is unknown or the throttle is disabled.
pub fn interval_for_hourly_budget(requests_per_hour: Option<u32>, fraction: f64) -> Option<Duration> {
    let requests_per_hour = requests_per_hour.filter(|limit| *limit > 0)?;
    if !fraction.is_finite() || fraction <= 0.0 {
        return None;
    }
    let target = f64::from(requests_per_hour) * fraction;
    Duration::try_from_secs_f64(SECONDS_PER_HOUR / target).ok()
}

/// Requests per hour implied by a fixed spacing.
pub fn requests_per_hour(interval: Duration) -> Option<f64> {
    (!interval.is_zero()).then(|| SECONDS_PER_HOUR / interval.as_secs_f64())
}

/// Limits applied to the photo listing of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhotoCaps {
    pub per_page: usize,
    pub max_photos: Option<usize>,
    pub max_pages: Option<usize>,
}

impl PhotoCaps {
    /// Photos the run will actually visit out of `total_photos`.
    pub fn photos_in_scope(&self, total_photos: u64) -> u64 {
        let mut photos = total_photos;
        if let Some(max_photos) = self.max_photos {
            photos = photos.min(max_photos as u64);
        }
        if let Some(max_pages) = self.max_pages {
            photos = photos.min((max_pages as u64).saturating_mul(self.per_page.max(1) as u64));
        }
        photos
    }

    /// Account and account statistics, the listing pages, and one statistics
    /// call per photo.
    pub fn expected_calls(&self, total_photos: Option<i64>) -> Option<u64> {
        let total_photos = total_photos?.max(0) as u64;
        let photos = self.photos_in_scope(total_photos);
        let pages = photos.div_ceil(self.per_page.max(1) as u64);
        Some(2 + pages + photos)
    }
}

/// Progress after one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub path: String,
    pub status_code: u16,
    pub completed_calls: u64,
    pub expected_total_calls: Option<u64>,
    pub percent_complete: Option<f64>,
    pub rate_limited: bool,
    pub rate_limit_wait: Option<Duration>,
}

pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// Turns client request events into progress events.
///
/// The expected number of calls becomes known once the account response
/// reveals how many photos there are.
pub struct ProgressTracker {
    account_path: String,
    caps: PhotoCaps,
    completed: AtomicU64,
    expected: Mutex<Option<u64>>,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl ProgressTracker {
    pub fn new(username: &str, caps: PhotoCaps, observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        Self {
            account_path: format!("/users/{username}"),
            caps,
            completed: AtomicU64::new(0),
            expected: Mutex::new(None),
            observer,
        }
    }

    pub fn completed_calls(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn expected_calls(&self) -> Option<u64> {
        *self.expected.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_expected(&self, event: &RequestEvent<'_>) -> Option<u64> {
        let mut expected = self.expected.lock().unwrap_or_else(PoisonError::into_inner);
        let is_account = event.path == self.account_path && (200..400).contains(&event.status_code);
        if expected.is_none() && is_account {
            if let Some(account) = event.response {
                *expected = self.caps.expected_calls(as_int(account.get("total_photos")));
            }
        }
        *expected
    }
}

pub fn percent_complete(completed: u64, expected: Option<u64>) -> Option<f64> {
    let expected = expected.filter(|expected| *expected > 0)?;
    Some((completed as f64 / expected as f64 * 100.0).min(100.0))
}

impl RequestObserver for ProgressTracker {
    fn on_request_completed(&self, event: &RequestEvent<'_>) {
        self.completed.store(event.request_count, Ordering::Relaxed);
        let expected = self.update_expected(event);

        let Some(observer) = &self.observer else {
            return;
        };
        observer.on_progress(&ProgressEvent {
            path: event.path.to_string(),
            status_code: event.status_code,
            completed_calls: event.request_count,
            expected_total_calls: expected,
            percent_complete: percent_complete(event.request_count, expected),
            rate_limited: event.rate_limited,
            rate_limit_wait: event.rate_limit_wait,
        });
    }
}
