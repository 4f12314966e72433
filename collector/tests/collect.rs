use pretty_assertions::assert_eq;
use serde_json::{
    json,
    Value,
};
use std::{
    sync::{
        Arc,
        Mutex,
    },
    time::{
        Duration,
        Instant,
    },
};
use temp_dir::TempDir;
use unsplash_stats_client::testing::{
    MockApi,
    MockResponse,
};
use unsplash_stats_collector::{
    collect_snapshot,
    CollectSettings,
    ErrorKind,
    ProgressEvent,
    ProgressObserver,
};
use unsplash_stats_store::Store;

fn settings(api: &MockApi, dir: &TempDir) -> CollectSettings {
    CollectSettings {
        username: "jane".to_string(),
        access_key: Some("test-key".to_string()),
        database: dir.path().join("stats.sqlite"),
        export_dir: None,
        api_base_url: api.base_url(),
        user_agent: "unsplash-stats-tests".to_string(),
        request_timeout: Duration::from_secs(5),
        min_request_interval: Duration::ZERO,
        rate_limit_retry_max_sleep: Duration::from_secs(5),
        delay: Duration::ZERO,
        rate_limit_fraction: 0.0,
        strict: false,
        per_page: 30,
        max_photos: None,
        max_pages: None,
    }
}

fn account(api: &MockApi, total_photos: u64) {
    api.route(
        "/users/jane",
        MockResponse::json(json!({"username": "jane", "total_photos": total_photos, "total_likes": 12})),
    );
    api.route(
        "/users/jane/statistics",
        MockResponse::json(json!({
            "downloads": {"total": 900, "historical": {"change": 30}},
            "views": {"total": 40000, "historical": {"change": 1200}},
        })),
    );
}

fn photo_stats(downloads: i64) -> Value {
    json!({
        "downloads": {"total": downloads, "historical": {"change": 4}},
        "views": {"total": downloads * 10, "historical": {"change": 40}},
        "likes": {"total": 2, "historical": {"change": 0}},
    })
}

fn two_photos(api: &MockApi) {
    account(api, 2);
    api.route(
        "/users/jane/photos?page=1",
        MockResponse::json(json!([
            {"id": "p1", "slug": "first", "description": null, "alt_description": "a lake", "likes": 3},
            {"id": "p2", "slug": "second", "description": "Mountains", "likes": 5},
        ])),
    );
    api.route("/photos/p2/statistics", MockResponse::json(photo_stats(20)));
}

fn store(dir: &TempDir) -> Store {
    Store::open_existing(dir.path().join("stats.sqlite")).unwrap().unwrap()
}

#[tokio::test]
async fn account_without_photos_stores_an_empty_run() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    account(&api, 0);
    api.route("/users/jane/photos?page=1", MockResponse::json(json!([])));

    let result = collect_snapshot(&settings(&api, &dir), None).await.unwrap();
    assert_eq!((result.photos_seen, result.photos_saved, result.photo_errors), (0, 0, 0));
    assert_eq!(result.api_calls_made, 3);

    let store = store(&dir);
    assert_eq!(store.run_count().unwrap(), 1);
    assert!(store.photo_history().unwrap().is_empty());

    let users = store.user_history().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].run_id, result.run_id);
    assert_eq!(users[0].total_photos, Some(0));
    assert_eq!(users[0].downloads_total, Some(900));
    assert_eq!(users[0].views_change_30d, Some(1200));
}

#[tokio::test]
async fn lenient_run_skips_the_failing_photo() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    two_photos(&api);
    api.route(
        "/photos/p1/statistics",
        MockResponse::status(500, json!({"errors": ["Something went wrong"]})),
    );

    let result = collect_snapshot(&settings(&api, &dir), None).await.unwrap();
    assert_eq!((result.photos_seen, result.photos_saved, result.photo_errors), (2, 1, 1));

    let photos = store(&dir).photo_history().unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].photo_id, "p2");
    assert_eq!(photos[0].photo_description.as_deref(), Some("Mountains"));
    assert_eq!(photos[0].downloads_total, Some(20));
    assert_eq!(photos[0].views_total, Some(200));
}

#[tokio::test]
async fn strict_run_aborts_without_writing_anything() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    two_photos(&api);
    api.route(
        "/photos/p1/statistics",
        MockResponse::status(500, json!({"errors": ["Something went wrong"]})),
    );

    let mut settings = settings(&api, &dir);
    settings.strict = true;
    let err = collect_snapshot(&settings, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Api);
    assert_eq!(err.to_string(), "Unsplash API error 500: Something went wrong");

    assert_eq!(api.count("/photos/p2/statistics"), 0);
    assert!(Store::open_existing(&settings.database).unwrap().is_none());
}

#[tokio::test]
async fn photo_repeated_on_the_next_page_is_stored_once() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    account(&api, 3);
    api.route(
        "/users/jane/photos?page=1",
        MockResponse::json(json!([{"id": "p1", "likes": 3}, {"id": "p2", "likes": 5}])),
    );
    api.route("/users/jane/photos?page=2", MockResponse::json(json!([{"id": "p2", "likes": 5}])));
    api.route("/photos/p1/statistics", MockResponse::json(photo_stats(10)));
    api.route("/photos/p2/statistics", MockResponse::json(photo_stats(20)));

    let result = collect_snapshot(
        &CollectSettings {
            per_page: 2,
            ..settings(&api, &dir)
        },
        None,
    )
    .await
    .unwrap();
    assert_eq!((result.photos_seen, result.photos_saved, result.photo_errors), (2, 2, 0));
    assert_eq!(api.count("/photos/p2/statistics"), 1);

    let ids: Vec<_> = store(&dir)
        .photo_history()
        .unwrap()
        .into_iter()
        .map(|row| row.photo_id)
        .collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"p1".to_string()));
    assert!(ids.contains(&"p2".to_string()));
}

#[tokio::test]
async fn empty_statistics_count_as_a_photo_error() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    two_photos(&api);
    api.route("/photos/p1/statistics", MockResponse::json(json!({})));

    let result = collect_snapshot(&settings(&api, &dir), None).await.unwrap();
    assert_eq!((result.photos_saved, result.photo_errors), (1, 1));
}

#[tokio::test]
async fn description_falls_back_to_the_alt_text() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    two_photos(&api);
    api.route("/photos/p1/statistics", MockResponse::json(photo_stats(100)));

    collect_snapshot(&settings(&api, &dir), None).await.unwrap();

    let photos = store(&dir).photo_history().unwrap();
    assert_eq!(
        photos
            .iter()
            .map(|row| (row.photo_id.as_str(), row.photo_description.as_deref()))
            .collect::<Vec<_>>(),
        vec![("p1", Some("a lake")), ("p2", Some("Mountains"))]
    );
}

#[tokio::test]
async fn missing_access_key_fails_before_any_request() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();

    let mut settings = settings(&api, &dir);
    settings.access_key = Some("  ".to_string());
    let err = collect_snapshot(&settings, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoApiKey);
    assert!(api.requests().is_empty());
}

#[tokio::test]
async fn account_failure_always_aborts() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    api.route("/users/jane", MockResponse::status(404, json!({"errors": ["Couldn't find User"]})));

    let err = collect_snapshot(&settings(&api, &dir), None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Api);
    assert!(Store::open_existing(dir.path().join("stats.sqlite")).unwrap().is_none());
}

#[tokio::test]
async fn hourly_quota_raises_but_never_lowers_the_interval() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    api.route(
        "/users/jane",
        MockResponse::json(json!({"username": "jane", "total_photos": 0})).quota(360_000, 359_999),
    );
    api.route("/users/jane/statistics", MockResponse::json(json!({})));
    api.route("/users/jane/photos?page=1", MockResponse::json(json!([])));

    let mut settings = settings(&api, &dir);
    settings.rate_limit_fraction = 1.0;
    let result = collect_snapshot(&settings, None).await.unwrap();
    assert_eq!(result.api_rate_limit_per_hour, Some(360_000));
    let interval = result.throttle_interval_seconds.unwrap();
    assert!((interval - 0.01).abs() < 1e-6, "{interval}");

    settings.min_request_interval = Duration::from_millis(20);
    let result = collect_snapshot(&settings, None).await.unwrap();
    let interval = result.throttle_interval_seconds.unwrap();
    assert!((interval - 0.02).abs() < 1e-6, "{interval}");
    let per_hour = result.throttle_target_requests_per_hour.unwrap();
    assert!((per_hour - 180_000.0).abs() < 1e-3, "{per_hour}");
}

#[tokio::test]
async fn disabled_throttle_reports_no_interval() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    account(&api, 0);
    api.route("/users/jane/photos?page=1", MockResponse::json(json!([])));

    let result = collect_snapshot(&settings(&api, &dir), None).await.unwrap();
    assert_eq!(result.throttle_interval_seconds, None);
    assert_eq!(result.throttle_target_requests_per_hour, None);
}

#[tokio::test]
async fn delay_follows_every_photo() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    two_photos(&api);
    api.route("/photos/p1/statistics", MockResponse::json(photo_stats(1)));

    let mut settings = settings(&api, &dir);
    settings.delay = Duration::from_millis(60);
    let started = Instant::now();
    collect_snapshot(&settings, None).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[derive(Default)]
struct Recording(Mutex<Vec<ProgressEvent>>);

impl ProgressObserver for Recording {
    fn on_progress(&self, event: &ProgressEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

#[tokio::test]
async fn progress_is_reported_after_every_request() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    two_photos(&api);
    api.route("/photos/p1/statistics", MockResponse::json(photo_stats(1)));

    let recording = Arc::new(Recording::default());
    let result = collect_snapshot(&settings(&api, &dir), Some(recording.clone()))
        .await
        .unwrap();
    assert_eq!(result.estimated_total_api_calls, Some(5));
    assert_eq!(result.api_calls_made, 5);

    let events = recording.0.lock().unwrap().clone();
    assert_eq!(
        events.iter().map(|event| event.path.as_str()).collect::<Vec<_>>(),
        vec![
            "/users/jane",
            "/users/jane/statistics",
            "/users/jane/photos",
            "/photos/p1/statistics",
            "/photos/p2/statistics",
        ]
    );
    assert_eq!(
        events.iter().map(|event| event.completed_calls).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
    assert_eq!(events.last().unwrap().percent_complete, Some(100.0));
}
