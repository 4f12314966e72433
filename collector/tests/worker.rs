use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use temp_dir::TempDir;
use unsplash_stats_client::testing::{
    MockApi,
    MockResponse,
};
use unsplash_stats_collector::{
    CollectSettings,
    CollectionWorker,
    Phase,
    StartOutcome,
};

fn settings(api: &MockApi, dir: &TempDir) -> CollectSettings {
    CollectSettings {
        username: "jane".to_string(),
        access_key: Some("test-key".to_string()),
        database: dir.path().join("stats.sqlite"),
        export_dir: Some(dir.path().join("exports")),
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

fn empty_account(api: &MockApi, delay: Duration) {
    api.route(
        "/users/jane",
        MockResponse::json(json!({"username": "jane", "total_photos": 0})).delayed(delay),
    );
    api.route("/users/jane/statistics", MockResponse::json(json!({})));
    api.route("/users/jane/photos?page=1", MockResponse::json(json!([])));
}

#[tokio::test]
async fn worker_starts_idle() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    let worker = CollectionWorker::new(settings(&api, &dir));

    let state = worker.snapshot();
    assert_eq!(state.phase, Phase::Idle);
    assert_eq!(state.message, "Ready.");
    assert_eq!(state.username, "jane");
    assert!(!worker.is_running());
}

#[tokio::test]
async fn second_start_while_running_reports_already_running() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    empty_account(&api, Duration::from_millis(300));
    let worker = CollectionWorker::new(settings(&api, &dir));

    assert_eq!(worker.try_start(), StartOutcome::Started);
    assert_eq!(worker.snapshot().phase, Phase::Running);
    assert_eq!(worker.try_start(), StartOutcome::AlreadyRunning);
    assert!(worker.is_running());

    worker.wait().await;
    assert_eq!(api.count("/users/jane"), 1);

    let state = worker.snapshot();
    assert_eq!(state.phase, Phase::Done);
    assert_eq!(state.refresh_token, 1);
    assert_eq!(state.percent_complete, 100.0);
    assert_eq!(state.last_endpoint, "complete");
    assert!(
        state
            .message
            .starts_with("Collection complete for @jane: run 1, 0 photos, 3 API calls. Exported "),
        "{}",
        state.message
    );
    assert!(dir.path().join("exports").join("photo_latest.json").is_file());
}

#[tokio::test]
async fn finished_worker_can_run_again() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    empty_account(&api, Duration::ZERO);
    let worker = CollectionWorker::new(settings(&api, &dir));

    assert_eq!(worker.try_start(), StartOutcome::Started);
    worker.wait().await;
    assert_eq!(worker.try_start(), StartOutcome::Started);
    worker.wait().await;

    let state = worker.snapshot();
    assert_eq!(state.refresh_token, 2);
    assert!(state.message.contains("run 2"), "{}", state.message);
}

#[tokio::test]
async fn failure_is_reported_in_the_state() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    let mut settings = settings(&api, &dir);
    settings.access_key = None;
    let worker = CollectionWorker::new(settings);

    assert_eq!(worker.try_start(), StartOutcome::Started);
    worker.wait().await;

    let state = worker.snapshot();
    assert_eq!(state.phase, Phase::Error);
    assert_eq!(state.message, "Collection failed: no Unsplash access key is configured");
    assert_eq!(state.refresh_token, 0);
}

#[tokio::test]
async fn export_failure_keeps_the_stored_run_visible() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    empty_account(&api, Duration::ZERO);
    let blocker = dir.path().join("not-a-directory");
    std::fs::write(&blocker, "").unwrap();
    let mut settings = settings(&api, &dir);
    settings.export_dir = Some(blocker.join("exports"));
    let worker = CollectionWorker::new(settings);

    assert_eq!(worker.try_start(), StartOutcome::Started);
    worker.wait().await;

    let state = worker.snapshot();
    assert_eq!(state.phase, Phase::Done);
    assert_eq!(state.refresh_token, 1);
    assert!(
        state
            .message
            .starts_with("Collection complete for @jane: run 1, 0 photos, 3 API calls. Export failed: "),
        "{}",
        state.message
    );
}

#[tokio::test]
async fn rate_limit_waits_show_up_in_the_state() {
    let api = MockApi::start().await;
    let dir = TempDir::new().unwrap();
    api.route(
        "/users/jane",
        MockResponse::status(429, json!({"errors": ["Rate Limit Exceeded"]}))
            .quota(50, 0)
            .header("Retry-After", "0.4"),
    );
    api.route("/users/jane", MockResponse::json(json!({"username": "jane", "total_photos": 0})));
    api.route("/users/jane/statistics", MockResponse::json(json!({})));
    api.route("/users/jane/photos?page=1", MockResponse::json(json!([])));
    let worker = CollectionWorker::new(settings(&api, &dir));

    worker.try_start();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let state = worker.snapshot();
    assert!(state.rate_limited);
    assert_eq!(state.last_status_code, Some(429));
    assert_eq!(state.message, "Rate limited at /users/jane; waiting 0.40s before retry.");

    worker.wait().await;
    assert_eq!(worker.snapshot().phase, Phase::Done);
}
