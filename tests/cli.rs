use chrono::{
    TimeZone as _,
    Utc,
};
use pretty_assertions::assert_eq;
use serde_json::{
    json,
    Value,
};
use std::{
    path::Path,
    process::{
        Command,
        Output,
    },
};
use temp_dir::TempDir;
use unsplash_stats_store::{
    MetricTotals,
    NewRun,
    PhotoSnapshot,
    Store,
    UserSnapshot,
};

fn run(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_unsplash-stats"))
        .args(args)
        .env("UNSPLASH_STATS_DATA", dir.path().join("data"))
        .env("UNSPLASH_STATS_CONFIG", dir.path().join("config"))
        .env_remove("UNSPLASH_ACCESS_KEY")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn seed(database: &Path) {
    let mut store = Store::open(database).unwrap();
    for (hour, downloads) in [(10, 100), (11, 140)] {
        store
            .insert_run(&NewRun {
                username: "jane".to_string(),
                collected_at: Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap(),
                user: UserSnapshot {
                    username: "jane".to_string(),
                    total_photos: Some(1),
                    total_likes: None,
                    metrics: MetricTotals::default(),
                    raw_json: json!({}),
                },
                photos: vec![PhotoSnapshot {
                    photo_id: "p1".to_string(),
                    photo_slug: Some("one".to_string()),
                    photo_description: None,
                    photo_created_at: None,
                    photo_likes: None,
                    metrics: MetricTotals {
                        downloads_total: Some(downloads),
                        views_total: Some(10),
                        ..Default::default()
                    },
                    raw_json: json!({}),
                }],
            })
            .unwrap();
    }
}

#[test]
fn export_without_database_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("missing.sqlite");
    let output = run(&dir, &["export", "--database", database.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Database not found"));
    assert!(!database.exists());
}

#[test]
fn export_writes_the_three_views() {
    let dir = TempDir::new().unwrap();
    let database = dir.path().join("stats.sqlite");
    let exports = dir.path().join("exports");
    seed(&database);

    let output = run(
        &dir,
        &[
            "export",
            "--database",
            database.to_str().unwrap(),
            "--export-dir",
            exports.to_str().unwrap(),
        ],
    );
    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        vec![
            "Exported user_stats_history.json (2 rows)",
            "Exported photo_stats_history.json (2 rows)",
            "Exported photo_latest.json (1 rows)",
        ]
    );

    let latest: Value = serde_json::from_str(&std::fs::read_to_string(exports.join("photo_latest.json")).unwrap()).unwrap();
    assert_eq!(latest[0]["downloads_delta_since_previous"], 40);
}

#[test]
fn collect_without_access_key_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = run(&dir, &["collect", "--skip-export"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("UNSPLASH_ACCESS_KEY is required"));
}

#[test]
fn out_of_range_fraction_is_a_usage_error() {
    let dir = TempDir::new().unwrap();
    let output = run(&dir, &["collect", "--access-key", "k", "--rate-limit-fraction", "1.5"]);

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("rate_limit_fraction must be <= 1"));
}
