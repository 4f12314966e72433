use chrono::{
    DateTime,
    Utc,
};
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

/// `downloads`, `views` and `likes` figures of one statistics response.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTotals {
    pub downloads_total: Option<i64>,
    pub views_total: Option<i64>,
    pub likes_total: Option<i64>,
    pub downloads_change_30d: Option<i64>,
    pub views_change_30d: Option<i64>,
    pub likes_change_30d: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub username: String,
    pub total_photos: Option<i64>,
    pub total_likes: Option<i64>,
    #[serde(flatten)]
    pub metrics: MetricTotals,
    /// Untouched API responses, kept for fields we do not extract yet.
    pub raw_json: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSnapshot {
    pub photo_id: String,
    pub photo_slug: Option<String>,
    pub photo_description: Option<String>,
    pub photo_created_at: Option<String>,
    pub photo_likes: Option<i64>,
    #[serde(flatten)]
    pub metrics: MetricTotals,
    pub raw_json: Value,
}

/// Everything one collection produced, written by [`crate::Store::insert_run`]
/// as a single unit.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
    pub username: String,
    pub collected_at: DateTime<Utc>,
    pub user: UserSnapshot,
    pub photos: Vec<PhotoSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: i64,
    pub username: String,
    pub collected_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserHistoryRow {
    pub run_id: i64,
    pub collected_at: String,
    pub username: String,
    pub total_photos: Option<i64>,
    pub downloads_total: Option<i64>,
    pub views_total: Option<i64>,
    pub downloads_change_30d: Option<i64>,
    pub views_change_30d: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoHistoryRow {
    pub run_id: i64,
    pub collected_at: String,
    pub photo_id: String,
    pub photo_slug: Option<String>,
    pub photo_description: Option<String>,
    pub photo_created_at: Option<String>,
    pub downloads_total: Option<i64>,
    pub views_total: Option<i64>,
    pub downloads_change_30d: Option<i64>,
    pub views_change_30d: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoLatestRow {
    pub photo_id: String,
    pub photo_slug: Option<String>,
    pub photo_description: Option<String>,
    pub photo_created_at: Option<String>,
    pub downloads_total: Option<i64>,
    pub views_total: Option<i64>,
    pub latest_collected_at: String,
    pub previous_collected_at: Option<String>,
    pub downloads_delta_since_previous: Option<i64>,
    pub views_delta_since_previous: Option<i64>,
}

/// Run timestamps are stored at second precision with an explicit offset,
/// e.g. `2024-05-01T12:00:00+00:00`.
pub fn format_collected_at(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}
