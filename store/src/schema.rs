//! Table layout of the snapshot store.
//!
//! Every statement is `IF NOT EXISTS`, so applying the schema to an existing
//! database leaves its rows untouched.

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS collection_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    collected_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_stats_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES collection_runs(id) ON DELETE CASCADE,
    username TEXT NOT NULL,
    total_photos INTEGER,
    total_likes INTEGER,
    downloads_total INTEGER,
    views_total INTEGER,
    likes_total INTEGER,
    downloads_change_30d INTEGER,
    views_change_30d INTEGER,
    likes_change_30d INTEGER,
    raw_json TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(run_id, username)
);

CREATE TABLE IF NOT EXISTS photo_stats_snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES collection_runs(id) ON DELETE CASCADE,
    photo_id TEXT NOT NULL,
    photo_slug TEXT,
    photo_description TEXT,
    photo_created_at TEXT,
    photo_likes INTEGER,
    downloads_total INTEGER,
    views_total INTEGER,
    likes_total INTEGER,
    downloads_change_30d INTEGER,
    views_change_30d INTEGER,
    likes_change_30d INTEGER,
    raw_json TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(run_id, photo_id)
);

CREATE INDEX IF NOT EXISTS idx_runs_collected_at
    ON collection_runs(collected_at);

CREATE INDEX IF NOT EXISTS idx_photo_snapshots_photo_id
    ON photo_stats_snapshots(photo_id);

CREATE INDEX IF NOT EXISTS idx_photo_snapshots_run_id
    ON photo_stats_snapshots(run_id);
"#;

pub(crate) const USER_HISTORY: &str = r#"
SELECT
    r.id AS run_id,
    r.collected_at,
    u.username,
    u.total_photos,
    u.downloads_total,
    u.views_total,
    u.downloads_change_30d,
    u.views_change_30d
FROM user_stats_snapshots u
JOIN collection_runs r ON r.id = u.run_id
ORDER BY r.collected_at ASC, r.id ASC
"#;

pub(crate) const PHOTO_HISTORY: &str = r#"
SELECT
    r.id AS run_id,
    r.collected_at,
    p.photo_id,
    p.photo_slug,
    p.photo_description,
    p.photo_created_at,
    p.downloads_total,
    p.views_total,
    p.downloads_change_30d,
    p.views_change_30d
FROM photo_stats_snapshots p
JOIN collection_runs r ON r.id = p.run_id
ORDER BY r.collected_at ASC, r.id ASC, p.photo_id ASC
"#;

/// Latest snapshot per photo next to the one before it. A photo seen in a
/// single run gets a zero delta.
pub(crate) const PHOTO_LATEST: &str = r#"
WITH ranked AS (
    SELECT
        p.id,
        p.photo_id,
        p.photo_slug,
        p.photo_description,
        p.photo_created_at,
        p.downloads_total,
        p.views_total,
        r.collected_at,
        ROW_NUMBER() OVER (
            PARTITION BY p.photo_id
            ORDER BY r.collected_at DESC, p.id DESC
        ) AS row_num
    FROM photo_stats_snapshots p
    JOIN collection_runs r ON r.id = p.run_id
),
latest AS (
    SELECT * FROM ranked WHERE row_num = 1
),
previous AS (
    SELECT * FROM ranked WHERE row_num = 2
)
SELECT
    latest.photo_id,
    latest.photo_slug,
    latest.photo_description,
    latest.photo_created_at,
    latest.downloads_total,
    latest.views_total,
    latest.collected_at AS latest_collected_at,
    previous.collected_at AS previous_collected_at,
    latest.downloads_total - COALESCE(previous.downloads_total, latest.downloads_total)
        AS downloads_delta_since_previous,
    latest.views_total - COALESCE(previous.views_total, latest.views_total)
        AS views_delta_since_previous
FROM latest
LEFT JOIN previous ON previous.photo_id = latest.photo_id
ORDER BY downloads_delta_since_previous DESC,
         views_delta_since_previous DESC,
         latest.photo_id ASC
"#;
