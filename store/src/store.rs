use crate::{
    error::{
        Error,
        Result,
    },
    model::{
        format_collected_at,
        NewRun,
        PhotoHistoryRow,
        PhotoLatestRow,
        RunRecord,
        UserHistoryRow,
    },
    schema,
};
use rusqlite::{
    params,
    Connection,
    OptionalExtension as _,
    Row,
};
use std::path::{
    Path,
    PathBuf,
};

/// SQLite database holding the collected runs.
///
/// The connection is blocking; async callers move the store onto a blocking
/// thread for the duration of a call.
#[derive(Debug)]
pub struct Store {
    pub(crate) conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Opens (creating if needed) the database at `path` and applies the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(Error::io(parent))?;
        }
        let conn = Connection::open(path)?;
        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        debug!(path = %path.display(), "opened snapshot store");
        Ok(store)
    }

    /// Opens an existing database without creating it.
    ///
    /// Returns `Ok(None)` when there is no file at `path`.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Ok(None);
        }
        Self::open(path).map(Some)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let store = Self { conn, path };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Creates the tables and indexes that do not exist yet.
    pub fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }

    /// Writes the run header, the account snapshot and every photo snapshot
    /// in one transaction and returns the new run id.
    ///
    /// Nothing of the run is visible to readers unless every insert succeeds.
    pub fn insert_run(&mut self, run: &NewRun) -> Result<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO collection_runs (username, collected_at) VALUES (?1, ?2)",
            params![run.username, format_collected_at(run.collected_at)],
        )?;
        let run_id = tx.last_insert_rowid();

        let user = &run.user;
        tx.execute(
            r#"
            INSERT INTO user_stats_snapshots (
                run_id, username, total_photos, total_likes,
                downloads_total, views_total, likes_total,
                downloads_change_30d, views_change_30d, likes_change_30d,
                raw_json
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                run_id,
                user.username,
                user.total_photos,
                user.total_likes,
                user.metrics.downloads_total,
                user.metrics.views_total,
                user.metrics.likes_total,
                user.metrics.downloads_change_30d,
                user.metrics.views_change_30d,
                user.metrics.likes_change_30d,
                serde_json::to_string(&user.raw_json)?,
            ],
        )?;

        {
            let mut insert_photo = tx.prepare(
                r#"
                INSERT INTO photo_stats_snapshots (
                    run_id, photo_id, photo_slug, photo_description, photo_created_at, photo_likes,
                    downloads_total, views_total, likes_total,
                    downloads_change_30d, views_change_30d, likes_change_30d,
                    raw_json
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )?;
            for photo in &run.photos {
                insert_photo.execute(params![
                    run_id,
                    photo.photo_id,
                    photo.photo_slug,
                    photo.photo_description,
                    photo.photo_created_at,
                    photo.photo_likes,
                    photo.metrics.downloads_total,
                    photo.metrics.views_total,
                    photo.metrics.likes_total,
                    photo.metrics.downloads_change_30d,
                    photo.metrics.views_change_30d,
                    photo.metrics.likes_change_30d,
                    serde_json::to_string(&photo.raw_json)?,
                ])?;
            }
        }

        tx.commit()?;
        info!(run_id, username = %run.username, photos = run.photos.len(), "stored collection run");
        Ok(run_id)
    }

    pub fn latest_run(&self) -> Result<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, username, collected_at FROM collection_runs ORDER BY collected_at DESC, id DESC LIMIT 1",
                [],
                |row| {
                    Ok(RunRecord {
                        id: row.get(0)?,
                        username: row.get(1)?,
                        collected_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }

    pub fn run_count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM collection_runs", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    /// Removes a run together with its snapshots. Returns whether it existed.
    pub fn delete_run(&self, run_id: i64) -> Result<bool> {
        let deleted = self
            .conn
            .execute("DELETE FROM collection_runs WHERE id = ?1", params![run_id])?;
        Ok(deleted > 0)
    }

    pub fn user_history(&self) -> Result<Vec<UserHistoryRow>> {
        self.query_all(schema::USER_HISTORY, |row| {
            Ok(UserHistoryRow {
                run_id: row.get("run_id")?,
                collected_at: row.get("collected_at")?,
                username: row.get("username")?,
                total_photos: row.get("total_photos")?,
                downloads_total: row.get("downloads_total")?,
                views_total: row.get("views_total")?,
                downloads_change_30d: row.get("downloads_change_30d")?,
                views_change_30d: row.get("views_change_30d")?,
            })
        })
    }

    pub fn photo_history(&self) -> Result<Vec<PhotoHistoryRow>> {
        self.query_all(schema::PHOTO_HISTORY, |row| {
            Ok(PhotoHistoryRow {
                run_id: row.get("run_id")?,
                collected_at: row.get("collected_at")?,
                photo_id: row.get("photo_id")?,
                photo_slug: row.get("photo_slug")?,
                photo_description: row.get("photo_description")?,
                photo_created_at: row.get("photo_created_at")?,
                downloads_total: row.get("downloads_total")?,
                views_total: row.get("views_total")?,
                downloads_change_30d: row.get("downloads_change_30d")?,
                views_change_30d: row.get("views_change_30d")?,
            })
        })
    }

    /// Latest snapshot of every photo with its change since the run before.
    pub fn photo_latest(&self) -> Result<Vec<PhotoLatestRow>> {
        self.query_all(schema::PHOTO_LATEST, |row| {
            Ok(PhotoLatestRow {
                photo_id: row.get("photo_id")?,
                photo_slug: row.get("photo_slug")?,
                photo_description: row.get("photo_description")?,
                photo_created_at: row.get("photo_created_at")?,
                downloads_total: row.get("downloads_total")?,
                views_total: row.get("views_total")?,
                latest_collected_at: row.get("latest_collected_at")?,
                previous_collected_at: row.get("previous_collected_at")?,
                downloads_delta_since_previous: row.get("downloads_delta_since_previous")?,
                views_delta_since_previous: row.get("views_delta_since_previous")?,
            })
        })
    }

    fn query_all<T>(&self, sql: &str, map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], map)?.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
