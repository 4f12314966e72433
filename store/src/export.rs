//! Writes the three history views as JSON files for downstream tooling.

use crate::{
    error::{
        Error,
        Result,
    },
    store::Store,
};
use serde::Serialize;
use std::{
    fs::File,
    io::{
        BufWriter,
        Write as _,
    },
    path::{
        Path,
        PathBuf,
    },
};

pub const USER_HISTORY_FILE: &str = "user_stats_history.json";
pub const PHOTO_HISTORY_FILE: &str = "photo_stats_history.json";
pub const PHOTO_LATEST_FILE: &str = "photo_latest.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedFile {
    pub path: PathBuf,
    pub rows: usize,
}

/// Writes every view into `output_dir`, creating it if needed.
pub fn export_json(store: &Store, output_dir: &Path) -> Result<Vec<ExportedFile>> {
    std::fs::create_dir_all(output_dir).map_err(Error::io(output_dir))?;

    let exported = vec![
        write_rows(&output_dir.join(USER_HISTORY_FILE), &store.user_history()?)?,
        write_rows(&output_dir.join(PHOTO_HISTORY_FILE), &store.photo_history()?)?,
        write_rows(&output_dir.join(PHOTO_LATEST_FILE), &store.photo_latest()?)?,
    ];

    for file in &exported {
        debug!(path = %file.path.display(), rows = file.rows, "wrote export");
    }
    Ok(exported)
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<ExportedFile> {
    let file = File::create(path).map_err(Error::io(path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(Error::io(path))?;

    Ok(ExportedFile {
        path: path.to_path_buf(),
        rows: rows.len(),
    })
}
