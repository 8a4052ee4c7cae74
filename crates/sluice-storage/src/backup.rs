// SPDX-FileCopyrightText: 2026 Sluice Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Online backup and restore.
//!
//! Copies go through SQLite's backup API a few pages at a time, so a
//! database in WAL mode can keep taking writes while it is copied.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use sluice_core::SluiceError;
use tracing::info;

const PAGES_PER_STEP: i32 = 100;
const STEP_PAUSE: Duration = Duration::from_millis(10);

fn copy(from: &Connection, to: &mut Connection) -> Result<(), SluiceError> {
    let backup = Backup::new(from, to)?;
    backup.run_to_completion(PAGES_PER_STEP, STEP_PAUSE, None)?;
    Ok(())
}

fn not_found(what: &str, path: &Path) -> SluiceError {
    SluiceError::storage(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!("{what} not found: {}", path.display()),
    ))
}

fn open_source(path: &Path) -> Result<Connection, SluiceError> {
    if !path.exists() {
        return Err(not_found("backup source", path));
    }
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    // Opening is lazy; a query proves the file is a database.
    conn.execute_batch("SELECT count(*) FROM sqlite_master")?;
    Ok(conn)
}

fn size_mb(path: &Path) -> f64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0) as f64 / (1024.0 * 1024.0)
}

/// Copy the live database behind `conn` into a new file at `dest`.
pub fn backup_to(conn: &Connection, dest: &Path) -> Result<(), SluiceError> {
    let mut dst = Connection::open(dest)?;
    copy(conn, &mut dst)?;
    info!(dest = %dest.display(), size_mb = %format!("{:.1}", size_mb(dest)), "backup complete");
    Ok(())
}

/// Overwrite the database behind `conn` with the contents of `src`.
pub fn restore_into(conn: &mut Connection, src: &Path) -> Result<(), SluiceError> {
    let source = open_source(src)?;
    copy(&source, conn)?;
    info!(src = %src.display(), "restore complete");
    Ok(())
}

/// Back up the database file at `src` into `dest`.
pub fn backup_file(src: &Path, dest: &Path) -> Result<(), SluiceError> {
    if !src.exists() {
        return Err(not_found("database", src));
    }
    let source = open_source(src)?;
    backup_to(&source, dest)
}

/// Restore the database file at `db_path` from `src`.
///
/// An existing database is first copied to `<db_path>.pre-restore`, whose
/// path is returned.
pub fn restore_file(db_path: &Path, src: &Path) -> Result<Option<PathBuf>, SluiceError> {
    let source = open_source(src)?;

    let safety = if db_path.exists() {
        let mut pre_restore = db_path.as_os_str().to_owned();
        pre_restore.push(".pre-restore");
        let pre_restore = PathBuf::from(pre_restore);
        info!(path = %pre_restore.display(), "creating safety backup");
        backup_file(db_path, &pre_restore)?;
        Some(pre_restore)
    } else {
        None
    };

    let mut dst = Connection::open(db_path)?;
    copy(&source, &mut dst)?;
    info!(
        src = %src.display(),
        size_mb = %format!("{:.1}", size_mb(db_path)),
        "restore complete"
    );
    Ok(safety)
}
