//! Staged uploads
//!
//! At most one validated workbook per region waits for commit. The row is
//! shared by every admin session, so a second admin sees (and may commit)
//! the workbook the first one uploaded.

use chrono::{DateTime, Utc};
use lrms_common::db::StagedUpload;
use lrms_common::{Error, Region, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::path::{Path, PathBuf};

fn from_row(row: &SqliteRow) -> Result<StagedUpload> {
    let region: String = row.get("region");
    let file_path: String = row.get("file_path");
    let uploaded_at: String = row.get("uploaded_at");

    Ok(StagedUpload {
        region: region.parse()?,
        file_path: PathBuf::from(file_path),
        original_filename: row.get("original_filename"),
        uploaded_by: row.get("uploaded_by"),
        uploaded_at: DateTime::parse_from_rfc3339(&uploaded_at)
            .map_err(|e| Error::Internal(format!("Invalid staging timestamp: {}", e)))?
            .with_timezone(&Utc),
    })
}

pub async fn get(pool: &SqlitePool, region: Region) -> Result<Option<StagedUpload>> {
    let row = sqlx::query(
        r#"
        SELECT region, file_path, original_filename, uploaded_by, uploaded_at
        FROM staged_uploads
        WHERE region = ?
        "#,
    )
    .bind(region.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(from_row).transpose()
}

/// All staged uploads, in region order
pub async fn list(pool: &SqlitePool) -> Result<Vec<StagedUpload>> {
    let rows = sqlx::query(
        "SELECT region, file_path, original_filename, uploaded_by, uploaded_at FROM staged_uploads",
    )
    .fetch_all(pool)
    .await?;

    let mut uploads = rows.iter().map(from_row).collect::<Result<Vec<_>>>()?;
    uploads.sort_by_key(|u| u.region);
    Ok(uploads)
}

/// Stage `upload` for its region, replacing any earlier one.
///
/// Returns the file path of the replaced upload; the caller owns deleting it.
/// Concurrent replacements of one region serialize; the last one wins.
pub async fn replace(pool: &SqlitePool, upload: &StagedUpload) -> Result<Option<PathBuf>> {
    let mut tx = pool.begin().await?;

    // Write before reading: a deferred transaction that has already read
    // cannot wait for the write lock and fails with SQLITE_BUSY instead.
    sqlx::query("UPDATE staged_uploads SET region = region WHERE region = ?")
        .bind(upload.region.as_str())
        .execute(&mut *tx)
        .await?;

    let previous: Option<String> =
        sqlx::query_scalar("SELECT file_path FROM staged_uploads WHERE region = ?")
            .bind(upload.region.as_str())
            .fetch_optional(&mut *tx)
            .await?;

    sqlx::query(
        r#"
        INSERT INTO staged_uploads (region, file_path, original_filename, uploaded_by, uploaded_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(region) DO UPDATE SET
            file_path = excluded.file_path,
            original_filename = excluded.original_filename,
            uploaded_by = excluded.uploaded_by,
            uploaded_at = excluded.uploaded_at
        "#,
    )
    .bind(upload.region.as_str())
    .bind(upload.file_path.to_string_lossy().into_owned())
    .bind(&upload.original_filename)
    .bind(&upload.uploaded_by)
    .bind(upload.uploaded_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(previous
        .map(PathBuf::from)
        .filter(|path| path != &upload.file_path))
}

/// Clear the region's staging row only if it still names `file_path`.
///
/// Returns false when another upload replaced it in the meantime.
pub async fn clear_if_current(conn: &mut SqliteConnection, region: Region, file_path: &Path) -> Result<bool> {
    let result = sqlx::query("DELETE FROM staged_uploads WHERE region = ? AND file_path = ?")
        .bind(region.as_str())
        .bind(file_path.to_string_lossy().into_owned())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}
