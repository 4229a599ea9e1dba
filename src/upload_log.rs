use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::storage::Backend;

/// Record of an artifact handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
  pub id: i64,
  pub name: String,
  pub backend: String,
  pub container: String,
  pub remote_id: String,
  pub sha256: String,
  pub size: i64,
  pub uploaded_at: i64,
  pub deleted_at: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NewUpload<'a> {
  pub name: &'a str,
  pub backend: Backend,
  pub container: &'a str,
  pub remote_id: &'a str,
  pub sha256: &'a str,
  pub size: u64,
  pub uploaded_at: i64,
}

pub struct UploadLog {
  pool: SqlitePool,
}

impl UploadLog {
  pub async fn open(path: &Path) -> Result<UploadLog> {
    let options = SqliteConnectOptions::new()
      .filename(path)
      .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
      .max_connections(1)
      .connect_with(options)
      .await
      .with_context(|| format!("opening upload log {:?}", path))?;
    sqlx::query("CREATE TABLE IF NOT EXISTS uploads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        backend TEXT NOT NULL,
        container TEXT NOT NULL,
        remote_id TEXT NOT NULL,
        sha256 TEXT NOT NULL,
        size INTEGER NOT NULL,
        uploaded_at INTEGER NOT NULL,
        deleted_at INTEGER NULL
      );")
      .execute(&pool)
      .await?;
    debug!("Opened upload log {:?}", path);
    Ok(UploadLog { pool })
  }

  pub async fn record(&self, upload: &NewUpload<'_>) -> Result<i64> {
    let result = sqlx::query("INSERT INTO uploads (name, backend, container, remote_id, sha256, size, uploaded_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
      .bind(upload.name)
      .bind(upload.backend.as_ref())
      .bind(upload.container)
      .bind(upload.remote_id)
      .bind(upload.sha256)
      .bind(i64::try_from(upload.size).unwrap_or(i64::MAX))
      .bind(upload.uploaded_at)
      .execute(&self.pool)
      .await?;
    Ok(result.last_insert_rowid())
  }

  /// Live uploads on `backend`/`container` made strictly before `cutoff`.
  pub async fn expired(&self, backend: Backend, container: &str, cutoff: i64) -> Result<Vec<UploadRecord>> {
    let rows = sqlx::query("SELECT * FROM uploads WHERE backend = ? AND container = ? AND uploaded_at < ? AND deleted_at IS NULL ORDER BY uploaded_at")
      .bind(backend.as_ref())
      .bind(container)
      .bind(cutoff)
      .fetch_all(&self.pool)
      .await?;
    rows.iter().map(from_row).collect()
  }

  pub async fn mark_deleted(&self, id: i64, at: i64) -> Result<()> {
    sqlx::query("UPDATE uploads SET deleted_at = ? WHERE id = ?")
      .bind(at)
      .bind(id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  pub async fn list(&self, include_deleted: bool) -> Result<Vec<UploadRecord>> {
    let sql = if include_deleted {
      "SELECT * FROM uploads ORDER BY uploaded_at, id"
    } else {
      "SELECT * FROM uploads WHERE deleted_at IS NULL ORDER BY uploaded_at, id"
    };
    let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
    rows.iter().map(from_row).collect()
  }

  pub async fn close(&self) {
    self.pool.close().await
  }
}

fn from_row(row: &SqliteRow) -> Result<UploadRecord> {
  Ok(UploadRecord {
    id: row.try_get("id")?,
    name: row.try_get("name")?,
    backend: row.try_get("backend")?,
    container: row.try_get("container")?,
    remote_id: row.try_get("remote_id")?,
    sha256: row.try_get("sha256")?,
    size: row.try_get("size")?,
    uploaded_at: row.try_get("uploaded_at")?,
    deleted_at: row.try_get("deleted_at")?,
  })
}
