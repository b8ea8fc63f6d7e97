//! The persisted export file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use hdyscan_core::{Pid, ProductRecord};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tokio::io::AsyncWriteExt;

use crate::products::export_all_products;
use crate::DbError;

/// On-disk shape of an export. `failed` is always written empty; it is kept
/// so readers of the legacy results file accept exports unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFile {
    pub success: Vec<ProductRecord>,
    #[serde(default)]
    pub failed: Vec<serde_json::Value>,
    pub last_identifier: Option<Pid>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub records: usize,
    pub last_identifier: Option<Pid>,
}

/// Writes every stored record to `path`, replacing any previous export.
///
/// The file is written to a sibling `.tmp` file, flushed, and renamed over
/// `path`, so readers only ever see a complete export. Missing parent
/// directories are created.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if reading the store fails, or [`DbError::Io`]
/// if the file cannot be written.
pub async fn write_export(
    pool: &SqlitePool,
    path: &Path,
    now: DateTime<Utc>,
) -> Result<ExportSummary, DbError> {
    let records = export_all_products(pool).await?;
    let export = ExportFile {
        last_identifier: records.last().map(|r| r.pid),
        success: records,
        failed: Vec::new(),
        updated_at: now,
    };
    let body = serde_json::to_vec_pretty(&export).map_err(|source| DbError::Json {
        path: path.display().to_string(),
        source,
    })?;

    write_atomically(path, &body).await.map_err(|source| DbError::Io {
        path: path.display().to_string(),
        source,
    })?;

    Ok(ExportSummary {
        path: path.to_path_buf(),
        records: export.success.len(),
        last_identifier: export.last_identifier,
    })
}

/// Reads an export (or legacy results) file.
///
/// # Errors
///
/// Returns [`DbError::Io`] if the file cannot be read, or [`DbError::Json`]
/// if it is not a valid export.
pub async fn read_export(path: &Path) -> Result<ExportFile, DbError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| DbError::Io {
            path: path.display().to_string(),
            source,
        })?;
    serde_json::from_str(&raw).map_err(|source| DbError::Json {
        path: path.display().to_string(),
        source,
    })
}

async fn write_atomically(path: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(body).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await
}
