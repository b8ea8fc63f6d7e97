//! One-time import of the flat legacy results file.
//!
//! The legacy file is `{"success": [record…], "failed": […]}` with records
//! keyed `pid`, `title`, `price`, `billing_cycle`, `url`. Export files share
//! that shape, so an export can be imported into a fresh store as well.

use std::path::Path;

use hdyscan_core::ProductRecord;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::products::{count_products, upsert_product};
use crate::DbError;

#[derive(Debug, Deserialize)]
struct LegacyFile {
    #[serde(default)]
    success: Vec<ProductRecord>,
}

/// Outcome of [`import_legacy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: usize,
    /// Records dropped because their identifier was not positive.
    pub skipped: usize,
}

/// Imports `path` into an empty `products` table.
///
/// A no-op returning an empty summary when the table already holds records
/// or the file does not exist. All rows are written in one transaction, so
/// a failed import leaves the table empty and the next run retries. When
/// the file repeats an identifier, the later entry wins.
///
/// # Errors
///
/// Returns [`DbError::Io`] if the file exists but cannot be read,
/// [`DbError::Json`] if it is not valid legacy JSON, or [`DbError::Sqlx`] if
/// a write fails.
pub async fn import_legacy(pool: &SqlitePool, path: &Path) -> Result<ImportSummary, DbError> {
    if count_products(pool).await? > 0 {
        return Ok(ImportSummary::default());
    }

    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ImportSummary::default());
        }
        Err(source) => {
            return Err(DbError::Io {
                path: path.display().to_string(),
                source,
            })
        }
    };
    let legacy: LegacyFile = serde_json::from_str(&raw).map_err(|source| DbError::Json {
        path: path.display().to_string(),
        source,
    })?;

    let mut summary = ImportSummary::default();
    let mut tx = pool.begin().await?;
    for record in &legacy.success {
        if record.pid <= 0 {
            summary.skipped += 1;
            continue;
        }
        upsert_product(&mut *tx, record).await?;
        summary.imported += 1;
    }
    tx.commit().await?;

    Ok(summary)
}
