//! Database operations for the `products` table.

use chrono::{DateTime, Utc};
use hdyscan_core::{BillingCycle, Pid, ProductRecord};
use sqlx::SqlitePool;

use crate::DbError;

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub pid: i64,
    pub title: String,
    /// Display price with currency prefix; `NULL` when the page showed none.
    pub price: Option<String>,
    /// `"default"` or `"annually"`; enforced by a CHECK constraint.
    pub billing_cycle: String,
    pub source_url: String,
    pub last_updated: DateTime<Utc>,
}

impl TryFrom<ProductRow> for ProductRecord {
    type Error = DbError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let billing_cycle =
            BillingCycle::parse(&row.billing_cycle).ok_or_else(|| DbError::InvalidRecord {
                pid: row.pid,
                reason: format!("unknown billing cycle {:?}", row.billing_cycle),
            })?;
        Ok(ProductRecord {
            pid: row.pid,
            title: row.title,
            price: row.price,
            billing_cycle,
            source_url: row.source_url,
            last_updated: row.last_updated,
        })
    }
}

const SELECT_COLUMNS: &str = "SELECT pid, title, price, billing_cycle, source_url, last_updated \
                              FROM products";

/// Point lookup by identifier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRecord`]
/// if the stored row cannot be mapped back to a record.
pub async fn get_product(pool: &SqlitePool, pid: Pid) -> Result<Option<ProductRecord>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_COLUMNS} WHERE pid = ?1"))
        .bind(pid)
        .fetch_optional(pool)
        .await?;
    row.map(ProductRecord::try_from).transpose()
}

/// Inserts or overwrites the record for `record.pid`.
///
/// Against a pool the statement runs in its own implicit transaction and is
/// committed before this returns; inside a transaction it commits with it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_product<'e, E>(executor: E, record: &ProductRecord) -> Result<(), DbError>
where
    E: sqlx::SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO products (pid, title, price, billing_cycle, source_url, last_updated) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT (pid) DO UPDATE SET \
             title         = excluded.title, \
             price         = excluded.price, \
             billing_cycle = excluded.billing_cycle, \
             source_url    = excluded.source_url, \
             last_updated  = excluded.last_updated",
    )
    .bind(record.pid)
    .bind(&record.title)
    .bind(&record.price)
    .bind(record.billing_cycle.as_str())
    .bind(&record.source_url)
    .bind(record.last_updated)
    .execute(executor)
    .await?;
    Ok(())
}

/// Every stored record, ordered by identifier ascending.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails, or [`DbError::InvalidRecord`]
/// for the first row that cannot be mapped back to a record.
pub async fn export_all_products(pool: &SqlitePool) -> Result<Vec<ProductRecord>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(&format!("{SELECT_COLUMNS} ORDER BY pid ASC"))
        .fetch_all(pool)
        .await?;
    rows.into_iter().map(ProductRecord::try_from).collect()
}

/// Number of stored records.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_products(pool: &SqlitePool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Highest stored identifier, or `None` on an empty table.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn last_identifier(pool: &SqlitePool) -> Result<Option<Pid>, DbError> {
    let max = sqlx::query_scalar::<_, Option<i64>>("SELECT MAX(pid) FROM products")
        .fetch_one(pool)
        .await?;
    Ok(max)
}
