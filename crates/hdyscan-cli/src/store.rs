//! Store maintenance command handlers: legacy migration, export, and lookup.

use chrono::Utc;
use hdyscan_core::{AppConfig, Pid};
use hdyscan_db::ExportSummary;
use sqlx::SqlitePool;

/// Imports the legacy results file when the store is still empty.
///
/// Returns how many records were imported.
///
/// # Errors
///
/// Returns an error if the legacy file exists but cannot be read or parsed,
/// or if the import transaction fails.
pub(crate) async fn migrate_legacy(pool: &SqlitePool, config: &AppConfig) -> anyhow::Result<usize> {
    let summary = hdyscan_db::import_legacy(pool, &config.legacy_path)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "failed to import legacy results from {}: {e}",
                config.legacy_path.display()
            )
        })?;

    if summary.imported > 0 || summary.skipped > 0 {
        tracing::info!(
            path = %config.legacy_path.display(),
            imported = summary.imported,
            skipped = summary.skipped,
            "migrated legacy results into store"
        );
    }
    Ok(summary.imported)
}

/// Writes the export file from the current store contents.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the file cannot be written.
pub(crate) async fn export_store(
    pool: &SqlitePool,
    config: &AppConfig,
) -> anyhow::Result<ExportSummary> {
    let summary = hdyscan_db::write_export(pool, &config.export_path, Utc::now()).await?;
    tracing::info!(
        path = %summary.path.display(),
        records = summary.records,
        last_identifier = ?summary.last_identifier,
        "export written"
    );
    Ok(summary)
}

/// `export` command: migrate if needed, then export.
///
/// # Errors
///
/// Returns an error if migration or export fails.
pub(crate) async fn run_export(pool: &SqlitePool, config: &AppConfig) -> anyhow::Result<()> {
    migrate_legacy(pool, config).await?;
    let summary = export_store(pool, config).await?;
    println!(
        "Exported {} records to {}",
        summary.records,
        summary.path.display()
    );
    Ok(())
}

/// `migrate` command: schema migrations already ran at connect; import the
/// legacy file.
///
/// # Errors
///
/// Returns an error if the legacy import fails.
pub(crate) async fn run_migrate(pool: &SqlitePool, config: &AppConfig) -> anyhow::Result<()> {
    let imported = migrate_legacy(pool, config).await?;
    let total = hdyscan_db::count_products(pool).await?;
    match hdyscan_db::last_identifier(pool).await? {
        Some(highest) => println!(
            "Imported {imported} legacy records; store holds {total} products (highest PID {highest})."
        ),
        None => println!("Imported {imported} legacy records; store is empty."),
    }
    Ok(())
}

/// `show` command: print one stored record.
///
/// # Errors
///
/// Returns an error if the lookup fails or the identifier is not stored.
pub(crate) async fn run_show(pool: &SqlitePool, pid: Pid) -> anyhow::Result<()> {
    let record = hdyscan_db::get_product(pool, pid)
        .await?
        .ok_or_else(|| anyhow::anyhow!("PID {pid} is not in the store"))?;

    println!("PID:           {}", record.pid);
    println!("Title:         {}", record.title);
    println!("Price:         {}", record.price.as_deref().unwrap_or("-"));
    println!("Billing cycle: {}", record.billing_cycle);
    println!("URL:           {}", record.source_url);
    println!("Last updated:  {}", record.last_updated.to_rfc3339());
    Ok(())
}
