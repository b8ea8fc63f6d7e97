mod scan;
mod store;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hdyscan_core::Pid;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "hdyscan")]
#[command(about = "Catalog PID scanner: finds valid product pages and tracks their prices")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan an identifier range and record valid products
    Scan {
        /// First identifier to check
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..))]
        start: Pid,

        /// Last identifier to check (inclusive); omit to scan until a stop condition
        #[arg(long, value_parser = clap::value_parser!(i64).range(1..))]
        end: Option<Pid>,

        /// Stop issuing new work after this many seconds
        #[arg(long)]
        budget_secs: Option<u64>,

        /// Concurrent workers (defaults to `HDYSCAN_WORKERS`)
        #[arg(long)]
        workers: Option<usize>,

        /// Skip identifiers already in the store
        #[arg(long)]
        skip_known: bool,
    },
    /// Write the export file from the store
    Export,
    /// Run schema migrations and import the legacy results file
    Migrate,
    /// Print the stored record for one identifier
    Show {
        pid: Pid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = hdyscan_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("hdyscan: no command given; try `hdyscan scan --start 1 --end 100`");
        return Ok(());
    };

    let pool = hdyscan_db::open_store(
        &config.database_url,
        hdyscan_db::PoolConfig::from_app_config(&config),
    )
    .await?;

    match command {
        Commands::Scan {
            start,
            end,
            budget_secs,
            workers,
            skip_known,
        } => {
            let options = scan::ScanOptions {
                start,
                end,
                budget: budget_secs.map(Duration::from_secs),
                workers: workers.unwrap_or(config.workers).max(1),
                skip_known,
            };
            scan::run_scan_command(&pool, &config, &options, interrupt_flag()).await?;
        }
        Commands::Export => store::run_export(&pool, &config).await?,
        Commands::Migrate => store::run_migrate(&pool, &config).await?,
        Commands::Show { pid } => store::run_show(&pool, pid).await?,
    }

    pool.close().await;
    Ok(())
}

/// Flag raised on the first Ctrl-C; the scan drains and exports instead of
/// exiting. A second Ctrl-C exits immediately with status 130.
fn interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let raised = Arc::clone(&flag);
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if raise_interrupt(&raised) {
                tracing::warn!("second interrupt; exiting without export");
                std::process::exit(130);
            }
            tracing::warn!(
                "interrupt received; finishing in-flight pages before exit (Ctrl-C again to abort)"
            );
        }
    });
    flag
}

/// Raises `flag`; returns whether it was already raised by an earlier signal.
fn raise_interrupt(flag: &AtomicBool) -> bool {
    flag.swap(true, Ordering::SeqCst)
}
