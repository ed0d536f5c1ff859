//! `refresh` command handlers.

use std::sync::Arc;

use clap::Subcommand;
use zoodro_db::{MemoryVendorStore, TriggerSource};
use zoodro_refresh::{RefreshPipeline, RefreshPolicy, RefreshReport};
use zoodro_scraper::{UpstreamConfig, VendorApiClient};

#[derive(Debug, Subcommand)]
pub enum RefreshCommands {
    /// Run one refresh cycle now
    Run {
        /// Scrape into in-memory collections and print the report without
        /// touching the database
        #[arg(long)]
        dry_run: bool,
    },
    /// Show recent refresh runs
    History {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

/// Runs one recorded cycle against the Postgres collections.
///
/// # Errors
///
/// Returns an error if the upstream is not configured, the run cannot be
/// recorded, or the cycle fails.
pub(crate) async fn run_refresh(
    pool: &sqlx::PgPool,
    config: &zoodro_core::AppConfig,
) -> anyhow::Result<()> {
    let pipeline = zoodro_refresh::postgres_pipeline(pool, config)?;
    let report = zoodro_refresh::run_recorded(&pipeline, pool, TriggerSource::Cli).await?;
    print_report(&report);
    Ok(())
}

/// Runs one cycle into in-memory collections.
///
/// # Errors
///
/// Returns an error if the upstream is not configured or the cycle fails.
pub(crate) async fn run_refresh_dry(config: &zoodro_core::AppConfig) -> anyhow::Result<()> {
    let client = VendorApiClient::new(&UpstreamConfig::from_app_config(config)?)?;
    let live = Arc::new(MemoryVendorStore::live());
    let pipeline = RefreshPipeline::new(
        Arc::new(client),
        Arc::new(MemoryVendorStore::staging()),
        live.clone(),
        RefreshPolicy::from_app_config(config),
    );

    let report = pipeline.run().await?;
    print_report(&report);
    println!("dry run: {} vendor(s) would be live", live.snapshot().await.len());
    Ok(())
}

/// # Errors
///
/// Returns an error if the database query fails.
pub(crate) async fn run_refresh_history(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = zoodro_db::list_refresh_runs(pool, limit.clamp(1, 200)).await?;

    if runs.is_empty() {
        println!("no refresh runs recorded; run `refresh run` first");
        return Ok(());
    }

    println!(
        "{:<7}{:<11}{:<11}{:<22}{:>8}{:>11}{:>8}  ERROR",
        "ID", "TRIGGER", "STATUS", "STARTED", "LISTED", "COMMITTED", "PRUNED"
    );
    for run in &runs {
        println!(
            "{:<7}{:<11}{:<11}{:<22}{:>8}{:>11}{:>8}  {}",
            run.id,
            run.trigger_source,
            run.status,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.vendors_listed,
            run.vendors_committed,
            run.vendors_pruned,
            run.error_message.as_deref().unwrap_or("")
        );
    }

    Ok(())
}

fn print_report(report: &RefreshReport) {
    println!("refresh finished in {}s", report.elapsed().num_seconds());
    println!(
        "  listed     {} vendor(s) over {} page(s){}",
        report.vendors_listed,
        report.pages_fetched,
        if report.listing_truncated {
            " (listing stopped on an upstream error)"
        } else {
            ""
        }
    );
    println!(
        "  details    {} fetched, {} failed attempt(s), {} pass(es), {} still missing",
        report.details_fetched,
        report.detail_failures,
        report.detail_passes,
        report.vendors_missing_details
    );
    println!(
        "  live       {} committed, {} pruned",
        report.vendors_committed, report.vendors_pruned
    );
}
