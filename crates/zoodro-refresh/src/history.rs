//! Refresh cycles recorded in the `refresh_runs` table.

use std::sync::Arc;

use sqlx::PgPool;
use zoodro_core::AppConfig;
use zoodro_db::{PgVendorStore, RefreshRunCounts, TriggerSource};
use zoodro_scraper::{ScraperError, UpstreamConfig, VendorApiClient};

use crate::{RefreshError, RefreshPipeline, RefreshPolicy, RefreshReport};

/// Wires a pipeline to the upstream API and the Postgres staging and live
/// collections.
///
/// # Errors
///
/// Returns [`ScraperError::InvalidConfig`] when no upstream JWT is configured,
/// or [`ScraperError::Http`] if the HTTP client cannot be built.
pub fn postgres_pipeline(
    pool: &PgPool,
    config: &AppConfig,
) -> Result<RefreshPipeline, ScraperError> {
    let client = VendorApiClient::new(&UpstreamConfig::from_app_config(config)?)?;
    Ok(RefreshPipeline::new(
        Arc::new(client),
        Arc::new(PgVendorStore::staging(pool.clone())),
        Arc::new(PgVendorStore::live(pool.clone())),
        RefreshPolicy::from_app_config(config),
    ))
}

/// Runs one cycle and records it as a `refresh_runs` row.
///
/// Failures to update the history row after the cycle are logged, not
/// returned; the cycle's own outcome wins.
///
/// # Errors
///
/// Returns [`RefreshError::Store`] if the history row cannot be created, or
/// whatever [`RefreshPipeline::run`] returned.
pub async fn run_recorded(
    pipeline: &RefreshPipeline,
    pool: &PgPool,
    trigger: TriggerSource,
) -> Result<RefreshReport, RefreshError> {
    let run = zoodro_db::start_refresh_run(pool, trigger).await?;
    tracing::info!(
        run_id = run.id,
        public_id = %run.public_id,
        trigger = %trigger,
        "refresh: run started"
    );

    let outcome = pipeline.run().await;

    let recorded = match &outcome {
        Ok(report) => zoodro_db::complete_refresh_run(pool, run.id, counts(report)).await,
        Err(e) => zoodro_db::fail_refresh_run(pool, run.id, &e.to_string()).await,
    };
    if let Err(e) = recorded {
        tracing::error!(run_id = run.id, error = %e, "refresh: failed to record run outcome");
    }

    match &outcome {
        Ok(report) => tracing::info!(
            run_id = run.id,
            vendors_committed = report.vendors_committed,
            vendors_pruned = report.vendors_pruned,
            "refresh: run succeeded"
        ),
        Err(e) => tracing::error!(run_id = run.id, error = %e, "refresh: run failed"),
    }

    outcome
}

fn counts(report: &RefreshReport) -> RefreshRunCounts {
    let clamp = |n: u64| i64::try_from(n).unwrap_or(i64::MAX);
    RefreshRunCounts {
        vendors_listed: clamp(report.vendors_listed),
        vendors_committed: clamp(report.vendors_committed),
        vendors_pruned: clamp(report.vendors_pruned),
    }
}
