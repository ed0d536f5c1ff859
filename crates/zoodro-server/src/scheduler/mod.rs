//! Background job scheduler.
//!
//! Registers the recurring vendor refresh on `ZOODRO_REFRESH_CRON` and,
//! when `ZOODRO_REFRESH_ON_STARTUP` is set, kicks off one cycle immediately.

use std::sync::Arc;

use sqlx::PgPool;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use zoodro_db::TriggerSource;
use zoodro_refresh::RefreshPipeline;

/// Builds and starts the background job scheduler.
///
/// `pipeline` is `None` when the upstream is not configured; the scheduler
/// then starts with no jobs so the read API keeps serving the last committed
/// data. Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// the cron expression is invalid, or the scheduler fails to start.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<zoodro_core::AppConfig>,
    pipeline: Option<Arc<RefreshPipeline>>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if let Some(pipeline) = pipeline {
        register_refresh_job(&scheduler, pool.clone(), Arc::clone(&pipeline), &config.refresh_cron)
            .await?;

        if config.refresh_on_startup {
            tokio::spawn(async move {
                tracing::info!("scheduler: running startup refresh");
                run_refresh(&pool, &pipeline, TriggerSource::Startup).await;
            });
        }
    } else {
        tracing::warn!("scheduler: ZOODRO_UPSTREAM_JWT not set; vendor refresh disabled");
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_refresh_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    pipeline: Arc<RefreshPipeline>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let pipeline = Arc::clone(&pipeline);

        Box::pin(async move {
            tracing::info!("scheduler: starting vendor refresh");
            run_refresh(&pool, &pipeline, TriggerSource::Scheduler).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: vendor refresh registered");
    Ok(())
}

/// Runs one recorded cycle. Every failure is logged and swallowed so the
/// next tick still fires.
async fn run_refresh(pool: &PgPool, pipeline: &RefreshPipeline, trigger: TriggerSource) {
    match zoodro_refresh::run_recorded(pipeline, pool, trigger).await {
        Ok(report) => tracing::info!(
            trigger = %trigger,
            vendors_committed = report.vendors_committed,
            vendors_pruned = report.vendors_pruned,
            elapsed_ms = report.elapsed().num_milliseconds(),
            "scheduler: vendor refresh complete"
        ),
        Err(e) => tracing::error!(trigger = %trigger, error = %e, "scheduler: vendor refresh failed"),
    }
}
