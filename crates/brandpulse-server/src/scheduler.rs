//! Background refresh scheduler.
//!
//! When `BRANDPULSE_REFRESH_CRON` is set, a [`JobScheduler`] re-runs the
//! pipeline on that schedule so readers always see a recent snapshot.

use std::sync::Arc;

use brandpulse_monitor::{PipelineError, SnapshotStore};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tokio_util::sync::CancellationToken;

/// Builds and starts the scheduler with a single refresh job.
///
/// The returned handle must be kept alive for the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the cron expression is invalid or the
/// scheduler fails to start.
pub async fn build_scheduler(
    cron: &str,
    store: Arc<SnapshotStore>,
    shutdown: CancellationToken,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let store = Arc::clone(&store);
        let shutdown = shutdown.clone();

        Box::pin(async move {
            tracing::info!("scheduler: starting refresh");
            run_refresh_job(&store, &shutdown).await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!(cron, "scheduler: refresh job registered");
    Ok(scheduler)
}

async fn run_refresh_job(store: &SnapshotStore, shutdown: &CancellationToken) {
    match store.try_refresh(shutdown).await {
        Ok(snapshot) => tracing::info!(
            ranked = snapshot.metadata.ranked,
            "scheduler: refresh complete"
        ),
        Err(PipelineError::RefreshInProgress) => {
            tracing::info!("scheduler: refresh already running; skipping tick");
        }
        Err(e) => tracing::error!(error = %e, "scheduler: refresh failed"),
    }
}
