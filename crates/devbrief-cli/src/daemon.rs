//! Scheduled operation: collect then brief on a cron schedule.

use std::sync::Arc;

use devbrief_core::AppConfig;
use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tokio_util::sync::CancellationToken;

use crate::brief::{run_brief, BriefOptions};

/// Start the scheduler and block until ctrl-c or SIGTERM.
///
/// # Errors
///
/// Returns an error if the scheduler cannot be built, started or shut down.
pub(crate) async fn run_daemon(pool: PgPool, config: Arc<AppConfig>) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut scheduler = build_scheduler(pool, Arc::clone(&config), cancel.clone()).await?;
    tracing::info!(cron = %config.schedule_cron, "daemon started");

    shutdown_signal().await;
    cancel.cancel();
    scheduler.shutdown().await?;
    Ok(())
}

/// Build and start a scheduler with the daily briefing job registered.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the cron expression is invalid or the
/// scheduler fails to start.
async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
    cancel: CancellationToken,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_daily_job(&scheduler, pool, config, cancel).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_daily_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
    cancel: CancellationToken,
) -> Result<(), JobSchedulerError> {
    let cron = config.schedule_cron.clone();
    let pool = Arc::new(pool);
    let running = Arc::new(Mutex::new(()));

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let running = Arc::clone(&running);
        let cancel = cancel.clone();

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!("scheduler: previous daily run still in progress; skipping");
                return;
            };
            tracing::info!("scheduler: starting daily run");
            run_daily(&pool, &config, &cancel).await;
            tracing::info!("scheduler: daily run complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %cron, "scheduler: registered daily job");
    Ok(())
}

/// One scheduled cycle. A failed collection still lets the briefing run on
/// whatever is already stored.
async fn run_daily(pool: &PgPool, config: &AppConfig, cancel: &CancellationToken) {
    if let Err(e) = crate::collect::run_collect(pool, config, "scheduler", false).await {
        tracing::error!(error = %format!("{e:#}"), "scheduler: collection failed");
    }
    if cancel.is_cancelled() {
        return;
    }

    let options = BriefOptions {
        dry_run: false,
        output: None,
        trigger: "scheduler",
    };
    if let Err(e) = run_brief(pool, config, &options, cancel).await {
        tracing::error!(error = %format!("{e:#}"), "scheduler: briefing failed");
    }
}

/// Resolve on ctrl-c or, on Unix, SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping");
}
