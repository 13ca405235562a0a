//! Job workers (spec §2 H1-H3, §5 "Scheduling model").
//!
//! Each worker task is the loop spec §5 describes: acquire -> execute ->
//! update status -> sleep briefly if no job. Acquisition and status updates
//! each get their own short transaction; the actual work runs in a second,
//! separate [`UnitOfWork`] so a failed transform rolls back without losing
//! the `running -> failed` status transition (which must survive the
//! rollback to be visible at all).

pub mod exploration;
pub mod import;
pub mod sampling;
pub mod sql_transform;

use std::time::Duration;

use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::domain::job::{Job, JobStatus, RunType};
use crate::error::CoreResult;
use crate::store::job_store::JobStore;
use crate::uow::UnitOfWork;

/// Runs one worker's acquire/execute/sleep loop forever. Intended to be
/// spawned with `tokio::spawn` once per worker slot
/// (`config.worker_pool_size_per_type` slots per `run_type`).
pub async fn run_worker_loop(conn: DatabaseConnection, config: Config, run_type: RunType) {
    loop {
        match try_acquire(&conn, run_type).await {
            Ok(Some(job)) => {
                info!(job_id = %job.job_id, run_type = run_type.as_str(), "acquired job");
                if let Err(e) = execute_and_finalize(&conn, &config, job).await {
                    error!(error = %e, "job execution loop failed unexpectedly");
                }
            }
            Ok(None) => {
                tokio::time::sleep(Duration::from_millis(config.worker_poll_interval_ms)).await;
            }
            Err(e) => {
                warn!(error = %e, "failed to acquire next job, backing off");
                tokio::time::sleep(Duration::from_millis(config.worker_poll_interval_ms)).await;
            }
        }
    }
}

async fn try_acquire(conn: &DatabaseConnection, run_type: RunType) -> CoreResult<Option<Job>> {
    let uow = UnitOfWork::begin(conn).await?;
    let job = JobStore::new(uow.txn()).acquire_next_pending_job(Some(run_type)).await?;
    uow.commit().await?;
    Ok(job)
}

async fn execute_and_finalize(conn: &DatabaseConnection, config: &Config, job: Job) -> CoreResult<()> {
    let job_id = job.job_id;
    let outcome = {
        let uow = UnitOfWork::begin(conn).await?;
        let result = dispatch(&uow, config, &job).await;
        match result {
            Ok(WorkerOutcome::Completed(output_summary)) => {
                JobStore::new(uow.txn())
                    .update_job_status(job_id, JobStatus::Completed, Some(output_summary), None)
                    .await?;
                uow.commit().await?;
                Ok(None)
            }
            Ok(WorkerOutcome::Cancelled) => {
                JobStore::new(uow.txn())
                    .update_job_status(job_id, JobStatus::Cancelled, None, None)
                    .await?;
                uow.commit().await?;
                Ok(None)
            }
            Err(e) => {
                uow.rollback().await?;
                Ok(Some(e))
            }
        }
    };

    if let Some(e) = outcome? {
        let uow = UnitOfWork::begin(conn).await?;
        JobStore::new(uow.txn())
            .update_job_status(job_id, JobStatus::Failed, None, Some(e.to_string()))
            .await?;
        uow.commit().await?;
    }
    Ok(())
}

/// What a worker body produced: a completed commit/summary, or an early,
/// clean stop because `cancel_requested` was observed at a batch boundary
/// (spec §5). Distinct from `Err` because cancellation is not a failure —
/// it must land the job in `Cancelled`, not `Failed` (spec §3's state
/// machine has no `running -> failed` edge for this case).
pub(crate) enum WorkerOutcome {
    Completed(serde_json::Value),
    Cancelled,
}

async fn dispatch(uow: &UnitOfWork, config: &Config, job: &Job) -> CoreResult<WorkerOutcome> {
    match job.run_type {
        RunType::Import => import::execute(uow, config, job).await,
        RunType::Sampling => sampling::execute(uow, job).await,
        RunType::SqlTransform => sql_transform::execute(uow, job).await,
        RunType::Exploration => exploration::execute(uow, job).await,
    }
}

/// Cooperative cancellation check at a batch boundary (spec §5): workers
/// call this between chunks of the source-row stream and, if it returns
/// `true`, abort with a rollback rather than completing the job.
pub(crate) async fn check_cancelled(uow: &UnitOfWork, job_id: uuid::Uuid) -> CoreResult<bool> {
    JobStore::new(uow.txn()).is_cancel_requested(job_id).await
}
