//! Job commands (spec §6): queue import / sampling / SQL transform jobs,
//! cancel, and query status.

use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus, RoundSpec, RunType};
use crate::domain::permission::PermissionLevel;
use crate::error::CoreResult;
use crate::permission::Resource;
use crate::uow::UnitOfWork;

#[derive(Debug, Clone)]
pub struct QueueImportCommand {
    pub dataset_id: i64,
    pub target_ref: String,
    pub commit_message: String,
    pub filename: String,
    pub temp_file_path: String,
    pub user_id: i64,
}

/// "Queue import" (spec §6): binds the job to the ref's *current* tip so
/// the import worker can detect a concurrent advance (spec §4.9 step 2).
pub async fn queue_import(uow: &UnitOfWork, cmd: QueueImportCommand) -> CoreResult<Uuid> {
    uow.permissions()
        .require(Resource::Dataset(cmd.dataset_id), cmd.user_id, PermissionLevel::Write)
        .await?;
    let tip = uow.refs().require_ref(cmd.dataset_id, &cmd.target_ref).await?;

    let params = json!({
        "temp_file_path": cmd.temp_file_path,
        "filename": cmd.filename,
        "target_ref": cmd.target_ref,
        "commit_message": cmd.commit_message,
    });
    uow.jobs()
        .create_job(
            RunType::Import,
            cmd.dataset_id,
            cmd.user_id,
            tip.commit_id.map(|h| h.to_hex()),
            params,
        )
        .await
}

#[derive(Debug, Clone)]
pub struct EnqueueSamplingCommand {
    pub dataset_id: i64,
    pub source_ref: String,
    pub table_key: String,
    pub rounds: Vec<RoundSpec>,
    pub export_residual: bool,
    pub output_branch_name: Option<String>,
    pub commit_message: String,
    pub user_id: i64,
}

pub async fn enqueue_sampling(uow: &UnitOfWork, cmd: EnqueueSamplingCommand) -> CoreResult<Uuid> {
    uow.permissions()
        .require(Resource::Dataset(cmd.dataset_id), cmd.user_id, PermissionLevel::Write)
        .await?;
    for round in &cmd.rounds {
        round.method.validate()?;
    }
    let tip = uow.refs().require_ref(cmd.dataset_id, &cmd.source_ref).await?;
    let source_commit_id = tip.commit_id.ok_or_else(|| {
        crate::error::CoreError::not_found("commit", "source ref has no commits yet")
    })?;

    let params = json!({
        "source_ref": cmd.source_ref,
        "table_key": cmd.table_key,
        "rounds": cmd.rounds,
        "export_residual": cmd.export_residual,
        "output_branch_name": cmd.output_branch_name,
        "commit_message": cmd.commit_message,
    });
    uow.jobs()
        .create_job(
            RunType::Sampling,
            cmd.dataset_id,
            cmd.user_id,
            Some(source_commit_id.to_hex()),
            params,
        )
        .await
}

#[derive(Debug, Clone)]
pub struct SqlSourceSpec {
    pub alias: String,
    pub dataset_id: i64,
    pub ref_name: String,
    pub table_key: String,
}

#[derive(Debug, Clone)]
pub struct SqlTargetSpec {
    pub dataset_id: i64,
    pub ref_name: String,
    pub message: String,
    pub expected_head_commit_id: Option<String>,
    pub output_branch_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EnqueueSqlTransformCommand {
    pub sources: Vec<SqlSourceSpec>,
    pub sql: String,
    pub target: SqlTargetSpec,
    pub user_id: i64,
}

/// Verifies read on every source dataset and write on the target (spec
/// §4.11 step 1) before a job row is even created, so a caller without
/// access fails fast instead of discovering it asynchronously via job
/// status.
pub async fn enqueue_sql_transform(uow: &UnitOfWork, cmd: EnqueueSqlTransformCommand) -> CoreResult<Uuid> {
    for source in &cmd.sources {
        uow.permissions()
            .require(Resource::Dataset(source.dataset_id), cmd.user_id, PermissionLevel::Read)
            .await?;
    }
    uow.permissions()
        .require(Resource::Dataset(cmd.target.dataset_id), cmd.user_id, PermissionLevel::Write)
        .await?;

    crate::sql_exec::validate_read_only(&cmd.sql)?;

    let sources_json: Vec<_> = cmd
        .sources
        .iter()
        .map(|s| {
            json!({
                "alias": s.alias,
                "dataset_id": s.dataset_id,
                "ref": s.ref_name,
                "table_key": s.table_key,
            })
        })
        .collect();
    let params = json!({
        "sources": sources_json,
        "sql": cmd.sql,
        "target": {
            "dataset_id": cmd.target.dataset_id,
            "ref": cmd.target.ref_name,
            "message": cmd.target.message,
            "expected_head_commit_id": cmd.target.expected_head_commit_id,
            "output_branch_name": cmd.target.output_branch_name,
        },
    });
    uow.jobs()
        .create_job(RunType::SqlTransform, cmd.target.dataset_id, cmd.user_id, None, params)
        .await
}

#[derive(Debug, Clone)]
pub struct EnqueueExplorationCommand {
    pub dataset_id: i64,
    pub source_ref: String,
    pub table_key: String,
    pub user_id: i64,
}

/// SPEC_FULL §B.2: an `exploration` job computes narrow per-column
/// statistics and records them on `output_summary` — it never produces a
/// new commit, so no target ref is required.
pub async fn enqueue_exploration(uow: &UnitOfWork, cmd: EnqueueExplorationCommand) -> CoreResult<Uuid> {
    uow.permissions()
        .require(Resource::Dataset(cmd.dataset_id), cmd.user_id, PermissionLevel::Read)
        .await?;
    let tip = uow.refs().require_ref(cmd.dataset_id, &cmd.source_ref).await?;
    let source_commit_id = tip
        .commit_id
        .ok_or_else(|| crate::error::CoreError::not_found("commit", "source ref has no commits yet"))?;
    let params = json!({"source_ref": cmd.source_ref, "table_key": cmd.table_key});
    uow.jobs()
        .create_job(
            RunType::Exploration,
            cmd.dataset_id,
            cmd.user_id,
            Some(source_commit_id.to_hex()),
            params,
        )
        .await
}

/// "Cancel job" (spec §6): a user may cancel a job they own or have write
/// access to the job's dataset for.
pub async fn cancel_job(uow: &UnitOfWork, user_id: i64, job_id: Uuid) -> CoreResult<()> {
    uow.permissions()
        .require(Resource::Job(job_id), user_id, PermissionLevel::Write)
        .await?;
    uow.jobs().cancel_job(job_id).await
}

pub async fn get_job_status(uow: &UnitOfWork, user_id: i64, job_id: Uuid) -> CoreResult<Job> {
    uow.permissions()
        .require(Resource::Job(job_id), user_id, PermissionLevel::Read)
        .await?;
    uow.jobs().require_job(job_id).await
}

#[derive(Debug, Clone, Default)]
pub struct ListJobsQuery {
    pub dataset_id: Option<i64>,
    pub run_type: Option<RunType>,
    pub status: Option<JobStatus>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub offset: u64,
    pub limit: u64,
}

/// SPEC_FULL §B.5. When `dataset_id` is given, the caller must have at
/// least `read` on it and sees every job on it. Without a `dataset_id` the
/// listing is scoped to the caller's own jobs — a cross-dataset global
/// listing would otherwise require a permission check per returned row.
pub async fn list_jobs(uow: &UnitOfWork, user_id: i64, query: ListJobsQuery) -> CoreResult<Vec<Job>> {
    if let Some(dataset_id) = query.dataset_id {
        uow.permissions()
            .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
            .await?;
    }
    let jobs = uow
        .jobs()
        .list_jobs(
            query.dataset_id,
            query.run_type,
            query.status,
            query.created_after,
            query.created_before,
            query.offset,
            query.limit,
        )
        .await?;
    Ok(if query.dataset_id.is_some() {
        jobs
    } else {
        jobs.into_iter().filter(|j| j.user_id == user_id).collect()
    })
}
