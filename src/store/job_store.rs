//! M1 Job store: enqueue, atomic acquire, status/result update (spec §4.7).

use chrono::Utc;
use sea_orm::{
    ActiveValue, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbBackend, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Statement,
};
use uuid::Uuid;

use crate::domain::job::{Job, JobStatus, RunType};
use crate::entities::jobs;
use crate::error::{CoreError, CoreResult};

pub struct JobStore<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> JobStore<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub async fn create_job(
        &self,
        run_type: RunType,
        dataset_id: i64,
        user_id: i64,
        source_commit_id: Option<String>,
        run_parameters: serde_json::Value,
    ) -> CoreResult<Uuid> {
        let job_id = Uuid::new_v4();
        let model = jobs::ActiveModel {
            job_id: ActiveValue::Set(job_id),
            run_type: ActiveValue::Set(run_type.as_str().to_string()),
            status: ActiveValue::Set(JobStatus::Pending.as_str().to_string()),
            dataset_id: ActiveValue::Set(dataset_id),
            user_id: ActiveValue::Set(user_id),
            source_commit_id: ActiveValue::Set(source_commit_id),
            run_parameters: ActiveValue::Set(run_parameters),
            output_summary: ActiveValue::Set(None),
            error_message: ActiveValue::Set(None),
            created_at: ActiveValue::Set(Utc::now()),
            completed_at: ActiveValue::Set(None),
            cancel_requested: ActiveValue::Set(false),
        };
        jobs::Entity::insert(model).exec(self.txn).await?;
        Ok(job_id)
    }

    /// Atomically transitions one `pending` row to `running` using
    /// `FOR UPDATE SKIP LOCKED` (spec §4.7), guaranteeing two workers never
    /// claim the same row (I6, P5). `run_type` restricts acquisition to a
    /// single worker kind; `None` claims the oldest pending job of any kind.
    pub async fn acquire_next_pending_job(&self, run_type: Option<RunType>) -> CoreResult<Option<Job>> {
        let backend = self.txn.get_database_backend();
        let (select_sql, update_sql) = match backend {
            DbBackend::Postgres => (
                "SELECT job_id FROM jobs WHERE status = 'pending' \
                 AND ($1::text IS NULL OR run_type = $1) \
                 ORDER BY created_at FOR UPDATE SKIP LOCKED LIMIT 1",
                "UPDATE jobs SET status = 'running' WHERE job_id = $1",
            ),
            _ => (
                "SELECT job_id FROM jobs WHERE status = 'pending' \
                 AND (?1 IS NULL OR run_type = ?1) \
                 ORDER BY created_at LIMIT 1",
                "UPDATE jobs SET status = 'running' WHERE job_id = ?1",
            ),
        };

        let run_type_param: Option<String> = run_type.map(|r| r.as_str().to_string());
        let row = self
            .txn
            .query_one(Statement::from_sql_and_values(
                backend,
                select_sql,
                [run_type_param.clone().into()],
            ))
            .await?;
        let Some(row) = row else { return Ok(None) };
        let job_id: Uuid = row.try_get("", "job_id")?;

        self.txn
            .execute(Statement::from_sql_and_values(
                backend,
                update_sql,
                [job_id.into()],
            ))
            .await?;

        self.get_job(job_id).await?.ok_or_else(|| {
            CoreError::Internal("job vanished between acquire and re-read".into())
        }).map(Some)
    }

    pub async fn get_job(&self, job_id: Uuid) -> CoreResult<Option<Job>> {
        let found = jobs::Entity::find_by_id(job_id).one(self.txn).await?;
        found.map(model_to_job).transpose()
    }

    pub async fn require_job(&self, job_id: Uuid) -> CoreResult<Job> {
        self.get_job(job_id)
            .await?
            .ok_or_else(|| CoreError::not_found("job", job_id.to_string()))
    }

    /// Advances `status`, validating the transition against the state
    /// machine (spec §4.7) before writing.
    pub async fn update_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        output_summary: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> CoreResult<()> {
        let current = self.require_job(job_id).await?;
        current.status.validate_transition(status)?;

        let mut model: jobs::ActiveModel = jobs::ActiveModel {
            job_id: ActiveValue::Unchanged(job_id),
            ..Default::default()
        };
        model.status = ActiveValue::Set(status.as_str().to_string());
        if let Some(summary) = output_summary {
            model.output_summary = ActiveValue::Set(Some(summary));
        }
        if let Some(err) = error_message {
            model.error_message = ActiveValue::Set(Some(err));
        }
        if status.is_terminal() {
            model.completed_at = ActiveValue::Set(Some(Utc::now()));
        }
        jobs::Entity::update(model).exec(self.txn).await?;
        Ok(())
    }

    /// `cancel_job` (spec §4.7): legal from `pending` or `running`. From
    /// `pending` the cancellation is immediate; from `running` it only sets
    /// the cooperative flag the worker checks at batch boundaries.
    pub async fn cancel_job(&self, job_id: Uuid) -> CoreResult<()> {
        let current = self.require_job(job_id).await?;
        match current.status {
            JobStatus::Pending => {
                self.update_job_status(job_id, JobStatus::Cancelled, None, None).await
            }
            JobStatus::Running => {
                let mut model: jobs::ActiveModel = jobs::ActiveModel {
                    job_id: ActiveValue::Unchanged(job_id),
                    ..Default::default()
                };
                model.cancel_requested = ActiveValue::Set(true);
                jobs::Entity::update(model).exec(self.txn).await?;
                Ok(())
            }
            other => Err(CoreError::business_rule(
                "job_status_transition",
                format!("cannot cancel a job in state {other:?}"),
            )),
        }
    }

    /// Cooperative check: has a running job been asked to stop? Workers call
    /// this at stream batch boundaries (spec §5).
    pub async fn is_cancel_requested(&self, job_id: Uuid) -> CoreResult<bool> {
        let model = jobs::Entity::find_by_id(job_id)
            .one(self.txn)
            .await?
            .ok_or_else(|| CoreError::not_found("job", job_id.to_string()))?;
        Ok(model.cancel_requested || model.status == "cancelled")
    }

    /// `list_jobs` with the filter set the original source's job repository
    /// supports (SPEC_FULL §B.5): dataset/run_type/status/date range plus
    /// pagination.
    #[allow(clippy::too_many_arguments)]
    pub async fn list_jobs(
        &self,
        dataset_id: Option<i64>,
        run_type: Option<RunType>,
        status: Option<JobStatus>,
        created_after: Option<chrono::DateTime<Utc>>,
        created_before: Option<chrono::DateTime<Utc>>,
        offset: u64,
        limit: u64,
    ) -> CoreResult<Vec<Job>> {
        let mut query = jobs::Entity::find();
        if let Some(id) = dataset_id {
            query = query.filter(jobs::Column::DatasetId.eq(id));
        }
        if let Some(rt) = run_type {
            query = query.filter(jobs::Column::RunType.eq(rt.as_str()));
        }
        if let Some(st) = status {
            query = query.filter(jobs::Column::Status.eq(st.as_str()));
        }
        if let Some(after) = created_after {
            query = query.filter(jobs::Column::CreatedAt.gte(after));
        }
        if let Some(before) = created_before {
            query = query.filter(jobs::Column::CreatedAt.lte(before));
        }
        let models = query
            .order_by_desc(jobs::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.txn)
            .await?;
        models.into_iter().map(model_to_job).collect()
    }
}

fn model_to_job(model: jobs::Model) -> CoreResult<Job> {
    Ok(Job {
        job_id: model.job_id,
        run_type: parse_run_type(&model.run_type)?,
        status: parse_status(&model.status)?,
        dataset_id: model.dataset_id,
        user_id: model.user_id,
        source_commit_id: model.source_commit_id,
        run_parameters: model.run_parameters,
        output_summary: model.output_summary,
        error_message: model.error_message,
        created_at: model.created_at,
        completed_at: model.completed_at,
    })
}

fn parse_run_type(s: &str) -> CoreResult<RunType> {
    match s {
        "import" => Ok(RunType::Import),
        "sampling" => Ok(RunType::Sampling),
        "sql_transform" => Ok(RunType::SqlTransform),
        "exploration" => Ok(RunType::Exploration),
        other => Err(CoreError::Internal(format!("corrupt run_type '{other}'"))),
    }
}

fn parse_status(s: &str) -> CoreResult<JobStatus> {
    match s {
        "pending" => Ok(JobStatus::Pending),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        "cancelled" => Ok(JobStatus::Cancelled),
        other => Err(CoreError::Internal(format!("corrupt job status '{other}'"))),
    }
}
