//! H1 Import worker (spec §4.9).

use serde::Deserialize;
use serde_json::json;

use crate::commit_writer::{write_commit_and_advance, CommitWrite};
use crate::config::Config;
use crate::domain::job::Job;
use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHash;
use crate::parser::ParserFactory;
use crate::preparer::{prepare_commit, validate_non_empty};
use crate::uow::UnitOfWork;
use crate::workers::{check_cancelled, WorkerOutcome};

#[derive(Debug, Deserialize)]
struct ImportParams {
    temp_file_path: String,
    filename: String,
    target_ref: String,
    commit_message: String,
}

/// Spec §4.9 steps 2-7. Step 1 (assert `pending`, mark `running`) already
/// happened in [`crate::workers::try_acquire`]; this starts from "read
/// current ref tip".
pub async fn execute(uow: &UnitOfWork, _config: &Config, job: &Job) -> CoreResult<WorkerOutcome> {
    let params: ImportParams = serde_json::from_value(job.run_parameters.clone())?;
    let temp_path = params.temp_file_path.clone();
    let result = run(uow, job, &params).await;
    let _ = tokio::fs::remove_file(&temp_path).await;
    result
}

async fn run(uow: &UnitOfWork, job: &Job, params: &ImportParams) -> CoreResult<WorkerOutcome> {
    let tip = uow.refs().require_ref(job.dataset_id, &params.target_ref).await?;
    let expected: Option<ContentHash> = job
        .source_commit_id
        .as_deref()
        .map(|s| s.parse())
        .transpose()
        .map_err(|_| CoreError::Internal("corrupt source_commit_id on job".into()))?;
    if tip.commit_id != expected {
        return Err(CoreError::conflict(format!(
            "ref '{}' moved since the job was queued",
            params.target_ref
        )));
    }

    let parser = ParserFactory::with_default_parsers();
    let parser = parser.parser_for(&params.filename)?;
    let path = std::path::Path::new(&params.temp_file_path);
    let tables = parser.parse(path, &params.filename).await?;
    validate_non_empty(&tables)?;

    if check_cancelled(uow, job.job_id).await? {
        return Ok(WorkerOutcome::Cancelled);
    }

    let prepared = prepare_commit(&tables)?;
    uow.rows().add_rows_if_not_exist(&prepared.rows).await?;
    let rows_processed = prepared.manifest.len();
    let table_keys: Vec<String> = tables.keys().cloned().collect();

    let new_commit_id = write_commit_and_advance(
        uow,
        CommitWrite {
            dataset_id: job.dataset_id,
            ref_name: params.target_ref.clone(),
            expected_tip: tip.commit_id,
            message: params.commit_message.clone(),
            author_id: job.user_id,
            manifest: prepared.manifest,
            schema: prepared.schema,
        },
    )
    .await?;

    Ok(WorkerOutcome::Completed(json!({
        "new_commit_id": new_commit_id.to_hex(),
        "updated_ref": params.target_ref,
        "rows_processed": rows_processed,
        "tables": table_keys,
    })))
}
