//! Exploration worker (SPEC_FULL §B.2): per-column profiling statistics
//! over a table at a ref. Produces no commit — results live entirely in
//! the job's `output_summary`.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::job::Job;
use crate::domain::schema::ColumnType;
use crate::error::{CoreError, CoreResult};
use crate::uow::UnitOfWork;
use crate::workers::{check_cancelled, WorkerOutcome};

const TOP_K: usize = 10;

#[derive(Debug, Deserialize)]
struct ExplorationParams {
    source_ref: String,
    table_key: String,
}

pub async fn execute(uow: &UnitOfWork, job: &Job) -> CoreResult<WorkerOutcome> {
    let params: ExplorationParams = serde_json::from_value(job.run_parameters.clone())?;

    let tip = uow.refs().require_ref(job.dataset_id, &params.source_ref).await?;
    let commit_id = tip
        .commit_id
        .ok_or_else(|| CoreError::not_found("commit", "source ref has no commits yet"))?;

    let schema = uow
        .table_reader()
        .get_table_schema(commit_id, &params.table_key)
        .await?
        .ok_or_else(|| CoreError::not_found("table", params.table_key.clone()))?;
    let rows = uow
        .table_reader()
        .get_table_data(commit_id, &params.table_key, 0, usize::MAX)
        .await?;

    let mut columns = Vec::with_capacity(schema.columns.len());
    for column in &schema.columns {
        if check_cancelled(uow, job.job_id).await? {
            return Ok(WorkerOutcome::Cancelled);
        }
        columns.push(profile_column(column.name.as_str(), column.column_type, &rows));
    }

    Ok(WorkerOutcome::Completed(json!({
        "table_key": params.table_key,
        "row_count": rows.len(),
        "columns": columns,
    })))
}

fn profile_column(name: &str, column_type: ColumnType, rows: &[Value]) -> Value {
    let mut null_count = 0usize;
    let mut distinct: BTreeMap<String, (Value, usize)> = BTreeMap::new();
    let mut min_value: Option<Value> = None;
    let mut max_value: Option<Value> = None;

    for row in rows {
        let value = row.get(name).cloned().unwrap_or(Value::Null);
        if value.is_null() {
            null_count += 1;
            continue;
        }
        let key = value.to_string();
        let entry = distinct.entry(key).or_insert_with(|| (value.clone(), 0));
        entry.1 += 1;

        if matches!(column_type, ColumnType::Integer | ColumnType::Number | ColumnType::Datetime) {
            update_extreme(&mut min_value, &value, true);
            update_extreme(&mut max_value, &value, false);
        }
    }

    let distinct_count = distinct.len();
    let mut top_values: Vec<(Value, usize)> = distinct.into_values().collect();
    top_values.sort_by(|a, b| b.1.cmp(&a.1));
    top_values.truncate(TOP_K);

    json!({
        "name": name,
        "type": column_type,
        "null_count": null_count,
        "distinct_count": distinct_count,
        "min": min_value,
        "max": max_value,
        "top_values": top_values.into_iter().map(|(v, c)| json!({"value": v, "count": c})).collect::<Vec<_>>(),
    })
}

fn update_extreme(slot: &mut Option<Value>, candidate: &Value, want_min: bool) {
    let better = match slot {
        None => true,
        Some(current) => {
            let ord = compare_for_extreme(current, candidate);
            if want_min { ord.is_gt() } else { ord.is_lt() }
        }
    };
    if better {
        *slot = Some(candidate.clone());
    }
}

fn compare_for_extreme(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.as_str().unwrap_or_default().cmp(b.as_str().unwrap_or_default()),
    }
}
