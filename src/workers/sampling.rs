//! H2 Sampling worker (spec §4.10): random / stratified / systematic /
//! cluster sampling with multi-round exclusion, producing a `sample` table
//! (and optionally a `residual` complement) as a new commit.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::commit_writer::{write_commit_and_advance, CommitWrite};
use crate::domain::job::{Job, RoundSpec, RowFilter, SamplingMethod};
use crate::error::{CoreError, CoreResult};
use crate::preparer::prepare_commit;
use crate::uow::UnitOfWork;
use crate::workers::{check_cancelled, WorkerOutcome};

#[derive(Debug, Deserialize)]
struct SamplingParams {
    source_ref: String,
    table_key: String,
    rounds: Vec<RoundSpec>,
    export_residual: bool,
    output_branch_name: Option<String>,
    commit_message: String,
}

pub async fn execute(uow: &UnitOfWork, job: &Job) -> CoreResult<WorkerOutcome> {
    let params: SamplingParams = serde_json::from_value(job.run_parameters.clone())?;
    if params.rounds.is_empty() {
        return Err(CoreError::validation("rounds", "at least one round is required"));
    }

    let source_tip = uow.refs().require_ref(job.dataset_id, &params.source_ref).await?;
    let source_commit_id = source_tip
        .commit_id
        .ok_or_else(|| CoreError::not_found("commit", "source ref has no commits yet"))?;

    let rows = uow
        .table_reader()
        .get_table_data(source_commit_id, &params.table_key, 0, usize::MAX)
        .await?;
    // strips the reader's synthetic `_logical_row_id` so a sampled row that
    // is byte-identical to its source hashes identically (spec §4.10 step 5).
    let rows: Vec<Value> = rows
        .into_iter()
        .map(|mut row| {
            if let Value::Object(map) = &mut row {
                map.remove("_logical_row_id");
            }
            row
        })
        .collect();

    let mut selected: Vec<bool> = vec![false; rows.len()];
    let mut round_details = Vec::with_capacity(params.rounds.len());

    for round in &params.rounds {
        if check_cancelled(uow, job.job_id).await? {
            return Ok(WorkerOutcome::Cancelled);
        }
        round.method.validate()?;
        let pool: Vec<usize> = (0..rows.len()).filter(|&i| !selected[i]).collect();
        let filtered = apply_filters(&pool, &rows, round.filters.as_ref());
        if filtered.is_empty() {
            return Err(CoreError::business_rule(
                "empty_sampling_round",
                "a sampling round selected zero eligible rows",
            ));
        }
        let chosen = apply_method(&round.method, &filtered, &rows)?;
        for &i in &chosen {
            selected[i] = true;
        }
        round_details.push(json!({
            "method": method_name(&round.method),
            "eligible_rows": filtered.len(),
            "selected_rows": chosen.len(),
        }));
    }

    let sample_rows: Vec<Value> = (0..rows.len()).filter(|&i| selected[i]).map(|i| rows[i].clone()).collect();
    let mut tables = BTreeMap::new();
    tables.insert("sample".to_string(), sample_rows);
    let residual_count = if params.export_residual {
        let residual_rows: Vec<Value> = (0..rows.len()).filter(|&i| !selected[i]).map(|i| rows[i].clone()).collect();
        let count = residual_rows.len();
        tables.insert("residual".to_string(), residual_rows);
        count
    } else {
        0
    };
    let total_samples = tables["sample"].len();

    let prepared = prepare_commit(&tables)?;
    uow.rows().add_rows_if_not_exist(&prepared.rows).await?;

    let target_ref = params.output_branch_name.clone().unwrap_or_else(|| params.source_ref.clone());
    if params.output_branch_name.is_some() && uow.refs().get_ref(job.dataset_id, &target_ref).await?.is_none() {
        uow.refs().create_ref(job.dataset_id, &target_ref, Some(source_commit_id)).await?;
    }

    let output_commit_id = write_commit_and_advance(
        uow,
        CommitWrite {
            dataset_id: job.dataset_id,
            ref_name: target_ref.clone(),
            expected_tip: Some(source_commit_id),
            message: params.commit_message.clone(),
            author_id: job.user_id,
            manifest: prepared.manifest,
            schema: prepared.schema,
        },
    )
    .await?;

    Ok(WorkerOutcome::Completed(json!({
        "output_commit_id": output_commit_id.to_hex(),
        "sampling_summary": {
            "round_details": round_details,
            "total_samples": total_samples,
            "residual_count": residual_count,
        },
    })))
}

fn method_name(method: &SamplingMethod) -> &'static str {
    match method {
        SamplingMethod::Random { .. } => "random",
        SamplingMethod::Stratified { .. } => "stratified",
        SamplingMethod::Systematic { .. } => "systematic",
        SamplingMethod::Cluster { .. } => "cluster",
    }
}

fn apply_filters(pool: &[usize], rows: &[Value], filters: Option<&RowFilter>) -> Vec<usize> {
    let Some(filters) = filters else { return pool.to_vec() };
    if filters.equals.is_empty() {
        return pool.to_vec();
    }
    pool.iter()
        .copied()
        .filter(|&i| {
            let Some(obj) = rows[i].as_object() else { return false };
            filters.equals.iter().all(|(col, expected)| obj.get(col) == Some(expected))
        })
        .collect()
}

fn build_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_os_rng(),
    }
}

/// Reservoir sampling (Algorithm R): picks `k` indices uniformly from
/// `pool` without replacement, in one pass, deterministic under a seeded
/// `rng` (spec §4.10 "random": "reservoir sampling for streams").
fn reservoir_sample(pool: &[usize], k: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
    if pool.len() <= k {
        return pool.to_vec();
    }
    let mut reservoir: Vec<usize> = pool[..k].to_vec();
    for (i, &item) in pool.iter().enumerate().skip(k) {
        let j = rng.random_range(0..=i);
        if j < k {
            reservoir[j] = item;
        }
    }
    reservoir
}

fn apply_method(method: &SamplingMethod, filtered: &[usize], rows: &[Value]) -> CoreResult<Vec<usize>> {
    match method {
        SamplingMethod::Random { sample_size, random_seed } => {
            let mut rng = build_rng(*random_seed);
            Ok(reservoir_sample(filtered, *sample_size, &mut rng))
        }
        SamplingMethod::Stratified { strata_columns, sample_size, samples_per_stratum, random_seed } => {
            sample_stratified(filtered, rows, strata_columns, *sample_size, *samples_per_stratum, *random_seed)
        }
        SamplingMethod::Systematic { interval, start } => {
            let start = start.unwrap_or(0) as usize;
            let interval = *interval as usize;
            Ok(filtered
                .iter()
                .enumerate()
                .filter(|(pos, _)| *pos >= start && (*pos - start) % interval == 0)
                .map(|(_, &i)| i)
                .collect())
        }
        SamplingMethod::Cluster { cluster_column, num_clusters, random_seed } => {
            sample_cluster(filtered, rows, cluster_column, *num_clusters, *random_seed)
        }
    }
}

fn strata_key(row: &Value, columns: &[String]) -> String {
    let tuple: Vec<Value> = columns.iter().map(|c| row.get(c).cloned().unwrap_or(Value::Null)).collect();
    serde_json::to_string(&tuple).unwrap_or_default()
}

fn sample_stratified(
    filtered: &[usize],
    rows: &[Value],
    strata_columns: &[String],
    sample_size: Option<usize>,
    samples_per_stratum: Option<usize>,
    random_seed: Option<u64>,
) -> CoreResult<Vec<usize>> {
    let mut strata: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for &i in filtered {
        strata.entry(strata_key(&rows[i], strata_columns)).or_default().push(i);
    }

    let mut rng = build_rng(random_seed);
    let mut selected = Vec::new();
    if let Some(per_stratum) = samples_per_stratum {
        for members in strata.values() {
            selected.extend(reservoir_sample(members, per_stratum, &mut rng));
        }
    } else {
        let total_size = sample_size.unwrap_or(0);
        let total_filtered = filtered.len().max(1);
        for members in strata.values() {
            let proportional = (total_size * members.len()) / total_filtered;
            selected.extend(reservoir_sample(members, proportional.min(members.len()), &mut rng));
        }
    }
    Ok(selected)
}

fn sample_cluster(
    filtered: &[usize],
    rows: &[Value],
    cluster_column: &str,
    num_clusters: usize,
    random_seed: Option<u64>,
) -> CoreResult<Vec<usize>> {
    let mut clusters: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for &i in filtered {
        let key = rows[i].get(cluster_column).cloned().unwrap_or(Value::Null).to_string();
        clusters.entry(key).or_default().push(i);
    }
    let keys: Vec<&String> = clusters.keys().collect();
    let mut rng = build_rng(random_seed);
    let chosen_count = num_clusters.min(keys.len());
    let chosen: Vec<&&String> = keys.choose_multiple(&mut rng, chosen_count).collect();
    Ok(chosen.into_iter().flat_map(|k| clusters[*k].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reservoir_sample_takes_all_when_pool_smaller_than_k() {
        let pool = vec![0, 1, 2];
        let mut rng = build_rng(Some(1));
        let sampled = reservoir_sample(&pool, 5, &mut rng);
        assert_eq!(sampled.len(), 3);
    }

    #[test]
    fn reservoir_sample_is_deterministic_with_seed() {
        let pool: Vec<usize> = (0..100).collect();
        let mut rng_a = build_rng(Some(42));
        let mut rng_b = build_rng(Some(42));
        let a = reservoir_sample(&pool, 10, &mut rng_a);
        let b = reservoir_sample(&pool, 10, &mut rng_b);
        assert_eq!(a, b);
    }

    #[test]
    fn systematic_selects_every_nth_row() {
        let filtered: Vec<usize> = (0..10).collect();
        let rows: Vec<Value> = filtered.iter().map(|_| json!({})).collect();
        let method = SamplingMethod::Systematic { interval: 3, start: Some(1) };
        let chosen = apply_method(&method, &filtered, &rows).unwrap();
        assert_eq!(chosen, vec![1, 4, 7]);
    }

    #[test]
    fn filters_equality_narrows_pool() {
        let rows = vec![json!({"grp": "a"}), json!({"grp": "b"}), json!({"grp": "a"})];
        let pool = vec![0, 1, 2];
        let mut equals = BTreeMap::new();
        equals.insert("grp".to_string(), json!("a"));
        let filters = RowFilter { equals };
        let result = apply_filters(&pool, &rows, Some(&filters));
        assert_eq!(result, vec![0, 2]);
    }

    #[test]
    fn stratified_fixed_per_stratum_caps_to_stratum_size() {
        let rows = vec![json!({"grp": "a"}), json!({"grp": "a"}), json!({"grp": "b"})];
        let filtered = vec![0, 1, 2];
        let chosen =
            sample_stratified(&filtered, &rows, &["grp".to_string()], None, Some(5), Some(7)).unwrap();
        assert_eq!(chosen.len(), 3);
    }
}
