//! Ref, commit, and table-read commands/queries (spec §4.2-§4.4, §6).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::commit_writer::{write_commit_and_advance, CommitWrite};
use crate::domain::commit::Commit;
use crate::domain::permission::PermissionLevel;
use crate::domain::schema::TableSchema;
use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHash;
use crate::permission::Resource;
use crate::preparer::{prepare_commit, validate_non_empty};
use crate::store::ref_store::RefHandle;
use crate::uow::UnitOfWork;

// ---- refs ----------------------------------------------------------------

pub async fn create_ref(
    uow: &UnitOfWork,
    user_id: i64,
    dataset_id: i64,
    ref_name: &str,
    commit_id: ContentHash,
) -> CoreResult<()> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Write)
        .await?;
    uow.commits().require_commit(commit_id).await?;
    uow.refs().create_ref(dataset_id, ref_name, Some(commit_id)).await
}

pub async fn delete_ref(uow: &UnitOfWork, user_id: i64, dataset_id: i64, ref_name: &str) -> CoreResult<bool> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Write)
        .await?;
    let dataset = crate::store::dataset_repo::DatasetRepo::new(uow.txn())
        .require_dataset(dataset_id)
        .await?;
    uow.refs()
        .delete_ref(dataset_id, ref_name, &dataset.default_branch)
        .await
}

pub async fn list_refs(
    uow: &UnitOfWork,
    user_id: i64,
    dataset_id: i64,
) -> CoreResult<Vec<crate::entities::refs::Model>> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
        .await?;
    uow.refs().list_refs(dataset_id).await
}

async fn resolve_ref_tip(uow: &UnitOfWork, dataset_id: i64, ref_name: &str) -> CoreResult<RefHandle> {
    uow.refs().require_ref(dataset_id, ref_name).await
}

// ---- commits ---------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CreateCommitCommand {
    pub dataset_id: i64,
    pub ref_name: String,
    pub message: String,
    pub author_id: i64,
    /// `table_key -> rows`; a single-table direct commit supplies just
    /// `{"primary": [...]}` (spec §6 "data[]").
    pub tables: BTreeMap<String, Vec<Value>>,
}

/// "Create commit (direct)" (spec §6): the synchronous path — prepare, then
/// CAS-advance. Used for small, programmatic commits that don't warrant
/// queuing an import job.
pub async fn create_commit_direct(uow: &UnitOfWork, cmd: CreateCommitCommand) -> CoreResult<ContentHash> {
    uow.permissions()
        .require(Resource::Dataset(cmd.dataset_id), cmd.author_id, PermissionLevel::Write)
        .await?;
    validate_non_empty(&cmd.tables)?;

    let tip = resolve_ref_tip(uow, cmd.dataset_id, &cmd.ref_name).await?;
    let prepared = prepare_commit(&cmd.tables)?;
    uow.rows().add_rows_if_not_exist(&prepared.rows).await?;

    write_commit_and_advance(
        uow,
        CommitWrite {
            dataset_id: cmd.dataset_id,
            ref_name: cmd.ref_name,
            expected_tip: tip.commit_id,
            message: cmd.message,
            author_id: cmd.author_id,
            manifest: prepared.manifest,
            schema: prepared.schema,
        },
    )
    .await
}

pub async fn get_commit(uow: &UnitOfWork, user_id: i64, dataset_id: i64, commit_id: ContentHash) -> CoreResult<Commit> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
        .await?;
    uow.commits().require_commit(commit_id).await
}

pub struct CommitHistoryPage {
    pub commits: Vec<Commit>,
    pub total: usize,
}

pub async fn get_commit_history(
    uow: &UnitOfWork,
    user_id: i64,
    dataset_id: i64,
    ref_name: &str,
    offset: usize,
    limit: usize,
) -> CoreResult<CommitHistoryPage> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
        .await?;
    let tip = resolve_ref_tip(uow, dataset_id, ref_name).await?;
    let Some(tip_id) = tip.commit_id else {
        return Ok(CommitHistoryPage { commits: Vec::new(), total: 0 });
    };
    let commits = uow.commits().get_commit_history(tip_id, offset, limit).await?;
    let total = uow.commits().count_commits_for_dataset(tip_id).await?;
    Ok(CommitHistoryPage { commits, total })
}

pub async fn get_commit_schema(
    uow: &UnitOfWork,
    user_id: i64,
    dataset_id: i64,
    commit_id: ContentHash,
) -> CoreResult<Option<crate::domain::schema::CommitSchema>> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
        .await?;
    uow.commits().require_commit(commit_id).await?;
    uow.commits().get_commit_schema(commit_id).await
}

// ---- table reads -----------------------------------------------------------

pub async fn list_tables_at_ref(
    uow: &UnitOfWork,
    user_id: i64,
    dataset_id: i64,
    ref_name: &str,
) -> CoreResult<Vec<String>> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
        .await?;
    let tip = resolve_ref_tip(uow, dataset_id, ref_name)
        .await?
        .commit_id
        .ok_or_else(|| CoreError::not_found("commit", "ref has no commits yet"))?;
    uow.table_reader().list_table_keys(tip).await
}

pub async fn get_table_data_at_ref(
    uow: &UnitOfWork,
    user_id: i64,
    dataset_id: i64,
    ref_name: &str,
    table_key: &str,
    offset: usize,
    limit: usize,
) -> CoreResult<Vec<Value>> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
        .await?;
    let tip = resolve_ref_tip(uow, dataset_id, ref_name)
        .await?
        .commit_id
        .ok_or_else(|| CoreError::not_found("commit", "ref has no commits yet"))?;
    uow.table_reader().get_table_data(tip, table_key, offset, limit).await
}

pub async fn get_table_schema_at_ref(
    uow: &UnitOfWork,
    user_id: i64,
    dataset_id: i64,
    ref_name: &str,
    table_key: &str,
) -> CoreResult<Option<TableSchema>> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
        .await?;
    let tip = resolve_ref_tip(uow, dataset_id, ref_name)
        .await?
        .commit_id
        .ok_or_else(|| CoreError::not_found("commit", "ref has no commits yet"))?;
    uow.table_reader().get_table_schema(tip, table_key).await
}

/// SPEC_FULL §B.6 `checkout`: resolves an arbitrary commit (not just a ref
/// tip) and returns its table listing/schema.
pub struct CommitView {
    pub commit: Commit,
    pub tables: Vec<(String, Option<TableSchema>)>,
}

pub async fn checkout(uow: &UnitOfWork, user_id: i64, dataset_id: i64, commit_id: ContentHash) -> CoreResult<CommitView> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
        .await?;
    let commit = uow.commits().require_commit(commit_id).await?;
    if commit.dataset_id != dataset_id {
        return Err(CoreError::not_found("commit", commit_id.to_hex()));
    }
    let keys = uow.table_reader().list_table_keys(commit_id).await?;
    let mut tables = Vec::with_capacity(keys.len());
    for key in keys {
        let schema = uow.table_reader().get_table_schema(commit_id, &key).await?;
        tables.push((key, schema));
    }
    Ok(CommitView { commit, tables })
}

// ---- SQL preview (SPEC_FULL §B.3) ------------------------------------------

#[derive(Debug, Clone)]
pub struct PreviewSqlSource {
    pub alias: String,
    pub dataset_id: i64,
    pub ref_name: String,
    pub table_key: String,
}

#[derive(Debug, Clone)]
pub struct PreviewSqlCommand {
    pub sources: Vec<PreviewSqlSource>,
    pub sql: String,
    pub user_id: i64,
}

/// `preview_sql` (SPEC_FULL §B.3): runs a read-only query synchronously
/// against materialized source tables, capped at `SQL_PREVIEW_ROW_LIMIT`
/// regardless of the query's own `LIMIT`. Shares the safety envelope and
/// executor with the `sql_transform` worker but produces no commit.
pub async fn preview_sql(uow: &UnitOfWork, cmd: PreviewSqlCommand) -> CoreResult<Vec<Value>> {
    for source in &cmd.sources {
        uow.permissions()
            .require(Resource::Dataset(source.dataset_id), cmd.user_id, PermissionLevel::Read)
            .await?;
    }
    let statement = crate::sql_exec::validate_read_only(&cmd.sql)?;

    let mut relations = Vec::with_capacity(cmd.sources.len());
    for source in &cmd.sources {
        let tip = resolve_ref_tip(uow, source.dataset_id, &source.ref_name)
            .await?
            .commit_id
            .ok_or_else(|| CoreError::not_found("commit", "source ref has no commits yet"))?;
        let rows = uow
            .table_reader()
            .get_table_data(tip, &source.table_key, 0, usize::MAX)
            .await?;
        relations.push(crate::sql_exec::Relation { name: source.alias.clone(), rows });
    }

    crate::sql_exec::execute_select(&statement, &relations, crate::sql_exec::SQL_PREVIEW_ROW_LIMIT)
}
