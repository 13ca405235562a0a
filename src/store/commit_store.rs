//! L2 Commit/manifest store.

use chrono::Utc;
use sea_orm::{ActiveValue, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder};

use crate::domain::commit::{compute_commit_id, validate_commit_message, Commit, ManifestEntry};
use crate::entities::{commit_manifests, commit_schemas, commits};
use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHash;

pub struct CommitStore<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> CommitStore<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    /// Writes the commit row and its manifest entries in one transaction
    /// (spec §4.2). The id is computed before insert, so calling this twice
    /// with identical inputs (e.g. a retried worker) is a harmless no-op the
    /// second time once a unique-key check is added by the caller; this
    /// crate's callers always check `expected` via the ref CAS first, which
    /// is the actual idempotency boundary.
    pub async fn create_commit_and_manifest(
        &self,
        dataset_id: i64,
        parent: Option<ContentHash>,
        message: &str,
        author_id: i64,
        manifest: Vec<ManifestEntry>,
    ) -> CoreResult<ContentHash> {
        validate_commit_message(message)?;
        let created_at = Utc::now();
        let commit_id = compute_commit_id(dataset_id, parent, message, author_id, created_at, &manifest);

        let commit_model = commits::ActiveModel {
            commit_id: ActiveValue::Set(commit_id.to_hex()),
            dataset_id: ActiveValue::Set(dataset_id),
            parent_commit_id: ActiveValue::Set(parent.map(|h| h.to_hex())),
            message: ActiveValue::Set(message.to_string()),
            author_id: ActiveValue::Set(author_id),
            created_at: ActiveValue::Set(created_at),
        };
        commits::Entity::insert(commit_model).exec(self.txn).await?;

        if !manifest.is_empty() {
            let entries: Vec<commit_manifests::ActiveModel> = manifest
                .into_iter()
                .map(|entry| commit_manifests::ActiveModel {
                    id: ActiveValue::NotSet,
                    commit_id: ActiveValue::Set(commit_id.to_hex()),
                    table_key: ActiveValue::Set(entry.table_key),
                    logical_row_id: ActiveValue::Set(entry.logical_row_id),
                    row_hash: ActiveValue::Set(entry.row_hash.to_hex()),
                })
                .collect();
            commit_manifests::Entity::insert_many(entries)
                .exec(self.txn)
                .await?;
        }

        Ok(commit_id)
    }

    pub async fn get_commit_by_id(&self, commit_id: ContentHash) -> CoreResult<Option<Commit>> {
        let found = commits::Entity::find_by_id(commit_id.to_hex())
            .one(self.txn)
            .await?;
        found.map(model_to_commit).transpose()
    }

    pub async fn require_commit(&self, commit_id: ContentHash) -> CoreResult<Commit> {
        self.get_commit_by_id(commit_id)
            .await?
            .ok_or_else(|| CoreError::not_found("commit", commit_id.to_hex()))
    }

    /// Follows `parent_commit_id` from `tip`, newest first, applying
    /// `offset`/`limit` (spec §4.2). Side-effect free and idempotent.
    pub async fn get_commit_history(
        &self,
        tip: ContentHash,
        offset: usize,
        limit: usize,
    ) -> CoreResult<Vec<Commit>> {
        let mut chain = Vec::new();
        let mut cursor = Some(tip);
        while let Some(id) = cursor {
            let model = commits::Entity::find_by_id(id.to_hex())
                .one(self.txn)
                .await?
                .ok_or_else(|| CoreError::not_found("commit", id.to_hex()))?;
            cursor = model
                .parent_commit_id
                .as_deref()
                .map(|s| s.parse())
                .transpose()
                .map_err(|_| CoreError::Internal("corrupt parent_commit_id".into()))?;
            chain.push(model_to_commit(model)?);
            if chain.len() >= offset + limit {
                break;
            }
        }
        Ok(chain.into_iter().skip(offset).take(limit).collect())
    }

    /// Total length of the parent chain reachable from `tip` (used for
    /// pagination totals).
    pub async fn count_commits_for_dataset(&self, tip: ContentHash) -> CoreResult<usize> {
        let mut count = 0usize;
        let mut cursor = Some(tip);
        while let Some(id) = cursor {
            let model = commits::Entity::find_by_id(id.to_hex())
                .one(self.txn)
                .await?
                .ok_or_else(|| CoreError::not_found("commit", id.to_hex()))?;
            cursor = model
                .parent_commit_id
                .as_deref()
                .map(|s| s.parse())
                .transpose()
                .map_err(|_| CoreError::Internal("corrupt parent_commit_id".into()))?;
            count += 1;
        }
        Ok(count)
    }

    pub async fn count_commit_rows(
        &self,
        commit_id: ContentHash,
        table_key: Option<&str>,
    ) -> CoreResult<u64> {
        let mut query = commit_manifests::Entity::find()
            .filter(commit_manifests::Column::CommitId.eq(commit_id.to_hex()));
        if let Some(key) = table_key {
            query = query.filter(commit_manifests::Column::TableKey.eq(key));
        }
        Ok(query.count(self.txn).await?)
    }

    pub async fn create_commit_schema(
        &self,
        commit_id: ContentHash,
        schema: &crate::domain::schema::CommitSchema,
    ) -> CoreResult<()> {
        let model = commit_schemas::ActiveModel {
            commit_id: ActiveValue::Set(commit_id.to_hex()),
            schema: ActiveValue::Set(serde_json::to_value(schema)?),
        };
        commit_schemas::Entity::insert(model).exec(self.txn).await?;
        Ok(())
    }

    pub async fn get_commit_schema(
        &self,
        commit_id: ContentHash,
    ) -> CoreResult<Option<crate::domain::schema::CommitSchema>> {
        let found = commit_schemas::Entity::find_by_id(commit_id.to_hex())
            .one(self.txn)
            .await?;
        found
            .map(|m| serde_json::from_value(m.schema).map_err(CoreError::from))
            .transpose()
    }

    /// Raw manifest entries for `(commit_id, table_key)`, ordered by logical
    /// row id within the table (spec §4.4's reader consumes this).
    pub async fn get_manifest_entries(
        &self,
        commit_id: ContentHash,
        table_key: &str,
    ) -> CoreResult<Vec<ManifestEntry>> {
        let rows = commit_manifests::Entity::find()
            .filter(commit_manifests::Column::CommitId.eq(commit_id.to_hex()))
            .filter(commit_manifests::Column::TableKey.eq(table_key))
            .order_by_asc(commit_manifests::Column::LogicalRowId)
            .all(self.txn)
            .await?;
        rows.into_iter()
            .map(|m| {
                Ok(ManifestEntry {
                    table_key: m.table_key,
                    logical_row_id: m.logical_row_id,
                    row_hash: m
                        .row_hash
                        .parse()
                        .map_err(|_| CoreError::Internal("corrupt row_hash in manifest".into()))?,
                })
            })
            .collect()
    }

    pub async fn list_table_keys(&self, commit_id: ContentHash) -> CoreResult<Vec<String>> {
        use sea_orm::QuerySelect;
        let keys: Vec<String> = commit_manifests::Entity::find()
            .filter(commit_manifests::Column::CommitId.eq(commit_id.to_hex()))
            .select_only()
            .column(commit_manifests::Column::TableKey)
            .distinct()
            .into_tuple()
            .all(self.txn)
            .await?;
        Ok(keys)
    }
}

fn model_to_commit(model: commits::Model) -> CoreResult<Commit> {
    Ok(Commit {
        commit_id: model
            .commit_id
            .parse()
            .map_err(|_| CoreError::Internal("corrupt commit_id".into()))?,
        dataset_id: model.dataset_id,
        parent_commit_id: model
            .parent_commit_id
            .as_deref()
            .map(|s| s.parse())
            .transpose()
            .map_err(|_| CoreError::Internal("corrupt parent_commit_id".into()))?,
        message: model.message,
        author_id: model.author_id,
        created_at: model.created_at,
    })
}
