//! L3 Ref store — the concurrency core (spec §4.3).
//!
//! `update_ref_atomically` is issued as a hand-written SQL statement through
//! `sea_orm::Statement` rather than the query builder: the builder has no
//! portable way to express `IS NOT DISTINCT FROM`, which is exactly what the
//! null-expected (first-advance) case in spec I5 needs.

use chrono::Utc;
use sea_orm::{
    ActiveValue, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbBackend, EntityTrait,
    QueryFilter, Statement,
};

use crate::domain::refs::validate_ref_name;
use crate::entities::refs;
use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHash;

pub struct RefStore<'a> {
    txn: &'a DatabaseTransaction,
}

#[derive(Debug, Clone)]
pub struct RefHandle {
    pub commit_id: Option<ContentHash>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl<'a> RefStore<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub async fn get_ref(&self, dataset_id: i64, ref_name: &str) -> CoreResult<Option<RefHandle>> {
        let found = refs::Entity::find()
            .filter(refs::Column::DatasetId.eq(dataset_id))
            .filter(refs::Column::Name.eq(ref_name))
            .one(self.txn)
            .await?;
        found
            .map(|m| -> CoreResult<RefHandle> {
                Ok(RefHandle {
                    commit_id: m
                        .commit_id
                        .as_deref()
                        .map(|s| s.parse())
                        .transpose()
                        .map_err(|_| CoreError::Internal("corrupt ref commit_id".into()))?,
                    updated_at: m.updated_at,
                })
            })
            .transpose()
    }

    pub async fn require_ref(&self, dataset_id: i64, ref_name: &str) -> CoreResult<RefHandle> {
        self.get_ref(dataset_id, ref_name)
            .await?
            .ok_or_else(|| CoreError::not_found("ref", ref_name))
    }

    /// Insert-or-fail on unique `(dataset_id, name)` (spec §4.3).
    pub async fn create_ref(
        &self,
        dataset_id: i64,
        ref_name: &str,
        commit_id: Option<ContentHash>,
    ) -> CoreResult<()> {
        validate_ref_name(ref_name)?;
        let existing = self.get_ref(dataset_id, ref_name).await?;
        if existing.is_some() {
            return Err(CoreError::conflict(format!(
                "ref '{ref_name}' already exists on dataset {dataset_id}"
            )));
        }
        let model = refs::ActiveModel {
            id: ActiveValue::NotSet,
            dataset_id: ActiveValue::Set(dataset_id),
            name: ActiveValue::Set(ref_name.to_string()),
            commit_id: ActiveValue::Set(commit_id.map(|h| h.to_hex())),
            updated_at: ActiveValue::Set(Utc::now()),
        };
        refs::Entity::insert(model).exec(self.txn).await?;
        Ok(())
    }

    /// The single mutable hot spot in the data model (spec §5): a conditional
    /// `UPDATE ... WHERE commit_id IS NOT DISTINCT FROM $expected`. Returns
    /// whether a row was updated; `false` means the ref moved concurrently
    /// and the caller must surface `ConflictError` (I5, P4).
    pub async fn update_ref_atomically(
        &self,
        dataset_id: i64,
        ref_name: &str,
        new_commit_id: ContentHash,
        expected_commit_id: Option<ContentHash>,
    ) -> CoreResult<bool> {
        let backend = self.txn.get_database_backend();
        let sql = match backend {
            DbBackend::Postgres => {
                "UPDATE refs SET commit_id = $1, updated_at = $2 \
                 WHERE dataset_id = $3 AND name = $4 AND commit_id IS NOT DISTINCT FROM $5"
            }
            DbBackend::Sqlite => {
                "UPDATE refs SET commit_id = ?1, updated_at = ?2 \
                 WHERE dataset_id = ?3 AND name = ?4 AND commit_id IS ?5"
            }
            DbBackend::MySql => {
                "UPDATE refs SET commit_id = ?, updated_at = ? \
                 WHERE dataset_id = ? AND name = ? AND commit_id <=> ?"
            }
        };

        let stmt = Statement::from_sql_and_values(
            backend,
            sql,
            [
                new_commit_id.to_hex().into(),
                Utc::now().into(),
                dataset_id.into(),
                ref_name.into(),
                expected_commit_id.map(|h| h.to_hex()).into(),
            ],
        );
        let result = self.txn.execute(stmt).await?;
        Ok(result.rows_affected() == 1)
    }

    /// Refuses to delete the dataset's default branch (I8's exception: refs
    /// are owned by the dataset, but `main` cannot be removed while the
    /// dataset exists).
    pub async fn delete_ref(
        &self,
        dataset_id: i64,
        ref_name: &str,
        default_branch: &str,
    ) -> CoreResult<bool> {
        if ref_name == default_branch {
            return Err(CoreError::business_rule(
                "protect_default_branch",
                format!("ref '{ref_name}' is the default branch and cannot be deleted"),
            ));
        }
        let result = refs::Entity::delete_many()
            .filter(refs::Column::DatasetId.eq(dataset_id))
            .filter(refs::Column::Name.eq(ref_name))
            .exec(self.txn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn list_refs(&self, dataset_id: i64) -> CoreResult<Vec<refs::Model>> {
        Ok(refs::Entity::find()
            .filter(refs::Column::DatasetId.eq(dataset_id))
            .all(self.txn)
            .await?)
    }
}
