//! Dataset repository: CRUD plus owned tags (spec §3 Dataset).

use chrono::Utc;
use sea_orm::{ActiveValue, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter};

use crate::domain::dataset::{validate_dataset_name, validate_tags, Dataset};
use crate::entities::{dataset_tags, datasets};
use crate::error::{CoreError, CoreResult};

pub struct DatasetRepo<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> DatasetRepo<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    /// Inserts a dataset row plus its initial tag set. Uniqueness of
    /// `(name, created_by)` is enforced by a unique index at the store
    /// layer; a violation surfaces here as `Conflict`.
    pub async fn create_dataset(
        &self,
        name: &str,
        created_by: i64,
        default_branch: &str,
        tags: &[String],
    ) -> CoreResult<i64> {
        validate_dataset_name(name)?;
        validate_tags(tags)?;

        let existing = datasets::Entity::find()
            .filter(datasets::Column::Name.eq(name))
            .filter(datasets::Column::CreatedBy.eq(created_by))
            .one(self.txn)
            .await?;
        if existing.is_some() {
            return Err(CoreError::conflict(format!(
                "dataset '{name}' already exists for user {created_by}"
            )));
        }

        let now = Utc::now();
        let model = datasets::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(name.to_string()),
            created_by: ActiveValue::Set(created_by),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            default_branch: ActiveValue::Set(default_branch.to_string()),
        };
        let inserted = datasets::Entity::insert(model).exec(self.txn).await?;
        let dataset_id = inserted.last_insert_id;

        if !tags.is_empty() {
            let tag_models: Vec<dataset_tags::ActiveModel> = tags
                .iter()
                .map(|tag| dataset_tags::ActiveModel {
                    id: ActiveValue::NotSet,
                    dataset_id: ActiveValue::Set(dataset_id),
                    tag: ActiveValue::Set(tag.clone()),
                })
                .collect();
            dataset_tags::Entity::insert_many(tag_models)
                .exec(self.txn)
                .await?;
        }

        Ok(dataset_id)
    }

    pub async fn get_dataset(&self, dataset_id: i64) -> CoreResult<Option<Dataset>> {
        let Some(model) = datasets::Entity::find_by_id(dataset_id).one(self.txn).await? else {
            return Ok(None);
        };
        let tags = dataset_tags::Entity::find()
            .filter(dataset_tags::Column::DatasetId.eq(dataset_id))
            .all(self.txn)
            .await?
            .into_iter()
            .map(|t| t.tag)
            .collect();
        Ok(Some(Dataset {
            id: model.id,
            name: model.name,
            created_by: model.created_by,
            created_at: model.created_at,
            updated_at: model.updated_at,
            default_branch: model.default_branch,
            tags,
        }))
    }

    pub async fn require_dataset(&self, dataset_id: i64) -> CoreResult<Dataset> {
        self.get_dataset(dataset_id)
            .await?
            .ok_or_else(|| CoreError::not_found("dataset", dataset_id.to_string()))
    }

    /// `list_datasets_for_user`: every dataset the user can at least read
    /// (joined against `dataset_permissions`), paginated.
    pub async fn list_datasets_for_user(
        &self,
        user_id: i64,
        offset: u64,
        limit: u64,
    ) -> CoreResult<Vec<Dataset>> {
        use crate::entities::dataset_permissions;
        use sea_orm::QuerySelect;

        let ids: Vec<i64> = dataset_permissions::Entity::find()
            .filter(dataset_permissions::Column::UserId.eq(user_id))
            .select_only()
            .column(dataset_permissions::Column::DatasetId)
            .distinct()
            .into_tuple()
            .all(self.txn)
            .await?;

        let mut out = Vec::new();
        for id in ids.into_iter().skip(offset as usize).take(limit as usize) {
            if let Some(ds) = self.get_dataset(id).await? {
                out.push(ds);
            }
        }
        Ok(out)
    }

    /// I8: cascades to permissions, tags, refs, commits, manifests, and job
    /// rows of this dataset. Row-store entries are untouched (shared across
    /// datasets).
    pub async fn delete_dataset(&self, dataset_id: i64) -> CoreResult<()> {
        use crate::entities::{commit_manifests, commits, dataset_permissions, jobs, refs};

        let commit_ids: Vec<String> = commits::Entity::find()
            .filter(commits::Column::DatasetId.eq(dataset_id))
            .all(self.txn)
            .await?
            .into_iter()
            .map(|c| c.commit_id)
            .collect();
        if !commit_ids.is_empty() {
            commit_manifests::Entity::delete_many()
                .filter(commit_manifests::Column::CommitId.is_in(commit_ids))
                .exec(self.txn)
                .await?;
        }
        commits::Entity::delete_many()
            .filter(commits::Column::DatasetId.eq(dataset_id))
            .exec(self.txn)
            .await?;
        refs::Entity::delete_many()
            .filter(refs::Column::DatasetId.eq(dataset_id))
            .exec(self.txn)
            .await?;
        jobs::Entity::delete_many()
            .filter(jobs::Column::DatasetId.eq(dataset_id))
            .exec(self.txn)
            .await?;
        dataset_permissions::Entity::delete_many()
            .filter(dataset_permissions::Column::DatasetId.eq(dataset_id))
            .exec(self.txn)
            .await?;
        dataset_tags::Entity::delete_many()
            .filter(dataset_tags::Column::DatasetId.eq(dataset_id))
            .exec(self.txn)
            .await?;
        datasets::Entity::delete_by_id(dataset_id).exec(self.txn).await?;
        Ok(())
    }
}
