//! Permission repository: raw `dataset_permissions` CRUD (spec §3 Permission).
//!
//! This is the persistence edge the [`crate::permission::PermissionService`]
//! (L5) consults on a cache miss. It deliberately does not itself do
//! hierarchy reasoning (`admin` satisfies a `read` check) — that logic lives
//! once, on [`crate::domain::permission::PermissionLevel`].

use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter};

use crate::domain::permission::PermissionLevel;
use crate::entities::dataset_permissions;
use crate::error::{CoreError, CoreResult};

pub struct PermissionRepo<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> PermissionRepo<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    pub async fn get_permission(
        &self,
        dataset_id: i64,
        user_id: i64,
    ) -> CoreResult<Option<PermissionLevel>> {
        let found = dataset_permissions::Entity::find()
            .filter(dataset_permissions::Column::DatasetId.eq(dataset_id))
            .filter(dataset_permissions::Column::UserId.eq(user_id))
            .one(self.txn)
            .await?;
        found
            .map(|m| m.level.parse())
            .transpose()
            .map_err(|_: CoreError| CoreError::Internal("corrupt permission level".into()))
    }

    /// Grants `level` to `user_id` on `dataset_id`, upserting over any
    /// existing grant (a dataset has at most one level per user).
    pub async fn grant_permission(
        &self,
        dataset_id: i64,
        user_id: i64,
        level: PermissionLevel,
    ) -> CoreResult<()> {
        let existing = dataset_permissions::Entity::find()
            .filter(dataset_permissions::Column::DatasetId.eq(dataset_id))
            .filter(dataset_permissions::Column::UserId.eq(user_id))
            .one(self.txn)
            .await?;

        if let Some(existing) = existing {
            let mut model: dataset_permissions::ActiveModel = existing.into();
            model.level = ActiveValue::Set(level.as_str().to_string());
            dataset_permissions::Entity::update(model).exec(self.txn).await?;
        } else {
            let model = dataset_permissions::ActiveModel {
                id: ActiveValue::NotSet,
                dataset_id: ActiveValue::Set(dataset_id),
                user_id: ActiveValue::Set(user_id),
                level: ActiveValue::Set(level.as_str().to_string()),
            };
            dataset_permissions::Entity::insert(model)
                .on_conflict(
                    OnConflict::columns([
                        dataset_permissions::Column::DatasetId,
                        dataset_permissions::Column::UserId,
                    ])
                    .update_column(dataset_permissions::Column::Level)
                    .to_owned(),
                )
                .exec(self.txn)
                .await?;
        }
        Ok(())
    }

    pub async fn revoke_permission(&self, dataset_id: i64, user_id: i64) -> CoreResult<bool> {
        let result = dataset_permissions::Entity::delete_many()
            .filter(dataset_permissions::Column::DatasetId.eq(dataset_id))
            .filter(dataset_permissions::Column::UserId.eq(user_id))
            .exec(self.txn)
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn list_permissions(
        &self,
        dataset_id: i64,
    ) -> CoreResult<Vec<(i64, PermissionLevel)>> {
        let rows = dataset_permissions::Entity::find()
            .filter(dataset_permissions::Column::DatasetId.eq(dataset_id))
            .all(self.txn)
            .await?;
        rows.into_iter()
            .map(|m| {
                let level: PermissionLevel = m
                    .level
                    .parse()
                    .map_err(|_: CoreError| CoreError::Internal("corrupt permission level".into()))?;
                Ok((m.user_id, level))
            })
            .collect()
    }
}
