//! Dataset commands (spec §6 "Create dataset" and the permission/tag
//! management spec §3 implies but leaves to the command layer).

use crate::commit_writer::{write_commit_and_advance, CommitWrite};
use crate::config::Config;
use crate::domain::dataset::{validate_dataset_name, validate_tags, Dataset};
use crate::domain::permission::PermissionLevel;
use crate::domain::refs::validate_ref_name;
use crate::error::CoreResult;
use crate::hash::ContentHash;
use crate::permission::Resource;
use crate::store::dataset_repo::DatasetRepo;
use crate::store::permission_repo::PermissionRepo;
use crate::uow::UnitOfWork;

#[derive(Debug, Clone)]
pub struct CreateDatasetCommand {
    pub name: String,
    pub tags: Vec<String>,
    pub default_branch: Option<String>,
    pub created_by: i64,
}

impl CreateDatasetCommand {
    pub fn validate(&self, config: &Config) -> CoreResult<()> {
        validate_dataset_name(&self.name)?;
        validate_tags(&self.tags)?;
        validate_ref_name(
            self.default_branch
                .as_deref()
                .unwrap_or(&config.default_branch_name),
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CreateDatasetOutput {
    pub dataset_id: i64,
    pub default_branch: String,
    pub initial_commit_id: ContentHash,
}

/// "Create dataset" (spec §6): creates the dataset row, grants the creator
/// `admin`, creates the default ref at `null`, writes the empty initial
/// commit, and advances the ref to it — all inside the caller's UoW.
pub async fn create_dataset(
    uow: &UnitOfWork,
    config: &Config,
    cmd: CreateDatasetCommand,
) -> CoreResult<CreateDatasetOutput> {
    cmd.validate(config)?;
    let default_branch = cmd
        .default_branch
        .clone()
        .unwrap_or_else(|| config.default_branch_name.clone());

    let dataset_id = DatasetRepo::new(uow.txn())
        .create_dataset(&cmd.name, cmd.created_by, &default_branch, &cmd.tags)
        .await?;

    PermissionRepo::new(uow.txn())
        .grant_permission(dataset_id, cmd.created_by, PermissionLevel::Admin)
        .await?;

    uow.refs().create_ref(dataset_id, &default_branch, None).await?;

    let initial_commit_id = write_commit_and_advance(
        uow,
        CommitWrite {
            dataset_id,
            ref_name: default_branch.clone(),
            expected_tip: None,
            message: "Initial commit".to_string(),
            author_id: cmd.created_by,
            manifest: Vec::new(),
            schema: crate::commit_writer::empty_schema(),
        },
    )
    .await?;

    Ok(CreateDatasetOutput {
        dataset_id,
        default_branch,
        initial_commit_id,
    })
}

pub async fn get_dataset(uow: &UnitOfWork, user_id: i64, dataset_id: i64) -> CoreResult<Dataset> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Read)
        .await?;
    DatasetRepo::new(uow.txn()).require_dataset(dataset_id).await
}

pub async fn list_datasets_for_user(
    uow: &UnitOfWork,
    user_id: i64,
    offset: u64,
    limit: u64,
) -> CoreResult<Vec<Dataset>> {
    DatasetRepo::new(uow.txn())
        .list_datasets_for_user(user_id, offset, limit)
        .await
}

/// Not in spec §6's command table directly, but implied by I8 ("dataset
/// deletion cascades..."); requires `admin` since it is irreversible for
/// every ref/commit the dataset owns.
pub async fn delete_dataset(uow: &UnitOfWork, user_id: i64, dataset_id: i64) -> CoreResult<()> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), user_id, PermissionLevel::Admin)
        .await?;
    DatasetRepo::new(uow.txn()).delete_dataset(dataset_id).await
}

pub async fn grant_permission(
    uow: &UnitOfWork,
    acting_user_id: i64,
    dataset_id: i64,
    target_user_id: i64,
    level: PermissionLevel,
) -> CoreResult<()> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), acting_user_id, PermissionLevel::Admin)
        .await?;
    PermissionRepo::new(uow.txn())
        .grant_permission(dataset_id, target_user_id, level)
        .await
}

pub async fn revoke_permission(
    uow: &UnitOfWork,
    acting_user_id: i64,
    dataset_id: i64,
    target_user_id: i64,
) -> CoreResult<bool> {
    uow.permissions()
        .require(Resource::Dataset(dataset_id), acting_user_id, PermissionLevel::Admin)
        .await?;
    PermissionRepo::new(uow.txn())
        .revoke_permission(dataset_id, target_user_id)
        .await
}
