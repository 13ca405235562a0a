//! Schema migrations for the 9 persisted tables (spec §6 "Persisted state
//! layout"). One file per table, applied in dependency order through
//! `sea-orm-migration`'s `Migrator`.

pub mod m20240101_000001_create_datasets;
pub mod m20240101_000002_create_dataset_tags;
pub mod m20240101_000003_create_dataset_permissions;
pub mod m20240101_000004_create_refs;
pub mod m20240101_000005_create_commits;
pub mod m20240101_000006_create_rows;
pub mod m20240101_000007_create_commit_manifests;
pub mod m20240101_000008_create_commit_schemas;
pub mod m20240101_000009_create_jobs;

use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_datasets::Migration),
            Box::new(m20240101_000002_create_dataset_tags::Migration),
            Box::new(m20240101_000003_create_dataset_permissions::Migration),
            Box::new(m20240101_000004_create_refs::Migration),
            Box::new(m20240101_000005_create_commits::Migration),
            Box::new(m20240101_000006_create_rows::Migration),
            Box::new(m20240101_000007_create_commit_manifests::Migration),
            Box::new(m20240101_000008_create_commit_schemas::Migration),
            Box::new(m20240101_000009_create_jobs::Migration),
        ]
    }
}
