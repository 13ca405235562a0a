//! Migration: create `commit_manifests` (spec §3 ManifestEntry).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE commit_manifests (
                    id BIGSERIAL PRIMARY KEY,
                    commit_id CHAR(64) NOT NULL REFERENCES commits(commit_id) ON DELETE CASCADE,
                    table_key TEXT NOT NULL,
                    logical_row_id TEXT NOT NULL,
                    row_hash CHAR(64) NOT NULL REFERENCES rows(row_hash)
                );

                CREATE INDEX idx_commit_manifests_commit_table ON commit_manifests(commit_id, table_key);
                CREATE INDEX idx_commit_manifests_row_hash ON commit_manifests(row_hash);
                "#,
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS commit_manifests CASCADE;")
            .await?;
        Ok(())
    }
}
