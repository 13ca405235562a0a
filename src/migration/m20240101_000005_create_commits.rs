//! Migration: create `commits` — immutable, content-addressed by `commit_id`.

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
                CREATE TABLE commits (
                    commit_id CHAR(64) PRIMARY KEY,
                    dataset_id BIGINT NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                    parent_commit_id CHAR(64) REFERENCES commits(commit_id),
                    message TEXT NOT NULL,
                    author_id BIGINT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_commits_dataset_id ON commits(dataset_id);
                CREATE INDEX idx_commits_parent_commit_id ON commits(parent_commit_id);
                "#,
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS commits CASCADE;")
            .await?;
        Ok(())
    }
}
