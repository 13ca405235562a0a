//! Migration: create `commit_schemas` (spec §3 CommitSchema).

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
                CREATE TABLE commit_schemas (
                    commit_id CHAR(64) PRIMARY KEY REFERENCES commits(commit_id) ON DELETE CASCADE,
                    schema JSONB NOT NULL
                );
                "#,
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS commit_schemas CASCADE;")
            .await?;
        Ok(())
    }
}
