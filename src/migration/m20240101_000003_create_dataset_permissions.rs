//! Migration: create `dataset_permissions`.

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
                CREATE TABLE dataset_permissions (
                    id BIGSERIAL PRIMARY KEY,
                    dataset_id BIGINT NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                    user_id BIGINT NOT NULL,
                    level TEXT NOT NULL CHECK (level IN ('read', 'write', 'admin'))
                );

                CREATE UNIQUE INDEX idx_dataset_permissions_dataset_user ON dataset_permissions(dataset_id, user_id);
                "#,
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS dataset_permissions CASCADE;")
            .await?;
        Ok(())
    }
}
