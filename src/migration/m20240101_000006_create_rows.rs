//! Migration: create `rows` — content-addressed row store (spec §4.1).
//! Never referenced with `ON DELETE CASCADE` from its dependents: rows are
//! shared across datasets and never deleted by this crate (I8).

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
                CREATE TABLE rows (
                    row_hash CHAR(64) PRIMARY KEY,
                    canonical_json JSONB NOT NULL
                );
                "#,
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS rows CASCADE;")
            .await?;
        Ok(())
    }
}
