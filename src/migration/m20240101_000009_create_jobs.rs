//! Migration: create `jobs` (spec §3 Job, §4.7 acquire/cancel protocol).

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
                CREATE TABLE jobs (
                    job_id UUID PRIMARY KEY,
                    run_type TEXT NOT NULL,
                    status TEXT NOT NULL,
                    dataset_id BIGINT NOT NULL REFERENCES datasets(id) ON DELETE CASCADE,
                    user_id BIGINT NOT NULL,
                    source_commit_id CHAR(64),
                    run_parameters JSONB NOT NULL,
                    output_summary JSONB,
                    error_message TEXT,
                    created_at TIMESTAMPTZ NOT NULL,
                    completed_at TIMESTAMPTZ,
                    cancel_requested BOOLEAN NOT NULL DEFAULT FALSE
                );

                CREATE INDEX idx_jobs_dataset_id ON jobs(dataset_id);
                CREATE INDEX idx_jobs_status_run_type ON jobs(status, run_type, created_at);
                "#,
            )
            .await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP TABLE IF EXISTS jobs CASCADE;")
            .await?;
        Ok(())
    }
}
