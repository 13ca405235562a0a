use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Asynchronous job row (spec §3 Job, §4.7).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub job_id: Uuid,
    pub run_type: String,
    pub status: String,
    pub dataset_id: i64,
    pub user_id: i64,
    pub source_commit_id: Option<String>,
    pub run_parameters: Json,
    pub output_summary: Option<Json>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Set to `true` by `cancel_job` when the job is `running`; the worker
    /// checks this at batch boundaries (spec §5 "Cancellation & timeouts").
    pub cancel_requested: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(belongs_to = "super::datasets::Entity", from = "Column::DatasetId", to = "super::datasets::Column::Id")]
    Dataset,
}

impl Related<super::datasets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dataset.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
