use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// `(dataset_id, name) -> commit_id?`. `commit_id` is nullable until the
/// dataset's initial commit is written (spec §3 Ref).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "refs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub dataset_id: i64,
    pub name: String,
    pub commit_id: Option<String>,
    pub updated_at: DateTime<Utc>,
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
