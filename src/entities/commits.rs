use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "commits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub commit_id: String,
    pub dataset_id: i64,
    pub parent_commit_id: Option<String>,
    pub message: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(belongs_to = "super::datasets::Entity", from = "Column::DatasetId", to = "super::datasets::Column::Id")]
    Dataset,
    #[sea_orm(has_many = "super::commit_manifests::Entity")]
    ManifestEntries,
    #[sea_orm(has_one = "super::commit_schemas::Entity")]
    Schema,
}

impl Related<super::datasets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dataset.def()
    }
}

impl Related<super::commit_manifests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ManifestEntries.def()
    }
}

impl Related<super::commit_schemas::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Schema.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
