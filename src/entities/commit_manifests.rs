use sea_orm::entity::prelude::*;

/// `(commit_id, table_key, logical_row_id, row_hash)` — immutable once
/// written (spec §3 ManifestEntry).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "commit_manifests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub commit_id: String,
    pub table_key: String,
    pub logical_row_id: String,
    pub row_hash: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(belongs_to = "super::commits::Entity", from = "Column::CommitId", to = "super::commits::Column::CommitId")]
    Commit,
    #[sea_orm(belongs_to = "super::rows::Entity", from = "Column::RowHash", to = "super::rows::Column::RowHash")]
    Row,
}

impl Related<super::commits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commit.def()
    }
}

impl Related<super::rows::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Row.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
