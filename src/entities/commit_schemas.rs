use sea_orm::entity::prelude::*;

/// `(commit_id) -> { table_key -> { columns, row_count } }`, stored as a
/// single JSON blob (spec §3 CommitSchema).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "commit_schemas")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub commit_id: String,
    pub schema: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(belongs_to = "super::commits::Entity", from = "Column::CommitId", to = "super::commits::Column::CommitId")]
    Commit,
}

impl Related<super::commits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Commit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
