use sea_orm::entity::prelude::*;

/// Content-addressed row store: `(row_hash PRIMARY KEY, canonical_json)`
/// (spec §3 Row, §4.1). Shared across every dataset/commit that references
/// the same hash; never deleted by this crate (I8).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "rows")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub row_hash: String,
    pub canonical_json: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::commit_manifests::Entity")]
    ManifestEntries,
}

impl Related<super::commit_manifests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ManifestEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
