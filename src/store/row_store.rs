//! L1 Row store: content-addressed `(hash -> canonical-json)` insert-if-absent.

use std::collections::{BTreeMap, HashSet};

use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter};

use crate::entities::rows;
use crate::error::CoreResult;
use crate::hash::ContentHash;

pub struct RowStore<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> RowStore<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    /// Batch insert with conflict-ignore on the `row_hash` primary key
    /// (spec §4.1). Idempotent and order-independent: duplicate hashes
    /// across concurrent callers are safe because `canonical_json` for a
    /// given hash is provably identical (P3).
    pub async fn add_rows_if_not_exist(
        &self,
        rows: &[(ContentHash, serde_json::Value)],
    ) -> CoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let models: Vec<rows::ActiveModel> = rows
            .iter()
            .map(|(hash, json)| rows::ActiveModel {
                row_hash: sea_orm::ActiveValue::Set(hash.to_hex()),
                canonical_json: sea_orm::ActiveValue::Set(json.clone()),
            })
            .collect();

        // `do_nothing()` on the insert (as opposed to the one on `OnConflict`)
        // also swallows the "fully conflicted, zero rows inserted" case that
        // `sea_orm` otherwise surfaces as `DbErr::RecordNotInserted` — both
        // are expected outcomes of an idempotent insert-if-absent.
        rows::Entity::insert_many(models)
            .on_conflict(
                OnConflict::column(rows::Column::RowHash)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(self.txn)
            .await?;
        Ok(())
    }

    /// Returns the subset of `hashes` present in the store, mapped to their
    /// canonical JSON.
    pub async fn get_rows_by_hash(
        &self,
        hashes: &HashSet<ContentHash>,
    ) -> CoreResult<BTreeMap<ContentHash, serde_json::Value>> {
        if hashes.is_empty() {
            return Ok(BTreeMap::new());
        }
        let hex: Vec<String> = hashes.iter().map(|h| h.to_hex()).collect();
        let found = rows::Entity::find()
            .filter(rows::Column::RowHash.is_in(hex))
            .all(self.txn)
            .await?;
        let mut out = BTreeMap::new();
        for row in found {
            let hash: ContentHash = row.row_hash.parse().map_err(|_| {
                crate::error::CoreError::Internal("corrupt row_hash in row store".into())
            })?;
            out.insert(hash, row.canonical_json);
        }
        Ok(out)
    }
}
