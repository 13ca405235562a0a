//! L4 Table reader (spec §4.4): reads rows/schema/stats/samples for a
//! `(commit, table_key)` pair. Segregated into metadata, data, and analytics
//! methods per spec §9's "narrow capability interfaces" guidance, even
//! though all three live on one type here — each group only touches what it
//! needs (manifest+schema for metadata, manifest+row-store for data).

use std::collections::{BTreeMap, HashSet};

use futures::Stream;
use sea_orm::DatabaseTransaction;

use crate::domain::commit::ManifestEntry;
use crate::domain::schema::TableSchema;
use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHash;
use crate::store::commit_store::CommitStore;
use crate::store::row_store::RowStore;

#[derive(Clone, Copy)]
pub struct TableReader<'a> {
    txn: &'a DatabaseTransaction,
}

impl<'a> TableReader<'a> {
    pub fn new(txn: &'a DatabaseTransaction) -> Self {
        Self { txn }
    }

    // ---- metadata ----------------------------------------------------

    pub async fn list_table_keys(&self, commit_id: ContentHash) -> CoreResult<Vec<String>> {
        CommitStore::new(self.txn).list_table_keys(commit_id).await
    }

    async fn ensure_table_exists(&self, commit_id: ContentHash, table_key: &str) -> CoreResult<()> {
        let keys = self.list_table_keys(commit_id).await?;
        if keys.iter().any(|k| k == table_key) {
            Ok(())
        } else {
            Err(CoreError::not_found("table", table_key.to_string()))
        }
    }

    /// `None` if the commit has a recorded schema but not for this table, or
    /// no recorded schema at all (schema is advisory, spec §3 CommitSchema).
    pub async fn get_table_schema(
        &self,
        commit_id: ContentHash,
        table_key: &str,
    ) -> CoreResult<Option<TableSchema>> {
        self.ensure_table_exists(commit_id, table_key).await?;
        let schema = CommitStore::new(self.txn).get_commit_schema(commit_id).await?;
        Ok(schema.and_then(|mut s| s.remove(table_key)))
    }

    pub async fn count_table_rows(&self, commit_id: ContentHash, table_key: &str) -> CoreResult<u64> {
        self.ensure_table_exists(commit_id, table_key).await?;
        CommitStore::new(self.txn)
            .count_commit_rows(commit_id, Some(table_key))
            .await
    }

    // ---- data ----------------------------------------------------------

    /// Manifest entries for `(commit, table_key)` in logical order. The
    /// store layer's `ORDER BY logical_row_id` is lexicographic over the
    /// `"{table_key}:{i}"` string, which diverges from the intended numeric
    /// order past index 9 (`"10" < "2"` as strings); this re-sorts by the
    /// parsed integer suffix so table order always matches ingestion order.
    async fn load_sorted_manifest(
        &self,
        commit_id: ContentHash,
        table_key: &str,
    ) -> CoreResult<Vec<ManifestEntry>> {
        self.ensure_table_exists(commit_id, table_key).await?;
        let mut entries = CommitStore::new(self.txn)
            .get_manifest_entries(commit_id, table_key)
            .await?;
        entries.sort_by_key(|e| logical_index(&e.logical_row_id));
        Ok(entries)
    }

    async fn hydrate_rows(&self, entries: &[ManifestEntry]) -> CoreResult<Vec<serde_json::Value>> {
        let hashes: HashSet<ContentHash> = entries.iter().map(|e| e.row_hash).collect();
        let by_hash = RowStore::new(self.txn).get_rows_by_hash(&hashes).await?;
        entries
            .iter()
            .map(|entry| {
                let mut row = by_hash
                    .get(&entry.row_hash)
                    .cloned()
                    .ok_or_else(|| CoreError::Internal(format!("dangling row_hash {}", entry.row_hash)))?;
                if let serde_json::Value::Object(ref mut map) = row {
                    map.insert(
                        "_logical_row_id".to_string(),
                        serde_json::Value::String(entry.logical_row_id.clone()),
                    );
                }
                Ok(row)
            })
            .collect()
    }

    /// `[row_dict]`, each carrying a synthetic `_logical_row_id` (spec §4.4).
    pub async fn get_table_data(
        &self,
        commit_id: ContentHash,
        table_key: &str,
        offset: usize,
        limit: usize,
    ) -> CoreResult<Vec<serde_json::Value>> {
        let entries = self.load_sorted_manifest(commit_id, table_key).await?;
        let page: Vec<ManifestEntry> = entries.into_iter().skip(offset).take(limit).collect();
        self.hydrate_rows(&page).await
    }

    /// Lazy batches of `batch_size` rows, oldest-logical-id first. Finite and
    /// not restartable: each item is produced by one manifest fetch (cached
    /// for the stream's lifetime) plus one row-store fetch per batch.
    pub fn stream_table_data(
        self,
        commit_id: ContentHash,
        table_key: String,
        batch_size: usize,
    ) -> impl Stream<Item = CoreResult<Vec<serde_json::Value>>> + 'a {
        struct State {
            entries: Vec<ManifestEntry>,
            cursor: usize,
        }

        futures::stream::unfold(None::<State>, move |state| {
            let reader = self;
            let table_key = table_key.clone();
            async move {
                let mut state = match state {
                    Some(s) => s,
                    None => match reader.load_sorted_manifest(commit_id, &table_key).await {
                        Ok(entries) => State { entries, cursor: 0 },
                        Err(e) => return Some((Err(e), None)),
                    },
                };
                if state.cursor >= state.entries.len() {
                    return None;
                }
                let end = (state.cursor + batch_size.max(1)).min(state.entries.len());
                let batch: Vec<ManifestEntry> = state.entries[state.cursor..end].to_vec();
                let result = reader.hydrate_rows(&batch).await;
                state.cursor = end;
                Some((result, Some(state)))
            }
        })
    }

    // ---- analytics -------------------------------------------------------

    /// Up to `per_column` distinct observed values per requested column
    /// (spec §4.4). Streams the table rather than materializing it fully.
    pub async fn get_column_samples(
        &self,
        commit_id: ContentHash,
        table_key: &str,
        columns: &[String],
        per_column: usize,
    ) -> CoreResult<BTreeMap<String, Vec<serde_json::Value>>> {
        use futures_util::StreamExt;

        let mut samples: BTreeMap<String, Vec<serde_json::Value>> =
            columns.iter().map(|c| (c.clone(), Vec::new())).collect();
        let mut seen: BTreeMap<String, HashSet<String>> =
            columns.iter().map(|c| (c.clone(), HashSet::new())).collect();

        const SCAN_BATCH: usize = 500;
        let mut stream = Box::pin(self.stream_table_data(commit_id, table_key.to_string(), SCAN_BATCH));
        'outer: while let Some(batch) = stream.next().await {
            for row in batch? {
                let obj = row.as_object();
                for column in columns {
                    let Some(obj) = obj else { continue };
                    let Some(value) = obj.get(column) else { continue };
                    if value.is_null() {
                        continue;
                    }
                    let bucket = samples.get_mut(column).expect("initialized above");
                    if bucket.len() >= per_column {
                        continue;
                    }
                    let dedup_key = value.to_string();
                    if seen.get_mut(column).expect("initialized above").insert(dedup_key) {
                        bucket.push(value.clone());
                    }
                }
                if samples.values().all(|v| v.len() >= per_column) {
                    break 'outer;
                }
            }
        }
        Ok(samples)
    }
}

/// Parses the zero-based index suffix out of a `"{table_key}:{i}"` logical
/// row id. Malformed ids (which this crate never produces) sort last rather
/// than panicking, since this runs over data already persisted by a prior
/// commit.
fn logical_index(logical_row_id: &str) -> u64 {
    logical_row_id
        .rsplit(':')
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_index_parses_suffix() {
        assert_eq!(logical_index("primary:0"), 0);
        assert_eq!(logical_index("primary:10"), 10);
        assert_eq!(logical_index("sheet one:3"), 3);
    }

    #[test]
    fn logical_index_sorts_numerically_not_lexically() {
        let mut ids = vec!["primary:10", "primary:2", "primary:1"];
        ids.sort_by_key(|id| logical_index(id));
        assert_eq!(ids, vec!["primary:1", "primary:2", "primary:10"]);
    }
}
