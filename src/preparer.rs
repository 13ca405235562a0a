//! M2 Commit preparer (spec §4.8): turns parsed tables into the row set,
//! manifest, and derived schema a commit is built from.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::domain::canonical::canonicalize_row;
use crate::domain::commit::ManifestEntry;
use crate::domain::schema::{ColumnSchema, ColumnType, CommitSchema, TableSchema};
use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHash;

pub struct PreparedCommit {
    /// Deduplicated by hash — inserting the same row twice (same content,
    /// possibly from different tables) is a no-op here and idempotent at
    /// the row store (P1, P3).
    pub rows: Vec<(ContentHash, Value)>,
    pub manifest: Vec<ManifestEntry>,
    pub schema: CommitSchema,
}

/// Prepares the rows/manifest/schema for one commit from parsed tables
/// (`table_key -> rows`, the shape a [`crate::parser::FileParser`] or the
/// sampling/SQL transform workers yield). Deterministic: the same `tables`
/// value always prepares identical output (hashes, logical ids, schema).
pub fn prepare_commit(tables: &BTreeMap<String, Vec<Value>>) -> CoreResult<PreparedCommit> {
    let mut rows_by_hash: BTreeMap<ContentHash, Value> = BTreeMap::new();
    let mut manifest = Vec::new();
    let mut schema = CommitSchema::new();

    for (table_key, rows) in tables {
        let mut accumulator = SchemaAccumulator::new();
        for (i, row) in rows.iter().enumerate() {
            let (bytes, hash) = canonicalize_row(row);
            let canonical_value: Value = serde_json::from_slice(&bytes)?;
            accumulator.observe(&canonical_value);
            manifest.push(ManifestEntry {
                table_key: table_key.clone(),
                logical_row_id: format!("{table_key}:{i}"),
                row_hash: hash,
            });
            rows_by_hash.entry(hash).or_insert(canonical_value);
        }
        schema.insert(table_key.clone(), accumulator.finish(rows.len()));
    }

    Ok(PreparedCommit {
        rows: rows_by_hash.into_iter().collect(),
        manifest,
        schema,
    })
}

/// Tracks per-column dtype and nullability across a table's rows, in
/// first-seen column order (spec §4.8: "derived from observed column
/// dtypes"; order matters for a stable `columns` listing, so this doesn't
/// use a `BTreeMap` for the column set itself).
struct SchemaAccumulator {
    order: Vec<String>,
    ty: BTreeMap<String, Option<ColumnType>>,
    appearances: BTreeMap<String, usize>,
    null_count: BTreeMap<String, usize>,
}

impl SchemaAccumulator {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            ty: BTreeMap::new(),
            appearances: BTreeMap::new(),
            null_count: BTreeMap::new(),
        }
    }

    fn observe(&mut self, row: &Value) {
        let Value::Object(map) = row else { return };
        for (key, value) in map {
            if !self.ty.contains_key(key) {
                self.order.push(key.clone());
                self.ty.insert(key.clone(), None);
            }
            *self.appearances.entry(key.clone()).or_insert(0) += 1;
            match classify(value) {
                Some(observed) => {
                    let slot = self.ty.get_mut(key).expect("inserted above");
                    *slot = Some(match slot {
                        Some(existing) => existing.widen(observed),
                        None => observed,
                    });
                }
                None => {
                    *self.null_count.entry(key.clone()).or_insert(0) += 1;
                }
            }
        }
    }

    fn finish(self, row_count: usize) -> TableSchema {
        let columns = self
            .order
            .into_iter()
            .map(|name| {
                let nulls = *self.null_count.get(&name).unwrap_or(&0);
                let appearances = *self.appearances.get(&name).unwrap_or(&0);
                let missing = row_count.saturating_sub(appearances);
                let column_type = self.ty.get(&name).cloned().flatten().unwrap_or(ColumnType::String);
                ColumnSchema {
                    name,
                    column_type,
                    nullable: nulls > 0 || missing > 0,
                }
            })
            .collect();
        TableSchema { columns, row_count }
    }
}

/// Classifies a single JSON value into the dtype enumeration from spec
/// §4.8. `None` means the value is null (tracked as nullability, not type).
fn classify(value: &Value) -> Option<ColumnType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(ColumnType::Boolean),
        Value::Number(n) => Some(if n.is_i64() || n.is_u64() {
            ColumnType::Integer
        } else {
            ColumnType::Number
        }),
        Value::String(s) => Some(if looks_like_datetime(s) {
            ColumnType::Datetime
        } else {
            ColumnType::String
        }),
        Value::Array(_) | Value::Object(_) => Some(ColumnType::String),
    }
}

fn looks_like_datetime(s: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

/// `{resource}` validation shared by the HTTP-facing layer this crate does
/// not implement; kept here because the preparer is the only place that
/// currently needs to reject a wholly empty file.
pub fn validate_non_empty(tables: &BTreeMap<String, Vec<Value>>) -> CoreResult<()> {
    if tables.is_empty() || tables.values().all(|rows| rows.is_empty()) {
        return Err(CoreError::validation("file", "parsed file contains no rows"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tables_of(rows: Vec<Value>) -> BTreeMap<String, Vec<Value>> {
        BTreeMap::from([("primary".to_string(), rows)])
    }

    #[test]
    fn logical_ids_are_zero_based_and_ordered() {
        let prepared = prepare_commit(&tables_of(vec![json!({"id": 1}), json!({"id": 2})])).unwrap();
        let ids: Vec<&str> = prepared.manifest.iter().map(|e| e.logical_row_id.as_str()).collect();
        assert_eq!(ids, vec!["primary:0", "primary:1"]);
    }

    #[test]
    fn identical_rows_dedupe_by_hash() {
        let prepared =
            prepare_commit(&tables_of(vec![json!({"id": 1}), json!({"id": 1})])).unwrap();
        assert_eq!(prepared.rows.len(), 1);
        assert_eq!(prepared.manifest.len(), 2);
        assert_eq!(prepared.manifest[0].row_hash, prepared.manifest[1].row_hash);
    }

    #[test]
    fn infers_integer_and_string_columns() {
        let prepared =
            prepare_commit(&tables_of(vec![json!({"id": 1, "name": "a"})])).unwrap();
        let schema = &prepared.schema["primary"];
        let id_col = schema.columns.iter().find(|c| c.name == "id").unwrap();
        let name_col = schema.columns.iter().find(|c| c.name == "name").unwrap();
        assert_eq!(id_col.column_type, ColumnType::Integer);
        assert_eq!(name_col.column_type, ColumnType::String);
        assert!(!id_col.nullable);
    }

    #[test]
    fn mixed_int_and_float_widens_to_number() {
        let prepared =
            prepare_commit(&tables_of(vec![json!({"v": 1}), json!({"v": 1.5})])).unwrap();
        let col = &prepared.schema["primary"].columns[0];
        assert_eq!(col.column_type, ColumnType::Number);
    }

    #[test]
    fn missing_column_in_some_rows_is_nullable() {
        let prepared =
            prepare_commit(&tables_of(vec![json!({"a": 1}), json!({"a": 1, "b": 2})])).unwrap();
        let schema = &prepared.schema["primary"];
        let b = schema.columns.iter().find(|c| c.name == "b").unwrap();
        assert!(b.nullable);
    }

    #[test]
    fn explicit_null_marks_nullable() {
        let prepared = prepare_commit(&tables_of(vec![json!({"a": null}), json!({"a": 1})])).unwrap();
        let col = &prepared.schema["primary"].columns[0];
        assert!(col.nullable);
        assert_eq!(col.column_type, ColumnType::Integer);
    }

    #[test]
    fn rejects_empty_file() {
        assert!(validate_non_empty(&BTreeMap::new()).is_err());
        assert!(validate_non_empty(&tables_of(vec![])).is_err());
    }

    #[test]
    fn row_count_matches_manifest_p6() {
        let prepared =
            prepare_commit(&tables_of(vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]))
                .unwrap();
        assert_eq!(prepared.schema["primary"].row_count, 3);
        assert_eq!(prepared.manifest.len(), 3);
    }
}
