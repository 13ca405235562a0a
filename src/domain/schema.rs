//! Derived table schema (spec §3 CommitSchema, §4.8 Commit preparer).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Number,
    Boolean,
    Datetime,
    String,
}

impl ColumnType {
    /// Widens `self` to accommodate a value observed as `other`'s type,
    /// matching the commit preparer's column-dtype inference: a column that
    /// mixes integers and floats becomes `number`; anything mixed with a
    /// non-numeric type becomes `string`.
    pub fn widen(self, other: ColumnType) -> ColumnType {
        use ColumnType::*;
        if self == other {
            return self;
        }
        match (self, other) {
            (Integer, Number) | (Number, Integer) => Number,
            _ => String,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub columns: Vec<ColumnSchema>,
    pub row_count: usize,
}

/// `{table_key → schema}` as stored in `commit_schemas`.
pub type CommitSchema = BTreeMap<String, TableSchema>;
