//! Commit and manifest domain types, and the content-hash that identifies a
//! commit (spec §3 Commit, I1, I4, P2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHash;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub commit_id: ContentHash,
    pub dataset_id: i64,
    pub parent_commit_id: Option<ContentHash>,
    pub message: String,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
}

/// `(table_key, logical_row_id, row_hash)`. Order within a table is encoded
/// by `logical_row_id`'s `"{table_key}:{i}"` suffix, not by storage order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub table_key: String,
    pub logical_row_id: String,
    pub row_hash: ContentHash,
}

pub fn validate_commit_message(message: &str) -> CoreResult<()> {
    if message.is_empty() || message.len() > 1000 {
        return Err(CoreError::validation(
            "message",
            "commit message must be 1..=1000 characters",
        ));
    }
    Ok(())
}

/// Computes the content-addressed `commit_id` per spec §3: SHA-256 over
/// `{dataset_id, parent_commit_id, message, author_id, timestamp,
/// serialized_manifest}`, where the manifest is serialized sorted first by
/// table key, then by logical id within each table. Two callers with
/// identical inputs always produce the same id (P2), which is why the caller
/// passes the *exact* timestamp that will be persisted on the commit row:
/// recomputing with `Utc::now()` a second time would not reproduce it.
pub fn compute_commit_id(
    dataset_id: i64,
    parent_commit_id: Option<ContentHash>,
    message: &str,
    author_id: i64,
    timestamp: DateTime<Utc>,
    manifest: &[ManifestEntry],
) -> ContentHash {
    let mut sorted: Vec<&ManifestEntry> = manifest.iter().collect();
    sorted.sort_by(|a, b| {
        a.table_key
            .cmp(&b.table_key)
            .then_with(|| a.logical_row_id.cmp(&b.logical_row_id))
    });

    let serialized_manifest: Vec<_> = sorted
        .iter()
        .map(|e| {
            json!({
                "table_key": e.table_key,
                "logical_row_id": e.logical_row_id,
                "row_hash": e.row_hash.to_hex(),
            })
        })
        .collect();

    let payload = json!({
        "dataset_id": dataset_id,
        "parent_commit_id": parent_commit_id.map(|h| h.to_hex()),
        "message": message,
        "author_id": author_id,
        "timestamp": timestamp.to_rfc3339(),
        "serialized_manifest": serialized_manifest,
    });

    let (normalized_bytes, _) = crate::domain::canonicalize_row(&payload);
    ContentHash::of(&normalized_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_manifest() -> Vec<ManifestEntry> {
        vec![
            ManifestEntry {
                table_key: "primary".into(),
                logical_row_id: "primary:0".into(),
                row_hash: ContentHash::of(b"row0"),
            },
            ManifestEntry {
                table_key: "primary".into(),
                logical_row_id: "primary:1".into(),
                row_hash: ContentHash::of(b"row1"),
            },
        ]
    }

    #[test]
    fn determinism_p2() {
        let ts = "2026-01-01T00:00:00Z".parse().unwrap();
        let a = compute_commit_id(1, None, "init", 7, ts, &sample_manifest());
        let b = compute_commit_id(1, None, "init", 7, ts, &sample_manifest());
        assert_eq!(a, b);
    }

    #[test]
    fn manifest_order_does_not_affect_id() {
        let ts = "2026-01-01T00:00:00Z".parse().unwrap();
        let mut reordered = sample_manifest();
        reordered.reverse();
        let a = compute_commit_id(1, None, "init", 7, ts, &sample_manifest());
        let b = compute_commit_id(1, None, "init", 7, ts, &reordered);
        assert_eq!(a, b);
    }

    #[test]
    fn different_parent_changes_id() {
        let ts = "2026-01-01T00:00:00Z".parse().unwrap();
        let a = compute_commit_id(1, None, "init", 7, ts, &sample_manifest());
        let b = compute_commit_id(1, Some(ContentHash::of(b"parent")), "init", 7, ts, &sample_manifest());
        assert_ne!(a, b);
    }

    #[test]
    fn rejects_empty_message() {
        assert!(validate_commit_message("").is_err());
    }

    #[test]
    fn rejects_oversized_message() {
        assert!(validate_commit_message(&"x".repeat(1001)).is_err());
    }
}
