//! The ref-CAS write protocol shared by every writer path (spec §4.3's
//! numbered protocol): the direct-commit command, the import/sampling/SQL
//! transform workers all fast-forward a ref the same way, so the sequence —
//! compute commit, write commit+manifest+schema, CAS-advance, surface
//! `Conflict` on failure — lives in one place instead of three.

use std::collections::BTreeMap;

use crate::domain::commit::ManifestEntry;
use crate::domain::schema::CommitSchema;
use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHash;
use crate::uow::UnitOfWork;

pub struct CommitWrite {
    pub dataset_id: i64,
    pub ref_name: String,
    pub expected_tip: Option<ContentHash>,
    pub message: String,
    pub author_id: i64,
    pub manifest: Vec<ManifestEntry>,
    pub schema: CommitSchema,
}

/// Writes the commit, its manifest, and its schema, then CAS-advances
/// `ref_name` from `expected_tip`. `expected_tip` becomes the new commit's
/// parent (fast-forward only, spec §4.3). On CAS failure the whole
/// transaction is left to the caller to roll back — this function only
/// returns the error; it never rolls back the UoW itself, since the caller
/// (a worker body) may want to record `error_message` in the same
/// transaction before rolling back.
pub async fn write_commit_and_advance(uow: &UnitOfWork, write: CommitWrite) -> CoreResult<ContentHash> {
    let commit_id = uow
        .commits()
        .create_commit_and_manifest(
            write.dataset_id,
            write.expected_tip,
            &write.message,
            write.author_id,
            write.manifest,
        )
        .await?;

    if !write.schema.is_empty() {
        uow.commits().create_commit_schema(commit_id, &write.schema).await?;
    }

    let advanced = uow
        .refs()
        .update_ref_atomically(write.dataset_id, &write.ref_name, commit_id, write.expected_tip)
        .await?;
    if !advanced {
        return Err(CoreError::conflict(format!(
            "ref '{}' moved concurrently on dataset {}",
            write.ref_name, write.dataset_id
        )));
    }
    Ok(commit_id)
}

/// Empty-manifest convenience for the dataset-creation initial commit.
pub fn empty_schema() -> CommitSchema {
    BTreeMap::new()
}
