//! Dataset domain type and validation rules (spec §3 Dataset).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub id: i64,
    pub name: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub default_branch: String,
    pub tags: Vec<String>,
}

/// Validates the tag set owned by a dataset (spec §3: "tags (set of
/// strings, ≤20, ≤50 chars each)"), mirroring the original
/// `dataset.py` validation constants (SPEC_FULL §B.1).
pub fn validate_tags(tags: &[String]) -> CoreResult<()> {
    if tags.len() > MAX_TAGS {
        return Err(CoreError::validation(
            "tags",
            format!("at most {MAX_TAGS} tags are allowed, got {}", tags.len()),
        ));
    }
    for tag in tags {
        if tag.is_empty() || tag.len() > MAX_TAG_LEN {
            return Err(CoreError::validation(
                "tags",
                format!("tag '{tag}' must be 1..={MAX_TAG_LEN} chars"),
            ));
        }
    }
    Ok(())
}

/// Validates a dataset name is non-empty and reasonably bounded; uniqueness
/// of `(name, created_by)` is enforced at the store layer via a unique index.
pub fn validate_dataset_name(name: &str) -> CoreResult<()> {
    if name.trim().is_empty() || name.len() > 255 {
        return Err(CoreError::validation(
            "name",
            "dataset name must be 1..=255 characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_too_many_tags() {
        let tags: Vec<String> = (0..=MAX_TAGS).map(|i| format!("t{i}")).collect();
        assert!(validate_tags(&tags).is_err());
    }

    #[test]
    fn rejects_oversized_tag() {
        let tags = vec!["x".repeat(MAX_TAG_LEN + 1)];
        assert!(validate_tags(&tags).is_err());
    }

    #[test]
    fn accepts_boundary_tags() {
        let tags = vec!["x".repeat(MAX_TAG_LEN); MAX_TAGS];
        assert!(validate_tags(&tags).is_ok());
    }

    #[test]
    fn rejects_empty_name() {
        assert!(validate_dataset_name("  ").is_err());
    }
}
