//! Ref (branch) domain type and name validation (spec §3 Ref).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ref {
    pub dataset_id: i64,
    pub name: String,
    pub commit_id: Option<String>,
    pub updated_at: DateTime<Utc>,
}

fn name_charset_ok(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 100
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '/')
        && name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
}

/// Validates a ref name against spec §3: matches
/// `^[A-Za-z0-9][A-Za-z0-9_\-/]{0,99}$`, no leading/trailing/duplicate `/`,
/// and is not the literal `HEAD`.
pub fn validate_ref_name(name: &str) -> CoreResult<()> {
    if name == "HEAD" {
        return Err(CoreError::validation("ref_name", "'HEAD' is reserved"));
    }
    if !name_charset_ok(name) {
        return Err(CoreError::validation(
            "ref_name",
            "must match ^[A-Za-z0-9][A-Za-z0-9_-/]{0,99}$",
        ));
    }
    if name.starts_with('/') || name.ends_with('/') || name.contains("//") {
        return Err(CoreError::validation(
            "ref_name",
            "must not have leading, trailing, or duplicate '/'",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_name() {
        assert!(validate_ref_name("main").is_ok());
    }

    #[test]
    fn accepts_namespaced_name() {
        assert!(validate_ref_name("feature/foo-bar_1").is_ok());
    }

    #[test]
    fn rejects_head() {
        assert!(validate_ref_name("HEAD").is_err());
    }

    #[test]
    fn rejects_leading_slash() {
        assert!(validate_ref_name("/main").is_err());
    }

    #[test]
    fn rejects_trailing_slash() {
        assert!(validate_ref_name("main/").is_err());
    }

    #[test]
    fn rejects_duplicate_slash() {
        assert!(validate_ref_name("a//b").is_err());
    }

    #[test]
    fn rejects_leading_punctuation() {
        assert!(validate_ref_name("-main").is_err());
    }

    #[test]
    fn rejects_non_ascii() {
        assert!(validate_ref_name("café").is_err());
    }
}
