//! Permission levels (spec §3 Permission, I7).

use serde::{Deserialize, Serialize};

/// `admin ⊃ write ⊃ read` (I7): a check for `L` succeeds iff the stored
/// level is ≥ `L` under this ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionLevel {
    Read,
    Write,
    Admin,
}

impl PermissionLevel {
    pub fn satisfies(&self, required: PermissionLevel) -> bool {
        *self >= required
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Read => "read",
            PermissionLevel::Write => "write",
            PermissionLevel::Admin => "admin",
        }
    }
}

impl std::str::FromStr for PermissionLevel {
    type Err = crate::error::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(PermissionLevel::Read),
            "write" => Ok(PermissionLevel::Write),
            "admin" => Ok(PermissionLevel::Admin),
            other => Err(crate::error::CoreError::validation(
                "permission_level",
                format!("'{other}' is not one of read|write|admin"),
            )),
        }
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_hierarchy() {
        assert!(PermissionLevel::Admin > PermissionLevel::Write);
        assert!(PermissionLevel::Write > PermissionLevel::Read);
    }

    #[test]
    fn admin_satisfies_everything_p8() {
        let admin = PermissionLevel::Admin;
        assert!(admin.satisfies(PermissionLevel::Read));
        assert!(admin.satisfies(PermissionLevel::Write));
        assert!(admin.satisfies(PermissionLevel::Admin));
    }

    #[test]
    fn read_does_not_satisfy_write() {
        assert!(!PermissionLevel::Read.satisfies(PermissionLevel::Write));
    }
}
