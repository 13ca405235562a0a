//! Content hashing for the row store and commit/manifest engine.
//!
//! Every hash in this crate is a SHA-256 digest encoded as a 64-character lowercase
//! hex string (spec: `row_hash`, `commit_id` both `HEX(64)`). `ContentHash` is the
//! single type used for both, since the two are structurally identical — a digest
//! over canonical bytes — and keeping one type avoids a family of near-duplicate
//! wrapper types.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};
use sha2::Digest;

/// A SHA-256 digest rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub const HEX_LEN: usize = 64;

    /// Compute the SHA-256 digest of `data`.
    pub fn of(data: &[u8]) -> ContentHash {
        let digest = sha2::Sha256::digest(data);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(digest.as_ref());
        ContentHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for ContentHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Error returned when a string is not a valid 64-hex-char content hash.
#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a valid 64-character hex content hash")]
pub struct InvalidContentHash(String);

impl FromStr for ContentHash {
    type Err = InvalidContentHash;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidContentHash(s.to_string()));
        }
        let decoded = hex::decode(s).map_err(|_| InvalidContentHash(s.to_string()))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(ContentHash(bytes))
    }
}

impl TryFrom<String> for ContentHash {
    type Error = InvalidContentHash;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(value: ContentHash) -> Self {
        value.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_known_input() {
        let hash = ContentHash::of(b"Hello, world!");
        assert_eq!(
            hash.to_hex(),
            "315f5bdb76d078c43b8ac0064e4a0164612b1fce77c869345bfc94c75894edd3"
        );
    }

    #[test]
    fn determinism_p1() {
        let a = ContentHash::of(b"{\"id\":1,\"name\":\"a\"}");
        let b = ContentHash::of(b"{\"id\":1,\"name\":\"a\"}");
        assert_eq!(a, b);
    }

    #[test]
    fn round_trips_through_hex() {
        let hash = ContentHash::of(b"round trip me");
        let hex = hash.to_hex();
        let parsed: ContentHash = hex.parse().unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn rejects_short_strings() {
        assert!("deadbeef".parse::<ContentHash>().is_err());
    }

    #[test]
    fn rejects_non_hex_strings() {
        let bogus = "z".repeat(ContentHash::HEX_LEN);
        assert!(bogus.parse::<ContentHash>().is_err());
    }
}
