//! Hashing utilities for step fingerprints.
//!
//! Every persisted content fingerprint is a full 64-character SHA-256 digest
//! rendered as lowercase hex.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A full 64-character SHA-256 hash of some content.
///
/// # Format
///
/// The hash is a lowercase hexadecimal string (64 characters).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
  /// Leading characters of the hash, for log lines and terminal output.
  pub fn short(&self) -> &str {
    let len = self.0.len().min(12);
    &self.0[..len]
  }
}

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Error parsing a stored hash value.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("not a sha256 hex digest: '{0}'")]
pub struct InvalidHash(pub String);

impl FromStr for ContentHash {
  type Err = InvalidHash;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if s.len() == 64 && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
      Ok(ContentHash(s.to_string()))
    } else {
      Err(InvalidHash(s.to_string()))
    }
  }
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character SHA256 hash.
pub fn hash_bytes(data: &[u8]) -> ContentHash {
  let mut hasher = Sha256::new();
  hasher.update(data);
  ContentHash(hex::encode(hasher.finalize()))
}
