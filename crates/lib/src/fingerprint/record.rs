use serde::{Deserialize, Serialize};

use crate::util::hash::{ContentHash, hash_bytes};

/// A structured fingerprint: an ordered list of named fields.
///
/// Fields are compared and persisted only through [`Fingerprint::encode`],
/// a single-line JSON array of `[key, value]` pairs. Field order is part of
/// the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
  fields: Vec<(String, String)>,
}

impl Fingerprint {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.fields.push((key.into(), value.into()));
    self
  }

  pub fn fields(&self) -> &[(String, String)] {
    &self.fields
  }

  pub fn get(&self, key: &str) -> Option<&str> {
    self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
  }

  /// Stable text form. Never contains a newline.
  pub fn encode(&self) -> String {
    // A list of string pairs always serialises.
    serde_json::to_string(&self.fields).unwrap_or_default()
  }

  pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
    serde_json::from_str(text.trim())
  }

  pub fn digest(&self) -> ContentHash {
    hash_bytes(self.encode().as_bytes())
  }
}
