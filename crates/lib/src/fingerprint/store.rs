//! On-disk fingerprint storage under a dependency's State directory.
//!
//! # Layout
//!
//! ```text
//! <state>/
//!   source.stamp            # encoded source Fingerprint
//!   storage-version.stamp   # layout schema version
//!   <config>/
//!     configure.sh          # generated scripts (written by `script`)
//!     build.sh
//!     configure.hash        # hash of the last successfully run script
//!     build.hash
//! ```
//!
//! Each file holds one newline-terminated value and is replaced atomically.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::Fingerprint;
use crate::script::StepKind;
use crate::util::hash::ContentHash;

const SOURCE_STAMP_FILE: &str = "source.stamp";
const STORAGE_VERSION_FILE: &str = "storage-version.stamp";

#[derive(Debug, Error)]
pub enum FingerprintError {
  #[error("failed to read fingerprint '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write fingerprint '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Reads and writes the fingerprints of one dependency.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
  state_dir: PathBuf,
}

impl FingerprintStore {
  pub fn new(state_dir: impl Into<PathBuf>) -> Self {
    Self {
      state_dir: state_dir.into(),
    }
  }

  pub fn state_dir(&self) -> &Path {
    &self.state_dir
  }

  /// The stored source stamp; `None` if absent or unreadable as a stamp.
  pub fn source_stamp(&self) -> Result<Option<Fingerprint>, FingerprintError> {
    let path = self.state_dir.join(SOURCE_STAMP_FILE);
    let Some(text) = read_value(&path)? else {
      return Ok(None);
    };
    match Fingerprint::decode(&text) {
      Ok(stamp) => Ok(Some(stamp)),
      Err(e) => {
        warn!(path = %path.display(), error = %e, "ignoring malformed source stamp");
        Ok(None)
      }
    }
  }

  pub fn write_source_stamp(&self, stamp: &Fingerprint) -> Result<(), FingerprintError> {
    write_value(&self.state_dir.join(SOURCE_STAMP_FILE), &stamp.encode())
  }

  /// The stored layout version, verbatim.
  pub fn storage_version(&self) -> Result<Option<String>, FingerprintError> {
    read_value(&self.state_dir.join(STORAGE_VERSION_FILE))
  }

  pub fn write_storage_version(&self, version: u32) -> Result<(), FingerprintError> {
    write_value(&self.state_dir.join(STORAGE_VERSION_FILE), &version.to_string())
  }

  /// Hash of the last successfully run script for a step; `None` if the step
  /// never completed or the stored value is not a hash.
  pub fn step_hash(&self, configuration: &str, step: StepKind) -> Result<Option<ContentHash>, FingerprintError> {
    let path = self.step_hash_path(configuration, step);
    Ok(read_value(&path)?.and_then(|text| text.parse().ok()))
  }

  pub fn write_step_hash(&self, configuration: &str, step: StepKind, hash: &ContentHash) -> Result<(), FingerprintError> {
    write_value(&self.step_hash_path(configuration, step), &hash.0)
  }

  pub fn configuration_dir(&self, configuration: &str) -> PathBuf {
    self.state_dir.join(configuration)
  }

  fn step_hash_path(&self, configuration: &str, step: StepKind) -> PathBuf {
    self.configuration_dir(configuration).join(step.hash_file_name())
  }
}

fn read_value(path: &Path) -> Result<Option<String>, FingerprintError> {
  match fs::read_to_string(path) {
    Ok(text) => Ok(Some(text.trim_end_matches(['\n', '\r']).to_string())),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
    Err(e) => Err(FingerprintError::Read {
      path: path.to_path_buf(),
      source: e,
    }),
  }
}

/// Write `value` plus a newline through a temp file and rename, so readers
/// never see a half-written stamp.
fn write_value(path: &Path, value: &str) -> Result<(), FingerprintError> {
  let write_err = |source| FingerprintError::Write {
    path: path.to_path_buf(),
    source,
  };
  let dir = path.parent().unwrap_or(Path::new("."));
  fs::create_dir_all(dir).map_err(write_err)?;

  let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
  tmp.write_all(value.as_bytes()).map_err(write_err)?;
  tmp.write_all(b"\n").map_err(write_err)?;
  tmp.persist(path).map_err(|e| write_err(e.error))?;

  debug!(path = %path.display(), "fingerprint written");
  Ok(())
}
