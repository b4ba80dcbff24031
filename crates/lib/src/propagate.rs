//! The accumulated package list and the package manifest file.
//!
//! Every processed dependency appends its own install prefix and the prefixes
//! its own dependencies reported. The list is passed into each processing call
//! and returned from it; there is no shared global.

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::platform::join_path_list;

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read package manifest '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write package manifest '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Ordered, duplicate-free list of package install directories.
///
/// Order is search precedence: earlier entries win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PackageList {
  dirs: Vec<PathBuf>,
}

impl PackageList {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append `dir` unless already present. Returns whether it was added.
  pub fn push(&mut self, dir: impl Into<PathBuf>) -> bool {
    let dir = dir.into();
    if self.dirs.contains(&dir) {
      return false;
    }
    self.dirs.push(dir);
    true
  }

  /// Append each directory not yet present, keeping their relative order.
  /// Returns the directories that were new.
  pub fn merge<I>(&mut self, dirs: I) -> Vec<PathBuf>
  where
    I: IntoIterator<Item = PathBuf>,
  {
    dirs.into_iter().filter(|dir| self.push(dir.clone())).collect()
  }

  pub fn contains(&self, dir: &Path) -> bool {
    self.dirs.iter().any(|d| d == dir)
  }

  pub fn as_slice(&self) -> &[PathBuf] {
    &self.dirs
  }

  pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
    self.dirs.iter()
  }

  pub fn len(&self) -> usize {
    self.dirs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dirs.is_empty()
  }

  /// The list joined with the host path-list delimiter.
  pub fn to_search_path(&self) -> Result<OsString, std::env::JoinPathsError> {
    join_path_list(self.dirs.iter().cloned())
  }
}

impl FromIterator<PathBuf> for PackageList {
  fn from_iter<T: IntoIterator<Item = PathBuf>>(iter: T) -> Self {
    let mut list = PackageList::new();
    list.merge(iter);
    list
  }
}

/// Read a manifest. `Ok(None)` when the file does not exist.
pub fn read_manifest(path: &Path) -> Result<Option<Vec<PathBuf>>, ManifestError> {
  let content = match fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => {
      return Err(ManifestError::Read {
        path: path.to_path_buf(),
        source: e,
      });
    }
  };

  let dirs = content
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(PathBuf::from)
    .collect();
  Ok(Some(dirs))
}

/// Write every directory of `packages`, one per line, replacing the file atomically.
pub fn write_manifest(path: &Path, packages: &PackageList) -> Result<(), ManifestError> {
  let write_err = |source| ManifestError::Write {
    path: path.to_path_buf(),
    source,
  };
  let dir = path.parent().unwrap_or(Path::new("."));
  fs::create_dir_all(dir).map_err(write_err)?;

  let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
  for package in packages.iter() {
    writeln!(tmp, "{}", package.display()).map_err(write_err)?;
  }
  tmp.persist(path).map_err(|e| write_err(e.error))?;

  debug!(path = %path.display(), count = packages.len(), "package manifest written");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn push_deduplicates_and_keeps_order() {
    let mut list = PackageList::new();
    assert!(list.push("/b"));
    assert!(list.push("/a"));
    assert!(!list.push("/b"));
    assert_eq!(list.as_slice(), &[PathBuf::from("/b"), PathBuf::from("/a")]);
  }

  #[test]
  fn merge_reports_only_new_entries() {
    let mut list: PackageList = vec![PathBuf::from("/a")].into_iter().collect();
    let added = list.merge(vec![PathBuf::from("/a"), PathBuf::from("/c"), PathBuf::from("/c")]);
    assert_eq!(added, vec![PathBuf::from("/c")]);
    assert_eq!(list.len(), 2);
  }

  #[test]
  #[cfg(unix)]
  fn search_path_uses_host_delimiter() {
    let list: PackageList = vec![PathBuf::from("/a"), PathBuf::from("/b")].into_iter().collect();
    assert_eq!(list.to_search_path().unwrap(), OsString::from("/a:/b"));
  }

  #[test]
  fn manifest_roundtrip() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("out").join("depforge-packages.txt");
    let list: PackageList = vec![PathBuf::from("/deps/C/package"), PathBuf::from("/deps/B/package")]
      .into_iter()
      .collect();

    write_manifest(&path, &list).unwrap();

    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.ends_with('\n'));
    assert_eq!(raw.lines().count(), 2);
    assert_eq!(read_manifest(&path).unwrap(), Some(list.as_slice().to_vec()));
  }

  #[test]
  fn missing_manifest_reads_as_none() {
    let temp = TempDir::new().unwrap();
    assert!(read_manifest(&temp.path().join("nope.txt")).unwrap().is_none());
  }

  #[test]
  fn blank_lines_are_ignored() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("m.txt");
    fs::write(&path, "/a\n\n  \n/b\n").unwrap();
    assert_eq!(
      read_manifest(&path).unwrap(),
      Some(vec![PathBuf::from("/a"), PathBuf::from("/b")])
    );
  }

  #[test]
  fn empty_list_writes_empty_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("m.txt");
    write_manifest(&path, &PackageList::new()).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "");
  }
}
