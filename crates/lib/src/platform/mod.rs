//! Host platform details: well-known directories and path lists.

pub mod paths;

use std::ffi::OsString;
use std::path::PathBuf;

/// Join directories with the host's path-list delimiter (`:` or `;`).
///
/// Fails if one of the entries itself contains the delimiter.
pub fn join_path_list<I>(dirs: I) -> Result<OsString, std::env::JoinPathsError>
where
  I: IntoIterator<Item = PathBuf>,
{
  std::env::join_paths(dirs)
}
