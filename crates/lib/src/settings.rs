//! Run-wide settings gathered from the environment.
//!
//! | Variable              | Meaning                                     | Default                    |
//! |-----------------------|---------------------------------------------|----------------------------|
//! | `DEPFORGE_ROOT`       | root storage directory for dependencies     | platform cache dir         |
//! | `DEPFORGE_FAST`       | fast mode: skip synchronisation and builds  | off                        |
//! | `DEPFORGE_OUTPUT_DIR` | where the package manifest is written       | current directory          |
//! | `DEPFORGE_CMAKE`      | build-system program                        | `cmake`                    |
//! | `DEPFORGE_GIT`        | version-control program                     | `git`                      |
//! | `DEPFORGE_PKG_CONFIG` | fallback discovery program, `none` disables | `pkg-config`               |

use std::path::PathBuf;

use crate::backend::BuildBackend;
use crate::consts::{CMAKE_ENV, FAST_MODE_ENV, GIT_ENV, OUTPUT_DIR_ENV, PKG_CONFIG_ENV, ROOT_ENV, STORAGE_VERSION};
use crate::platform::paths::cache_dir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  /// Default root storage directory; a descriptor may override it.
  pub root_dir: PathBuf,
  /// The calling project's build output; receives the package manifest.
  pub output_dir: PathBuf,
  pub fast_mode: bool,
  pub storage_version: u32,
  pub cmake_program: String,
  pub generator: Option<String>,
  pub toolchain_file: Option<PathBuf>,
  pub git_program: String,
  /// `None` disables the pkg-config fallback.
  pub pkg_config_program: Option<String>,
}

impl Settings {
  /// Settings with every default and the given directories.
  pub fn new(root_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
    Self {
      root_dir: root_dir.into(),
      output_dir: output_dir.into(),
      fast_mode: false,
      storage_version: STORAGE_VERSION,
      cmake_program: "cmake".to_string(),
      generator: None,
      toolchain_file: None,
      git_program: "git".to_string(),
      pkg_config_program: Some("pkg-config".to_string()),
    }
  }

  pub fn from_env() -> Self {
    let root_dir = non_empty_var(ROOT_ENV).map(PathBuf::from).unwrap_or_else(cache_dir);
    let output_dir = non_empty_var(OUTPUT_DIR_ENV)
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from("."));

    let mut settings = Self::new(root_dir, output_dir);
    settings.fast_mode = env_flag(FAST_MODE_ENV);
    if let Some(cmake) = non_empty_var(CMAKE_ENV) {
      settings.cmake_program = cmake;
    }
    if let Some(git) = non_empty_var(GIT_ENV) {
      settings.git_program = git;
    }
    if let Some(pkg_config) = non_empty_var(PKG_CONFIG_ENV) {
      settings.pkg_config_program = (!pkg_config.eq_ignore_ascii_case("none")).then_some(pkg_config);
    }
    settings
  }

  pub fn backend(&self) -> BuildBackend {
    let mut backend = BuildBackend::new(&self.cmake_program);
    if let Some(generator) = &self.generator {
      backend = backend.with_generator(generator);
    }
    if let Some(toolchain) = &self.toolchain_file {
      backend = backend.with_toolchain_file(toolchain);
    }
    backend
  }
}

fn non_empty_var(key: &str) -> Option<String> {
  std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// `1`, `true`, `yes` and `on` (any case) enable a flag.
pub fn env_flag(key: &str) -> bool {
  non_empty_var(key)
    .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
    .unwrap_or(false)
}
