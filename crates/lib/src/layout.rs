//! Per-dependency directory layout.
//!
//! ```text
//! <root>/<name>/
//!   source/              # git checkout (local sources live where they are)
//!   build/<config>/      # one binary tree per configuration
//!   package/             # shared install prefix for every configuration
//!   state/               # fingerprints, plus state/<config>/ scripts
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::descriptor::SourceSpec;

/// The four locations of one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDirs {
  /// `<root>/<name>`; removing it discards everything depforge owns.
  pub project: PathBuf,
  pub source: PathBuf,
  pub build: PathBuf,
  pub package: PathBuf,
  pub state: PathBuf,
}

/// The Build and State partitions of one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigDirs {
  pub build: PathBuf,
  pub state: PathBuf,
}

impl ProjectDirs {
  pub fn new(root_dir: &Path, name: &str, source: &SourceSpec) -> Self {
    let project = root_dir.join(name);
    let source = match source {
      SourceSpec::Git(_) => project.join("source"),
      SourceSpec::Local { path } => path.clone(),
    };
    Self {
      source,
      build: project.join("build"),
      package: project.join("package"),
      state: project.join("state"),
      project,
    }
  }

  pub fn config(&self, configuration: &str) -> ConfigDirs {
    ConfigDirs {
      build: self.build.join(configuration),
      state: self.state.join(configuration),
    }
  }

  /// Discard the whole project directory. A local source tree is outside it
  /// and is never touched.
  pub fn wipe_all(&self) -> io::Result<()> {
    if remove_dir_if_exists(&self.project)? {
      info!(path = %self.project.display(), "discarded project directory");
    }
    Ok(())
  }

  /// Discard Build, Package and State but keep Source.
  pub fn wipe_artifacts(&self) -> io::Result<()> {
    for dir in [&self.build, &self.package, &self.state] {
      if remove_dir_if_exists(dir)? {
        info!(path = %dir.display(), "discarded");
      }
    }
    Ok(())
  }
}

fn remove_dir_if_exists(path: &Path) -> io::Result<bool> {
  match fs::remove_dir_all(path) {
    Ok(()) => Ok(true),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
    Err(e) => Err(e),
  }
}
