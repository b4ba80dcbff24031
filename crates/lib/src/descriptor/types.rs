//! Descriptor types as supplied by the caller and after normalisation.
//!
//! - [`DependencyDescriptor`] - one dependency as declared (may use deprecated keys)
//! - [`Declarations`] - explicit per-configuration declarations, made before processing
//! - [`ResolvedDependency`] - the validated, normalised form the orchestrator consumes

use std::path::PathBuf;

use serde::Serialize;

use crate::fingerprint::Fingerprint;

/// Where a dependency's source tree comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum SourceSpec {
  /// A git repository checked out into the dependency's Source directory.
  Git(GitSource),
  /// An existing directory used in place; never modified.
  Local { path: PathBuf },
}

impl SourceSpec {
  pub fn mode(&self) -> &'static str {
    match self {
      SourceSpec::Git(_) => "git",
      SourceSpec::Local { .. } => "local",
    }
  }

  /// Source identity: mode plus location.
  ///
  /// The git revision is deliberately absent; moving to another revision is
  /// the synchroniser's job and must not discard the project directory.
  pub fn stamp(&self) -> Fingerprint {
    let fingerprint = Fingerprint::new().field("mode", self.mode());
    match self {
      SourceSpec::Git(git) => fingerprint.field("url", &git.url),
      SourceSpec::Local { path } => fingerprint.field("path", path.to_string_lossy()),
    }
  }
}

/// A git source with its submodule handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitSource {
  pub url: String,
  /// Tag, remote-tracking branch (`origin/main`) or commit.
  pub rev: String,
  /// Recursively initialise submodules on clone, checkout and update.
  pub submodules: bool,
  /// Restrict submodule updates to these paths.
  pub submodule_paths: Vec<String>,
  /// Update submodules to their remote-tracking branch (`--remote`).
  pub submodule_remote: bool,
}

impl GitSource {
  pub fn new(url: impl Into<String>, rev: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      rev: rev.into(),
      submodules: true,
      submodule_paths: Vec::new(),
      submodule_remote: false,
    }
  }
}

/// One dependency as declared by the caller.
///
/// Option lists are `Option` so that "not given" and "given empty" can be told
/// apart when checking mutually exclusive keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDescriptor {
  pub name: String,
  pub source: SourceSpec,
  /// Root storage directory; the caller's default root when absent.
  pub root_dir: Option<PathBuf>,
  /// Name used for package discovery; defaults to `name`.
  pub package: Option<String>,
  pub configuration: Option<String>,
  pub configurations: Vec<String>,
  pub configure_options: Option<Vec<String>>,
  pub build_options: Option<Vec<String>>,
  /// Deprecated spelling of `configure_options`.
  pub cmake_args: Option<Vec<String>>,
  /// Only synchronise the source; no steps, no discovery.
  pub fetch_only: bool,
}

impl DependencyDescriptor {
  pub fn new(name: impl Into<String>, source: SourceSpec) -> Self {
    Self {
      name: name.into(),
      source,
      root_dir: None,
      package: None,
      configuration: None,
      configurations: Vec::new(),
      configure_options: None,
      build_options: None,
      cmake_args: None,
      fetch_only: false,
    }
  }

  pub fn git(name: impl Into<String>, url: impl Into<String>, rev: impl Into<String>) -> Self {
    Self::new(name, SourceSpec::Git(GitSource::new(url, rev)))
  }

  pub fn local(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self::new(name, SourceSpec::Local { path: path.into() })
  }

  pub fn with_root_dir(mut self, root: impl Into<PathBuf>) -> Self {
    self.root_dir = Some(root.into());
    self
  }

  pub fn with_configuration(mut self, configuration: impl Into<String>) -> Self {
    self.configuration = Some(configuration.into());
    self
  }

  pub fn with_configure_options<I, S>(mut self, options: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.configure_options = Some(options.into_iter().map(Into::into).collect());
    self
  }
}

/// Options for one (dependency, configuration) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeclaredConfiguration {
  pub configure_options: Vec<String>,
  pub build_options: Vec<String>,
  /// Name under which the configuration's Build directory is reported back.
  pub output: Option<String>,
}

/// Explicit configuration declarations, collected before processing.
///
/// Lives for one processing pass only; nothing here is persisted.
#[derive(Debug, Clone, Default)]
pub struct Declarations {
  entries: Vec<(String, String, DeclaredConfiguration)>,
}

impl Declarations {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declare a configuration for a dependency. A second declaration of the
  /// same pair replaces the first but keeps its position.
  pub fn declare(&mut self, dependency: &str, configuration: &str, declared: DeclaredConfiguration) {
    if let Some(entry) = self
      .entries
      .iter_mut()
      .find(|(dep, cfg, _)| dep == dependency && cfg == configuration)
    {
      entry.2 = declared;
      return;
    }
    self
      .entries
      .push((dependency.to_string(), configuration.to_string(), declared));
  }

  /// Declarations for one dependency, in declaration order.
  pub fn for_dependency<'a>(&'a self, dependency: &'a str) -> impl Iterator<Item = (&'a str, &'a DeclaredConfiguration)> {
    self
      .entries
      .iter()
      .filter(move |(dep, _, _)| dep == dependency)
      .map(|(_, cfg, declared)| (cfg.as_str(), declared))
  }

  pub fn get(&self, dependency: &str, configuration: &str) -> Option<&DeclaredConfiguration> {
    self
      .entries
      .iter()
      .find(|(dep, cfg, _)| dep == dependency && cfg == configuration)
      .map(|(_, _, declared)| declared)
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}

/// A configuration ready for script generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConfiguration {
  pub name: String,
  pub configure_options: Vec<String>,
  pub build_options: Vec<String>,
  pub output: Option<String>,
}

/// A validated dependency with its configuration set fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDependency {
  pub name: String,
  pub package: String,
  pub source: SourceSpec,
  pub root_dir: PathBuf,
  pub configurations: Vec<ResolvedConfiguration>,
  pub fetch_only: bool,
}
