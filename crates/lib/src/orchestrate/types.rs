use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::descriptor::DescriptorError;
use crate::discovery::{DiscoveredPackage, DiscoveryError};
use crate::exec::ExecError;
use crate::fingerprint::FingerprintError;
use crate::propagate::{ManifestError, PackageList};
use crate::script::{ScriptError, StepKind};
use crate::source::{SyncError, SyncOutcome};
use crate::util::hash::ContentHash;

/// Errors that abort processing. Nothing is committed when one is returned.
#[derive(Debug, Error)]
pub enum OrchestrateError {
  #[error(transparent)]
  Descriptor(#[from] DescriptorError),

  #[error("source synchronisation failed: {0}")]
  Sync(#[from] SyncError),

  #[error(transparent)]
  Script(#[from] ScriptError),

  #[error(transparent)]
  Fingerprint(#[from] FingerprintError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  Discovery(#[from] DiscoveryError),

  #[error("{step} step of '{dependency}' ({configuration}) failed: {source}")]
  Step {
    dependency: String,
    configuration: String,
    step: StepKind,
    #[source]
    source: ExecError,
  },

  #[error("cannot resolve output directory '{path}': {source}")]
  OutputDir {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to discard '{path}': {source}")]
  Wipe {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Where one dependency is in its processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
  Unchecked,
  SourceChecked,
  ScriptsGenerated,
  ConfigureNeeded,
  ConfigureSkipped,
  BuildNeeded,
  BuildSkipped,
  Propagated,
  Stamped,
}

impl std::fmt::Display for Phase {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      Phase::Unchecked => "unchecked",
      Phase::SourceChecked => "source-checked",
      Phase::ScriptsGenerated => "scripts-generated",
      Phase::ConfigureNeeded => "configure-needed",
      Phase::ConfigureSkipped => "configure-skipped",
      Phase::BuildNeeded => "build-needed",
      Phase::BuildSkipped => "build-skipped",
      Phase::Propagated => "propagated",
      Phase::Stamped => "stamped",
    };
    f.write_str(name)
  }
}

/// What was discarded before synchronisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Invalidation {
  /// Stamps matched; nothing discarded.
  Unchanged,
  /// The project directory did not exist yet.
  FirstRun,
  /// An earlier pass never reached its commit point: Build, Package and
  /// State were discarded, Source was kept.
  Unstamped,
  /// The source stamp changed: the whole project directory was discarded.
  SourceChanged { previous: String },
  /// The storage version changed: Build, Package and State were discarded.
  StorageVersion { previous: Option<String> },
}

/// Why a configuration's steps ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunReason {
  ConfigureScriptChanged,
  BuildScriptChanged,
  /// Synchronisation cloned, moved or could not track the source.
  SourceChanged,
  BuildDirMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum StepDecision {
  Skipped,
  Ran { reasons: Vec<RunReason> },
}

impl StepDecision {
  pub fn ran(&self) -> bool {
    matches!(self, StepDecision::Ran { .. })
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationReport {
  pub name: String,
  pub build_dir: PathBuf,
  pub decision: StepDecision,
  pub configure_hash: ContentHash,
  pub build_hash: ContentHash,
}

/// The outcome of processing one dependency.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessReport {
  pub dependency: String,
  pub package: String,
  pub fast_mode: bool,
  pub fetch_only: bool,
  pub invalidation: Invalidation,
  /// `None` in fast mode.
  pub source: Option<SyncOutcome>,
  pub configurations: Vec<ConfigurationReport>,
  /// Package directories first seen in this dependency's own manifests.
  pub inherited: Vec<PathBuf>,
  /// Packages found under the inherited directories.
  pub transitive: Vec<DiscoveredPackage>,
  /// This dependency's own package; `None` for fetch-only dependencies.
  pub found: Option<DiscoveredPackage>,
  /// Declared output names bound to configuration Build directories.
  pub bindings: BTreeMap<String, PathBuf>,
}

impl ProcessReport {
  pub(crate) fn new(dependency: &str, package: &str) -> Self {
    Self {
      dependency: dependency.to_string(),
      package: package.to_string(),
      fast_mode: false,
      fetch_only: false,
      invalidation: Invalidation::Unchanged,
      source: None,
      configurations: Vec::new(),
      inherited: Vec::new(),
      transitive: Vec::new(),
      found: None,
      bindings: BTreeMap::new(),
    }
  }

  /// Whether any configure or build step ran.
  pub fn steps_ran(&self) -> bool {
    self.configurations.iter().any(|c| c.decision.ran())
  }
}

/// The outcome of processing a list of dependencies in order.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
  pub dependencies: Vec<ProcessReport>,
  pub packages: PackageList,
  /// Where the package manifest was written.
  pub manifest: PathBuf,
}
