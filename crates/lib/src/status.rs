//! Read-only view of what the fingerprint store holds for each dependency.

use std::path::PathBuf;

use serde::Serialize;

use crate::descriptor::{Declarations, DependencyDescriptor, DescriptorError, normalize};
use crate::fingerprint::{FingerprintError, FingerprintStore};
use crate::layout::ProjectDirs;
use crate::script::StepKind;
use crate::settings::Settings;
use crate::util::hash::ContentHash;

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
  #[error(transparent)]
  Descriptor(#[from] DescriptorError),

  #[error(transparent)]
  Fingerprint(#[from] FingerprintError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigurationStatus {
  pub name: String,
  pub build_dir: PathBuf,
  pub built: bool,
  pub configure_hash: Option<ContentHash>,
  pub build_hash: Option<ContentHash>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyStatus {
  pub name: String,
  pub project_dir: PathBuf,
  pub source_dir: PathBuf,
  /// The stored source stamp, encoded.
  pub source_stamp: Option<String>,
  /// Whether the stored stamp matches the descriptor's source.
  pub source_current: bool,
  pub storage_version: Option<String>,
  pub storage_current: bool,
  pub fetch_only: bool,
  pub configurations: Vec<ConfigurationStatus>,
}

impl DependencyStatus {
  /// Whether a full run would find nothing to discard.
  pub fn is_current(&self) -> bool {
    self.source_current && self.storage_current && (self.fetch_only || self.configurations.iter().all(|c| c.built))
  }
}

/// Report the stored state of one dependency without touching anything.
pub fn dependency_status(
  settings: &Settings,
  descriptor: &DependencyDescriptor,
  declarations: &Declarations,
) -> Result<DependencyStatus, StatusError> {
  let dep = normalize(descriptor, declarations, &settings.root_dir)?;
  let dirs = ProjectDirs::new(&dep.root_dir, &dep.name, &dep.source);
  let store = FingerprintStore::new(&dirs.state);

  let stamp = store.source_stamp()?;
  let storage_version = store.storage_version()?;

  let mut configurations = Vec::with_capacity(dep.configurations.len());
  for cfg in &dep.configurations {
    let build_dir = dirs.config(&cfg.name).build;
    let configure_hash = store.step_hash(&cfg.name, StepKind::Configure)?;
    let build_hash = store.step_hash(&cfg.name, StepKind::Build)?;
    configurations.push(ConfigurationStatus {
      built: build_hash.is_some() && build_dir.is_dir(),
      name: cfg.name.clone(),
      build_dir,
      configure_hash,
      build_hash,
    });
  }

  Ok(DependencyStatus {
    source_current: stamp.as_ref() == Some(&dep.source.stamp()),
    source_stamp: stamp.map(|s| s.encode()),
    storage_current: storage_version.as_deref() == Some(settings.storage_version.to_string().as_str()),
    storage_version,
    fetch_only: dep.fetch_only,
    name: dep.name,
    project_dir: dirs.project,
    source_dir: dirs.source,
    configurations,
  })
}
