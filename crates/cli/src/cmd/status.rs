//! Status command implementation.
//!
//! Displays the stored source stamp, storage version and step hashes of every
//! dependency in a descriptor file without running anything.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use depforge_lib::settings::Settings;
use depforge_lib::status::{DependencyStatus, dependency_status};

use crate::output::{OutputFormat, print_info, print_json, print_stat, print_success, print_warning, truncate_hash};

pub fn cmd_status(file: &Path, root: Option<PathBuf>, format: OutputFormat) -> Result<()> {
  let deps = super::load(file)?;

  let mut settings = Settings::from_env();
  if let Some(root) = root {
    settings.root_dir = root;
  }

  let statuses = deps
    .dependencies
    .iter()
    .map(|dep| {
      dependency_status(&settings, dep, &deps.declarations)
        .with_context(|| format!("Failed to read state of '{}'", dep.name))
    })
    .collect::<Result<Vec<_>>>()?;

  if format.is_json() {
    return print_json(&statuses);
  }

  if statuses.is_empty() {
    print_info("No dependencies declared.");
    return Ok(());
  }
  for status in &statuses {
    print_status(status);
  }
  Ok(())
}

fn print_status(status: &DependencyStatus) {
  if status.is_current() {
    print_success(&status.name);
  } else if status.source_stamp.is_none() {
    print_warning(&format!("{} (never processed)", status.name));
  } else {
    print_warning(&format!("{} (stale)", status.name));
  }

  print_stat("Project", &status.project_dir.display().to_string());
  print_stat("Source", &status.source_dir.display().to_string());
  print_stat(
    "Source stamp",
    match (&status.source_stamp, status.source_current) {
      (None, _) => "missing",
      (Some(_), true) => "current",
      (Some(_), false) => "changed",
    },
  );
  print_stat(
    "Storage version",
    &match &status.storage_version {
      Some(version) if status.storage_current => version.clone(),
      Some(version) => format!("{} (outdated)", version),
      None => "missing".to_string(),
    },
  );

  for cfg in &status.configurations {
    let hash = |h: &Option<depforge_lib::util::hash::ContentHash>| {
      h.as_ref()
        .map(|h| truncate_hash(&h.0).to_string())
        .unwrap_or_else(|| "-".to_string())
    };
    print_stat(
      &cfg.name,
      &format!(
        "configure {} build {}{}",
        hash(&cfg.configure_hash),
        hash(&cfg.build_hash),
        if cfg.built { "" } else { " (not built)" }
      ),
    );
  }
}
