//! The per-dependency decision engine.
//!
//! Processing one dependency walks these phases:
//!
//! 1. Normalise the descriptor (usage errors surface before any side effect)
//! 2. Compare the source stamp and storage version; discard stale directories
//! 3. Synchronise the source
//! 4. Regenerate configure/build scripts per configuration and run the steps
//!    whose script content changed, or when the source moved
//! 5. Fold the dependency's own package manifests into the package list and
//!    locate every package
//! 6. Commit the step hashes, the storage version and finally the source stamp
//!
//! Any failure before step 6 leaves the stored fingerprints as they were, so the
//! next run retries the same work. In fast mode only step 5 runs.

mod types;

pub use types::{
  ConfigurationReport, Invalidation, OrchestrateError, Phase, ProcessReport, RunReason, SessionReport, StepDecision,
};

use std::path::PathBuf;

use tracing::{debug, info};

use crate::backend::BuildBackend;
use crate::consts::MANIFEST_FILENAME;
use crate::descriptor::{Declarations, DependencyDescriptor, ResolvedDependency, normalize};
use crate::discovery::Discovery;
use crate::exec::{CommandRunner, script_invocation};
use crate::fingerprint::FingerprintStore;
use crate::layout::ProjectDirs;
use crate::propagate::{PackageList, read_manifest, write_manifest};
use crate::script::{ScriptContext, StepKind, StepScript, generate_step};
use crate::settings::Settings;
use crate::source::{SyncOutcome, synchronize};
use crate::util::hash::ContentHash;

/// Step hashes waiting for the commit point.
struct PendingHashes {
  configuration: String,
  configure: ContentHash,
  build: ContentHash,
}

pub struct Orchestrator<'a> {
  settings: &'a Settings,
  runner: &'a dyn CommandRunner,
  backend: BuildBackend,
}

impl<'a> Orchestrator<'a> {
  pub fn new(settings: &'a Settings, runner: &'a dyn CommandRunner) -> Self {
    Self {
      backend: settings.backend(),
      settings,
      runner,
    }
  }

  /// Process `descriptors` in order, threading the package list through, and
  /// write the package manifest into the output directory after each one.
  ///
  /// Every descriptor is validated before the first one is processed.
  pub fn process_all(
    &self,
    descriptors: &[DependencyDescriptor],
    declarations: &Declarations,
  ) -> Result<SessionReport, OrchestrateError> {
    for descriptor in descriptors {
      normalize(descriptor, declarations, &self.settings.root_dir)?;
    }

    let output_dir = &self.settings.output_dir;
    let manifest = std::path::absolute(output_dir)
      .map_err(|source| OrchestrateError::OutputDir {
        path: output_dir.clone(),
        source,
      })?
      .join(MANIFEST_FILENAME);
    let mut packages = PackageList::new();
    let mut reports = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
      let (report, next) = self.process(descriptor, declarations, packages)?;
      packages = next;
      write_manifest(&manifest, &packages)?;
      reports.push(report);
    }
    if descriptors.is_empty() {
      write_manifest(&manifest, &packages)?;
    }

    info!(
      dependencies = reports.len(),
      packages = packages.len(),
      manifest = %manifest.display(),
      "all dependencies processed"
    );

    Ok(SessionReport {
      dependencies: reports,
      packages,
      manifest,
    })
  }

  /// Process one dependency. Takes the accumulated package list and returns
  /// it extended with this dependency's packages.
  pub fn process(
    &self,
    descriptor: &DependencyDescriptor,
    declarations: &Declarations,
    packages: PackageList,
  ) -> Result<(ProcessReport, PackageList), OrchestrateError> {
    let dep = normalize(descriptor, declarations, &self.settings.root_dir)?;
    let dirs = ProjectDirs::new(&dep.root_dir, &dep.name, &dep.source);
    let store = FingerprintStore::new(&dirs.state);

    let mut report = ProcessReport::new(&dep.name, &dep.package);
    report.fetch_only = dep.fetch_only;
    enter(&dep, Phase::Unchecked);

    if self.settings.fast_mode {
      report.fast_mode = true;
      if dep.fetch_only {
        info!(dep = %dep.name, "fast mode: fetch-only dependency skipped");
        return Ok((report, packages));
      }
      info!(dep = %dep.name, "fast mode: skipping synchronisation and build");
      let packages = self.propagate(&dep, &dirs, packages, &mut report)?;
      return Ok((report, packages));
    }

    report.invalidation = self.invalidate(&dep, &dirs, &store)?;

    let outcome = synchronize(self.runner, &self.settings.git_program, &dep.source, &dirs.source)?;
    enter(&dep, Phase::SourceChecked);
    report.source = Some(outcome.clone());

    if dep.fetch_only {
      info!(dep = %dep.name, "fetch only: skipping build and discovery");
      self.commit(&dep, &store, &[])?;
      return Ok((report, packages));
    }

    let mut pending = Vec::with_capacity(dep.configurations.len());
    for cfg in &dep.configurations {
      let cfg_dirs = dirs.config(&cfg.name);
      let ctx = ScriptContext {
        dependency: &dep.name,
        backend: &self.backend,
        source_dir: &dirs.source,
        build_dir: &cfg_dirs.build,
        install_prefix: &dirs.package,
        configuration: cfg,
        packages: &packages,
      };
      let configure = generate_step(StepKind::Configure, &ctx, &store)?;
      let build = generate_step(StepKind::Build, &ctx, &store)?;
      enter(&dep, Phase::ScriptsGenerated);

      let reasons = run_reasons(&configure, &build, &outcome, cfg_dirs.build.is_dir());
      let decision = if reasons.is_empty() {
        debug!(dep = %dep.name, config = %cfg.name, "configure and build up to date");
        enter(&dep, Phase::ConfigureSkipped);
        enter(&dep, Phase::BuildSkipped);
        StepDecision::Skipped
      } else {
        info!(dep = %dep.name, config = %cfg.name, ?reasons, "steps needed");
        enter(&dep, Phase::ConfigureNeeded);
        self.run_step(&dep, &cfg.name, &configure)?;
        enter(&dep, Phase::BuildNeeded);
        self.run_step(&dep, &cfg.name, &build)?;
        StepDecision::Ran { reasons }
      };

      if let Some(output) = &cfg.output {
        report.bindings.insert(output.clone(), cfg_dirs.build.clone());
      }
      report.configurations.push(ConfigurationReport {
        name: cfg.name.clone(),
        build_dir: cfg_dirs.build,
        decision,
        configure_hash: configure.hash.clone(),
        build_hash: build.hash.clone(),
      });
      pending.push(PendingHashes {
        configuration: cfg.name.clone(),
        configure: configure.hash,
        build: build.hash,
      });
    }

    let packages = self.propagate(&dep, &dirs, packages, &mut report)?;
    self.commit(&dep, &store, &pending)?;

    Ok((report, packages))
  }

  /// Discard whatever the stored stamps say is stale.
  fn invalidate(
    &self,
    dep: &ResolvedDependency,
    dirs: &ProjectDirs,
    store: &FingerprintStore,
  ) -> Result<Invalidation, OrchestrateError> {
    let stamp = dep.source.stamp();
    let invalidation = match store.source_stamp()? {
      None if !dirs.project.exists() => Invalidation::FirstRun,
      None => Invalidation::Unstamped,
      Some(previous) if previous != stamp => Invalidation::SourceChanged {
        previous: previous.encode(),
      },
      Some(_) => {
        let current = self.settings.storage_version.to_string();
        match store.storage_version()? {
          Some(stored) if stored == current => Invalidation::Unchanged,
          previous => Invalidation::StorageVersion { previous },
        }
      }
    };

    let wiped = match &invalidation {
      Invalidation::Unchanged | Invalidation::FirstRun => Ok(()),
      Invalidation::SourceChanged { .. } => dirs.wipe_all(),
      Invalidation::Unstamped | Invalidation::StorageVersion { .. } => dirs.wipe_artifacts(),
    };
    wiped.map_err(|source| OrchestrateError::Wipe {
      path: dirs.project.clone(),
      source,
    })?;

    if !matches!(invalidation, Invalidation::Unchanged | Invalidation::FirstRun) {
      info!(dep = %dep.name, ?invalidation, "stale state discarded");
    }
    Ok(invalidation)
  }

  fn run_step(&self, dep: &ResolvedDependency, configuration: &str, script: &StepScript) -> Result<(), OrchestrateError> {
    info!(dep = %dep.name, config = %configuration, step = %script.kind, "running step");
    self
      .runner
      .run(&script_invocation(&script.path))
      .map_err(|source| OrchestrateError::Step {
        dependency: dep.name.clone(),
        configuration: configuration.to_string(),
        step: script.kind,
        source,
      })?;
    Ok(())
  }

  /// Fold in the dependency's own manifests, add its package directory and
  /// locate every package.
  fn propagate(
    &self,
    dep: &ResolvedDependency,
    dirs: &ProjectDirs,
    mut packages: PackageList,
    report: &mut ProcessReport,
  ) -> Result<PackageList, OrchestrateError> {
    let mut nested: Vec<PathBuf> = Vec::new();
    for cfg in &dep.configurations {
      let manifest = dirs.config(&cfg.name).build.join(MANIFEST_FILENAME);
      if let Some(listed) = read_manifest(&manifest)? {
        debug!(dep = %dep.name, manifest = %manifest.display(), count = listed.len(), "nested package manifest read");
        nested.extend(listed);
      }
    }
    report.inherited = packages.merge(nested);
    packages.push(dirs.package.clone());

    let discovery = Discovery::new(self.runner, self.settings.pkg_config_program.clone());
    for prefix in &report.inherited {
      report
        .transitive
        .extend(discovery.discover_prefix(prefix, packages.as_slice()));
    }

    let search: Vec<PathBuf> = std::iter::once(dirs.package.clone())
      .chain(packages.iter().filter(|p| **p != dirs.package).cloned())
      .collect();
    let found = discovery.find(&dep.package, &search)?;
    info!(
      dep = %dep.name,
      package = %found.name,
      method = ?found.method,
      inherited = report.inherited.len(),
      "package located"
    );
    report.found = Some(found);
    enter(dep, Phase::Propagated);

    Ok(packages)
  }

  /// Persist the fingerprints of a completed pass. The source stamp goes last.
  fn commit(
    &self,
    dep: &ResolvedDependency,
    store: &FingerprintStore,
    pending: &[PendingHashes],
  ) -> Result<(), OrchestrateError> {
    for hashes in pending {
      store.write_step_hash(&hashes.configuration, StepKind::Configure, &hashes.configure)?;
      store.write_step_hash(&hashes.configuration, StepKind::Build, &hashes.build)?;
    }
    store.write_storage_version(self.settings.storage_version)?;
    store.write_source_stamp(&dep.source.stamp())?;
    enter(dep, Phase::Stamped);
    Ok(())
  }
}

fn enter(dep: &ResolvedDependency, phase: Phase) {
  debug!(dep = %dep.name, %phase, "phase");
}

fn run_reasons(configure: &StepScript, build: &StepScript, outcome: &SyncOutcome, build_dir_exists: bool) -> Vec<RunReason> {
  let mut reasons = Vec::new();
  if configure.changed {
    reasons.push(RunReason::ConfigureScriptChanged);
  }
  if build.changed {
    reasons.push(RunReason::BuildScriptChanged);
  }
  if outcome.triggers_rebuild() {
    reasons.push(RunReason::SourceChanged);
  }
  if !build_dir_exists {
    reasons.push(RunReason::BuildDirMissing);
  }
  reasons
}
