//! Implementation of the `depforge fetch` command.
//!
//! Loads a descriptor file and runs one processing pass over its dependencies,
//! then prints what was decided for each one.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::debug;

use depforge_lib::exec::SystemRunner;
use depforge_lib::orchestrate::{Invalidation, Orchestrator, ProcessReport, RunReason, SessionReport, StepDecision};
use depforge_lib::settings::Settings;
use depforge_lib::source::SyncOutcome;

use crate::output::{
  OutputFormat, format_duration, print_info, print_json, print_stat, print_success, print_warning, symbols,
  truncate_hash,
};

pub fn cmd_fetch(
  file: &Path,
  output: Option<PathBuf>,
  root: Option<PathBuf>,
  fast: bool,
  format: OutputFormat,
) -> Result<()> {
  let deps = super::load(file)?;

  let mut settings = Settings::from_env();
  if let Some(output) = output {
    settings.output_dir = output;
  }
  if let Some(root) = root {
    settings.root_dir = root;
  }
  settings.fast_mode |= fast;
  if deps.generator.is_some() {
    settings.generator = deps.generator.clone();
  }
  if deps.toolchain.is_some() {
    settings.toolchain_file = deps.toolchain.clone();
  }

  debug!(
    file = %file.display(),
    root = %settings.root_dir.display(),
    fast = settings.fast_mode,
    dependencies = deps.dependencies.len(),
    "starting fetch"
  );
  let runner = SystemRunner;
  let started = Instant::now();
  let session = Orchestrator::new(&settings, &runner)
    .process_all(&deps.dependencies, &deps.declarations)
    .context("Fetch failed")?;

  if format.is_json() {
    return print_json(&session);
  }
  print_session(&session, started.elapsed());
  Ok(())
}

fn print_session(session: &SessionReport, elapsed: std::time::Duration) {
  for report in &session.dependencies {
    print_dependency(report);
  }
  println!();
  print_success(&format!(
    "{} dependencies processed in {}",
    session.dependencies.len(),
    format_duration(elapsed)
  ));
  print_stat("Packages", &session.packages.len().to_string());
  print_stat("Manifest", &session.manifest.display().to_string());
}

fn print_dependency(report: &ProcessReport) {
  let mut headline = report.dependency.clone();
  if report.package != report.dependency {
    headline.push_str(&format!(" (package {})", report.package));
  }
  if report.fast_mode {
    headline.push_str(" [fast]");
  }
  print_info(&headline);

  if let Some(note) = describe_invalidation(&report.invalidation) {
    print_stat("Discarded", note);
  }
  if let Some(source) = &report.source {
    if *source == SyncOutcome::DirtySkipped {
      print_warning(&format!("{}: local modifications, source left untouched", report.dependency));
    }
    print_stat("Source", &describe_source(source));
  }

  for cfg in &report.configurations {
    let decision = match &cfg.decision {
      StepDecision::Skipped => "up to date".to_string(),
      StepDecision::Ran { reasons } => {
        let reasons: Vec<&str> = reasons.iter().map(describe_reason).collect();
        format!("configured and built ({})", reasons.join(", "))
      }
    };
    print_stat(&cfg.name, &decision);
  }

  for (name, dir) in &report.bindings {
    print_stat(name, &format!("{} {}", symbols::ARROW, dir.display()));
  }
  if let Some(found) = &report.found {
    let location = found
      .location
      .as_ref()
      .or(found.prefix.as_ref())
      .map(|p| p.display().to_string())
      .unwrap_or_default();
    print_stat("Package", &format!("{:?} {}", found.method, location));
  }
  for package in &report.transitive {
    print_stat("Transitive", &package.name);
  }
}

fn describe_invalidation(invalidation: &Invalidation) -> Option<&'static str> {
  match invalidation {
    Invalidation::Unchanged => None,
    Invalidation::FirstRun => Some("first run"),
    Invalidation::Unstamped => Some("incomplete earlier run"),
    Invalidation::SourceChanged { .. } => Some("source location changed"),
    Invalidation::StorageVersion { .. } => Some("storage layout changed"),
  }
}

fn describe_reason(reason: &RunReason) -> &'static str {
  match reason {
    RunReason::ConfigureScriptChanged => "configure script changed",
    RunReason::BuildScriptChanged => "build script changed",
    RunReason::SourceChanged => "source changed",
    RunReason::BuildDirMissing => "build directory missing",
  }
}

fn describe_source(source: &SyncOutcome) -> String {
  match source {
    SyncOutcome::Cloned { commit } => format!("cloned at {}", truncate_hash(commit)),
    SyncOutcome::UpToDate { commit } => format!("at {}", truncate_hash(commit)),
    SyncOutcome::Updated { from, to } => format!(
      "{} {} {}",
      from.as_deref().map(truncate_hash).unwrap_or("?"),
      symbols::ARROW,
      truncate_hash(to)
    ),
    SyncOutcome::DirtySkipped => "modified locally".to_string(),
    SyncOutcome::Local => "local".to_string(),
  }
}
