//! Generated configure and build scripts.
//!
//! Each configuration gets a `configure` and a `build` script in its State
//! directory. Scripts are rewritten on every pass so they can be inspected and
//! rerun by hand; whether a step must run is decided by comparing the hash of
//! the fresh content with the hash stored after the step last succeeded.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::backend::{BuildBackend, SEARCH_PATH_ENV};
use crate::consts::{APP_NAME, OUTPUT_DIR_ENV};
use crate::descriptor::ResolvedConfiguration;
use crate::fingerprint::{FingerprintError, FingerprintStore};
use crate::propagate::PackageList;
use crate::util::hash::{ContentHash, hash_bytes};

#[derive(Debug, Error)]
pub enum ScriptError {
  #[error("package search path cannot be expressed on this platform: {0}")]
  PathList(#[from] std::env::JoinPathsError),

  #[error("failed to write script '{path}': {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error(transparent)]
  Fingerprint(#[from] FingerprintError),
}

/// The two steps run for every configuration, configure first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
  Configure,
  Build,
}

impl StepKind {
  pub const ALL: [StepKind; 2] = [StepKind::Configure, StepKind::Build];

  pub fn file_stem(self) -> &'static str {
    match self {
      StepKind::Configure => "configure",
      StepKind::Build => "build",
    }
  }

  pub fn script_file_name(self) -> String {
    format!("{}.{}", self.file_stem(), SCRIPT_EXTENSION)
  }

  pub fn hash_file_name(self) -> String {
    format!("{}.hash", self.file_stem())
  }
}

impl std::fmt::Display for StepKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.file_stem())
  }
}

#[cfg(unix)]
const SCRIPT_EXTENSION: &str = "sh";
#[cfg(windows)]
const SCRIPT_EXTENSION: &str = "cmd";

/// Everything a step script depends on.
#[derive(Debug, Clone, Copy)]
pub struct ScriptContext<'a> {
  pub dependency: &'a str,
  pub backend: &'a BuildBackend,
  pub source_dir: &'a Path,
  /// The configuration's Build directory.
  pub build_dir: &'a Path,
  /// The shared Package directory.
  pub install_prefix: &'a Path,
  pub configuration: &'a ResolvedConfiguration,
  /// Packages visible to the build system while the step runs.
  pub packages: &'a PackageList,
}

impl ScriptContext<'_> {
  fn argv(&self, kind: StepKind) -> Vec<String> {
    let cfg = self.configuration;
    match kind {
      StepKind::Configure => self.backend.configure_args(
        self.source_dir,
        self.build_dir,
        self.install_prefix,
        &cfg.name,
        &cfg.configure_options,
      ),
      StepKind::Build => self.backend.build_args(self.build_dir, &cfg.name, &cfg.build_options),
    }
  }

  fn environment(&self) -> Result<Vec<(&'static str, String)>, ScriptError> {
    let mut env = Vec::new();
    if !self.packages.is_empty() {
      let search_path = self.packages.to_search_path()?;
      env.push((SEARCH_PATH_ENV, search_path.to_string_lossy().into_owned()));
    }
    env.push((OUTPUT_DIR_ENV, self.build_dir.display().to_string()));
    Ok(env)
  }
}

/// A script written to disk, with its freshness verdict.
#[derive(Debug, Clone)]
pub struct StepScript {
  pub kind: StepKind,
  pub path: PathBuf,
  pub hash: ContentHash,
  /// The content differs from what last ran successfully (or nothing has).
  pub changed: bool,
}

/// Render the text of a step script.
pub fn render(kind: StepKind, ctx: &ScriptContext<'_>) -> Result<String, ScriptError> {
  let header = format!(
    "Generated by {}: {} step of {} ({})",
    APP_NAME, kind, ctx.dependency, ctx.configuration.name
  );
  Ok(render_script(&header, &ctx.environment()?, ctx.build_dir, &ctx.argv(kind)))
}

/// Write the script for `kind` into the configuration's State directory and
/// compare its hash with the stored one.
pub fn generate_step(
  kind: StepKind,
  ctx: &ScriptContext<'_>,
  store: &FingerprintStore,
) -> Result<StepScript, ScriptError> {
  let content = render(kind, ctx)?;
  let hash = hash_bytes(content.as_bytes());

  let dir = store.configuration_dir(&ctx.configuration.name);
  let path = dir.join(kind.script_file_name());
  write_script(&dir, &path, &content)?;

  let previous = store.step_hash(&ctx.configuration.name, kind)?;
  let changed = previous.as_ref() != Some(&hash);

  debug!(
    dep = %ctx.dependency,
    config = %ctx.configuration.name,
    step = %kind,
    hash = %hash.short(),
    changed,
    "step script generated"
  );

  Ok(StepScript {
    kind,
    path,
    hash,
    changed,
  })
}

fn write_script(dir: &Path, path: &Path, content: &str) -> Result<(), ScriptError> {
  let write_err = |source| ScriptError::Write {
    path: path.to_path_buf(),
    source,
  };
  fs::create_dir_all(dir).map_err(write_err)?;
  fs::write(path, content).map_err(write_err)?;

  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(write_err)?;
  }

  Ok(())
}

#[cfg(unix)]
fn render_script(header: &str, env: &[(&str, String)], workdir: &Path, argv: &[String]) -> String {
  let mut out = String::from("#!/bin/sh\n");
  out.push_str(&format!("# {}\n", header));
  out.push_str("set -e\n");
  for (key, value) in env {
    out.push_str(&format!("{}={}\nexport {}\n", key, sh_quote(value), key));
  }
  let workdir = sh_quote(&workdir.display().to_string());
  out.push_str(&format!("mkdir -p {}\ncd {}\n", workdir, workdir));
  let command: Vec<String> = argv.iter().map(|arg| sh_quote(arg)).collect();
  out.push_str(&format!("exec {}\n", command.join(" ")));
  out
}

#[cfg(unix)]
fn sh_quote(value: &str) -> String {
  format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(windows)]
fn render_script(header: &str, env: &[(&str, String)], workdir: &Path, argv: &[String]) -> String {
  let mut out = String::from("@echo off\r\n");
  out.push_str(&format!("rem {}\r\n", header));
  for (key, value) in env {
    out.push_str(&format!("set \"{}={}\"\r\n", key, value.replace('%', "%%")));
  }
  let workdir = cmd_quote(&workdir.display().to_string());
  out.push_str(&format!("if not exist {} mkdir {}\r\n", workdir, workdir));
  out.push_str(&format!("cd /d {} || exit /b 1\r\n", workdir));
  let command: Vec<String> = argv.iter().map(|arg| cmd_quote(arg)).collect();
  out.push_str(&format!("{}\r\n", command.join(" ")));
  out.push_str("exit /b %ERRORLEVEL%\r\n");
  out
}

#[cfg(windows)]
fn cmd_quote(value: &str) -> String {
  format!("\"{}\"", value.replace('"', "\"\"").replace('%', "%%"))
}
