//! A thin git client over a [`CommandRunner`].
//!
//! Every operation maps to exactly one `git` invocation inside the checkout.
//! Queries whose failure carries meaning (`status`, `show-ref`, `rev-parse`) capture the
//! exit code instead of failing.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::descriptor::GitSource;
use crate::exec::{CommandRunner, CommandSpec, ExecError};

/// How a requested revision relates to the refs of the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
  /// A tag or remote-tracking branch; its target may move upstream.
  Tracking,
  /// A local branch name. Updating it has no well-defined meaning.
  LocalBranch,
  /// Anything else: a commit hash or an abbreviation of one.
  CommitLike,
}

pub struct Git<'a> {
  runner: &'a dyn CommandRunner,
  program: &'a str,
  dir: PathBuf,
}

impl<'a> Git<'a> {
  pub fn new(runner: &'a dyn CommandRunner, program: &'a str, dir: impl Into<PathBuf>) -> Self {
    Self {
      runner,
      program,
      dir: dir.into(),
    }
  }

  /// `git clone [--recurse-submodules] <url> <dir>`, then a client for the new checkout.
  pub fn clone_into(
    runner: &'a dyn CommandRunner,
    program: &'a str,
    source: &GitSource,
    dir: &Path,
  ) -> Result<Self, ExecError> {
    info!(url = %source.url, path = %dir.display(), "cloning repository");
    let mut spec = CommandSpec::new(program).arg("clone");
    if source.submodules {
      spec = spec.arg("--recurse-submodules");
    }
    spec = spec.arg(&source.url).arg(dir.to_string_lossy());
    runner.run(&spec)?;
    Ok(Self::new(runner, program, dir))
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn command(&self) -> CommandSpec {
    CommandSpec::new(self.program).current_dir(&self.dir)
  }

  /// Whether `status --porcelain` reports anything, or `None` when git does
  /// not recognise the directory as a checkout.
  pub fn is_dirty(&self) -> Result<Option<bool>, ExecError> {
    let output = self
      .runner
      .run(&self.command().args(["status", "--porcelain"]).allow_failure())?;
    if !output.success() {
      debug!(path = %self.dir.display(), stderr = %output.stderr.trim(), "status failed");
      return Ok(None);
    }
    Ok(Some(!output.stdout.trim().is_empty()))
  }

  /// Classify `rev` by the refs `show-ref` matches.
  pub fn classify(&self, rev: &str) -> Result<RefKind, ExecError> {
    let output = self
      .runner
      .run(&self.command().args(["show-ref", rev]).allow_failure())?;
    if !output.success() {
      return Ok(RefKind::CommitLike);
    }

    let refs: Vec<&str> = output
      .stdout
      .lines()
      .filter_map(|line| line.split_whitespace().nth(1))
      .collect();
    debug!(rev, ?refs, "show-ref matches");

    if refs.iter().any(|r| r.starts_with("refs/heads/")) {
      Ok(RefKind::LocalBranch)
    } else if refs
      .iter()
      .any(|r| r.starts_with("refs/remotes/") || r.starts_with("refs/tags/"))
    {
      Ok(RefKind::Tracking)
    } else {
      Ok(RefKind::CommitLike)
    }
  }

  /// The commit `rev` points at, or `None` if git cannot resolve it.
  pub fn resolve(&self, rev: &str) -> Result<Option<String>, ExecError> {
    let output = self
      .runner
      .run(&self.command().arg("rev-parse").arg(format!("{}^0", rev)).allow_failure())?;
    if !output.success() {
      return Ok(None);
    }
    let commit = output.stdout.trim();
    Ok((!commit.is_empty()).then(|| commit.to_string()))
  }

  /// The checked-out commit.
  pub fn head(&self) -> Result<Option<String>, ExecError> {
    self.resolve("HEAD")
  }

  /// `fetch` followed by `fetch --tags`.
  pub fn fetch(&self) -> Result<(), ExecError> {
    info!(path = %self.dir.display(), "fetching");
    self.runner.run(&self.command().arg("fetch"))?;
    self.runner.run(&self.command().args(["fetch", "--tags"]))?;
    Ok(())
  }

  /// Detached checkout of `commit`.
  pub fn checkout(&self, commit: &str, recurse_submodules: bool) -> Result<(), ExecError> {
    info!(path = %self.dir.display(), commit, "checking out");
    let mut spec = self
      .command()
      .args(["-c", "advice.detachedHead=false", "checkout"]);
    if recurse_submodules {
      spec = spec.arg("--recurse-submodules");
    }
    self.runner.run(&spec.arg(commit))?;
    Ok(())
  }

  /// `submodule update --init [--remote] [--recursive] [-- <paths>]`.
  ///
  /// Nothing runs when submodules are disabled and no paths are named.
  pub fn update_submodules(&self, source: &GitSource) -> Result<(), ExecError> {
    if !source.submodules && source.submodule_paths.is_empty() {
      return Ok(());
    }
    let mut spec = self.command().args(["submodule", "update", "--init"]);
    if source.submodule_remote {
      spec = spec.arg("--remote");
    }
    if source.submodules {
      spec = spec.arg("--recursive");
    }
    if !source.submodule_paths.is_empty() {
      spec = spec.arg("--").args(source.submodule_paths.iter().cloned());
    }
    self.runner.run(&spec)?;
    Ok(())
  }
}
