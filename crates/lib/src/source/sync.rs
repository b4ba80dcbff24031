use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::git::{Git, RefKind};
use crate::descriptor::{GitSource, SourceSpec};
use crate::exec::{CommandRunner, ExecError};

#[derive(Debug, Error)]
pub enum SyncError {
  /// A plain local branch name was requested.
  #[error(
    "revision '{rev}' of '{url}' names a local branch; use a tag, a commit or a remote branch such as 'origin/{rev}'"
  )]
  AmbiguousBranch { url: String, rev: String },

  #[error("revision '{rev}' not found in '{url}'")]
  RevisionNotFound { url: String, rev: String },

  /// The Source directory exists but git does not treat it as a checkout.
  #[error("'{path}' exists but is not a git checkout; remove it to clone afresh")]
  NotACheckout { path: PathBuf },

  #[error("failed to create directory '{path}': {source}")]
  CreateDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error(transparent)]
  Exec(#[from] ExecError),
}

/// What synchronisation did to the Source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
  /// Freshly cloned and checked out.
  Cloned { commit: String },
  /// Already at the requested commit.
  UpToDate { commit: String },
  /// Moved from one commit to another.
  Updated { from: Option<String>, to: String },
  /// The working tree has local modifications and was left alone.
  DirtySkipped,
  /// A local source; nothing to synchronise.
  Local,
}

impl SyncOutcome {
  /// Whether the source may differ from what the last build saw.
  pub fn triggers_rebuild(&self) -> bool {
    matches!(
      self,
      SyncOutcome::Cloned { .. } | SyncOutcome::Updated { .. } | SyncOutcome::Local
    )
  }
}

/// Bring `dir` to the state `source` asks for.
///
/// Any failing clone, fetch or checkout aborts with an error. A dirty working
/// tree is never modified.
pub fn synchronize(
  runner: &dyn CommandRunner,
  git_program: &str,
  source: &SourceSpec,
  dir: &Path,
) -> Result<SyncOutcome, SyncError> {
  match source {
    SourceSpec::Local { path } => {
      debug!(path = %path.display(), "local source, nothing to synchronise");
      Ok(SyncOutcome::Local)
    }
    SourceSpec::Git(git) => synchronize_git(runner, git_program, git, dir),
  }
}

fn synchronize_git(
  runner: &dyn CommandRunner,
  program: &str,
  source: &GitSource,
  dir: &Path,
) -> Result<SyncOutcome, SyncError> {
  let cloned = !dir.exists();
  let git = if cloned {
    if let Some(parent) = dir.parent() {
      fs::create_dir_all(parent).map_err(|e| SyncError::CreateDir {
        path: parent.to_path_buf(),
        source: e,
      })?;
    }
    Git::clone_into(runner, program, source, dir)?
  } else {
    let git = Git::new(runner, program, dir);
    let dirty = git.is_dirty()?.ok_or_else(|| SyncError::NotACheckout {
      path: dir.to_path_buf(),
    })?;
    if dirty {
      warn!(
        path = %dir.display(),
        rev = %source.rev,
        "source has local modifications, skipping update"
      );
      return Ok(SyncOutcome::DirtySkipped);
    }
    git
  };

  let kind = git.classify(&source.rev)?;
  if kind == RefKind::LocalBranch {
    return Err(SyncError::AmbiguousBranch {
      url: source.url.clone(),
      rev: source.rev.clone(),
    });
  }

  if !cloned && needs_fetch(&git, kind, &source.rev)? {
    git.fetch()?;
    git.update_submodules(source)?;
  }

  let target = git.resolve(&source.rev)?.ok_or_else(|| SyncError::RevisionNotFound {
    url: source.url.clone(),
    rev: source.rev.clone(),
  })?;
  let head = git.head()?;

  if head.as_deref() == Some(target.as_str()) {
    debug!(commit = %target, "source up to date");
    return Ok(if cloned {
      SyncOutcome::Cloned { commit: target }
    } else {
      SyncOutcome::UpToDate { commit: target }
    });
  }

  git.checkout(&target, source.submodules)?;
  git.update_submodules(source)?;
  info!(from = ?head, to = %target, "source updated");

  Ok(if cloned {
    SyncOutcome::Cloned { commit: target }
  } else {
    SyncOutcome::Updated { from: head, to: target }
  })
}

/// Tracking refs always refetch; a commit only when it is not checked out.
fn needs_fetch(git: &Git<'_>, kind: RefKind, rev: &str) -> Result<bool, ExecError> {
  match kind {
    RefKind::Tracking => Ok(true),
    RefKind::LocalBranch => Ok(false),
    RefKind::CommitLike => {
      let head = git.head()?;
      let target = git.resolve(rev)?;
      Ok(head.is_none() || target.is_none() || head != target)
    }
  }
}
