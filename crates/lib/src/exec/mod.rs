//! Synchronous subprocess execution.
//!
//! Every external tool (the VCS client, the build system, generated step
//! scripts, pkg-config) runs through a [`CommandRunner`]. Runs block until the
//! child exits; stdout and stderr are captured. A nonzero exit is an error
//! unless the caller asked for failure capture with
//! [`CommandSpec::allow_failure`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while running a subprocess.
#[derive(Debug, Error)]
pub enum ExecError {
  /// The program could not be started at all.
  #[error("failed to spawn '{program}': {source}")]
  Spawn {
    program: String,
    #[source]
    source: std::io::Error,
  },

  /// The program ran and exited unsuccessfully.
  #[error("command failed with exit code {code:?}: {cmd}{}", format_stderr(.stderr))]
  Failed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },
}

fn format_stderr(stderr: &str) -> String {
  let trimmed = stderr.trim();
  if trimmed.is_empty() {
    String::new()
  } else {
    format!("\n{}", trimmed)
  }
}

/// A fully described subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
  pub program: String,
  pub args: Vec<String>,
  pub cwd: Option<PathBuf>,
  /// Variables added on top of the inherited environment.
  pub env: BTreeMap<String, String>,
  /// Return nonzero exits as output instead of failing.
  pub allow_failure: bool,
}

impl CommandSpec {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: None,
      env: BTreeMap::new(),
      allow_failure: false,
    }
  }

  pub fn arg(mut self, arg: impl Into<String>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
    self.cwd = Some(dir.into());
    self
  }

  pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.env.insert(key.into(), value.into());
    self
  }

  pub fn allow_failure(mut self) -> Self {
    self.allow_failure = true;
    self
  }

  /// The command line as a single string, for logs and error messages.
  pub fn display(&self) -> String {
    std::iter::once(self.program.as_str())
      .chain(self.args.iter().map(String::as_str))
      .collect::<Vec<_>>()
      .join(" ")
  }
}

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
  /// Exit code, `None` when the process was killed by a signal.
  pub code: Option<i32>,
  pub stdout: String,
  pub stderr: String,
}

impl CommandOutput {
  pub fn success(&self) -> bool {
    self.code == Some(0)
  }

  /// Successful output with the given stdout.
  pub fn ok(stdout: impl Into<String>) -> Self {
    Self {
      code: Some(0),
      stdout: stdout.into(),
      stderr: String::new(),
    }
  }

  /// Failed output with the given exit code.
  pub fn failed(code: i32) -> Self {
    Self {
      code: Some(code),
      stdout: String::new(),
      stderr: String::new(),
    }
  }
}

/// Runs subprocesses on behalf of the synchroniser, orchestrator and discovery.
pub trait CommandRunner {
  /// Start the process, wait for it and capture its output, whatever the exit code.
  fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError>;

  /// Like [`execute`](Self::execute), but a nonzero exit is an error unless
  /// `spec.allow_failure` is set.
  fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
    let output = self.execute(spec)?;

    if !output.success() && !spec.allow_failure {
      if !output.stdout.is_empty() {
        debug!(stdout = %output.stdout, "command stdout");
      }
      return Err(ExecError::Failed {
        cmd: spec.display(),
        code: output.code,
        stderr: output.stderr,
      });
    }

    Ok(output)
  }
}

/// Runs commands with [`std::process::Command`], inheriting the environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
  fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
    info!(cmd = %spec.display(), "executing command");

    let mut command = Command::new(&spec.program);
    command.args(&spec.args).envs(&spec.env);
    if let Some(cwd) = &spec.cwd {
      command.current_dir(cwd);
    }

    debug!(working_dir = ?spec.cwd, "spawning process");

    let output = command.output().map_err(|source| ExecError::Spawn {
      program: spec.program.clone(),
      source,
    })?;

    let result = CommandOutput {
      code: output.status.code(),
      stdout: String::from_utf8_lossy(&output.stdout).to_string(),
      stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    if !result.stderr.is_empty() {
      debug!(stderr = %result.stderr, "command stderr");
    }

    Ok(result)
  }
}

/// The invocation that runs a generated step script with the platform shell.
///
/// Scripts are always handed to `/bin/sh` (Unix) or `cmd.exe` (Windows)
/// rather than the user's `$SHELL`, so profile files cannot alter the step.
#[cfg(unix)]
pub fn script_invocation(script: &Path) -> CommandSpec {
  CommandSpec::new("/bin/sh").arg(script.to_string_lossy())
}

#[cfg(windows)]
pub fn script_invocation(script: &Path) -> CommandSpec {
  CommandSpec::new("cmd.exe").arg("/C").arg(script.to_string_lossy())
}
