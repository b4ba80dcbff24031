//! Test doubles for depforge-lib.
//!
//! - [`FakeRunner`] records every command and answers through a closure.
//! - [`FakeWorld`] wraps a `FakeRunner` that simulates git remotes and
//!   checkouts, and step scripts that "install" a package into the
//!   dependency's Package directory, without touching the network or a real
//!   build system.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::consts::MANIFEST_FILENAME;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec, ExecError};
use crate::script::StepKind;

type Handler = Box<dyn Fn(&CommandSpec) -> Result<CommandOutput, ExecError>>;

/// Records commands and answers them with a closure.
pub struct FakeRunner {
  calls: RefCell<Vec<CommandSpec>>,
  handler: Handler,
}

impl FakeRunner {
  pub fn new(handler: impl Fn(&CommandSpec) -> Result<CommandOutput, ExecError> + 'static) -> Self {
    Self {
      calls: RefCell::new(Vec::new()),
      handler: Box::new(handler),
    }
  }

  /// Every command succeeds with empty output.
  pub fn succeed() -> Self {
    Self::new(|_| Ok(CommandOutput::ok("")))
  }

  pub fn calls(&self) -> Vec<CommandSpec> {
    self.calls.borrow().clone()
  }

  pub fn clear(&self) {
    self.calls.borrow_mut().clear();
  }
}

impl CommandRunner for FakeRunner {
  fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
    self.calls.borrow_mut().push(spec.clone());
    (self.handler)(spec)
  }
}

/// A published repository: ref name (`refs/heads/main`, `refs/tags/v1`) to commit.
#[derive(Debug, Clone, Default)]
struct Remote {
  refs: BTreeMap<String, String>,
  commits: BTreeSet<String>,
}

/// A checkout as git would see it after its last clone or fetch.
#[derive(Debug, Clone)]
struct Checkout {
  url: String,
  refs: BTreeMap<String, String>,
  commits: BTreeSet<String>,
  head: Option<String>,
  dirty: bool,
}

impl Checkout {
  fn sync_from(&mut self, remote: &Remote) {
    for (name, commit) in &remote.refs {
      if let Some(branch) = name.strip_prefix("refs/heads/") {
        self.refs.insert(format!("refs/remotes/origin/{}", branch), commit.clone());
      } else {
        self.refs.insert(name.clone(), commit.clone());
      }
    }
    self.commits.extend(remote.commits.iter().cloned());
  }

  /// Refs whose trailing path components equal `pattern`, like `git show-ref`.
  fn matching_refs(&self, pattern: &str) -> Vec<(&String, &String)> {
    let suffix = format!("/{}", pattern);
    self.refs.iter().filter(|(name, _)| name.ends_with(&suffix)).collect()
  }

  fn resolve(&self, rev: &str) -> Option<String> {
    if rev == "HEAD" {
      return self.head.clone();
    }
    for candidate in [
      rev.to_string(),
      format!("refs/{}", rev),
      format!("refs/tags/{}", rev),
      format!("refs/heads/{}", rev),
      format!("refs/remotes/{}", rev),
    ] {
      if let Some(commit) = self.refs.get(&candidate) {
        return Some(commit.clone());
      }
    }
    self.commits.contains(rev).then(|| rev.to_string())
  }
}

#[derive(Debug, Default)]
struct WorldState {
  remotes: HashMap<String, Remote>,
  checkouts: HashMap<PathBuf, Checkout>,
  failing_git: HashSet<String>,
  failing_steps: HashSet<(String, StepKind)>,
  not_installing: HashSet<String>,
  nested_manifests: HashMap<String, Vec<PathBuf>>,
}

/// A scripted environment for synchroniser and orchestrator tests.
pub struct FakeWorld {
  state: Rc<RefCell<WorldState>>,
  runner: FakeRunner,
}

impl Default for FakeWorld {
  fn default() -> Self {
    Self::new()
  }
}

impl FakeWorld {
  pub fn new() -> Self {
    let state = Rc::new(RefCell::new(WorldState::default()));
    let handler_state = Rc::clone(&state);
    let runner = FakeRunner::new(move |spec| Ok(handle(&mut handler_state.borrow_mut(), spec)));
    Self { state, runner }
  }

  pub fn runner(&self) -> &FakeRunner {
    &self.runner
  }

  /// Point `refname` of the repository at `url` to `commit`.
  pub fn publish(&self, url: &str, refname: &str, commit: &str) {
    let mut state = self.state.borrow_mut();
    let remote = state.remotes.entry(url.to_string()).or_default();
    remote.refs.insert(refname.to_string(), commit.to_string());
    remote.commits.insert(commit.to_string());
  }

  pub fn head(&self, dir: &Path) -> Option<String> {
    self.state.borrow().checkouts.get(dir).and_then(|c| c.head.clone())
  }

  pub fn set_dirty(&self, dir: &Path, dirty: bool) {
    if let Some(checkout) = self.state.borrow_mut().checkouts.get_mut(dir) {
      checkout.dirty = dirty;
    }
  }

  /// Make every `git <subcommand>` exit with status 128.
  pub fn fail_git(&self, subcommand: &str) {
    self.state.borrow_mut().failing_git.insert(subcommand.to_string());
  }

  /// Make the given step script of `dependency` exit with status 1.
  pub fn fail_step(&self, dependency: &str, step: StepKind) {
    self
      .state
      .borrow_mut()
      .failing_steps
      .insert((dependency.to_string(), step));
  }

  pub fn clear_failures(&self) {
    let mut state = self.state.borrow_mut();
    state.failing_git.clear();
    state.failing_steps.clear();
  }

  /// The build step of `dependency` installs nothing.
  pub fn install_nothing(&self, dependency: &str) {
    self.state.borrow_mut().not_installing.insert(dependency.to_string());
  }

  /// The build step of `dependency` writes a package manifest listing `packages`,
  /// as a nested depforge run would.
  pub fn nested_manifest(&self, dependency: &str, packages: Vec<PathBuf>) {
    self
      .state
      .borrow_mut()
      .nested_manifests
      .insert(dependency.to_string(), packages);
  }

  pub fn clear_calls(&self) {
    self.runner.clear();
  }

  /// Number of `git <subcommand>` invocations so far.
  pub fn git_calls(&self, subcommand: &str) -> usize {
    self
      .runner
      .calls()
      .iter()
      .filter(|spec| is_git(spec) && git_subcommand(spec) == Some(subcommand))
      .count()
  }

  /// Step scripts run so far, as `(dependency, configuration, step)`.
  pub fn step_runs(&self) -> Vec<(String, String, StepKind)> {
    self.runner.calls().iter().filter_map(step_of).collect()
  }
}

fn is_git(spec: &CommandSpec) -> bool {
  spec.program == "git"
}

fn is_shell(spec: &CommandSpec) -> bool {
  spec.program == "/bin/sh" || spec.program == "cmd.exe"
}

/// The subcommand, skipping `-c key=value` options.
fn git_subcommand(spec: &CommandSpec) -> Option<&str> {
  let mut args = spec.args.iter();
  while let Some(arg) = args.next() {
    if arg == "-c" {
      args.next();
      continue;
    }
    return Some(arg.as_str());
  }
  None
}

fn step_of(spec: &CommandSpec) -> Option<(String, String, StepKind)> {
  if !is_shell(spec) {
    return None;
  }
  let script = Path::new(spec.args.last()?);
  let step = match script.file_stem()?.to_str()? {
    "configure" => StepKind::Configure,
    "build" => StepKind::Build,
    _ => return None,
  };
  let config_dir = script.parent()?;
  let configuration = config_dir.file_name()?.to_str()?.to_string();
  let project = config_dir.parent()?.parent()?;
  let dependency = project.file_name()?.to_str()?.to_string();
  Some((dependency, configuration, step))
}

fn handle(state: &mut WorldState, spec: &CommandSpec) -> CommandOutput {
  if is_git(spec) {
    handle_git(state, spec)
  } else if is_shell(spec) {
    handle_step(state, spec)
  } else if spec.program == "pkg-config" {
    CommandOutput::failed(1)
  } else {
    CommandOutput::ok("")
  }
}

fn git_failure(subcommand: &str) -> CommandOutput {
  CommandOutput {
    code: Some(128),
    stdout: String::new(),
    stderr: format!("fatal: {} failed", subcommand),
  }
}

fn handle_git(state: &mut WorldState, spec: &CommandSpec) -> CommandOutput {
  let Some(subcommand) = git_subcommand(spec).map(str::to_string) else {
    return git_failure("git");
  };
  if state.failing_git.contains(&subcommand) {
    return git_failure(&subcommand);
  }

  if subcommand == "clone" {
    let mut positional = spec.args.iter().skip(1).filter(|a| !a.starts_with("--"));
    let (Some(url), Some(dir)) = (positional.next(), positional.next()) else {
      return git_failure("clone");
    };
    let Some(remote) = state.remotes.get(url).cloned() else {
      return git_failure("clone");
    };
    let dir = PathBuf::from(dir);
    if fs::create_dir_all(&dir).is_err() {
      return git_failure("clone");
    }
    let mut checkout = Checkout {
      url: url.clone(),
      refs: BTreeMap::new(),
      commits: BTreeSet::new(),
      head: remote.refs.get("refs/heads/main").cloned(),
      dirty: false,
    };
    checkout.sync_from(&remote);
    if let Some(head) = checkout.head.clone() {
      checkout.refs.insert("refs/heads/main".to_string(), head);
    }
    state.checkouts.insert(dir, checkout);
    return CommandOutput::ok("");
  }

  let Some(dir) = spec.cwd.clone() else {
    return git_failure(&subcommand);
  };
  let Some(checkout) = state.checkouts.get(&dir).cloned() else {
    return git_failure(&subcommand);
  };
  let last = spec.args.last().cloned().unwrap_or_default();

  match subcommand.as_str() {
    "status" => {
      if checkout.dirty {
        CommandOutput::ok(" M CMakeLists.txt\n")
      } else {
        CommandOutput::ok("")
      }
    }
    "show-ref" => {
      let matches = checkout.matching_refs(&last);
      if matches.is_empty() {
        return CommandOutput::failed(1);
      }
      let stdout: String = matches
        .iter()
        .map(|(name, commit)| format!("{} {}\n", commit, name))
        .collect();
      CommandOutput::ok(stdout)
    }
    "rev-parse" => {
      let rev = last.strip_suffix("^0").unwrap_or(&last);
      match checkout.resolve(rev) {
        Some(commit) => CommandOutput::ok(format!("{}\n", commit)),
        None => git_failure("rev-parse"),
      }
    }
    "fetch" => {
      let Some(remote) = state.remotes.get(&checkout.url).cloned() else {
        return git_failure("fetch");
      };
      if let Some(current) = state.checkouts.get_mut(&dir) {
        current.sync_from(&remote);
      }
      CommandOutput::ok("")
    }
    "checkout" => match checkout.resolve(&last) {
      Some(commit) => {
        if let Some(current) = state.checkouts.get_mut(&dir) {
          current.head = Some(commit);
        }
        CommandOutput::ok("")
      }
      None => git_failure("checkout"),
    },
    _ => CommandOutput::ok(""),
  }
}

fn handle_step(state: &mut WorldState, spec: &CommandSpec) -> CommandOutput {
  let Some((dependency, configuration, step)) = step_of(spec) else {
    return CommandOutput::failed(127);
  };
  if state.failing_steps.contains(&(dependency.clone(), step)) {
    return CommandOutput {
      code: Some(1),
      stdout: String::new(),
      stderr: format!("{} step of {} failed", step, dependency),
    };
  }

  let Some(project) = spec
    .args
    .last()
    .map(Path::new)
    .and_then(|script| script.parent()?.parent()?.parent())
    .map(Path::to_path_buf)
  else {
    return CommandOutput::failed(127);
  };
  let build_dir = project.join("build").join(&configuration);
  if fs::create_dir_all(&build_dir).is_err() {
    return CommandOutput::failed(1);
  }

  if step == StepKind::Build {
    if !state.not_installing.contains(&dependency) {
      let config_dir = project.join("package").join("lib").join("cmake").join(&dependency);
      let installed = fs::create_dir_all(&config_dir)
        .and_then(|_| fs::write(config_dir.join(format!("{}Config.cmake", dependency)), ""));
      if installed.is_err() {
        return CommandOutput::failed(1);
      }
    }
    if let Some(packages) = state.nested_manifests.get(&dependency) {
      let content: String = packages.iter().map(|p| format!("{}\n", p.display())).collect();
      if fs::write(build_dir.join(MANIFEST_FILENAME), content).is_err() {
        return CommandOutput::failed(1);
      }
    }
  }

  CommandOutput::ok("")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fake_runner_records_calls() {
    let runner = FakeRunner::succeed();
    runner.run(&CommandSpec::new("git").arg("status")).unwrap();
    assert_eq!(runner.calls().len(), 1);
    runner.clear();
    assert!(runner.calls().is_empty());
  }

  #[test]
  fn git_subcommand_skips_config_options() {
    let spec = CommandSpec::new("git").args(["-c", "advice.detachedHead=false", "checkout", "abc"]);
    assert_eq!(git_subcommand(&spec), Some("checkout"));
  }

  #[test]
  fn step_of_decodes_script_location() {
    let spec = CommandSpec::new("/bin/sh").arg("/deps/Lib/state/Release/build.sh");
    assert_eq!(
      step_of(&spec),
      Some(("Lib".to_string(), "Release".to_string(), StepKind::Build))
    );
  }
}
