//! Locating installed packages.
//!
//! The primary mechanism looks for a CMake package configuration file
//! (`<Name>Config.cmake` or `<name>-config.cmake`) under each search prefix,
//! in order. If that fails and a pkg-config program is configured, pkg-config
//! is asked as a best-effort fallback, with its search path (`PKG_CONFIG_LIBDIR`
//! and `PKG_CONFIG_PATH`) restricted to the same prefixes.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::exec::{CommandRunner, CommandSpec};
use crate::platform::join_path_list;

/// Package configuration files sit at most this deep below a prefix
/// (`lib/cmake/<Name>/<Name>Config.cmake`, `share/<name>/cmake/...`).
const CONFIG_SEARCH_DEPTH: usize = 5;

#[derive(Debug, Error)]
pub enum DiscoveryError {
  #[error("package '{package}' not found in {} search location(s); it does not export usable build artifacts", .searched.len())]
  NotFound { package: String, searched: Vec<PathBuf> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryMethod {
  ConfigFile,
  PkgConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredPackage {
  pub name: String,
  pub method: DiscoveryMethod,
  /// The install prefix the package was found under, when known.
  pub prefix: Option<PathBuf>,
  /// The configuration file that matched.
  pub location: Option<PathBuf>,
  pub version: Option<String>,
}

pub struct Discovery<'a> {
  runner: &'a dyn CommandRunner,
  pkg_config: Option<String>,
}

impl<'a> Discovery<'a> {
  pub fn new(runner: &'a dyn CommandRunner, pkg_config: Option<String>) -> Self {
    Self { runner, pkg_config }
  }

  /// Find `name` under `search`, earlier prefixes first.
  pub fn find(&self, name: &str, search: &[PathBuf]) -> Result<DiscoveredPackage, DiscoveryError> {
    for prefix in search {
      if let Some(location) = find_config_file(name, prefix) {
        debug!(package = name, location = %location.display(), "package configuration found");
        return Ok(DiscoveredPackage {
          name: name.to_string(),
          method: DiscoveryMethod::ConfigFile,
          prefix: Some(prefix.clone()),
          location: Some(location),
          version: None,
        });
      }
    }

    if let Some(found) = self.find_with_pkg_config(name, search) {
      return Ok(found);
    }

    Err(DiscoveryError::NotFound {
      package: name.to_string(),
      searched: search.to_vec(),
    })
  }

  /// Find every package that installs a configuration file under `prefix`.
  ///
  /// Failures are logged and skipped.
  pub fn discover_prefix(&self, prefix: &Path, search: &[PathBuf]) -> Vec<DiscoveredPackage> {
    scan_prefix(prefix)
      .into_iter()
      .filter_map(|name| match self.find(&name, search) {
        Ok(found) => Some(found),
        Err(e) => {
          warn!(prefix = %prefix.display(), error = %e, "package of transitive dependency not discoverable");
          None
        }
      })
      .collect()
  }

  fn find_with_pkg_config(&self, name: &str, search: &[PathBuf]) -> Option<DiscoveredPackage> {
    let program = self.pkg_config.as_deref()?;
    let dirs = search.iter().flat_map(|prefix| {
      [
        prefix.join("lib").join("pkgconfig"),
        prefix.join("lib64").join("pkgconfig"),
        prefix.join("share").join("pkgconfig"),
      ]
    });
    let pkg_config_path = match join_path_list(dirs) {
      Ok(path) => path.to_string_lossy().into_owned(),
      Err(e) => {
        warn!(error = %e, "search prefixes cannot be passed to pkg-config");
        return None;
      }
    };

    let query = |flag: String| {
      CommandSpec::new(program)
        .arg(flag)
        .arg(name)
        .env("PKG_CONFIG_LIBDIR", pkg_config_path.clone())
        .env("PKG_CONFIG_PATH", pkg_config_path.clone())
        .allow_failure()
    };

    let exists = match self.runner.run(&query("--exists".to_string())) {
      Ok(output) => output.success(),
      Err(e) => {
        warn!(package = name, error = %e, "pkg-config fallback unavailable");
        return None;
      }
    };
    if !exists {
      return None;
    }

    let value = |flag: String| {
      self
        .runner
        .run(&query(flag))
        .ok()
        .filter(|output| output.success())
        .map(|output| output.stdout.trim().to_string())
        .filter(|value| !value.is_empty())
    };

    debug!(package = name, "package found with pkg-config");
    Some(DiscoveredPackage {
      name: name.to_string(),
      method: DiscoveryMethod::PkgConfig,
      prefix: value("--variable=prefix".to_string()).map(PathBuf::from),
      location: None,
      version: value("--modversion".to_string()),
    })
  }
}

/// The first configuration file for `name` below `prefix`, in sorted walk order.
pub fn find_config_file(name: &str, prefix: &Path) -> Option<PathBuf> {
  if !prefix.is_dir() {
    return None;
  }
  let exact = format!("{}Config.cmake", name);
  let lower = format!("{}-config.cmake", name.to_lowercase());

  WalkDir::new(prefix)
    .max_depth(CONFIG_SEARCH_DEPTH)
    .sort_by_file_name()
    .into_iter()
    .filter_map(Result::ok)
    .filter(|entry| entry.file_type().is_file())
    .find(|entry| {
      let file_name = entry.file_name().to_string_lossy();
      file_name == exact || file_name == lower
    })
    .map(|entry| entry.into_path())
}

/// Names of the packages whose configuration files are installed under `prefix`.
pub fn scan_prefix(prefix: &Path) -> Vec<String> {
  if !prefix.is_dir() {
    return Vec::new();
  }
  let mut names: Vec<String> = Vec::new();
  let entries = WalkDir::new(prefix)
    .max_depth(CONFIG_SEARCH_DEPTH)
    .sort_by_file_name()
    .into_iter()
    .filter_map(Result::ok)
    .filter(|entry| entry.file_type().is_file());

  for entry in entries {
    let file_name = entry.file_name().to_string_lossy();
    let name = file_name
      .strip_suffix("Config.cmake")
      .or_else(|| file_name.strip_suffix("-config.cmake"));
    if let Some(name) = name.filter(|n| !n.is_empty())
      && !names.iter().any(|known| known.eq_ignore_ascii_case(name))
    {
      names.push(name.to_string());
    }
  }
  names
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::exec::CommandOutput;
  use crate::util::testutil::FakeRunner;
  use std::fs;
  use tempfile::TempDir;
  use tracing_test::traced_test;

  fn install(prefix: &Path, relative: &str) -> PathBuf {
    let path = prefix.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "").unwrap();
    path
  }

  mod config_files {
    use super::*;

    #[test]
    fn finds_exact_and_lowercase_names() {
      let temp = TempDir::new().unwrap();
      let exact = install(temp.path(), "lib/cmake/Foo/FooConfig.cmake");
      let lower = install(temp.path(), "share/bar/cmake/bar-config.cmake");

      assert_eq!(find_config_file("Foo", temp.path()), Some(exact));
      assert_eq!(find_config_file("Bar", temp.path()), Some(lower));
      assert_eq!(find_config_file("Baz", temp.path()), None);
    }

    #[test]
    fn version_files_do_not_count() {
      let temp = TempDir::new().unwrap();
      install(temp.path(), "lib/cmake/Foo/FooConfigVersion.cmake");
      assert_eq!(find_config_file("Foo", temp.path()), None);
      assert!(scan_prefix(temp.path()).is_empty());
    }

    #[test]
    fn missing_prefix_finds_nothing() {
      assert_eq!(find_config_file("Foo", Path::new("/definitely/not/here")), None);
      assert!(scan_prefix(Path::new("/definitely/not/here")).is_empty());
    }

    #[test]
    fn scan_lists_each_package_once() {
      let temp = TempDir::new().unwrap();
      install(temp.path(), "lib/cmake/Foo/FooConfig.cmake");
      install(temp.path(), "lib/cmake/Foo/FooConfigVersion.cmake");
      install(temp.path(), "lib64/cmake/foo/foo-config.cmake");
      install(temp.path(), "lib/cmake/Zed/ZedConfig.cmake");

      assert_eq!(scan_prefix(temp.path()), vec!["Foo".to_string(), "Zed".to_string()]);
    }
  }

  mod find {
    use super::*;

    #[test]
    fn earlier_prefix_wins() {
      let temp = TempDir::new().unwrap();
      let first = temp.path().join("first");
      let second = temp.path().join("second");
      install(&second, "lib/cmake/Foo/FooConfig.cmake");
      let expected = install(&first, "lib/cmake/Foo/FooConfig.cmake");

      let runner = FakeRunner::succeed();
      let found = Discovery::new(&runner, None).find("Foo", &[first.clone(), second]).unwrap();

      assert_eq!(found.method, DiscoveryMethod::ConfigFile);
      assert_eq!(found.prefix, Some(first));
      assert_eq!(found.location, Some(expected));
      assert!(runner.calls().is_empty());
    }

    #[test]
    fn not_found_without_fallback() {
      let temp = TempDir::new().unwrap();
      let runner = FakeRunner::succeed();
      let err = Discovery::new(&runner, None)
        .find("Foo", &[temp.path().to_path_buf()])
        .unwrap_err();

      let DiscoveryError::NotFound { package, searched } = err;
      assert_eq!(package, "Foo");
      assert_eq!(searched, vec![temp.path().to_path_buf()]);
    }

    #[test]
    fn pkg_config_fallback_is_restricted_to_search_prefixes() {
      let runner = FakeRunner::new(|spec| {
        Ok(match spec.args[0].as_str() {
          "--exists" => CommandOutput::ok(""),
          "--modversion" => CommandOutput::ok("1.2.3\n"),
          "--variable=prefix" => CommandOutput::ok("/deps/Foo/package\n"),
          _ => CommandOutput::failed(1),
        })
      });
      let found = Discovery::new(&runner, Some("pkg-config".to_string()))
        .find("foo", &[PathBuf::from("/deps/Foo/package")])
        .unwrap();

      assert_eq!(found.method, DiscoveryMethod::PkgConfig);
      assert_eq!(found.version.as_deref(), Some("1.2.3"));
      assert_eq!(found.prefix, Some(PathBuf::from("/deps/Foo/package")));

      let calls = runner.calls();
      let path = calls[0].env.get("PKG_CONFIG_PATH").unwrap();
      assert!(path.contains("/deps/Foo/package"));
      assert!(path.contains("pkgconfig"));
      assert_eq!(calls[0].env.get("PKG_CONFIG_LIBDIR"), Some(path));
    }

    #[test]
    fn pkg_config_miss_is_not_found() {
      let runner = FakeRunner::new(|_| Ok(CommandOutput::failed(1)));
      let result = Discovery::new(&runner, Some("pkg-config".to_string())).find("foo", &[]);
      assert!(matches!(result, Err(DiscoveryError::NotFound { .. })));
      assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    #[traced_test]
    fn unavailable_pkg_config_is_logged_and_treated_as_miss() {
      let runner = crate::exec::SystemRunner;
      let result = Discovery::new(&runner, Some("depforge-no-such-pkg-config".to_string())).find("foo", &[]);
      assert!(matches!(result, Err(DiscoveryError::NotFound { .. })));
      assert!(logs_contain("pkg-config fallback unavailable"));
    }
  }

  #[test]
  #[traced_test]
  fn discover_prefix_finds_installed_packages() {
    let temp = TempDir::new().unwrap();
    install(temp.path(), "lib/cmake/Zlib/ZlibConfig.cmake");
    let runner = FakeRunner::succeed();
    let discovery = Discovery::new(&runner, None);

    let found = discovery.discover_prefix(temp.path(), &[temp.path().to_path_buf()]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Zlib");
  }
}
