//! Input normalisation: validation and the compatibility shim for deprecated keys.
//!
//! Runs once per dependency before any side effect. Everything downstream sees
//! only [`ResolvedDependency`].

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use super::types::{
  Declarations, DependencyDescriptor, ResolvedConfiguration, ResolvedDependency, SourceSpec,
};
use crate::consts::DEFAULT_CONFIGURATION;

/// Usage errors in a dependency descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
  #[error("dependency '{dependency}': missing required field '{field}'")]
  MissingField { dependency: String, field: &'static str },

  #[error("invalid dependency name '{0}': must be non-empty and a single path component")]
  InvalidName(String),

  #[error("dependency '{dependency}': '{first}' and '{second}' are mutually exclusive")]
  MutuallyExclusive {
    dependency: String,
    first: &'static str,
    second: &'static str,
  },

  #[error("dependency '{dependency}': invalid configuration name '{name}'")]
  InvalidConfiguration { dependency: String, name: String },

  #[error("dependency '{dependency}': cannot resolve root directory '{path}': {source}")]
  RootDir {
    dependency: String,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("dependency '{dependency}': local source '{path}' not found: {source}")]
  LocalPathNotFound {
    dependency: String,
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
}

/// Validate a descriptor and fix its configuration set.
///
/// The configurations processed are the descriptor's `configurations`, else its
/// single `configuration`, followed by declared names not already listed. With
/// none at all, [`DEFAULT_CONFIGURATION`] is used. Descriptor-level options come
/// first; declared options are appended.
pub fn normalize(
  descriptor: &DependencyDescriptor,
  declarations: &Declarations,
  default_root: &Path,
) -> Result<ResolvedDependency, DescriptorError> {
  let name = descriptor.name.trim();
  if !is_single_component(name) {
    return Err(DescriptorError::InvalidName(descriptor.name.clone()));
  }
  let dependency = name.to_string();

  let source = normalize_source(&dependency, &descriptor.source)?;
  let configure_options = shim_configure_options(&dependency, descriptor)?;
  let build_options = descriptor.build_options.clone().unwrap_or_default();

  if descriptor.configuration.is_some() && !descriptor.configurations.is_empty() {
    return Err(DescriptorError::MutuallyExclusive {
      dependency,
      first: "configuration",
      second: "configurations",
    });
  }

  let mut names: Vec<String> = Vec::new();
  let explicit = descriptor
    .configurations
    .iter()
    .chain(descriptor.configuration.iter())
    .map(String::as_str);
  let declared = declarations.for_dependency(&dependency).map(|(cfg, _)| cfg);
  for cfg in explicit.chain(declared) {
    let cfg = cfg.trim();
    if !is_single_component(cfg) {
      return Err(DescriptorError::InvalidConfiguration {
        dependency: dependency.clone(),
        name: cfg.to_string(),
      });
    }
    if !names.iter().any(|n| n == cfg) {
      names.push(cfg.to_string());
    }
  }
  if names.is_empty() {
    names.push(DEFAULT_CONFIGURATION.to_string());
  }

  let configurations = names
    .into_iter()
    .map(|cfg| {
      let declared = declarations.get(&dependency, &cfg);
      let mut resolved = ResolvedConfiguration {
        name: cfg,
        configure_options: configure_options.clone(),
        build_options: build_options.clone(),
        output: None,
      };
      if let Some(declared) = declared {
        resolved.configure_options.extend(declared.configure_options.iter().cloned());
        resolved.build_options.extend(declared.build_options.iter().cloned());
        resolved.output = declared.output.clone();
      }
      resolved
    })
    .collect();

  let package = descriptor
    .package
    .as_deref()
    .map(str::trim)
    .filter(|p| !p.is_empty())
    .unwrap_or(&dependency)
    .to_string();

  let root = descriptor.root_dir.as_deref().unwrap_or(default_root);
  let root_dir = std::path::absolute(root).map_err(|e| DescriptorError::RootDir {
    dependency: dependency.clone(),
    path: root.to_path_buf(),
    source: e,
  })?;

  Ok(ResolvedDependency {
    package,
    source,
    root_dir,
    configurations,
    fetch_only: descriptor.fetch_only,
    name: dependency,
  })
}

fn normalize_source(dependency: &str, source: &SourceSpec) -> Result<SourceSpec, DescriptorError> {
  match source {
    SourceSpec::Git(git) => {
      if git.url.trim().is_empty() {
        return Err(DescriptorError::MissingField {
          dependency: dependency.to_string(),
          field: "git.url",
        });
      }
      if git.rev.trim().is_empty() {
        return Err(DescriptorError::MissingField {
          dependency: dependency.to_string(),
          field: "git.rev",
        });
      }
      Ok(source.clone())
    }
    SourceSpec::Local { path } => {
      if path.as_os_str().is_empty() {
        return Err(DescriptorError::MissingField {
          dependency: dependency.to_string(),
          field: "path",
        });
      }
      let canonical = dunce::canonicalize(path).map_err(|e| DescriptorError::LocalPathNotFound {
        dependency: dependency.to_string(),
        path: path.clone(),
        source: e,
      })?;
      Ok(SourceSpec::Local { path: canonical })
    }
  }
}

/// `cmake_args` is the old name of `configure_options`.
fn shim_configure_options(dependency: &str, descriptor: &DependencyDescriptor) -> Result<Vec<String>, DescriptorError> {
  match (&descriptor.cmake_args, &descriptor.configure_options) {
    (Some(_), Some(_)) => Err(DescriptorError::MutuallyExclusive {
      dependency: dependency.to_string(),
      first: "cmake_args",
      second: "configure_options",
    }),
    (Some(old), None) => {
      warn!(dep = %dependency, "'cmake_args' is deprecated, use 'configure_options'");
      Ok(old.clone())
    }
    (None, options) => Ok(options.clone().unwrap_or_default()),
  }
}

fn is_single_component(name: &str) -> bool {
  let mut components = Path::new(name).components();
  matches!(
    (components.next(), components.next()),
    (Some(Component::Normal(_)), None)
  ) && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::descriptor::{DeclaredConfiguration, GitSource};
  use tempfile::TempDir;
  use tracing_test::traced_test;

  fn lib() -> DependencyDescriptor {
    DependencyDescriptor::git("Lib", "https://example.com/lib.git", "v1.0")
  }

  fn resolve(descriptor: &DependencyDescriptor) -> Result<ResolvedDependency, DescriptorError> {
    normalize(descriptor, &Declarations::new(), Path::new("/deps"))
  }

  mod validation {
    use super::*;

    #[test]
    fn empty_name_is_rejected() {
      let descriptor = DependencyDescriptor::git("", "https://example.com/lib.git", "v1");
      assert!(matches!(resolve(&descriptor), Err(DescriptorError::InvalidName(_))));
    }

    #[test]
    fn name_with_separator_is_rejected() {
      let descriptor = DependencyDescriptor::git("a/b", "https://example.com/lib.git", "v1");
      assert!(matches!(resolve(&descriptor), Err(DescriptorError::InvalidName(_))));
      let descriptor = DependencyDescriptor::git("..", "https://example.com/lib.git", "v1");
      assert!(matches!(resolve(&descriptor), Err(DescriptorError::InvalidName(_))));
    }

    #[test]
    fn missing_rev_is_rejected() {
      let descriptor = DependencyDescriptor::new("Lib", SourceSpec::Git(GitSource::new("https://x", " ")));
      assert!(matches!(
        resolve(&descriptor),
        Err(DescriptorError::MissingField { field: "git.rev", .. })
      ));
    }

    #[test]
    fn missing_local_path_is_rejected() {
      let descriptor = DependencyDescriptor::local("Lib", "/nonexistent/depforge/12345");
      assert!(matches!(
        resolve(&descriptor),
        Err(DescriptorError::LocalPathNotFound { .. })
      ));
    }

    #[test]
    fn local_path_is_made_absolute() {
      let temp = TempDir::new().unwrap();
      let descriptor = DependencyDescriptor::local("Lib", temp.path());
      let resolved = resolve(&descriptor).unwrap();
      match resolved.source {
        SourceSpec::Local { path } => assert_eq!(path, dunce::canonicalize(temp.path()).unwrap()),
        other => panic!("unexpected source {:?}", other),
      }
    }

    #[test]
    fn configuration_and_configurations_are_exclusive() {
      let mut descriptor = lib().with_configuration("Release");
      descriptor.configurations = vec!["Debug".to_string()];
      assert!(matches!(
        resolve(&descriptor),
        Err(DescriptorError::MutuallyExclusive {
          first: "configuration",
          ..
        })
      ));
    }

    #[test]
    fn configuration_name_must_be_a_path_component() {
      let descriptor = lib().with_configuration("../Release");
      assert!(matches!(
        resolve(&descriptor),
        Err(DescriptorError::InvalidConfiguration { .. })
      ));
    }
  }

  mod deprecated_options {
    use super::*;

    #[test]
    #[traced_test]
    fn cmake_args_is_aliased_with_a_warning() {
      let mut descriptor = lib();
      descriptor.cmake_args = Some(vec!["-DFOO=1".to_string()]);

      let resolved = resolve(&descriptor).unwrap();
      assert_eq!(resolved.configurations[0].configure_options, vec!["-DFOO=1"]);
      assert!(logs_contain("deprecated"));
    }

    #[test]
    fn cmake_args_and_configure_options_conflict() {
      let mut descriptor = lib().with_configure_options(["-DFOO=1"]);
      descriptor.cmake_args = Some(vec!["-DFOO=2".to_string()]);
      assert!(matches!(
        resolve(&descriptor),
        Err(DescriptorError::MutuallyExclusive { first: "cmake_args", .. })
      ));
    }
  }

  mod configurations {
    use super::*;

    #[test]
    fn defaults_to_release() {
      let resolved = resolve(&lib()).unwrap();
      let names: Vec<_> = resolved.configurations.iter().map(|c| c.name.as_str()).collect();
      assert_eq!(names, vec!["Release"]);
    }

    #[test]
    fn package_defaults_to_name_and_root_to_default() {
      let resolved = resolve(&lib()).unwrap();
      assert_eq!(resolved.package, "Lib");
      assert_eq!(resolved.root_dir, std::path::absolute("/deps").unwrap());
    }

    #[test]
    fn relative_root_is_made_absolute() {
      let mut descriptor = lib();
      descriptor.root_dir = Some(PathBuf::from("work").join("deps"));

      let resolved = resolve(&descriptor).unwrap();

      assert!(resolved.root_dir.is_absolute());
      assert_eq!(resolved.root_dir, std::env::current_dir().unwrap().join("work").join("deps"));
    }

    #[test]
    fn single_configuration_is_used() {
      let resolved = resolve(&lib().with_configuration("Debug")).unwrap();
      assert_eq!(resolved.configurations.len(), 1);
      assert_eq!(resolved.configurations[0].name, "Debug");
    }

    #[test]
    fn declared_configurations_follow_explicit_ones() {
      let mut descriptor = lib().with_configure_options(["-DFOO=1"]);
      descriptor.configurations = vec!["Release".to_string()];

      let mut decls = Declarations::new();
      decls.declare(
        "Lib",
        "Debug",
        DeclaredConfiguration {
          configure_options: vec!["-DDEBUG_EXTRA=ON".to_string()],
          build_options: vec!["--parallel".to_string()],
          output: Some("LIB_DEBUG_DIR".to_string()),
        },
      );
      decls.declare("Lib", "Release", DeclaredConfiguration::default());

      let resolved = normalize(&descriptor, &decls, Path::new("/deps")).unwrap();
      let names: Vec<_> = resolved.configurations.iter().map(|c| c.name.as_str()).collect();
      assert_eq!(names, vec!["Release", "Debug"]);

      let debug = &resolved.configurations[1];
      assert_eq!(debug.configure_options, vec!["-DFOO=1", "-DDEBUG_EXTRA=ON"]);
      assert_eq!(debug.build_options, vec!["--parallel"]);
      assert_eq!(debug.output.as_deref(), Some("LIB_DEBUG_DIR"));
      assert_eq!(resolved.configurations[0].configure_options, vec!["-DFOO=1"]);
    }

    #[test]
    fn declarations_for_other_dependencies_are_ignored() {
      let mut decls = Declarations::new();
      decls.declare("Other", "Debug", DeclaredConfiguration::default());
      let resolved = normalize(&lib(), &decls, Path::new("/deps")).unwrap();
      assert_eq!(resolved.configurations.len(), 1);
      assert_eq!(resolved.configurations[0].name, "Release");
    }
  }
}
