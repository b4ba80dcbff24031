use std::path::{Path, PathBuf};

use mlua::prelude::*;
use thiserror::Error;
use tracing::debug;

use super::runtime;
use crate::descriptor::{DeclaredConfiguration, Declarations, DependencyDescriptor, GitSource, SourceSpec};

#[derive(Debug, Error)]
pub enum LuaLoadError {
  #[error("failed to read '{path}': {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("{path}: {message}")]
  Eval { path: PathBuf, message: String },
}

/// Everything a descriptor file declares.
#[derive(Debug, Clone, Default)]
pub struct DepsFile {
  pub generator: Option<String>,
  pub toolchain: Option<PathBuf>,
  pub dependencies: Vec<DependencyDescriptor>,
  pub declarations: Declarations,
}

const DEPENDENCY_KEYS: &[&str] = &[
  "name",
  "git",
  "path",
  "root",
  "package",
  "configure_options",
  "build_options",
  "cmake_args",
  "configuration",
  "configurations",
  "fetch_only",
];

/// Evaluate a descriptor file.
///
/// The file must return a table:
///
/// ```lua
/// return {
///   generator = "Ninja",
///   dependencies = {
///     {
///       name = "Lib",
///       git = { url = "https://example.com/lib.git", rev = "v1.0" },
///       configure_options = { "-DFOO=1" },
///       configurations = {
///         "Debug",
///         { name = "Release", configure_options = { "-DLTO=ON" }, output = "LIB_RELEASE" },
///       },
///     },
///     { name = "Local", path = "../local" },
///   },
/// }
/// ```
///
/// Relative `path`, `root` and `toolchain` values are resolved against the
/// file's directory.
pub fn load_deps_file(path: &Path) -> Result<DepsFile, LuaLoadError> {
  let read_err = |source| LuaLoadError::Read {
    path: path.to_path_buf(),
    source,
  };
  let canonical = dunce::canonicalize(path).map_err(read_err)?;
  let content = std::fs::read_to_string(&canonical).map_err(read_err)?;
  let dir = canonical.parent().unwrap_or(Path::new("")).to_path_buf();

  let eval = || -> LuaResult<DepsFile> {
    let lua = runtime::create_runtime(&dir)?;
    let value = runtime::eval_chunk(&lua, &canonical, &content)?;
    let LuaValue::Table(table) = value else {
      return Err(LuaError::external("descriptor file must return a table"));
    };
    parse_deps_file(&table, &dir)
  };

  let file = eval().map_err(|e| LuaLoadError::Eval {
    path: canonical.clone(),
    message: e.to_string(),
  })?;
  debug!(path = %canonical.display(), dependencies = file.dependencies.len(), "descriptor file loaded");
  Ok(file)
}

fn parse_deps_file(table: &LuaTable, dir: &Path) -> LuaResult<DepsFile> {
  let mut file = DepsFile {
    generator: table.get("generator")?,
    toolchain: table.get::<Option<String>>("toolchain")?.map(|p| resolve(dir, &p)),
    ..Default::default()
  };

  match table.get::<LuaValue>("dependencies")? {
    LuaValue::Nil => {}
    LuaValue::Table(deps) => {
      for (index, value) in deps.sequence_values::<LuaValue>().enumerate() {
        let LuaValue::Table(entry) = value? else {
          return Err(LuaError::external(format!("dependencies[{}] must be a table", index + 1)));
        };
        let descriptor = parse_dependency(&entry, dir, &mut file.declarations)?;
        file.dependencies.push(descriptor);
      }
    }
    _ => return Err(LuaError::external("dependencies must be a list of tables")),
  }

  Ok(file)
}

fn parse_dependency(table: &LuaTable, dir: &Path, declarations: &mut Declarations) -> LuaResult<DependencyDescriptor> {
  let name: String = table
    .get::<Option<String>>("name")?
    .ok_or_else(|| LuaError::external("dependency without 'name'"))?;
  let fail = |message: String| LuaError::external(format!("dependency '{}': {}", name, message));

  for pair in table.pairs::<LuaValue, LuaValue>() {
    let (key, _) = pair?;
    let known = match &key {
      LuaValue::String(s) => {
        let key = s.to_str()?.to_string();
        DEPENDENCY_KEYS.contains(&key.as_str())
      }
      _ => false,
    };
    if !known {
      return Err(fail(format!("unknown key {}", describe_key(&key))));
    }
  }

  let git: Option<LuaTable> = table.get("git")?;
  let path: Option<String> = table.get("path")?;
  let source = match (git, path) {
    (Some(git), None) => SourceSpec::Git(parse_git(&git).map_err(|e| fail(e.to_string()))?),
    (None, Some(path)) => SourceSpec::Local {
      path: resolve(dir, &path),
    },
    (Some(_), Some(_)) => return Err(fail("'git' and 'path' are mutually exclusive".to_string())),
    (None, None) => return Err(fail("one of 'git' or 'path' is required".to_string())),
  };

  let mut descriptor = DependencyDescriptor::new(&name, source);
  descriptor.root_dir = table.get::<Option<String>>("root")?.map(|p| resolve(dir, &p));
  descriptor.package = table.get("package")?;
  descriptor.configure_options = string_list(table, "configure_options").map_err(|e| fail(e.to_string()))?;
  descriptor.build_options = string_list(table, "build_options").map_err(|e| fail(e.to_string()))?;
  descriptor.cmake_args = string_list(table, "cmake_args").map_err(|e| fail(e.to_string()))?;
  descriptor.configuration = table.get("configuration")?;
  descriptor.fetch_only = table.get::<Option<bool>>("fetch_only")?.unwrap_or(false);

  match table.get::<LuaValue>("configurations")? {
    LuaValue::Nil => {}
    LuaValue::Table(list) => {
      for value in list.sequence_values::<LuaValue>() {
        match value? {
          LuaValue::String(cfg) => descriptor.configurations.push(cfg.to_str()?.to_string()),
          LuaValue::Table(cfg) => {
            let (cfg_name, declared) = parse_declared(&cfg).map_err(|e| fail(e.to_string()))?;
            declarations.declare(&name, &cfg_name, declared);
            descriptor.configurations.push(cfg_name);
          }
          other => {
            return Err(fail(format!(
              "configurations entries must be names or tables, got {}",
              other.type_name()
            )));
          }
        }
      }
    }
    other => return Err(fail(format!("configurations must be a list, got {}", other.type_name()))),
  }

  Ok(descriptor)
}

fn parse_git(table: &LuaTable) -> LuaResult<GitSource> {
  let url: String = table
    .get::<Option<String>>("url")?
    .ok_or_else(|| LuaError::external("git.url is required"))?;
  let rev: String = table
    .get::<Option<String>>("rev")?
    .ok_or_else(|| LuaError::external("git.rev is required"))?;

  let mut git = GitSource::new(url, rev);
  if let Some(submodules) = table.get::<Option<bool>>("submodules")? {
    git.submodules = submodules;
  }
  git.submodule_paths = string_list(table, "submodule_paths")?.unwrap_or_default();
  git.submodule_remote = table.get::<Option<bool>>("submodule_remote")?.unwrap_or(false);
  Ok(git)
}

fn parse_declared(table: &LuaTable) -> LuaResult<(String, DeclaredConfiguration)> {
  let name: String = table
    .get::<Option<String>>("name")?
    .ok_or_else(|| LuaError::external("configuration table without 'name'"))?;
  let declared = DeclaredConfiguration {
    configure_options: string_list(table, "configure_options")?.unwrap_or_default(),
    build_options: string_list(table, "build_options")?.unwrap_or_default(),
    output: table.get("output")?,
  };
  Ok((name, declared))
}

/// A list of strings; `None` when the key is absent.
fn string_list(table: &LuaTable, key: &str) -> LuaResult<Option<Vec<String>>> {
  match table.get::<LuaValue>(key)? {
    LuaValue::Nil => Ok(None),
    LuaValue::Table(list) => {
      let mut items = Vec::new();
      for value in list.sequence_values::<LuaValue>() {
        match value? {
          LuaValue::String(s) => items.push(s.to_str()?.to_string()),
          other => {
            return Err(LuaError::external(format!(
              "{} must contain only strings, got {}",
              key,
              other.type_name()
            )));
          }
        }
      }
      Ok(Some(items))
    }
    other => Err(LuaError::external(format!("{} must be a list, got {}", key, other.type_name()))),
  }
}

fn describe_key(key: &LuaValue) -> String {
  match key {
    LuaValue::String(s) => format!("'{}'", s.to_string_lossy()),
    LuaValue::Integer(i) => format!("[{}]", i),
    other => format!("of type {}", other.type_name()),
  }
}

fn resolve(dir: &Path, path: &str) -> PathBuf {
  let path = Path::new(path);
  if path.is_absolute() { path.to_path_buf() } else { dir.join(path) }
}
