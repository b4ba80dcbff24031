//! The build-system backend (CMake command-line conventions).
//!
//! Whether the generator is multi-configuration is a single capability flag.
//! It is consulted in exactly two places: [`BuildBackend::configure_args`]
//! (single-config backends get `CMAKE_BUILD_TYPE`) and
//! [`BuildBackend::build_args`] (multi-config backends get `--config`).

use std::path::{Path, PathBuf};

/// Environment variable the build system reads installed-package prefixes from.
pub const SEARCH_PATH_ENV: &str = "CMAKE_PREFIX_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBackend {
  program: String,
  generator: Option<String>,
  toolchain_file: Option<PathBuf>,
  multi_config: bool,
}

impl BuildBackend {
  pub fn new(program: impl Into<String>) -> Self {
    Self {
      program: program.into(),
      generator: None,
      toolchain_file: None,
      multi_config: false,
    }
  }

  /// Select a generator; multi-config-ness follows from its name.
  pub fn with_generator(mut self, generator: impl Into<String>) -> Self {
    let generator = generator.into();
    self.multi_config = is_multi_config_generator(&generator);
    self.generator = Some(generator);
    self
  }

  pub fn with_toolchain_file(mut self, toolchain: impl Into<PathBuf>) -> Self {
    self.toolchain_file = Some(toolchain.into());
    self
  }

  pub fn is_multi_config(&self) -> bool {
    self.multi_config
  }

  pub fn program(&self) -> &str {
    &self.program
  }

  /// `cmake -S <source> -B <build> [-G gen] -DCMAKE_INSTALL_PREFIX=.. [toolchain] [build type] <options>`
  pub fn configure_args(
    &self,
    source: &Path,
    build: &Path,
    install_prefix: &Path,
    configuration: &str,
    options: &[String],
  ) -> Vec<String> {
    let mut args = vec![
      self.program.clone(),
      "-S".to_string(),
      source.display().to_string(),
      "-B".to_string(),
      build.display().to_string(),
    ];
    if let Some(generator) = &self.generator {
      args.push("-G".to_string());
      args.push(generator.clone());
    }
    args.push(format!("-DCMAKE_INSTALL_PREFIX={}", install_prefix.display()));
    if let Some(toolchain) = &self.toolchain_file {
      args.push(format!("-DCMAKE_TOOLCHAIN_FILE={}", toolchain.display()));
    }
    if !self.multi_config {
      args.push(format!("-DCMAKE_BUILD_TYPE={}", configuration));
    }
    args.extend(options.iter().cloned());
    args
  }

  /// `cmake --build <build> --target install [--config cfg] <options>`
  pub fn build_args(&self, build: &Path, configuration: &str, options: &[String]) -> Vec<String> {
    let mut args = vec![
      self.program.clone(),
      "--build".to_string(),
      build.display().to_string(),
      "--target".to_string(),
      "install".to_string(),
    ];
    if self.multi_config {
      args.push("--config".to_string());
      args.push(configuration.to_string());
    }
    args.extend(options.iter().cloned());
    args
  }
}

fn is_multi_config_generator(generator: &str) -> bool {
  generator.starts_with("Visual Studio") || generator == "Xcode" || generator == "Ninja Multi-Config"
}
