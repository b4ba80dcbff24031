mod fetch;
mod status;

pub use fetch::cmd_fetch;
pub use status::cmd_status;

use std::path::Path;

use anyhow::{Context, Result};

use depforge_lib::lua::{DepsFile, load_deps_file};

fn load(file: &Path) -> Result<DepsFile> {
  load_deps_file(file).with_context(|| format!("Failed to load descriptor file '{}'", file.display()))
}
