//! Lua descriptor files.
//!
//! - [`deps_file`] - evaluating a descriptor file into dependency descriptors
//! - [`runtime`] - the Lua VM and the `depforge` global table

pub mod deps_file;
pub mod runtime;

pub use deps_file::{DepsFile, LuaLoadError, load_deps_file};
