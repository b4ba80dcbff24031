//! depforge-lib: change detection and incremental rebuilds for fetched dependencies
//!
//! This crate decides, for each declared dependency, whether its source must be
//! synchronised, whether its configure and build steps must run again, and which
//! installed package directories must be made visible to the calling build:
//! - `descriptor`: what the caller asks for (source, configurations, options)
//! - `source`: bringing a git checkout to the requested revision
//! - `script`: materialised configure/build scripts and their fingerprints
//! - `orchestrate`: the per-dependency decision engine
//! - `propagate` / `discovery`: the accumulated package list and package lookup

pub mod backend;
pub mod consts;
pub mod descriptor;
pub mod discovery;
pub mod exec;
pub mod fingerprint;
pub mod layout;
pub mod lua;
pub mod orchestrate;
pub mod platform;
pub mod propagate;
pub mod script;
pub mod settings;
pub mod source;
pub mod status;
pub mod util;
