//! Dependency descriptors and configuration declarations.
//!
//! A descriptor is supplied by the caller and is immutable for one invocation.
//! [`normalize`] validates it, applies the deprecated-key shim and merges the
//! caller's [`Declarations`] into a [`ResolvedDependency`].

mod normalize;
mod types;

pub use normalize::{DescriptorError, normalize};
pub use types::*;
