//! Source synchronisation.
//!
//! A git source is cloned into the dependency's Source directory on first use
//! and afterwards brought to the requested revision, unless the working tree
//! holds local modifications. A local source is used where it is and never
//! touched.

mod git;
mod sync;

pub use git::{Git, RefKind};
pub use sync::{SyncError, SyncOutcome, synchronize};
