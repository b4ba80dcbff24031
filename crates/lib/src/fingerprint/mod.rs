//! Change fingerprints: the only durable record of what was last built.
//!
//! - [`Fingerprint`] - structured record with one stable text encoding
//! - [`FingerprintStore`] - newline-terminated stamp files under State
//!
//! Nothing is written here until the step it describes has succeeded.

mod record;
mod store;

pub use record::Fingerprint;
pub use store::{FingerprintError, FingerprintStore};
