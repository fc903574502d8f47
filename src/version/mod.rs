//! Content-addressed function versioning.
//!
//! Identity comes from [`ClosureMetadata`]: SHA-256 digests over the
//! canonicalized function source and its signature. [`Versioned`] wraps an
//! asynchronous function with that identity, traces every invocation, and
//! lazily registers the version with the configured client the first time it
//! runs.

mod closure;
mod versioned;

pub use closure::ClosureMetadata;
pub use versioned::{version, VersionInfo, VersionOptions, Versioned, VersionedResult};
