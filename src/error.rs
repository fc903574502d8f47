//! Error types for mirascope-ops.
//!
//! This module defines the centralized error type [`OpsError`] and a type alias
//! [`Result`] used throughout the crate. All errors are implemented using the
//! `thiserror` crate for automatic `Error` trait implementation.
//!
//! Tracing and propagation faults deliberately do **not** surface through this
//! type: an absent tracer degrades to no-op spans and a malformed carrier
//! yields an empty context (see the crate-level error-handling contract).
//! `OpsError` exists for the external collaborators — the annotation store and
//! the function registry — whose failures are caught and logged at the call
//! sites that talk to them.

use thiserror::Error;

/// The main error type for mirascope-ops operations.
///
/// This enum consolidates the error conditions that can occur when talking to
/// the external backend. Callers inside this crate treat every variant as
/// best-effort: a failed registration or annotation is logged and swallowed,
/// never propagated into the wrapped function's result.
#[derive(Debug, Error)]
pub enum OpsError {
    /// The external client is misconfigured or unreachable.
    ///
    /// The string contains a description of what went wrong (transport
    /// failure, authentication, malformed response).
    #[error("Client error: {0}")]
    Client(String),

    /// Function registration with the remote registry failed.
    ///
    /// Occurs when neither the find-by-hash lookup nor the create call
    /// could complete. The string describes the underlying failure.
    #[error("Registration error: {0}")]
    Registration(String),

    /// Reporting an annotation to the remote store failed.
    #[error("Annotation error: {0}")]
    Annotation(String),
}

/// A specialized `Result` type for mirascope-ops operations.
///
/// This is a type alias for `std::result::Result<T, OpsError>` that simplifies
/// signatures on the external-client seam.
pub type Result<T> = std::result::Result<T, OpsError>;
