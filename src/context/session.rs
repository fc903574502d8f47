//! Session grouping over the per-chain active context.
//!
//! A session is a caller-defined grouping id threaded through every span
//! created during its scope. The "active context" is an immutable
//! `opentelemetry::Context` snapshot: entering a session overlays the session
//! fields onto the current snapshot and binds the result for the dynamic
//! extent of the scoped function — every `await` inside it included — and the
//! parent snapshot is restored on exit, success or failure alike.
//!
//! Because each logical call chain carries its own snapshot, two sibling
//! sessions running concurrently can never observe each other's id, no matter
//! how their suspension points interleave.

use std::collections::BTreeMap;
use std::future::Future;

use opentelemetry::trace::FutureExt as _;
use opentelemetry::Context;
use uuid::Uuid;

use crate::propagation::{Carrier, SESSION_HEADER_NAME};

/// Configuration for [`session`] and [`session_sync`].
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Explicit session id. A UUIDv4 is generated when absent.
    pub id: Option<String>,
    /// Attributes attached to the session for its whole extent.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl SessionOptions {
    /// Creates empty options (generated id, no attributes).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit session id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Adds a session attribute.
    #[must_use]
    pub fn attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Per-call-chain session grouping: an id plus caller-defined attributes.
///
/// Immutable once created; its lifetime is the dynamic extent of the
/// [`session`] scope that created it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    /// Session id, explicit or generated.
    pub id: String,
    /// Caller-defined session attributes.
    pub attributes: BTreeMap<String, serde_json::Value>,
}

/// Runs an async function inside a new session scope.
///
/// Builds a [`SessionContext`] from `options`, overlays it onto the current
/// context, and binds the result as active for the full dynamic extent of
/// the future returned by `f`. The previous context is restored
/// automatically when the future completes or is dropped; the function's
/// output (or error) passes through unchanged.
pub async fn session<F, Fut, T>(options: SessionOptions, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    f().with_context(overlay(options)).await
}

/// Synchronous counterpart of [`session`], using a scope guard to restore
/// the previous context on exit.
pub fn session_sync<F, T>(options: SessionOptions, f: F) -> T
where
    F: FnOnce() -> T,
{
    let _guard = overlay(options).attach();
    f()
}

/// Overlays session fields onto the current context snapshot.
fn overlay(options: SessionOptions) -> Context {
    let session = SessionContext {
        id: options
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        attributes: options.attributes,
    };
    Context::current().with_value(session)
}

/// Returns the session active on the current call chain, if any.
#[must_use]
pub fn current_session() -> Option<SessionContext> {
    Context::current().get::<SessionContext>().cloned()
}

/// Looks up the session id carried by inbound headers.
///
/// The lookup is case-insensitive on [`SESSION_HEADER_NAME`]; multi-valued
/// headers yield their first element. Returns `None` when the header is
/// absent or empty.
#[must_use]
pub fn extract_session_id(headers: &Carrier) -> Option<String> {
    headers.get(SESSION_HEADER_NAME).map(str::to_string)
}
