//! Inbound-boundary context binding.
//!
//! [`propagated_context`] is the server-side half of distributed tracing:
//! given an inbound header carrier, it extracts the remote trace context via
//! the global propagator and runs a function with that context bound as
//! active, so every span created inside parents correctly to the caller's
//! trace. If the carrier also names a session, a [`SessionContext`] with that
//! id is bound alongside, making `current_session()` work inside the handler
//! and letting the session re-propagate on outbound calls.

use std::collections::BTreeMap;
use std::future::Future;

use opentelemetry::trace::FutureExt as _;
use opentelemetry::Context;

use super::session::{extract_session_id, SessionContext};
use crate::propagation::{self, Carrier};

/// Runs an async function with the context extracted from `carrier` bound
/// as active for its full dynamic extent.
///
/// Malformed or empty carriers bind an "empty" context (spans created inside
/// start a fresh trace); the function's output passes through unchanged.
pub async fn propagated_context<F, Fut, T>(carrier: &Carrier, f: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    f().with_context(bound_context(carrier)).await
}

/// Synchronous counterpart of [`propagated_context`].
pub fn propagated_context_sync<F, T>(carrier: &Carrier, f: F) -> T
where
    F: FnOnce() -> T,
{
    let _guard = bound_context(carrier).attach();
    f()
}

/// Like [`propagated_context`], but extracts against an explicit parent
/// context instead of the currently active one.
///
/// Values carried by `parent` (an active session, baggage) survive into the
/// bound context unless the carrier overrides them.
pub async fn propagated_context_with_parent<F, Fut, T>(
    parent: &Context,
    carrier: &Carrier,
    f: F,
) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    f().with_context(bound_context_from(parent, carrier)).await
}

/// Extracts the trace context and overlays the carrier's session, if any.
fn bound_context(carrier: &Carrier) -> Context {
    bound_context_from(&Context::current(), carrier)
}

fn bound_context_from(parent: &Context, carrier: &Carrier) -> Context {
    let cx = propagation::extract_context_from(parent, carrier);
    match extract_session_id(carrier) {
        Some(id) => cx.with_value(SessionContext {
            id,
            attributes: BTreeMap::new(),
        }),
        None => cx,
    }
}
