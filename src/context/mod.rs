//! Per-call-chain context: sessions and inbound propagation scopes.
//!
//! The crate keeps no shared mutable globals for per-call state. Instead, an
//! immutable `opentelemetry::Context` snapshot travels with each logical call
//! chain — through every suspension and resumption — carrying the active
//! session and span. Scopes ([`session`], [`propagated_context`]) derive a
//! new snapshot on entry and restore the exact parent snapshot on exit,
//! giving stack discipline even across concurrent sibling chains.

mod propagated;
mod session;

pub use propagated::{
    propagated_context, propagated_context_sync, propagated_context_with_parent,
};
pub use session::{
    current_session, extract_session_id, session, session_sync, SessionContext, SessionOptions,
};
