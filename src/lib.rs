//! Mirascope ops: application observability instrumentation over OpenTelemetry.
//!
//! This crate provides:
//! - A span lifecycle wrapper with JSON-valued attributes, events, and
//!   leveled log events
//! - Session scoping that travels with the logical call chain across `await`
//!   points and threads
//! - Multi-format trace-context propagation (W3C, B3, Jaeger, composite)
//!   with a fixed session-id header layered on top
//! - Tracing combinators for plain functions, async functions, and
//!   streaming call objects
//! - Content-addressed function versioning with lazy remote registration

#![allow(clippy::multiple_crate_versions)]

//!
//! # Architecture
//!
//! The crate is layered over the OpenTelemetry context:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Wrappers (trace/, version/)                        │  ← User-facing
//! │  - Traced / AsyncTraced / TracedCall                │
//! │  - Versioned (content-addressed identity)           │
//! └─────────────────────────────────────────────────────┘
//!         │                    │                    │
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Span Layer    │   │ Context Layer │   │ Client Seam   │
//! │ (span)        │   │ (context/)    │   │ (client)      │
//! │ - Lifecycle   │   │ - Sessions    │   │ - Annotations │
//! │ - Attributes  │   │ - Scoping     │   │ - Registry    │
//! │ - Log events  │   │ - Restoration │   │ - Trait seam  │
//! └───────────────┘   └───────────────┘   └───────────────┘
//!         │                    │
//! ┌─────────────────────────────────────────────────────┐
//! │  Propagation Layer (propagation/)                   │
//! │  - Format selection (env / argument / default)      │
//! │  - Header carriers with case-insensitive lookup     │
//! │  - Session header injection                         │
//! └─────────────────────────────────────────────────────┘
//!                        │
//! ┌─────────────────────────────────────────────────────┐
//! │  OpenTelemetry (global tracer + propagator)         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`span`]: Span lifecycle wrapper with no-op degradation
//! - [`context`]: Session scopes and inbound propagation scopes
//! - [`propagation`]: Wire-format selection, carriers, inject/extract
//! - [`trace`]: Tracing combinators for functions and call objects
//! - [`version`]: Content-addressed versioning with lazy registration
//! - [`client`]: Backend trait for annotations and the function registry
//! - [`error`]: Crate error type
//!
//! # Examples
//!
//! ## Tracing a function
//!
//! ```rust,no_run
//! use mirascope_ops::trace;
//!
//! let add = trace("add", |(a, b): (i64, i64)| {
//!     Ok::<i64, std::convert::Infallible>(a + b)
//! });
//! let sum = add.call((1, 2))?;
//! assert_eq!(sum, 3);
//!
//! // Wrapped mode exposes span ids and annotation.
//! let outcome = add.wrapped((3, 4));
//! let _span_id = outcome.span_id();
//! # Ok::<(), std::convert::Infallible>(())
//! ```
//!
//! ## Session scoping
//!
//! ```rust,no_run
//! use mirascope_ops::{current_session, session, SessionOptions};
//!
//! # async fn run() {
//! let options = SessionOptions::new().id("session-42");
//! session(options, || async {
//!     let active = current_session().map(|s| s.id);
//!     assert_eq!(active.as_deref(), Some("session-42"));
//! })
//! .await;
//! # }
//! ```
//!
//! ## Propagating across a process boundary
//!
//! ```rust,no_run
//! use mirascope_ops::{inject_context, propagated_context, Carrier};
//!
//! # async fn run(inbound: Carrier) {
//! // Caller side: write the active context into outgoing headers.
//! let mut headers = Carrier::new();
//! inject_context(&mut headers, None);
//!
//! // Callee side: resume the inbound trace and session.
//! propagated_context(&inbound, || async {
//!     // Spans started here parent to the remote caller.
//! })
//! .await;
//! # }
//! ```
//!
//! # Key Design Decisions
//!
//! ## Context snapshots over mutable globals
//!
//! Per-call state (the active session, the active span) lives in immutable
//! `opentelemetry::Context` snapshots bound to each logical call chain.
//! Scopes derive a child snapshot on entry and restore the parent on exit,
//! so concurrent chains never observe each other's state.
//!
//! ## No-op degradation
//!
//! Without a configured tracer provider every span operation silently does
//! nothing and span ids come back as `None`. Instrumented code behaves
//! identically with telemetry on or off.
//!
//! ## Best-effort backend calls
//!
//! Function registration and annotations go through the installed
//! [`client::OpsClient`] as single attempts. Failures are logged and
//! swallowed; the wrapped call's own result is never affected.

pub mod client;
pub mod context;
pub mod error;
pub mod propagation;
pub mod span;
pub mod trace;
pub mod version;

pub use client::{
    client, reset_client, set_client, Annotation, AnnotationLabel, FunctionRecord, OpsClient,
    RegisterFunction,
};
pub use context::{
    current_session, extract_session_id, propagated_context, propagated_context_sync,
    propagated_context_with_parent, session, session_sync, SessionContext, SessionOptions,
};
pub use error::{OpsError, Result};
pub use propagation::{
    extract_context, extract_context_from, get_propagator, inject_context, reset_propagator,
    Carrier, ContextPropagator, HeaderValue, PropagatorFormat, SESSION_HEADER_NAME,
};
pub use span::{LogLevel, Span};
pub use trace::{
    trace, trace_async, trace_call, AnnotationOptions, AsyncTraced, Call, TraceOptions, Traced,
    TracedCall, TracedResult, TracedStream, WrappedStream,
};
pub use version::{
    version, ClosureMetadata, VersionInfo, VersionOptions, Versioned, VersionedResult,
};
