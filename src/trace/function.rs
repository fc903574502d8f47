//! Plain-function tracing wrappers.
//!
//! [`Traced`] wraps a synchronous function, [`AsyncTraced`] an asynchronous
//! one. Both take one serializable argument value and a body returning
//! `Result<T, E>`; the error's display message is what lands on the span when
//! the body fails. The span name is the explicit name given at wrap time —
//! never reflected function identity.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;

use opentelemetry::trace::FutureExt as _;
use serde::Serialize;

use super::{finish_call_span, start_call_span, TraceOptions, TracedResult};
use crate::span::Span;

/// Wraps a synchronous function with default options.
///
/// Equivalent to `TraceOptions::new().wrap(name, f)`.
#[must_use]
pub fn trace<F>(name: impl Into<String>, f: F) -> Traced<F> {
    TraceOptions::new().wrap(name, f)
}

/// Wraps an asynchronous function with default options.
///
/// Equivalent to `TraceOptions::new().wrap_async(name, f)`.
#[must_use]
pub fn trace_async<F>(name: impl Into<String>, f: F) -> AsyncTraced<F> {
    TraceOptions::new().wrap_async(name, f)
}

/// Tracing wrapper around a synchronous function.
///
/// Each invocation opens a span named after the wrapper, records the call
/// attributes, runs the body with the span bound as the active context (so
/// nested spans parent correctly), records the outcome, and finishes the
/// span on every exit path exactly once.
#[derive(Debug)]
pub struct Traced<F> {
    name: String,
    tags: Vec<String>,
    metadata: BTreeMap<String, serde_json::Value>,
    f: F,
}

impl<F> Traced<F> {
    pub(crate) fn new(name: impl Into<String>, f: F, options: TraceOptions) -> Self {
        Self {
            name: name.into(),
            tags: options.normalized_tags(),
            metadata: options.metadata,
            f,
        }
    }

    /// The span name this wrapper was configured with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct invocation: the function's own result, unchanged.
    pub fn call<A, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        A: Serialize,
        T: Serialize,
        E: Display,
    {
        let (result, mut span) = self.run(args);
        finish_call_span(&mut span, &result);
        result
    }

    /// Wrapped invocation: the result inside a [`TracedResult`] envelope.
    pub fn wrapped<A, T, E>(&self, args: A) -> TracedResult<T, E>
    where
        F: Fn(A) -> Result<T, E>,
        A: Serialize,
        T: Serialize,
        E: Display,
    {
        let (result, mut span) = self.run(args);
        finish_call_span(&mut span, &result);
        TracedResult::new(result, span)
    }

    fn run<A, T, E>(&self, args: A) -> (Result<T, E>, Span)
    where
        F: Fn(A) -> Result<T, E>,
        A: Serialize,
    {
        let span = start_call_span(&self.name, false, &self.tags, &self.metadata, &args);
        let guard = span.context().attach();
        let result = (self.f)(args);
        drop(guard);
        (result, span)
    }
}

/// Tracing wrapper around an asynchronous function.
///
/// The span's context is bound to the returned future, so it stays active
/// across every `await` inside the body without leaking to sibling chains.
#[derive(Debug)]
pub struct AsyncTraced<F> {
    name: String,
    tags: Vec<String>,
    metadata: BTreeMap<String, serde_json::Value>,
    f: F,
}

impl<F> AsyncTraced<F> {
    pub(crate) fn new(name: impl Into<String>, f: F, options: TraceOptions) -> Self {
        Self {
            name: name.into(),
            tags: options.normalized_tags(),
            metadata: options.metadata,
            f,
        }
    }

    /// The span name this wrapper was configured with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Direct invocation: the function's own result, unchanged.
    pub async fn call<A, Fut, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Serialize,
        T: Serialize,
        E: Display,
    {
        let mut span = start_call_span(&self.name, true, &self.tags, &self.metadata, &args);
        let result = (self.f)(args).with_context(span.context()).await;
        finish_call_span(&mut span, &result);
        result
    }

    /// Wrapped invocation: the result inside a [`TracedResult`] envelope.
    pub async fn wrapped<A, Fut, T, E>(&self, args: A) -> TracedResult<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Serialize,
        T: Serialize,
        E: Display,
    {
        let mut span = start_call_span(&self.name, true, &self.tags, &self.metadata, &args);
        let result = (self.f)(args).with_context(span.context()).await;
        finish_call_span(&mut span, &result);
        TracedResult::new(result, span)
    }
}
