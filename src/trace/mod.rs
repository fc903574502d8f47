//! Tracing combinators: wrap a function or a call-like object with a span.
//!
//! Two traceable shapes are supported, selected explicitly rather than by
//! probing:
//!
//! - plain functions — [`Traced`] (sync) and [`AsyncTraced`] (async), built
//!   by [`trace`] / [`trace_async`] or through [`TraceOptions`];
//! - call-like objects — anything implementing [`Call`], wrapped by
//!   [`trace_call`] into a [`TracedCall`] that additionally mirrors the span
//!   lifecycle around streaming invocations.
//!
//! Every wrapper offers a direct mode (the function's own result, unchanged)
//! and a wrapped mode returning a [`TracedResult`] envelope with span ids and
//! best-effort annotation. A wrapped function's return value and errors are
//! observationally identical to the unwrapped function; the only addition is
//! telemetry.

mod call;
mod function;

pub use call::{trace_call, Call, TracedCall, TracedStream, WrappedStream};
pub use function::{trace, trace_async, AsyncTraced, Traced};

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::Serialize;
use serde_json::json;

use crate::client::{self, Annotation, AnnotationLabel};
use crate::span::{string_array, Span};

pub(crate) const ATTR_TYPE: &str = "mirascope.type";
pub(crate) const ATTR_FN_NAME: &str = "mirascope.fn.name";
pub(crate) const ATTR_FN_IS_ASYNC: &str = "mirascope.fn.is_async";
pub(crate) const ATTR_ARG_TYPES: &str = "mirascope.trace.arg_types";
pub(crate) const ATTR_ARG_VALUES: &str = "mirascope.trace.arg_values";
pub(crate) const ATTR_OUTPUT: &str = "mirascope.trace.output";
pub(crate) const ATTR_TAGS: &str = "mirascope.trace.tags";
pub(crate) const ATTR_META_PREFIX: &str = "mirascope.trace.meta.";

/// Declarative configuration shared by all tracing wrappers.
///
/// Acts as the curried form of the combinators: build options once, then
/// wrap any number of functions or calls with them.
#[derive(Debug, Clone, Default)]
pub struct TraceOptions {
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl TraceOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Adds several tags.
    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Wraps a synchronous function.
    #[must_use]
    pub fn wrap<F>(self, name: impl Into<String>, f: F) -> Traced<F> {
        Traced::new(name, f, self)
    }

    /// Wraps an asynchronous function.
    #[must_use]
    pub fn wrap_async<F>(self, name: impl Into<String>, f: F) -> AsyncTraced<F> {
        AsyncTraced::new(name, f, self)
    }

    /// Wraps a call-like object.
    #[must_use]
    pub fn wrap_call<C: Call>(self, call: C) -> TracedCall<C> {
        TracedCall::new(call, self)
    }

    /// Tags, deduplicated and sorted, the order they are recorded in.
    pub(crate) fn normalized_tags(&self) -> Vec<String> {
        let mut tags = self.tags.clone();
        tags.sort();
        tags.dedup();
        tags
    }
}

/// Starts a span for one traced invocation and records the standard call
/// attributes: type, function name, async flag, argument types/values,
/// declared tags and metadata.
pub(crate) fn start_call_span<A: Serialize>(
    name: &str,
    is_async: bool,
    tags: &[String],
    metadata: &BTreeMap<String, serde_json::Value>,
    args: &A,
) -> Span {
    let mut span = Span::start(name.to_string());
    span.set([
        (ATTR_TYPE.to_string(), json!("trace")),
        (ATTR_FN_NAME.to_string(), json!(name)),
        (ATTR_FN_IS_ASYNC.to_string(), json!(is_async)),
        (
            ATTR_ARG_TYPES.to_string(),
            json!(std::any::type_name::<A>()),
        ),
    ]);
    match serde_json::to_string(args) {
        Ok(values) => span.set([(ATTR_ARG_VALUES, json!(values))]),
        Err(error) => tracing::debug!(error = %error, "failed to serialize traced arguments"),
    }
    if !tags.is_empty() {
        span.set_value(ATTR_TAGS, string_array(tags));
    }
    for (key, value) in metadata {
        span.set([(format!("{ATTR_META_PREFIX}{key}"), value.clone())]);
    }
    span
}

/// Records the outcome of a traced invocation and finishes the span.
///
/// A non-null success value lands on the output attribute (primitives
/// natively, composites as canonical JSON); an error records ERROR status
/// with the error's display message. The span finishes exactly once either
/// way; the result itself is untouched.
pub(crate) fn finish_call_span<T, E>(span: &mut Span, result: &Result<T, E>)
where
    T: Serialize,
    E: Display,
{
    match result {
        Ok(value) => match serde_json::to_value(value) {
            Ok(output) => span.set([(ATTR_OUTPUT, output)]),
            Err(error) => {
                tracing::debug!(error = %error, "failed to serialize traced output");
            }
        },
        Err(error) => span.error(&error.to_string()),
    }
    span.finish();
}

/// Options for [`TracedResult::annotate`] and its streaming counterpart.
#[derive(Debug, Clone)]
pub struct AnnotationOptions {
    pub label: AnnotationLabel,
    pub reasoning: Option<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl AnnotationOptions {
    /// Creates options with the given label and nothing else.
    #[must_use]
    pub fn new(label: AnnotationLabel) -> Self {
        Self {
            label,
            reasoning: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Attaches reasoning text.
    #[must_use]
    pub fn reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Envelope returned by the wrapped invocation modes.
///
/// Carries the untouched result alongside the span that traced it, plus a
/// best-effort [`annotate`](Self::annotate) hook into the external
/// annotation store.
#[derive(Debug)]
pub struct TracedResult<T, E> {
    /// The wrapped function's own result, unchanged.
    pub result: Result<T, E>,
    span: Span,
}

impl<T, E> TracedResult<T, E> {
    pub(crate) fn new(result: Result<T, E>, span: Span) -> Self {
        Self { result, span }
    }

    /// The span that traced this call.
    #[must_use]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Hex span id, or `None` when no tracer was configured.
    #[must_use]
    pub fn span_id(&self) -> Option<String> {
        self.span.span_id()
    }

    /// Hex trace id, or `None` when no tracer was configured.
    #[must_use]
    pub fn trace_id(&self) -> Option<String> {
        self.span.trace_id()
    }

    /// Reports a pass/fail annotation for this call to the external store.
    ///
    /// No-op when either id is unavailable (no tracer configured) or when no
    /// client is installed; failures are logged and swallowed.
    pub async fn annotate(&self, options: AnnotationOptions) {
        annotate_ids(self.span_id(), self.trace_id(), options).await;
    }
}

/// Shared best-effort annotation path, keyed by `(span_id, trace_id)`.
pub(crate) async fn annotate_ids(
    span_id: Option<String>,
    trace_id: Option<String>,
    options: AnnotationOptions,
) {
    let (Some(span_id), Some(trace_id)) = (span_id, trace_id) else {
        tracing::debug!("span ids unavailable, skipping annotation");
        return;
    };
    let Some(client) = client::client() else {
        tracing::debug!("no client configured, skipping annotation");
        return;
    };
    let annotation = Annotation {
        span_id,
        trace_id,
        label: options.label,
        reasoning: options.reasoning,
        metadata: options.metadata,
    };
    if let Err(error) = client.create_annotation(annotation).await {
        tracing::warn!(error = %error, "failed to report annotation");
    }
}
