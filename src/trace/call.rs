//! Call-object tracing with streaming support.
//!
//! A [`Call`] is the explicit call-like traceable: an object with a display
//! name, a unary invocation, and a streaming invocation. [`TracedCall`]
//! mirrors the plain-function wrapper's direct and wrapped modes, and adds
//! [`stream`](TracedCall::stream) / [`wrapped_stream`](TracedCall::wrapped_stream),
//! which keep the span open for the lifetime of the returned stream: the span
//! finishes when the stream is exhausted or dropped, and an error item marks
//! it failed.

use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::Stream;
use opentelemetry::trace::FutureExt as _;
use serde::Serialize;

use super::{
    annotate_ids, finish_call_span, start_call_span, AnnotationOptions, TraceOptions, TracedResult,
};
use crate::span::Span;

/// A call-like object: named, invocable, and streamable.
///
/// This is the explicit tagged alternative to probing an object for shape:
/// implement the trait, and [`TracedCall`] knows how to trace both the unary
/// and the streaming invocation.
#[async_trait]
pub trait Call: Send + Sync {
    /// Argument value recorded on the span and passed to the invocation.
    type Args: Serialize + Send + Sync + 'static;
    /// Unary result value.
    type Output: Serialize + Send;
    /// Item produced by the streaming invocation.
    type Chunk: Send + 'static;
    /// Invocation error; its display message is what spans record.
    type Error: Display + Send + 'static;

    /// Display name, used as the span name for every traced invocation.
    fn name(&self) -> &str;

    /// Unary invocation.
    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error>;

    /// Streaming invocation.
    async fn stream(
        &self,
        args: Self::Args,
    ) -> Result<BoxStream<'static, Result<Self::Chunk, Self::Error>>, Self::Error>;
}

/// Wraps a call-like object with default options.
///
/// Equivalent to `TraceOptions::new().wrap_call(call)`.
#[must_use]
pub fn trace_call<C: Call>(call: C) -> TracedCall<C> {
    TraceOptions::new().wrap_call(call)
}

/// Tracing wrapper around a [`Call`].
#[derive(Debug)]
pub struct TracedCall<C> {
    call: C,
    tags: Vec<String>,
    metadata: std::collections::BTreeMap<String, serde_json::Value>,
}

impl<C: Call> TracedCall<C> {
    pub(crate) fn new(call: C, options: TraceOptions) -> Self {
        Self {
            call,
            tags: options.normalized_tags(),
            metadata: options.metadata,
        }
    }

    /// The original wrapped call object.
    #[must_use]
    pub fn inner(&self) -> &C {
        &self.call
    }

    /// Direct invocation: the call's own result, unchanged.
    pub async fn call(&self, args: C::Args) -> Result<C::Output, C::Error> {
        let mut span = self.start_span(&args);
        let result = self.call.call(args).with_context(span.context()).await;
        finish_call_span(&mut span, &result);
        result
    }

    /// Wrapped invocation: the result inside a [`TracedResult`] envelope.
    pub async fn wrapped(&self, args: C::Args) -> TracedResult<C::Output, C::Error> {
        let mut span = self.start_span(&args);
        let result = self.call.call(args).with_context(span.context()).await;
        finish_call_span(&mut span, &result);
        TracedResult::new(result, span)
    }

    /// Streaming invocation with the span lifecycle wrapped around the
    /// stream.
    ///
    /// If opening the stream fails, the span records the error and finishes
    /// immediately; otherwise it stays open until the returned
    /// [`TracedStream`] is exhausted or dropped.
    pub async fn stream(
        &self,
        args: C::Args,
    ) -> Result<TracedStream<C::Chunk, C::Error>, C::Error> {
        let mut span = self.start_span(&args);
        match self.call.stream(args).with_context(span.context()).await {
            Ok(inner) => Ok(TracedStream { inner, span }),
            Err(error) => {
                span.error(&error.to_string());
                span.finish();
                Err(error)
            }
        }
    }

    /// Streaming invocation returning a [`WrappedStream`] envelope with span
    /// ids and annotation alongside the stream.
    pub async fn wrapped_stream(
        &self,
        args: C::Args,
    ) -> Result<WrappedStream<C::Chunk, C::Error>, C::Error> {
        self.stream(args).await.map(|stream| WrappedStream { stream })
    }

    fn start_span(&self, args: &C::Args) -> Span {
        start_call_span(self.call.name(), true, &self.tags, &self.metadata, args)
    }
}

/// A stream whose span finishes when the stream does.
///
/// Error items record ERROR status with the error's display message before
/// being yielded; dropping the stream mid-way finishes the span as well.
pub struct TracedStream<I, E> {
    inner: BoxStream<'static, Result<I, E>>,
    span: Span,
}

impl<I, E> TracedStream<I, E> {
    /// Hex span id of the streaming span, if a tracer is configured.
    #[must_use]
    pub fn span_id(&self) -> Option<String> {
        self.span.span_id()
    }

    /// Hex trace id of the streaming span, if a tracer is configured.
    #[must_use]
    pub fn trace_id(&self) -> Option<String> {
        self.span.trace_id()
    }
}

impl<I, E: Display> Stream for TracedStream<I, E> {
    type Item = Result<I, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(None) => {
                this.span.finish();
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(error))) => {
                this.span.error(&error.to_string());
                Poll::Ready(Some(Err(error)))
            }
            other => other,
        }
    }
}

impl<I, E> Drop for TracedStream<I, E> {
    fn drop(&mut self) {
        self.span.finish();
    }
}

impl<I, E> std::fmt::Debug for TracedStream<I, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracedStream")
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

/// Envelope around a [`TracedStream`] exposing span ids and annotation.
#[derive(Debug)]
pub struct WrappedStream<I, E> {
    /// The traced stream itself.
    pub stream: TracedStream<I, E>,
}

impl<I, E> WrappedStream<I, E> {
    /// Hex span id of the streaming span.
    #[must_use]
    pub fn span_id(&self) -> Option<String> {
        self.stream.span_id()
    }

    /// Hex trace id of the streaming span.
    #[must_use]
    pub fn trace_id(&self) -> Option<String> {
        self.stream.trace_id()
    }

    /// Reports a pass/fail annotation for the streaming span.
    ///
    /// Same best-effort contract as [`TracedResult::annotate`].
    pub async fn annotate(&self, options: AnnotationOptions) {
        annotate_ids(self.span_id(), self.trace_id(), options).await;
    }
}
