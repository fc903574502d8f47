//! Span lifecycle wrapper over the OpenTelemetry backend span.
//!
//! [`Span`] owns the `opentelemetry::Context` that carries one backend span,
//! providing attribute/event recording, leveled log events, status, and an
//! idempotent [`Span::finish`]. When no tracer provider is configured (or the
//! sampler drops the span), the wrapper degrades to a no-op: every mutator
//! becomes silent, while local bookkeeping (`is_finished`) keeps working.
//!
//! None of the operations on this type return errors or panic. A
//! misconfigured backend degrades telemetry, never the correctness of the
//! code being instrumented.

use opentelemetry::trace::{Span as _, Status, TraceContextExt, Tracer};
use opentelemetry::{global, Context, KeyValue, StringValue};

/// Instrumentation scope name used for every span created by this crate.
pub(crate) const TRACER_NAME: &str = "mirascope-ops";

/// Severity level for [`Span::log`] events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Returns the wire name recorded on the log event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }

    /// Whether this level marks the span as failed.
    const fn is_error(self) -> bool {
        matches!(self, Self::Error | Self::Critical)
    }
}

/// Lifecycle wrapper around one backend span.
///
/// Created by [`Span::start`], mutated only before [`Span::finish`], and ended
/// exactly once. The wrapper holds the span inside an `opentelemetry::Context`
/// snapshot so the span can be bound as the active context across `await`
/// points (contexts are cheap `Arc` clones).
///
/// If the wrapper is dropped without `finish()`, the backend span still ends
/// when the last clone of its carrying context is released, so unwinding or
/// task abortion cannot leak an open span.
#[derive(Debug)]
pub struct Span {
    /// Context carrying the backend span. `None` when the backend reported a
    /// non-recording span at creation time.
    cx: Option<Context>,
    finished: bool,
}

impl Span {
    /// Starts a new span parented to the currently active context.
    ///
    /// If the backend hands back a non-recording span (no tracer provider
    /// configured, or the span was sampled out), the wrapper flips to no-op
    /// mode and drops the backend handle.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        let tracer = global::tracer(TRACER_NAME);
        let parent = Context::current();
        let span = tracer.start_with_context(name.into(), &parent);

        if span.is_recording() {
            Self {
                cx: Some(parent.with_span(span)),
                finished: false,
            }
        } else {
            tracing::debug!("no tracer configured, span degrades to no-op");
            Self {
                cx: None,
                finished: false,
            }
        }
    }

    /// Sets attributes on the span.
    ///
    /// Each value is a `serde_json::Value`: primitives (bool, number, string)
    /// are stored natively; arrays and objects are canonicalized to JSON text
    /// before storage; `null` values produce no attribute at all.
    ///
    /// Silent no-op after [`Span::finish`] or on a no-op span.
    pub fn set<K, I>(&mut self, attributes: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        let Some(cx) = self.active() else { return };
        let span = cx.span();
        for (key, value) in attributes {
            if let Some(value) = otel_value(&value) {
                span.set_attribute(KeyValue::new(key.into(), value));
            }
        }
    }

    /// Records a named, timestamped event with the same value-serialization
    /// rule as [`Span::set`].
    pub fn event<K, I>(&mut self, name: impl Into<String>, attributes: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        let Some(cx) = self.active() else { return };
        let kvs = attributes
            .into_iter()
            .filter_map(|(key, value)| {
                otel_value(&value).map(|value| KeyValue::new(key.into(), value))
            })
            .collect();
        cx.span().add_event(name.into(), kvs);
    }

    /// Records a leveled log event on the span.
    ///
    /// Sugar over `event("log", {level, message, ...attributes})`. The
    /// `Error` and `Critical` levels additionally set the span status to
    /// ERROR with `message` as the description.
    pub fn log<K, I>(&mut self, level: LogLevel, message: &str, attributes: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        let Some(cx) = self.active() else { return };
        let mut kvs = vec![
            KeyValue::new("level", level.as_str()),
            KeyValue::new("message", message.to_string()),
        ];
        kvs.extend(attributes.into_iter().filter_map(|(key, value)| {
            otel_value(&value).map(|value| KeyValue::new(key.into(), value))
        }));
        let span = cx.span();
        span.add_event("log", kvs);
        if level.is_error() {
            span.set_status(Status::error(message.to_string()));
        }
    }

    /// Records a debug-level log event.
    pub fn debug(&mut self, message: &str) {
        self.log(LogLevel::Debug, message, empty());
    }

    /// Records an info-level log event.
    pub fn info(&mut self, message: &str) {
        self.log(LogLevel::Info, message, empty());
    }

    /// Records a warning-level log event.
    pub fn warning(&mut self, message: &str) {
        self.log(LogLevel::Warning, message, empty());
    }

    /// Records an error-level log event and sets the span status to ERROR.
    pub fn error(&mut self, message: &str) {
        self.log(LogLevel::Error, message, empty());
    }

    /// Records a critical-level log event and sets the span status to ERROR.
    pub fn critical(&mut self, message: &str) {
        self.log(LogLevel::Critical, message, empty());
    }

    /// Ends the backend span.
    ///
    /// Idempotent: the backend span is ended exactly once, and subsequent
    /// calls are no-ops.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        if let Some(cx) = &self.cx {
            cx.span().end();
        }
        self.finished = true;
    }

    /// Hex-encoded span id (16 characters), or `None` on a no-op span.
    #[must_use]
    pub fn span_id(&self) -> Option<String> {
        self.cx
            .as_ref()
            .map(|cx| cx.span().span_context().span_id().to_string())
    }

    /// Hex-encoded trace id (32 characters), or `None` on a no-op span.
    #[must_use]
    pub fn trace_id(&self) -> Option<String> {
        self.cx
            .as_ref()
            .map(|cx| cx.span().span_context().trace_id().to_string())
    }

    /// Whether the backend reported a non-recording span at creation.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.cx.is_none()
    }

    /// Whether [`Span::finish`] has run.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the context carrying this span, for binding as the active
    /// context of nested work. Falls back to the current context for no-op
    /// spans so session values keep flowing.
    #[must_use]
    pub fn context(&self) -> Context {
        self.cx.clone().unwrap_or_else(Context::current)
    }

    /// Sets a single attribute with a native OpenTelemetry value, bypassing
    /// the JSON canonicalization rule. Used internally for typed values like
    /// string arrays.
    pub(crate) fn set_value(&mut self, key: impl Into<String>, value: opentelemetry::Value) {
        let Some(cx) = self.active() else { return };
        cx.span().set_attribute(KeyValue::new(key.into(), value));
    }

    /// Context for mutation, present only while the span is live.
    fn active(&self) -> Option<&Context> {
        if self.finished {
            return None;
        }
        self.cx.as_ref()
    }
}

/// Empty attribute iterator for the level sugar methods.
fn empty() -> std::iter::Empty<(String, serde_json::Value)> {
    std::iter::empty()
}

/// Converts a JSON value into an OpenTelemetry attribute value.
///
/// Primitives map to their native attribute types; arrays and objects are
/// canonicalized to JSON text; `null` maps to `None` (no attribute).
pub(crate) fn otel_value(value: &serde_json::Value) -> Option<opentelemetry::Value> {
    use serde_json::Value as Json;
    match value {
        Json::Null => None,
        Json::Bool(b) => Some(opentelemetry::Value::Bool(*b)),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(opentelemetry::Value::I64(i))
            } else {
                n.as_f64().map(opentelemetry::Value::F64)
            }
        }
        Json::String(s) => Some(opentelemetry::Value::String(s.clone().into())),
        composite => serde_json::to_string(composite)
            .ok()
            .map(|text| opentelemetry::Value::String(text.into())),
    }
}

/// Builds an OpenTelemetry string-array value from a list of strings.
pub(crate) fn string_array(values: &[String]) -> opentelemetry::Value {
    let values: Vec<StringValue> = values.iter().cloned().map(StringValue::from).collect();
    opentelemetry::Value::Array(opentelemetry::Array::String(values))
}
