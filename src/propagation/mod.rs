//! Multi-format trace-context propagation.
//!
//! This module selects among the standard interoperable wire formats — W3C
//! `tracecontext`, Zipkin B3 (single and multi header), Jaeger, and a
//! composite of all of them — and layers one fixed behavior on top of every
//! format: whenever a session is active, injection also writes the
//! [`SESSION_HEADER_NAME`] header, so session correlation survives process
//! boundaries regardless of the tracing format in use.
//!
//! The format is resolved once, at propagator construction:
//!
//! 1. Explicit [`PropagatorFormat`] argument
//! 2. The `MIRASCOPE_PROPAGATOR` environment variable
//! 3. Default: `tracecontext`
//!
//! An unrecognized environment value is preserved verbatim by
//! [`ContextPropagator::format`] but behaves as W3C tracecontext.
//!
//! A process-wide instance is lazily built by [`get_propagator`];
//! [`reset_propagator`] discards it (test isolation only — reconfiguring
//! concurrently with active tracing is unsupported).

mod carrier;

pub use carrier::{Carrier, HeaderValue};

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use opentelemetry::propagation::text_map_propagator::FieldIter;
use opentelemetry::propagation::{TextMapCompositePropagator, TextMapPropagator};
use opentelemetry::{global, Context};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_zipkin::{B3Encoding, Propagator as B3Propagator};

use crate::context::SessionContext;

/// Fixed header carrying the session id across process boundaries.
pub const SESSION_HEADER_NAME: &str = "Mirascope-Session-Id";

/// Environment variable selecting the propagation format.
pub const ENV_PROPAGATOR_FORMAT: &str = "MIRASCOPE_PROPAGATOR";

/// Environment guard that suppresses global propagator installation.
pub const ENV_PROPAGATOR_SET_GLOBAL: &str = "_MIRASCOPE_PROPAGATOR_SET_GLOBAL";

/// Supported trace-context wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagatorFormat {
    /// W3C `traceparent`/`tracestate`.
    TraceContext,
    /// Zipkin B3, single `b3` header.
    B3,
    /// Zipkin B3, `x-b3-*` multi headers.
    B3Multi,
    /// Jaeger `uber-trace-id`.
    Jaeger,
    /// All of the above, extraction trying each in turn.
    Composite,
}

impl PropagatorFormat {
    /// Parses a wire-format name (`tracecontext`, `b3`, `b3multi`, `jaeger`,
    /// `composite`). Returns `None` for anything else.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tracecontext" => Some(Self::TraceContext),
            "b3" => Some(Self::B3),
            "b3multi" => Some(Self::B3Multi),
            "jaeger" => Some(Self::Jaeger),
            "composite" => Some(Self::Composite),
            _ => None,
        }
    }

    /// The wire-format name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TraceContext => "tracecontext",
            Self::B3 => "b3",
            Self::B3Multi => "b3multi",
            Self::Jaeger => "jaeger",
            Self::Composite => "composite",
        }
    }
}

impl fmt::Display for PropagatorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shareable handle over a boxed text-map propagator.
///
/// The same underlying propagator must serve both the [`ContextPropagator`]
/// instance and, optionally, the OpenTelemetry global registry, which takes
/// ownership of a concrete `TextMapPropagator` type.
#[derive(Clone)]
struct SharedPropagator(Arc<dyn TextMapPropagator + Send + Sync>);

impl fmt::Debug for SharedPropagator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl TextMapPropagator for SharedPropagator {
    fn inject_context(&self, cx: &Context, injector: &mut dyn opentelemetry::propagation::Injector) {
        self.0.inject_context(cx, injector);
    }

    fn extract_with_context(
        &self,
        cx: &Context,
        extractor: &dyn opentelemetry::propagation::Extractor,
    ) -> Context {
        self.0.extract_with_context(cx, extractor)
    }

    fn fields(&self) -> FieldIter<'_> {
        self.0.fields()
    }
}

/// Format-selectable inject/extract of trace context into header carriers.
///
/// Construction resolves the format once (argument, then environment, then
/// default) and optionally installs the selected propagator as the
/// OpenTelemetry global text-map propagator.
#[derive(Debug)]
pub struct ContextPropagator {
    format: String,
    propagator: SharedPropagator,
}

impl ContextPropagator {
    /// Creates a propagator with the resolved format.
    ///
    /// `set_global` installs the selected propagator as the process-wide
    /// OpenTelemetry text-map propagator, unless the
    /// `_MIRASCOPE_PROPAGATOR_SET_GLOBAL=false` guard is set.
    #[must_use]
    pub fn new(set_global: bool, format: Option<PropagatorFormat>) -> Self {
        let (label, resolved) = match format {
            Some(format) => (format.as_str().to_string(), format),
            None => match std::env::var(ENV_PROPAGATOR_FORMAT) {
                Ok(raw) => match PropagatorFormat::from_name(&raw) {
                    Some(format) => (raw, format),
                    None => {
                        tracing::warn!(
                            format = %raw,
                            "unrecognized propagator format, using tracecontext behavior"
                        );
                        (raw, PropagatorFormat::TraceContext)
                    }
                },
                Err(_) => (
                    PropagatorFormat::TraceContext.as_str().to_string(),
                    PropagatorFormat::TraceContext,
                ),
            },
        };

        let propagator = SharedPropagator(build_propagator(resolved));

        if set_global && global_install_allowed() {
            global::set_text_map_propagator(propagator.clone());
        }

        Self {
            format: label,
            propagator,
        }
    }

    /// The format this propagator was constructed with, as reported.
    ///
    /// An unrecognized environment value is preserved here even though the
    /// propagator behaves as `tracecontext`.
    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Extracts a context from the carrier against the currently active
    /// context as a base.
    ///
    /// Empty or malformed carriers yield a context equivalent to "no incoming
    /// trace" — never an error.
    #[must_use]
    pub fn extract_context(&self, carrier: &Carrier) -> Context {
        self.extract_context_from(&Context::current(), carrier)
    }

    /// Extracts a context from the carrier against an explicit base context
    /// instead of the currently active one. Values carried by `parent`
    /// survive into the result.
    #[must_use]
    pub fn extract_context_from(&self, parent: &Context, carrier: &Carrier) -> Context {
        self.propagator.extract_with_context(parent, carrier)
    }

    /// Injects the given context (default: the currently active one) into
    /// the carrier.
    ///
    /// Independently of the tracing format and of whether a span is active,
    /// an active session always writes the [`SESSION_HEADER_NAME`] header.
    pub fn inject_context(&self, carrier: &mut Carrier, context: Option<&Context>) {
        let cx = match context {
            Some(cx) => cx.clone(),
            None => Context::current(),
        };
        self.propagator.inject_context(&cx, carrier);

        if let Some(session) = cx.get::<SessionContext>() {
            carrier.insert(SESSION_HEADER_NAME, session.id.clone());
        }
    }
}

/// Whether the `_MIRASCOPE_PROPAGATOR_SET_GLOBAL` guard permits installing
/// the global propagator.
fn global_install_allowed() -> bool {
    match std::env::var(ENV_PROPAGATOR_SET_GLOBAL) {
        Ok(value) => !matches!(
            value.to_ascii_lowercase().as_str(),
            "false" | "0" | "no" | "off"
        ),
        Err(_) => true,
    }
}

/// Builds the standard propagator implementation for a format.
fn build_propagator(format: PropagatorFormat) -> Arc<dyn TextMapPropagator + Send + Sync> {
    match format {
        PropagatorFormat::TraceContext => Arc::new(TraceContextPropagator::new()),
        PropagatorFormat::B3 => Arc::new(B3Propagator::with_encoding(B3Encoding::SingleHeader)),
        PropagatorFormat::B3Multi => {
            Arc::new(B3Propagator::with_encoding(B3Encoding::MultipleHeader))
        }
        PropagatorFormat::Jaeger => Arc::new(opentelemetry_jaeger_propagator::Propagator::new()),
        PropagatorFormat::Composite => Arc::new(TextMapCompositePropagator::new(vec![
            Box::new(TraceContextPropagator::new()),
            Box::new(B3Propagator::with_encoding(B3Encoding::SingleHeader)),
            Box::new(B3Propagator::with_encoding(B3Encoding::MultipleHeader)),
            Box::new(opentelemetry_jaeger_propagator::Propagator::new()),
        ])),
    }
}

/// Process-wide propagator singleton. Configure once, read many.
static PROPAGATOR: Mutex<Option<Arc<ContextPropagator>>> = Mutex::new(None);

/// Returns the process-wide [`ContextPropagator`], lazily constructing it on
/// first use with `set_global = true` and environment-resolved format.
#[must_use]
pub fn get_propagator() -> Arc<ContextPropagator> {
    let mut slot = PROPAGATOR.lock().unwrap_or_else(PoisonError::into_inner);
    slot.get_or_insert_with(|| Arc::new(ContextPropagator::new(true, None)))
        .clone()
}

/// Discards the cached propagator so the next [`get_propagator`] call builds
/// a fresh one. Intended for test isolation, not for runtime
/// reconfiguration concurrent with active tracing.
pub fn reset_propagator() {
    let mut slot = PROPAGATOR.lock().unwrap_or_else(PoisonError::into_inner);
    *slot = None;
}

/// Extracts a context from the carrier via the global propagator.
#[must_use]
pub fn extract_context(carrier: &Carrier) -> Context {
    get_propagator().extract_context(carrier)
}

/// Extracts a context from the carrier against an explicit base context via
/// the global propagator.
#[must_use]
pub fn extract_context_from(parent: &Context, carrier: &Carrier) -> Context {
    get_propagator().extract_context_from(parent, carrier)
}

/// Injects the given context (default: current) into the carrier via the
/// global propagator.
pub fn inject_context(carrier: &mut Carrier, context: Option<&Context>) {
    get_propagator().inject_context(carrier, context);
}
