//! Versioned function wrapper with lazy, best-effort registration.
//!
//! [`Versioned`] layers content-addressed identity on top of the tracing
//! machinery: every invocation is traced like [`crate::trace::AsyncTraced`],
//! with the closure hashes mirrored onto the span, and the first invocation
//! drives a one-shot registration attempt against the remote function
//! registry — find-by-hash for idempotent reuse, create on miss. Any failure
//! parks the wrapper in a permanently-unregistered state; registration never
//! delays beyond its own attempt and never affects the wrapped call's result.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Mutex, PoisonError};

use opentelemetry::trace::FutureExt as _;
use serde::Serialize;
use serde_json::json;

use super::closure::ClosureMetadata;
use crate::client::{self, RegisterFunction};
use crate::span::{string_array, Span};
use crate::trace::{finish_call_span, start_call_span, AnnotationOptions, TraceOptions};

const ATTR_VERSION_HASH: &str = "mirascope.version.hash";
const ATTR_VERSION_SIGNATURE_HASH: &str = "mirascope.version.signature_hash";
const ATTR_VERSION_UUID: &str = "mirascope.version.uuid";
const ATTR_VERSION_NAME: &str = "mirascope.version.name";
const ATTR_VERSION_TAGS: &str = "mirascope.version.tags";
const ATTR_VERSION_META_PREFIX: &str = "mirascope.version.meta.";

/// Registration progress of one wrapper instance.
///
/// Attempted at most once: `NotAttempted` transitions to `Pending` when the
/// first invocation takes the attempt, then settles in `Registered` or
/// `Failed` forever. Concurrent first invocations observing `Pending`
/// proceed without a uuid rather than waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Registration {
    NotAttempted,
    Pending,
    Registered(String),
    Failed,
}

/// Static version metadata, available without invoking the function.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionInfo {
    /// Registry-assigned id; filled in at most once by registration.
    pub uuid: Option<String>,
    /// SHA-256 hex digest of the assembled closure code.
    pub hash: String,
    /// SHA-256 hex digest of the declared signature.
    pub signature_hash: String,
    /// Display name of the versioned function.
    pub name: String,
    /// Declared tags, deduplicated and sorted.
    pub tags: Vec<String>,
    /// Declared metadata.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Configuration for [`version`] wrappers: trace options plus an optional
/// precomputed [`ClosureMetadata`] from a build-time extraction step.
#[derive(Debug, Clone, Default)]
pub struct VersionOptions {
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Build-time closure metadata. When absent, the wrapper falls back to
    /// hashing the function's type name — a weaker, build-dependent identity.
    pub closure: Option<ClosureMetadata>,
}

impl VersionOptions {
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

    /// Supplies build-time closure metadata.
    #[must_use]
    pub fn closure(mut self, closure: ClosureMetadata) -> Self {
        self.closure = Some(closure);
        self
    }

    /// Wraps an asynchronous function as a versioned, traced wrapper.
    #[must_use]
    pub fn wrap<F>(self, name: impl Into<String>, f: F) -> Versioned<F> {
        let closure = self
            .closure
            .unwrap_or_else(|| ClosureMetadata::from_type_name(std::any::type_name::<F>()));
        let options = TraceOptions {
            tags: self.tags,
            metadata: self.metadata,
        };
        Versioned {
            name: name.into(),
            tags: options.normalized_tags(),
            metadata: options.metadata,
            closure,
            registration: Mutex::new(Registration::NotAttempted),
            f,
        }
    }
}

/// Wraps an asynchronous function with default version options.
///
/// Equivalent to `VersionOptions::new().wrap(name, f)`.
#[must_use]
pub fn version<F>(name: impl Into<String>, f: F) -> Versioned<F> {
    VersionOptions::new().wrap(name, f)
}

/// Content-addressed, traced wrapper around an asynchronous function.
#[derive(Debug)]
pub struct Versioned<F> {
    name: String,
    tags: Vec<String>,
    metadata: BTreeMap<String, serde_json::Value>,
    closure: ClosureMetadata,
    registration: Mutex<Registration>,
    f: F,
}

impl<F> Versioned<F> {
    /// The display name this wrapper was configured with.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The closure metadata backing this wrapper's identity.
    #[must_use]
    pub fn closure(&self) -> &ClosureMetadata {
        &self.closure
    }

    /// Static version metadata; `uuid` reflects the registration state at
    /// the time of the call.
    #[must_use]
    pub fn version_info(&self) -> VersionInfo {
        VersionInfo {
            uuid: self.registered_uuid(),
            hash: self.closure.hash.clone(),
            signature_hash: self.closure.signature_hash.clone(),
            name: self.name.clone(),
            tags: self.tags.clone(),
            metadata: self.metadata.clone(),
        }
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
        let uuid = self.ensure_registration().await;
        let mut span = self.start_version_span(uuid.as_deref(), &args);
        let result = (self.f)(args).with_context(span.context()).await;
        finish_call_span(&mut span, &result);
        result
    }

    /// Wrapped invocation: the result inside a [`VersionedResult`] envelope
    /// carrying the function uuid when registration succeeded in time.
    pub async fn wrapped<A, Fut, T, E>(&self, args: A) -> VersionedResult<T, E>
    where
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        A: Serialize,
        T: Serialize,
        E: Display,
    {
        let uuid = self.ensure_registration().await;
        let mut span = self.start_version_span(uuid.as_deref(), &args);
        let result = (self.f)(args).with_context(span.context()).await;
        finish_call_span(&mut span, &result);
        VersionedResult {
            result,
            function_uuid: uuid,
            span,
        }
    }

    /// Uuid if the state machine has settled in `Registered`.
    fn registered_uuid(&self) -> Option<String> {
        let state = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &*state {
            Registration::Registered(uuid) => Some(uuid.clone()),
            _ => None,
        }
    }

    /// Drives the registration state machine, attempting at most once per
    /// wrapper instance.
    async fn ensure_registration(&self) -> Option<String> {
        {
            let mut state = self
                .registration
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match &*state {
                Registration::Registered(uuid) => return Some(uuid.clone()),
                Registration::Pending | Registration::Failed => return None,
                Registration::NotAttempted => *state = Registration::Pending,
            }
        }

        let outcome = self.attempt_registration().await;

        let mut state = self
            .registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match outcome {
            Some(uuid) => {
                *state = Registration::Registered(uuid.clone());
                Some(uuid)
            }
            None => {
                *state = Registration::Failed;
                None
            }
        }
    }

    /// One best-effort registration attempt: find by hash, create on miss.
    /// Every failure is logged and swallowed.
    async fn attempt_registration(&self) -> Option<String> {
        let Some(client) = client::client() else {
            tracing::debug!(
                name = %self.name,
                "no client configured, skipping function registration"
            );
            return None;
        };

        match client.find_function_by_hash(&self.closure.hash).await {
            Ok(Some(record)) => return Some(record.uuid),
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(name = %self.name, error = %error, "function lookup failed");
                return None;
            }
        }

        let request = RegisterFunction {
            code: self.closure.code.clone(),
            hash: self.closure.hash.clone(),
            name: self.name.clone(),
            signature: self.closure.signature.clone(),
            signature_hash: self.closure.signature_hash.clone(),
        };
        match client.register_function(request).await {
            Ok(record) => Some(record.uuid),
            Err(error) => {
                tracing::warn!(name = %self.name, error = %error, "function registration failed");
                None
            }
        }
    }

    /// Starts the trace span and mirrors version identity onto it.
    fn start_version_span<A: Serialize>(&self, uuid: Option<&str>, args: &A) -> Span {
        let mut span = start_call_span(&self.name, true, &self.tags, &self.metadata, args);
        span.set([
            (ATTR_VERSION_HASH, json!(self.closure.hash)),
            (
                ATTR_VERSION_SIGNATURE_HASH,
                json!(self.closure.signature_hash),
            ),
            (ATTR_VERSION_NAME, json!(self.name)),
        ]);
        if let Some(uuid) = uuid {
            span.set([(ATTR_VERSION_UUID, json!(uuid))]);
        }
        if !self.tags.is_empty() {
            span.set_value(ATTR_VERSION_TAGS, string_array(&self.tags));
        }
        for (key, value) in &self.metadata {
            span.set([(format!("{ATTR_VERSION_META_PREFIX}{key}"), value.clone())]);
        }
        span
    }
}

/// Envelope returned by [`Versioned::wrapped`].
#[derive(Debug)]
pub struct VersionedResult<T, E> {
    /// The wrapped function's own result, unchanged.
    pub result: Result<T, E>,
    /// Registry uuid, when registration succeeded before this call's span
    /// finished.
    pub function_uuid: Option<String>,
    span: Span,
}

impl<T, E> VersionedResult<T, E> {
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

    /// Reports a pass/fail annotation for this call.
    ///
    /// Same best-effort contract as
    /// [`TracedResult::annotate`](crate::trace::TracedResult::annotate).
    pub async fn annotate(&self, options: AnnotationOptions) {
        crate::trace::annotate_ids(self.span_id(), self.trace_id(), options).await;
    }
}
