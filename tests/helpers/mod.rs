//! Shared fixtures for the integration tests.
//!
//! Tests that touch process-wide state (the global tracer provider, the
//! global propagator, the installed client, environment variables) must hold
//! the [`serial`] guard for their whole body so they cannot interleave.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use opentelemetry::global;
use opentelemetry::trace::noop::NoopTracerProvider;
use opentelemetry_sdk::export::trace::SpanData;
use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
use opentelemetry_sdk::trace::TracerProvider;

use mirascope_ops::{
    Annotation, FunctionRecord, OpsClient, OpsError, RegisterFunction, Result as OpsResult,
};

static LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that mutate process-wide state.
pub fn serial() -> MutexGuard<'static, ()> {
    // Opt-in crate diagnostics via RUST_LOG while debugging tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Installs a fresh in-memory exporter as the global tracer provider and
/// returns it for span inspection.
pub fn install_exporter() -> InMemorySpanExporter {
    let exporter = InMemorySpanExporter::default();
    let provider = TracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    global::set_tracer_provider(provider);
    exporter
}

/// Installs a no-op tracer provider, so started spans are non-recording.
pub fn install_noop_tracer() {
    global::set_tracer_provider(NoopTracerProvider::new());
}

/// All spans the exporter has finished so far.
pub fn finished_spans(exporter: &InMemorySpanExporter) -> Vec<SpanData> {
    exporter
        .get_finished_spans()
        .expect("in-memory exporter never fails")
}

/// Looks up an attribute value on an exported span.
pub fn attr(span: &SpanData, key: &str) -> Option<opentelemetry::Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

/// Attribute value rendered as a string, for assertion convenience.
pub fn attr_str(span: &SpanData, key: &str) -> Option<String> {
    attr(span, key).map(|value| value.as_str().into_owned())
}

/// In-memory [`OpsClient`] that records every interaction.
///
/// With `fail` set, every method returns a client error, which lets tests
/// observe the best-effort contract of the callers.
#[derive(Default)]
pub struct RecordingClient {
    pub fail: bool,
    pub known: Mutex<HashMap<String, FunctionRecord>>,
    pub find_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub annotations: Mutex<Vec<Annotation>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Preloads a registered function, as if an earlier process created it.
    pub fn preload(&self, hash: &str, uuid: &str, name: &str) {
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                hash.to_string(),
                FunctionRecord {
                    uuid: uuid.to_string(),
                    hash: hash.to_string(),
                    name: name.to_string(),
                },
            );
    }

    pub fn recorded_annotations(&self) -> Vec<Annotation> {
        self.annotations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl OpsClient for RecordingClient {
    async fn find_function_by_hash(&self, hash: &str) -> OpsResult<Option<FunctionRecord>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(OpsError::Client("registry unavailable".to_string()));
        }
        Ok(self
            .known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .cloned())
    }

    async fn register_function(&self, function: RegisterFunction) -> OpsResult<FunctionRecord> {
        let n = self.register_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(OpsError::Registration("registry unavailable".to_string()));
        }
        let record = FunctionRecord {
            uuid: format!("fn-{n}"),
            hash: function.hash.clone(),
            name: function.name.clone(),
        };
        self.known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(function.hash, record.clone());
        Ok(record)
    }

    async fn create_annotation(&self, annotation: Annotation) -> OpsResult<()> {
        if self.fail {
            return Err(OpsError::Annotation("store unavailable".to_string()));
        }
        self.annotations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(annotation);
        Ok(())
    }
}
