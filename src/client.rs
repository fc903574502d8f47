//! External backend seam: annotation store and function registry.
//!
//! The crate never talks to the network itself. Callers install an
//! [`OpsClient`] implementation once at startup ([`set_client`]); the trace
//! and version wrappers then make best-effort, fire-and-expect-failure calls
//! through it. Nothing at this layer retries, and a failing or absent client
//! never blocks or fails the primary wrapped call.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Pass/fail judgment attached to a trace span by [`super::trace::TracedResult::annotate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationLabel {
    Pass,
    Fail,
}

/// Annotation payload, keyed by the span and trace it judges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub span_id: String,
    pub trace_id: String,
    pub label: AnnotationLabel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// A function version as known to the remote registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionRecord {
    /// Server-assigned unique identifier for this version.
    pub uuid: String,
    /// SHA-256 hex digest of the registered closure code.
    pub hash: String,
    /// Display name of the registered function.
    pub name: String,
}

/// Payload for registering a new function version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterFunction {
    pub code: String,
    pub hash: String,
    pub name: String,
    pub signature: String,
    pub signature_hash: String,
}

/// Client for the remote annotation store and function registry.
///
/// Implementations own their transport, authentication, and retry policy;
/// this crate treats every call as a single best-effort attempt.
#[async_trait]
pub trait OpsClient: Send + Sync {
    /// Looks up a registered function version by its content hash.
    ///
    /// Returns `Ok(None)` when no version with that hash exists — a miss is
    /// not an error.
    async fn find_function_by_hash(&self, hash: &str) -> Result<Option<FunctionRecord>>;

    /// Registers a new function version and returns the created record.
    async fn register_function(&self, function: RegisterFunction) -> Result<FunctionRecord>;

    /// Reports an annotation for a finished span.
    async fn create_annotation(&self, annotation: Annotation) -> Result<()>;
}

/// Process-wide client slot. Configure once, read many.
static CLIENT: Mutex<Option<Arc<dyn OpsClient>>> = Mutex::new(None);

/// Installs the process-wide [`OpsClient`].
pub fn set_client(client: Arc<dyn OpsClient>) {
    let mut slot = CLIENT.lock().unwrap_or_else(PoisonError::into_inner);
    *slot = Some(client);
}

/// Returns the installed client, if any.
#[must_use]
pub fn client() -> Option<Arc<dyn OpsClient>> {
    CLIENT
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Clears the installed client. Intended for test isolation.
pub fn reset_client() {
    let mut slot = CLIENT.lock().unwrap_or_else(PoisonError::into_inner);
    *slot = None;
}
