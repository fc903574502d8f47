//! Content-addressed function identity.
//!
//! A closure, in the versioning sense, is a function's complete reproducible
//! source snapshot. [`ClosureMetadata`] pins that snapshot down to two
//! independent SHA-256 digests: one over the canonicalized assembled code,
//! one over just the declared signature — so a body edit changes `hash`
//! without necessarily touching `signature_hash`.
//!
//! The preferred producer of this metadata is a build-time extraction step
//! that sees the true pre-compilation source. When none ran, the runtime
//! fallback hashes the compiler's textual name for the function type, which
//! is a strictly weaker approximation: it cannot see source and is not
//! portable across build configurations. That limitation is inherent to the
//! fallback, not something this layer can resolve.

use sha2::{Digest, Sha256};

/// Content-addressed identity of one function version.
///
/// Immutable once computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureMetadata {
    /// Canonicalized assembled source of the function.
    pub code: String,
    /// SHA-256 hex digest of `code`.
    pub hash: String,
    /// Canonicalized declared signature text.
    pub signature: String,
    /// SHA-256 hex digest of `signature`, independent of the body.
    pub signature_hash: String,
}

impl ClosureMetadata {
    /// Computes metadata from assembled source and signature text.
    ///
    /// Both inputs are canonicalized (line endings normalized, trailing
    /// whitespace stripped) before hashing, so formatting-only differences
    /// at line ends do not change identity.
    #[must_use]
    pub fn new(code: impl AsRef<str>, signature: impl AsRef<str>) -> Self {
        let code = canonicalize(code.as_ref());
        let signature = canonicalize(signature.as_ref());
        let hash = sha256_hex(&code);
        let signature_hash = sha256_hex(&signature);
        Self {
            code,
            hash,
            signature,
            signature_hash,
        }
    }

    /// Runtime fallback: derives metadata from the function's type name when
    /// no build-time extraction step supplied the real source.
    pub(crate) fn from_type_name(type_name: &str) -> Self {
        Self::new(type_name, type_name)
    }
}

/// Normalizes line endings and strips trailing whitespace per line and at
/// the end of the text.
fn canonicalize(source: &str) -> String {
    let normalized = source.replace("\r\n", "\n");
    let mut lines: Vec<&str> = normalized.lines().map(str::trim_end).collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// SHA-256 hex digest of a text.
fn sha256_hex(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().fold(
        String::with_capacity(digest.len() * 2),
        |mut out, byte| {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
            out
        },
    )
}
