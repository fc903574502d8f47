//! Header-bag carrier for context propagation.
//!
//! [`Carrier`] is the wire-side collaborator of the propagator: a map from
//! header name to one-or-many string values, typically HTTP headers. It
//! implements the OpenTelemetry [`Extractor`] and [`Injector`] traits so the
//! standard propagators can read and write it directly. The carrier owns
//! nothing beyond the call: propagators mutate it in place.

use std::collections::BTreeMap;

use opentelemetry::propagation::{Extractor, Injector};

/// A header value: either a single string or a list of strings.
///
/// Multi-valued headers are tolerated on extraction (the first element is
/// used); injection always writes single values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderValue {
    /// First usable string of this value, if any.
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.as_str()),
            Self::Multi(values) => values.first().map(String::as_str),
        }
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<String>> for HeaderValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multi(values)
    }
}

/// Header bag used to carry trace context across process boundaries.
///
/// Lookups are case-insensitive, matching HTTP header semantics. Keys keep
/// the casing they were inserted with.
#[derive(Debug, Default, Clone)]
pub struct Carrier {
    entries: BTreeMap<String, HeaderValue>,
}

impl Carrier {
    /// Creates an empty carrier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive lookup returning the first value of the header.
    ///
    /// Returns `None` when the header is absent or its value list is empty.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .and_then(|(_, value)| value.first())
    }

    /// Inserts or replaces a header.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Whether a header is present, ignoring ASCII case.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .keys()
            .any(|name| name.eq_ignore_ascii_case(key))
    }

    /// Header names, in insertion-independent (sorted) order.
    #[must_use]
    pub fn header_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Number of headers in the bag.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the bag holds no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Carrier
where
    K: Into<String>,
    V: Into<HeaderValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut carrier = Self::new();
        for (key, value) in iter {
            carrier.insert(key, value);
        }
        carrier
    }
}

impl Extractor for Carrier {
    fn get(&self, key: &str) -> Option<&str> {
        Carrier::get(self, key)
    }

    fn keys(&self) -> Vec<&str> {
        self.header_names()
    }
}

impl Injector for Carrier {
    fn set(&mut self, key: &str, value: String) {
        self.insert(key, value);
    }
}
