//! Request-scoped metadata and the context handed to handlers.

use std::collections::HashMap;
use std::sync::Arc;

/// String key/value metadata propagated from message headers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata(HashMap<String, String>);

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value by exact key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert a value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over all entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<HashMap<String, String>> for Metadata {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Per-request execution context.
///
/// Carries metadata only: there is no deadline and no cancellation signal.
/// Cloning is cheap, the metadata sits behind an `Arc`.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    metadata: Arc<Metadata>,
}

impl RequestContext {
    /// A context with no metadata attached.
    pub fn background() -> Self {
        Self::default()
    }

    /// Attach metadata, replacing whatever this context carried.
    #[must_use]
    pub fn with_metadata(self, metadata: impl Into<Metadata>) -> Self {
        Self {
            metadata: Arc::new(metadata.into()),
        }
    }

    /// The attached metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
