//! Content-type to codec mapping.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{Codec, JsonCodec, ProtoCodec};

/// Maps `Content-Type` values to codecs.
///
/// [`CodecSelector::default`] knows `application/json` and
/// `application/octet-stream`. Matching is exact and case-sensitive.
#[derive(Clone)]
pub struct CodecSelector {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

impl CodecSelector {
    /// A selector that knows no content types.
    pub fn empty() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Add a codec under its own content type, returning the one it replaced.
    pub fn register(&mut self, codec: Arc<dyn Codec>) -> Option<Arc<dyn Codec>> {
        self.codecs.insert(codec.content_type().to_owned(), codec)
    }

    /// Look up the codec for a content type.
    pub fn select(&self, content_type: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(content_type).cloned()
    }

    /// Registered content types, sorted.
    pub fn content_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.codecs.keys().cloned().collect();
        types.sort();
        types
    }
}

impl Default for CodecSelector {
    fn default() -> Self {
        let mut selector = Self::empty();
        let _ = selector.register(Arc::new(JsonCodec));
        let _ = selector.register(Arc::new(ProtoCodec));
        selector
    }
}

impl std::fmt::Debug for CodecSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecSelector")
            .field("content_types", &self.content_types())
            .finish()
    }
}
