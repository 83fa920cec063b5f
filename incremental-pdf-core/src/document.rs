use crate::structure::OutlineNode;
use std::collections::BTreeMap;

/// Key/value document metadata as extracted from the source document.
///
/// Keys are the source format's names (`title`, `author`, `year`, ...).
/// Values are raw bytes, normally UTF-8. Iteration order is sorted by key so
/// the information dictionary is reproducible.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentMetadata {
    entries: BTreeMap<String, Vec<u8>>,
}

impl DocumentMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl<K, V> FromIterator<(K, V)> for DocumentMetadata
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut metadata = DocumentMetadata::new();
        for (key, value) in iter {
            metadata.insert(key, value);
        }
        metadata
    }
}

/// Everything known about a document before its first page is rendered.
///
/// This is what [`IncrementalPdfWriter::init`](crate::IncrementalPdfWriter::init)
/// reserves object numbers from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DocumentLayout {
    pub page_count: usize,
    pub outline: Vec<OutlineNode>,
    pub metadata: DocumentMetadata,
    /// JBIG2 globals segments known up front
    pub jbig2_globals: usize,
    /// Upper bound on globals segments discovered while rendering
    pub estimated_max_jbig2_globals: usize,
}

impl DocumentLayout {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            ..Self::default()
        }
    }

    pub fn with_outline(mut self, outline: Vec<OutlineNode>) -> Self {
        self.outline = outline;
        self
    }

    pub fn with_metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_jbig2_globals(mut self, count: usize) -> Self {
        self.jbig2_globals = count;
        self
    }

    pub fn with_estimated_jbig2_globals(mut self, count: usize) -> Self {
        self.estimated_max_jbig2_globals = count;
        self
    }

    /// Number of globals object numbers to reserve
    pub fn jbig2_global_slots(&self) -> usize {
        self.jbig2_globals.max(self.estimated_max_jbig2_globals)
    }
}
