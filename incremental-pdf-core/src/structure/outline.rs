//! Document outline (bookmarks) according to ISO 32000-1 Section 12.3.3
//!
//! Callers describe the outline as a nested tree of [`OutlineNode`]s. Before
//! any object number is reserved the tree is flattened into
//! [`PdfOutlineItem`]s, which mirror the linked sibling/child structure of
//! PDF outline item dictionaries.

use serde::{Deserialize, Deserializer};

/// A heading in the source document's table of contents
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OutlineNode {
    /// Raw title bytes, normally UTF-8
    #[serde(deserialize_with = "title_from_string")]
    pub title: Vec<u8>,
    /// Zero-based target page, `None` when the heading could not be resolved
    #[serde(default, rename = "page")]
    pub page_index: Option<usize>,
    /// Nested headings
    #[serde(default)]
    pub children: Vec<OutlineNode>,
}

fn title_from_string<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(String::into_bytes)
}

impl OutlineNode {
    /// Create a heading pointing at `page_index`
    pub fn new(title: impl Into<Vec<u8>>, page_index: usize) -> Self {
        Self {
            title: title.into(),
            page_index: Some(page_index),
            children: Vec::new(),
        }
    }

    /// Create a heading without a resolved target page
    pub fn unresolved(title: impl Into<Vec<u8>>) -> Self {
        Self {
            title: title.into(),
            page_index: None,
            children: Vec::new(),
        }
    }

    /// Add child heading
    pub fn add_child(&mut self, child: OutlineNode) {
        self.children.push(child);
    }

    /// Builder form of [`add_child`](Self::add_child)
    pub fn with_child(mut self, child: OutlineNode) -> Self {
        self.children.push(child);
        self
    }

    /// Count this node and everything below it
    pub fn count_all(&self) -> usize {
        1 + self.children.iter().map(OutlineNode::count_all).sum::<usize>()
    }
}

/// One outline item dictionary, linked by indices into the flattened list
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfOutlineItem {
    pub title: Vec<u8>,
    pub page_index: Option<usize>,
    pub parent: Option<usize>,
    pub first_child: Option<usize>,
    pub last_child: Option<usize>,
    pub prev: Option<usize>,
    pub next: Option<usize>,
    /// Number of descendants at every depth, written as `/Count`
    pub count: usize,
}

/// Flattened outline plus the span of its top level
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatOutline {
    pub items: Vec<PdfOutlineItem>,
    pub first: Option<usize>,
    pub last: Option<usize>,
    /// Total number of items, used for the root `/Count`
    pub descendants: usize,
}

impl FlatOutline {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Default)]
struct LevelSpan {
    first: Option<usize>,
    last: Option<usize>,
    descendants: usize,
}

/// Flatten an outline forest depth-first.
///
/// Items appear in document order: each node precedes its children, and
/// siblings are linked through `prev`/`next`.
pub fn flatten_outline(nodes: &[OutlineNode]) -> FlatOutline {
    let mut items = Vec::with_capacity(nodes.iter().map(OutlineNode::count_all).sum());
    let span = flatten_level(&mut items, nodes, None);
    FlatOutline {
        items,
        first: span.first,
        last: span.last,
        descendants: span.descendants,
    }
}

fn flatten_level(
    items: &mut Vec<PdfOutlineItem>,
    nodes: &[OutlineNode],
    parent: Option<usize>,
) -> LevelSpan {
    let mut span = LevelSpan::default();
    let mut prev: Option<usize> = None;

    for node in nodes {
        let idx = items.len();
        items.push(PdfOutlineItem {
            title: node.title.clone(),
            page_index: node.page_index,
            parent,
            ..PdfOutlineItem::default()
        });

        span.first.get_or_insert(idx);
        if let Some(p) = prev {
            items[p].next = Some(idx);
            items[idx].prev = Some(p);
        }
        prev = Some(idx);

        if !node.children.is_empty() {
            let children = flatten_level(items, &node.children, Some(idx));
            let item = &mut items[idx];
            item.first_child = children.first;
            item.last_child = children.last;
            item.count = children.descendants;
        }

        span.last = Some(idx);
        span.descendants += 1 + items[idx].count;
    }

    span
}
