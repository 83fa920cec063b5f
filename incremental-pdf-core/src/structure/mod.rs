//! Document structure: outline flattening

pub mod outline;

pub use outline::{flatten_outline, FlatOutline, OutlineNode, PdfOutlineItem};
