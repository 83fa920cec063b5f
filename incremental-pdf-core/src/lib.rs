//! # incremental-pdf
//!
//! A single-pass, thread-safe PDF writer for scanned documents whose pages are
//! made of pre-encoded JPEG and JBIG2 layers, as produced when converting DjVu
//! books to PDF.
//!
//! ## Features
//!
//! - **Streaming output**: each page is serialized as soon as it is rendered
//! - **Any order, any thread**: pages may arrive out of order from worker threads
//! - **Compound pages**: JPEG background with a JBIG2 foreground mask
//! - **Shared JBIG2 dictionaries**: globals streams referenced by many pages
//! - **Outlines and metadata**: nested bookmarks and Unicode document info
//! - **Atomic installation**: finished files appear at their path in one rename
//!
//! ## Quick Start
//!
//! ```rust
//! use incremental_pdf::{
//!     DocumentLayout, DocumentMetadata, IncrementalPdfWriter, OutlineNode, PageImage,
//!     PageInfo, Placement, Result,
//! };
//!
//! # fn main() -> Result<()> {
//! let layout = DocumentLayout::new(2)
//!     .with_outline(vec![OutlineNode::new("Chapter 1", 0)])
//!     .with_metadata(DocumentMetadata::new().with("title", "Résumé"));
//!
//! let writer = IncrementalPdfWriter::new();
//! writer.init(&layout)?;
//!
//! // Pages may be written in any order
//! for index in [1, 0] {
//!     let scan = PageImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9], 850, 1100, true)
//!         .placed(Placement::full_page(612.0, 792.0));
//!     writer.write_page(index, &PageInfo::letter().with_image(scan))?;
//! }
//!
//! writer.finalize(&[])?;
//! let pdf = writer.into_inner()?;
//! assert!(pdf.ends_with(b"%%EOF\n"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`writer`] - The incremental writer and atomic output helpers
//! - [`pipeline`] - Parallel page rendering and job tracking
//! - [`page`] - Page descriptions and layer classification
//! - [`graphics`] - Image layers and content streams
//! - [`structure`] - Outline flattening
//! - [`validate`] - Structural checks of written files

pub mod document;
pub mod encoding;
pub mod error;
pub mod graphics;
pub mod objects;
pub mod page;
pub mod pipeline;
pub mod structure;
pub mod validate;
pub mod writer;

pub use document::{DocumentLayout, DocumentMetadata};
pub use error::{PdfError, Result};
pub use graphics::{parse_jpeg_header, GraphicsContext, ImageKind, PageImage, Placement};
pub use page::{PageInfo, PageLayout};
pub use pipeline::{
    render_pages, ConversionReport, ConversionTracker, JobKey, JobState, PageSource,
    PipelineOptions,
};
pub use structure::{flatten_outline, OutlineNode};
pub use validate::{inspect, inspect_file, is_valid_pdf, PdfSummary};
pub use writer::{IncrementalPdfWriter, PageStatus, WriterOptions};

/// Current version of incremental-pdf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
