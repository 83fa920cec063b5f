//! The incremental writer itself

use crate::document::{DocumentLayout, DocumentMetadata};
use crate::encoding::encode_text_string;
use crate::error::{PdfError, Result};
use crate::graphics::{GraphicsContext, ImageKind, PageImage};
use crate::objects::{Dictionary, Object, ObjectId};
use crate::page::{PageInfo, PageLayout};
use crate::structure::{flatten_outline, FlatOutline};
use crate::writer::allocator::{ObjectTable, PageObjects};
use crate::writer::info::build_info_dictionary;
use crate::writer::output::persist_bytes;
use crate::writer::serializer::PdfSink;
use crate::writer::WriterOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Outcome of a successful [`IncrementalPdfWriter::write_page`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    /// The page's objects were appended to the output
    Written,
    /// The page had been written before; nothing was emitted
    AlreadyWritten,
}

/// State fixed by `init`
struct Prepared {
    table: ObjectTable,
    outline: FlatOutline,
    metadata: DocumentMetadata,
}

struct WriterState<W: Write> {
    sink: PdfSink<W>,
    document: Option<Prepared>,
    written: Vec<bool>,
    finalized: bool,
    /// Set when the sink rejected a write; the byte stream is then unusable
    failed: bool,
}

/// A PDF writer that accepts pages in any order from any thread.
///
/// Object numbers for the whole document are reserved by [`init`](Self::init).
/// After that, [`write_page`](Self::write_page) may be called concurrently and
/// out of order; each call appends one page's objects as a contiguous run.
/// [`finalize`](Self::finalize) then writes the catalog, page tree, outline,
/// JBIG2 globals, information dictionary, cross-reference table and trailer.
///
/// All mutation goes through a single mutex: pages are rendered in parallel
/// but serialized into the output one at a time.
///
/// # Example
///
/// ```rust
/// use incremental_pdf::{DocumentLayout, IncrementalPdfWriter, PageImage, PageInfo, Placement};
///
/// # fn main() -> incremental_pdf::Result<()> {
/// let writer = IncrementalPdfWriter::new();
/// writer.init(&DocumentLayout::new(1))?;
///
/// let jpeg = vec![0xFF, 0xD8, 0xFF, 0xD9];
/// let image = PageImage::jpeg(jpeg, 100, 100, false).placed(Placement::full_page(72.0, 72.0));
/// writer.write_page(0, &PageInfo::new(72.0, 72.0).with_image(image))?;
///
/// writer.finalize(&[])?;
/// let pdf = writer.into_inner()?;
/// assert!(pdf.starts_with(b"%PDF-1.7"));
/// # Ok(())
/// # }
/// ```
pub struct IncrementalPdfWriter<W: Write = Vec<u8>> {
    options: WriterOptions,
    state: Mutex<WriterState<W>>,
}

impl IncrementalPdfWriter<Vec<u8>> {
    /// Writer that builds the whole document in memory
    pub fn new() -> Self {
        Self::with_sink(Vec::new())
    }

    /// Copy of the bytes produced so far
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.lock()?.sink.get_ref().clone())
    }

    /// Install the finished document at `path` in one shot.
    ///
    /// Fails unless the document was finalized. The file appears at `path`
    /// only if every byte was written; a failed write leaves nothing there.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = self.lock()?;
        if !state.finalized {
            return Err(PdfError::NotFinalized);
        }
        let buffer = state.sink.get_ref();
        if buffer.is_empty() {
            return Err(PdfError::EmptyOutput);
        }
        persist_bytes(buffer, path)
    }
}

impl Default for IncrementalPdfWriter<Vec<u8>> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> IncrementalPdfWriter<W> {
    /// Writer that streams into `sink` as pages arrive
    pub fn with_sink(sink: W) -> Self {
        Self::with_options(sink, WriterOptions::default())
    }

    pub fn with_options(sink: W, options: WriterOptions) -> Self {
        Self {
            options,
            state: Mutex::new(WriterState {
                sink: PdfSink::new(sink),
                document: None,
                written: Vec::new(),
                finalized: false,
                failed: false,
            }),
        }
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    fn lock(&self) -> Result<MutexGuard<'_, WriterState<W>>> {
        self.state.lock().map_err(|_| PdfError::LockPoisoned)
    }

    /// Reserve every object number and write the file header.
    pub fn init(&self, layout: &DocumentLayout) -> Result<()> {
        let mut state = self.lock()?;
        if state.failed {
            return Err(PdfError::OutputFailed);
        }
        if state.document.is_some() {
            return Err(PdfError::AlreadyInitialized);
        }
        if layout.page_count == 0 {
            return Err(PdfError::InvalidPageCount(layout.page_count));
        }

        let outline = flatten_outline(&layout.outline);
        let table = ObjectTable::allocate(
            layout.page_count,
            layout.jbig2_global_slots(),
            outline.len(),
        );

        state.sink.reserve(table.max_object());
        if let Err(error) = state.sink.write_header(&self.options.version) {
            state.failed = true;
            return Err(error);
        }

        info!(
            pages = layout.page_count,
            outline_items = outline.len(),
            jbig2_globals = table.jbig2_globals.len(),
            objects = table.max_object(),
            "initialized PDF writer"
        );

        state.written = vec![false; layout.page_count];
        state.document = Some(Prepared {
            table,
            outline,
            metadata: layout.metadata.clone(),
        });
        Ok(())
    }

    /// Write one page.
    ///
    /// Every precondition is checked before the first byte is emitted, so a
    /// rejected page leaves the output exactly as it was. Writing a page a
    /// second time is a no-op that reports [`PageStatus::AlreadyWritten`].
    ///
    /// If the sink fails partway through, the writer refuses every later
    /// page and [`finalize`](Self::finalize) with [`PdfError::OutputFailed`].
    pub fn write_page(&self, index: usize, page: &PageInfo) -> Result<PageStatus> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let document = state.document.as_ref().ok_or(PdfError::NotInitialized)?;
        if state.finalized {
            return Err(PdfError::AlreadyFinalized);
        }
        if state.failed {
            return Err(PdfError::OutputFailed);
        }
        let count = document.table.page_count();
        if index >= count {
            return Err(PdfError::PageIndexOutOfRange { index, count });
        }
        if state.written[index] {
            debug!(page = index, "page already written");
            return Ok(PageStatus::AlreadyWritten);
        }

        let objs = document.table.page_objects[index];
        let plan = plan_page(index, page, &document.table)?;

        let emitted = emit_page(&mut state.sink, &plan, page, &objs, document.table.pages);
        if let Err(error) = emitted {
            for id in [objs.background, objs.mask, objs.image, objs.contents, objs.page] {
                state.sink.forget(id);
            }
            state.failed = true;
            warn!(page = index, %error, "output failed while writing page");
            return Err(error);
        }

        state.written[index] = true;
        debug!(
            page = index,
            images = plan.len(),
            end = state.sink.position(),
            "wrote page"
        );
        Ok(PageStatus::Written)
    }

    /// Write the document-level objects, the cross-reference table and trailer.
    ///
    /// `jbig2_globals` holds the shared JBIG2 dictionary streams, indexed like
    /// [`PageImage::jbig2_globals`]. Pages that were never written are left out
    /// of the page tree rather than failing the document.
    pub fn finalize(&self, jbig2_globals: &[Vec<u8>]) -> Result<()> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let document = state.document.as_ref().ok_or(PdfError::NotInitialized)?;
        if state.finalized {
            return Err(PdfError::AlreadyFinalized);
        }
        if state.failed {
            return Err(PdfError::OutputFailed);
        }

        let info = build_info_dictionary(
            &document.metadata,
            &self.options.producer,
            self.options.modification_date,
        );
        let emitted = emit_document(
            &mut state.sink,
            document,
            &state.written,
            jbig2_globals,
            info,
        );
        if let Err(error) = emitted {
            state.failed = true;
            warn!(%error, "output failed while finalizing");
            return Err(error);
        }

        state.finalized = true;
        info!(
            bytes = state.sink.position(),
            pages = state.written.iter().filter(|w| **w).count(),
            "finalized PDF"
        );
        Ok(())
    }

    /// True once a sink write has failed; nothing more will be written
    pub fn has_failed(&self) -> bool {
        self.lock().map(|s| s.failed).unwrap_or(true)
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().map(|s| s.document.is_some()).unwrap_or(false)
    }

    pub fn is_finalized(&self) -> bool {
        self.lock().map(|s| s.finalized).unwrap_or(false)
    }

    /// Number of pages reserved by `init`, zero before it
    pub fn page_count(&self) -> usize {
        self.lock().map(|s| s.written.len()).unwrap_or(0)
    }

    /// True once every reserved page has been written
    pub fn all_pages_written(&self) -> bool {
        self.lock()
            .map(|s| !s.written.is_empty() && s.written.iter().all(|w| *w))
            .unwrap_or(false)
    }

    /// Indices of the pages written so far, ascending
    pub fn written_pages(&self) -> Vec<usize> {
        self.lock()
            .map(|s| {
                s.written
                    .iter()
                    .enumerate()
                    .filter_map(|(i, w)| w.then_some(i))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of the reserved object numbers
    pub fn object_table(&self) -> Option<ObjectTable> {
        self.lock()
            .ok()
            .and_then(|s| s.document.as_ref().map(|d| d.table.clone()))
    }

    /// Byte offset of an object's `obj` keyword, if it has been written
    pub fn offset_of(&self, id: ObjectId) -> Option<u64> {
        self.lock().ok().and_then(|s| s.sink.offset_of(id))
    }

    /// Take the sink back once the document is complete
    pub fn into_inner(self) -> Result<W> {
        let state = self
            .state
            .into_inner()
            .map_err(|_| PdfError::LockPoisoned)?;
        if !state.finalized {
            return Err(PdfError::NotFinalized);
        }
        Ok(state.sink.into_inner())
    }
}

/// Append one page's XObjects, content stream and page dictionary
fn emit_page<W: Write>(
    sink: &mut PdfSink<W>,
    plan: &[PlacedImage<'_>],
    page: &PageInfo,
    objs: &PageObjects,
    pages: ObjectId,
) -> Result<()> {
    let mut content = GraphicsContext::new();
    let mut xobjects = Dictionary::new();

    for placed in plan {
        sink.write_stream(
            placed.id,
            image_dictionary(placed.image, placed.globals, placed.as_mask),
            &placed.image.data,
        )?;
        if placed.as_mask {
            content.draw_mask(placed.name, &placed.image.placement);
        } else {
            content.draw_image(placed.name, &placed.image.placement);
        }
        xobjects.set(placed.name, placed.id);
    }

    sink.write_stream(objs.contents, Dictionary::new(), &content.into_bytes())?;

    let page_dict = page_dictionary(page, objs, pages, xobjects);
    sink.write_object(objs.page, &Object::Dictionary(page_dict))
}

/// Catalog, page tree, outline, globals, info, xref and trailer
fn emit_document<W: Write>(
    sink: &mut PdfSink<W>,
    document: &Prepared,
    written: &[bool],
    jbig2_globals: &[Vec<u8>],
    info: Dictionary,
) -> Result<()> {
    let table = &document.table;

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::name("Catalog"));
    catalog.set("Pages", table.pages);
    if let Some(outlines) = table.outlines {
        catalog.set("Outlines", outlines);
        catalog.set("PageMode", Object::name("UseOutlines"));
    }
    sink.write_object(table.catalog, &Object::Dictionary(catalog))?;

    let kids: Vec<Object> = table
        .page_objects
        .iter()
        .zip(written)
        .filter(|(_, done)| **done)
        .map(|(objs, _)| Object::Reference(objs.page))
        .collect();
    let missing = table.page_count() - kids.len();
    if missing > 0 {
        warn!(missing, "finalizing with pages that were never written");
    }
    let mut pages = Dictionary::new();
    pages.set("Type", Object::name("Pages"));
    let count = kids.len();
    pages.set("Kids", Object::Array(kids));
    pages.set("Count", count);
    sink.write_object(table.pages, &Object::Dictionary(pages))?;

    if let Some(outlines_id) = table.outlines {
        write_outline(sink, table, &document.outline, outlines_id, written)?;
    }

    for (index, data) in jbig2_globals.iter().enumerate() {
        match table.jbig2_globals_object(index) {
            Some(id) => sink.write_stream(id, Dictionary::new(), data)?,
            None => warn!(index, "no object reserved for JBIG2 globals, skipped"),
        }
    }

    sink.write_object(table.info, &Object::Dictionary(info))?;

    let xref_position = sink.write_xref()?;
    sink.write_trailer(table.catalog, table.info, xref_position)?;
    sink.flush()
}

/// One image XObject a page will emit
struct PlacedImage<'a> {
    id: ObjectId,
    name: &'static str,
    image: &'a PageImage,
    globals: Option<ObjectId>,
    as_mask: bool,
}

fn resolve_globals(page: usize, image: &PageImage, table: &ObjectTable) -> Result<ObjectId> {
    image
        .jbig2_globals
        .and_then(|index| table.jbig2_globals_object(index))
        .ok_or(PdfError::MissingJbig2Globals {
            page,
            index: image.jbig2_globals,
        })
}

/// Decide which XObjects a page needs and resolve their dependencies
fn plan_page<'a>(
    index: usize,
    page: &'a PageInfo,
    table: &ObjectTable,
) -> Result<Vec<PlacedImage<'a>>> {
    let objs = &table.page_objects[index];
    match page.layout() {
        PageLayout::Compound { background, mask } => {
            if background.kind != ImageKind::Jpeg {
                return Err(PdfError::InvalidImage(format!(
                    "page {index}: background layer must be JPEG"
                )));
            }
            if mask.kind != ImageKind::Jbig2 {
                return Err(PdfError::InvalidImage(format!(
                    "page {index}: foreground mask must be JBIG2"
                )));
            }
            let mask_globals = resolve_globals(index, mask, table)?;
            Ok(vec![
                PlacedImage {
                    id: objs.background,
                    name: "BgIm",
                    image: background,
                    globals: None,
                    as_mask: false,
                },
                PlacedImage {
                    id: objs.mask,
                    name: "FgMask",
                    image: mask,
                    globals: Some(mask_globals),
                    as_mask: true,
                },
            ])
        }
        PageLayout::Single(image) => {
            let globals = match image.kind {
                ImageKind::Jpeg => None,
                ImageKind::Jbig2 => Some(resolve_globals(index, image, table)?),
            };
            Ok(vec![PlacedImage {
                id: objs.image,
                name: "Im",
                image,
                globals,
                as_mask: false,
            }])
        }
        PageLayout::Empty => Ok(Vec::new()),
    }
}

fn image_dictionary(image: &PageImage, globals: Option<ObjectId>, as_mask: bool) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", Object::name("XObject"));
    dict.set("Subtype", Object::name("Image"));
    dict.set("Width", image.width);
    dict.set("Height", image.height);

    if as_mask {
        dict.set("ImageMask", true);
        dict.set("BitsPerComponent", 1);
    } else {
        match image.kind {
            ImageKind::Jpeg => {
                let color_space = if image.gray { "DeviceGray" } else { "DeviceRGB" };
                dict.set("ColorSpace", Object::name(color_space));
                dict.set("BitsPerComponent", 8);
            }
            ImageKind::Jbig2 => {
                dict.set("ColorSpace", Object::name("DeviceGray"));
                dict.set("BitsPerComponent", 1);
            }
        }
    }

    dict.set("Filter", Object::name(image.kind.filter_name()));
    if let Some(globals) = globals {
        let mut parms = Dictionary::new();
        parms.set("JBIG2Globals", globals);
        dict.set("DecodeParms", parms);
    }
    dict
}

fn page_dictionary(
    page: &PageInfo,
    objs: &PageObjects,
    parent: ObjectId,
    xobjects: Dictionary,
) -> Dictionary {
    let mut resources = Dictionary::new();
    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }

    let mut dict = Dictionary::new();
    dict.set("Type", Object::name("Page"));
    dict.set("Parent", parent);
    dict.set(
        "MediaBox",
        vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page.width),
            Object::Real(page.height),
        ],
    );
    dict.set("Resources", resources);
    dict.set("Contents", objs.contents);
    dict
}

/// Pick the page an outline item points at.
///
/// Out-of-range targets are clamped to the first page; a target that was
/// never written falls back to the first written page.
fn resolve_destination(target: Option<usize>, written: &[bool]) -> Option<usize> {
    let index = match target {
        Some(i) if i < written.len() => i,
        other => {
            warn!(requested = ?other, "outline target out of range, using first page");
            0
        }
    };
    if written.get(index).copied().unwrap_or(false) {
        Some(index)
    } else {
        written.iter().position(|w| *w)
    }
}

fn write_outline<W: Write>(
    sink: &mut PdfSink<W>,
    table: &ObjectTable,
    outline: &FlatOutline,
    outlines_id: ObjectId,
    written: &[bool],
) -> Result<()> {
    let ids = &table.outline_items;

    let mut root = Dictionary::new();
    root.set("Type", Object::name("Outlines"));
    if let (Some(first), Some(last)) = (outline.first, outline.last) {
        root.set("First", ids[first]);
        root.set("Last", ids[last]);
        root.set("Count", outline.descendants);
    }
    sink.write_object(outlines_id, &Object::Dictionary(root))?;

    for (item, &id) in outline.items.iter().zip(ids) {
        let mut dict = Dictionary::new();
        dict.set("Title", encode_text_string(&item.title));
        dict.set("Parent", item.parent.map_or(outlines_id, |p| ids[p]));
        if let Some(page) = resolve_destination(item.page_index, written) {
            dict.set(
                "Dest",
                vec![
                    Object::Reference(table.page_objects[page].page),
                    Object::name("Fit"),
                ],
            );
        }
        if let Some(prev) = item.prev {
            dict.set("Prev", ids[prev]);
        }
        if let Some(next) = item.next {
            dict.set("Next", ids[next]);
        }
        if let (Some(first), Some(last)) = (item.first_child, item.last_child) {
            dict.set("First", ids[first]);
            dict.set("Last", ids[last]);
            dict.set("Count", item.count);
        }
        sink.write_object(id, &Object::Dictionary(dict))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Placement;

    #[test]
    fn test_resolve_destination() {
        let written = [false, true, true];
        assert_eq!(resolve_destination(Some(2), &written), Some(2));
        // unwritten target falls back to the first written page
        assert_eq!(resolve_destination(Some(0), &written), Some(1));
        // out of range is clamped to page 0 first
        assert_eq!(resolve_destination(Some(7), &written), Some(1));
        assert_eq!(resolve_destination(None, &[true]), Some(0));
        assert_eq!(resolve_destination(Some(0), &[false, false]), None);
    }

    #[test]
    fn test_image_dictionary_for_gray_jpeg() {
        let image = PageImage::jpeg(vec![1], 10, 20, true);
        let dict = image_dictionary(&image, None, false);
        let keys: Vec<&str> = dict.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["Type", "Subtype", "Width", "Height", "ColorSpace", "BitsPerComponent", "Filter"]
        );
        assert_eq!(dict.get("ColorSpace"), Some(&Object::name("DeviceGray")));
        assert_eq!(dict.get("BitsPerComponent"), Some(&Object::Integer(8)));
    }

    #[test]
    fn test_image_dictionary_for_mask() {
        let image = PageImage::jbig2(vec![1], 10, 20, 0);
        let dict = image_dictionary(&image, Some(ObjectId::new(4, 0)), true);
        assert_eq!(dict.get("ImageMask"), Some(&Object::Boolean(true)));
        assert!(!dict.contains_key("ColorSpace"));
        let parms = dict.get("DecodeParms").and_then(Object::as_dict).unwrap();
        assert_eq!(
            parms.get("JBIG2Globals"),
            Some(&Object::Reference(ObjectId::new(4, 0)))
        );
    }

    #[test]
    fn test_compound_page_requires_jpeg_background() {
        let table = ObjectTable::allocate(1, 1, 0);
        let wrong = PageImage::jbig2(vec![1], 10, 10, 0);
        let mask = PageImage::jbig2(vec![1], 10, 10, 0);
        let page = PageInfo::new(10.0, 10.0).with_layers(wrong, mask);
        assert!(matches!(
            plan_page(0, &page, &table),
            Err(PdfError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_streaming_sink_receives_bytes_as_pages_arrive() {
        let writer = IncrementalPdfWriter::with_sink(Vec::new());
        writer.init(&DocumentLayout::new(2)).unwrap();
        let header_len = writer.to_bytes().unwrap().len();

        let image = PageImage::jpeg(vec![0xFF, 0xD8], 1, 1, true)
            .placed(Placement::full_page(10.0, 10.0));
        writer
            .write_page(1, &PageInfo::new(10.0, 10.0).with_image(image))
            .unwrap();
        assert!(writer.to_bytes().unwrap().len() > header_len);
        assert_eq!(writer.written_pages(), vec![1]);
        assert_eq!(writer.page_count(), 2);
        assert!(writer.is_initialized());
        assert!(!writer.is_finalized());
    }
}
