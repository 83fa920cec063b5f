//! Structural checks for written documents
//!
//! This is not a general PDF parser. It reads back the subset of the format
//! the writer produces: a single classic cross-reference table, a trailer and
//! uncompressed dictionaries. It is used by the test suite and by the CLI's
//! `validate` command.

use crate::error::{PdfError, Result};
use crate::objects::ObjectId;
use std::path::Path;
use tracing::debug;

/// What [`inspect`] learned about a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfSummary {
    /// Version from the `%PDF-` header
    pub version: String,
    /// `/Size` from the trailer
    pub size: u32,
    /// Object numbers marked in use in the cross-reference table
    pub in_use: Vec<u32>,
    pub root: ObjectId,
    pub info: Option<ObjectId>,
    /// `/Count` of the page tree root
    pub page_count: usize,
    pub has_outline: bool,
    pub startxref: u64,
}

impl PdfSummary {
    pub fn object_count(&self) -> usize {
        self.in_use.len()
    }
}

fn invalid(message: impl Into<String>) -> PdfError {
    PdfError::InvalidStructure(message.into())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

/// Whitespace-separated tokens following `key`, where `key` must end at a delimiter
fn tokens_after<'a>(text: &'a str, key: &str) -> Option<std::str::SplitWhitespace<'a>> {
    let mut from = 0;
    while let Some(found) = text[from..].find(key) {
        let end = from + found + key.len();
        let boundary = text[end..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || "/<[(".contains(c));
        if boundary {
            return Some(text[end..].split_whitespace());
        }
        from = end;
    }
    None
}

fn find_integer(text: &str, key: &str) -> Option<u64> {
    tokens_after(text, key)?.next()?.parse().ok()
}

fn find_reference(text: &str, key: &str) -> Option<ObjectId> {
    let mut tokens = tokens_after(text, key)?;
    let number = tokens.next()?.parse().ok()?;
    let generation = tokens.next()?.parse().ok()?;
    (tokens.next()? == "R").then(|| ObjectId::new(number, generation))
}

/// Dictionary text of the object starting at `offset`
fn object_text(bytes: &[u8], offset: u64) -> Result<String> {
    let start = usize::try_from(offset).map_err(|_| invalid("offset overflow"))?;
    let body = bytes
        .get(start..)
        .ok_or_else(|| invalid(format!("offset {offset} past end of file")))?;
    let end = [find(body, b"stream"), find(body, b"endobj")]
        .into_iter()
        .flatten()
        .min()
        .ok_or_else(|| invalid(format!("unterminated object at {offset}")))?;
    Ok(String::from_utf8_lossy(&body[..end]).into_owned())
}

fn parse_xref_entry(line: &[u8]) -> Result<Option<u64>> {
    let shown = String::from_utf8_lossy(line);
    if line.len() != 20 || !line.ends_with(b" \n") {
        return Err(invalid(format!("malformed xref entry {shown:?}")));
    }
    let (digits, rest) = line.split_at(10);
    if !digits.iter().all(u8::is_ascii_digit) || rest[0] != b' ' {
        return Err(invalid(format!("bad xref offset in {shown:?}")));
    }
    let offset = digits
        .iter()
        .fold(0u64, |acc, d| acc * 10 + u64::from(d - b'0'));
    match line[17] {
        b'n' => Ok(Some(offset)),
        b'f' => Ok(None),
        _ => Err(invalid(format!("bad xref flag in {shown:?}"))),
    }
}

/// Check the document structure and summarize it.
pub fn inspect(bytes: &[u8]) -> Result<PdfSummary> {
    if !bytes.starts_with(b"%PDF-") {
        return Err(invalid("missing %PDF- header"));
    }
    let header_end = find(bytes, b"\n").ok_or_else(|| invalid("truncated header"))?;
    let version = String::from_utf8_lossy(&bytes[5..header_end]).trim().to_string();

    let trimmed = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    if !trimmed.ends_with(b"%%EOF") {
        return Err(invalid("missing %%EOF marker"));
    }

    let startxref_at = rfind(bytes, b"startxref").ok_or_else(|| invalid("missing startxref"))?;
    let tail = String::from_utf8_lossy(&bytes[startxref_at + b"startxref".len()..]).into_owned();
    let startxref: u64 = tail
        .split_whitespace()
        .next()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| invalid("unreadable startxref value"))?;

    let xref_start = usize::try_from(startxref).map_err(|_| invalid("startxref overflow"))?;
    let xref = bytes
        .get(xref_start..)
        .filter(|rest| rest.starts_with(b"xref\n"))
        .ok_or_else(|| invalid(format!("startxref {startxref} does not point at xref")))?;

    let subsection_end = find(&xref[5..], b"\n").ok_or_else(|| invalid("truncated xref"))? + 5;
    let subsection = String::from_utf8_lossy(&xref[5..subsection_end]).into_owned();
    let mut parts = subsection.split_whitespace();
    let first: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(u32::MAX);
    let count: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(|| invalid("unreadable xref subsection"))?;
    if first != 0 {
        return Err(invalid("xref subsection must start at object 0"));
    }

    let entries_start = subsection_end + 1;
    let entries_len = count as usize * 20;
    let entries = xref
        .get(entries_start..entries_start + entries_len)
        .ok_or_else(|| invalid("truncated xref entries"))?;

    let mut in_use = Vec::new();
    for (number, line) in entries.chunks(20).enumerate() {
        if let Some(offset) = parse_xref_entry(line)? {
            let expected = format!("{number} 0 obj");
            let at = usize::try_from(offset).map_err(|_| invalid("offset overflow"))?;
            if !bytes
                .get(at..)
                .is_some_and(|rest| rest.starts_with(expected.as_bytes()))
            {
                return Err(invalid(format!(
                    "xref entry for object {number} points at offset {offset}, which is not its header"
                )));
            }
            in_use.push(number as u32);
        }
    }

    let trailer_bytes = startxref_at
        .checked_sub(xref_start)
        .and_then(|end| xref.get(entries_start + entries_len..end))
        .ok_or_else(|| invalid("missing trailer after xref table"))?;
    let trailer_text = String::from_utf8_lossy(trailer_bytes).into_owned();
    if !trailer_text.trim_start().starts_with("trailer") {
        return Err(invalid("missing trailer after xref table"));
    }
    let size =
        find_integer(&trailer_text, "/Size").ok_or_else(|| invalid("trailer lacks /Size"))?;
    if size != u64::from(count) {
        return Err(invalid(format!(
            "trailer /Size {size} disagrees with xref count {count}"
        )));
    }
    let root =
        find_reference(&trailer_text, "/Root").ok_or_else(|| invalid("trailer lacks /Root"))?;
    let info = find_reference(&trailer_text, "/Info");

    let offset_for = |id: ObjectId| -> Result<u64> {
        let line = entries
            .chunks(20)
            .nth(id.number() as usize)
            .ok_or_else(|| invalid(format!("object {id} outside xref")))?;
        parse_xref_entry(line)?.ok_or_else(|| invalid(format!("object {id} is not in use")))
    };

    let catalog = object_text(bytes, offset_for(root)?)?;
    if !catalog.contains("/Type /Catalog") {
        return Err(invalid("root object is not a catalog"));
    }
    let pages_id =
        find_reference(&catalog, "/Pages").ok_or_else(|| invalid("catalog lacks /Pages"))?;
    let pages = object_text(bytes, offset_for(pages_id)?)?;
    let page_count =
        find_integer(&pages, "/Count").ok_or_else(|| invalid("page tree lacks /Count"))?;

    let summary = PdfSummary {
        version,
        size: count,
        in_use,
        root,
        info,
        page_count: page_count as usize,
        has_outline: catalog.contains("/Outlines"),
        startxref,
    };
    debug!(?summary, "inspected PDF");
    Ok(summary)
}

/// Read and [`inspect`] a file
pub fn inspect_file(path: impl AsRef<Path>) -> Result<PdfSummary> {
    let bytes = std::fs::read(path)?;
    inspect(&bytes)
}

/// Whether `path` holds a structurally sound PDF
pub fn is_valid_pdf(path: impl AsRef<Path>) -> bool {
    inspect_file(path).is_ok()
}
