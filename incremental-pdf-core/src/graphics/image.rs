//! Pre-encoded page images
//!
//! The writer never decodes or re-encodes pixels. A [`PageImage`] carries the
//! encoder's output bytes together with the few header facts the image
//! XObject dictionary needs.

use crate::{PdfError, Result};

/// Compression of an encoded image stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Baseline or progressive JPEG, written with `/DCTDecode`
    Jpeg,
    /// JBIG2 page stream, written with `/JBIG2Decode`
    Jbig2,
}

impl ImageKind {
    pub fn filter_name(&self) -> &'static str {
        match self {
            ImageKind::Jpeg => "DCTDecode",
            ImageKind::Jbig2 => "JBIG2Decode",
        }
    }
}

/// Rectangle in PDF user space (points) the image is scaled into
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Placement {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Cover a whole page of the given size
    pub fn full_page(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// An encoded image ready to be embedded as an image XObject
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub kind: ImageKind,
    /// Single gray channel instead of RGB (JPEG only)
    pub gray: bool,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Index into the document's JBIG2 globals table (JBIG2 only)
    pub jbig2_globals: Option<usize>,
    pub placement: Placement,
    /// Encoded stream body
    pub data: Vec<u8>,
}

impl PageImage {
    /// JPEG image with known pixel dimensions
    pub fn jpeg(data: Vec<u8>, width: u32, height: u32, gray: bool) -> Self {
        Self {
            kind: ImageKind::Jpeg,
            gray,
            width,
            height,
            jbig2_globals: None,
            placement: Placement::default(),
            data,
        }
    }

    /// JPEG image whose dimensions and color mode are read from its header
    pub fn jpeg_from_data(data: Vec<u8>) -> Result<Self> {
        let header = parse_jpeg_header(&data)?;
        let gray = match header.components {
            1 => true,
            3 => false,
            n => {
                return Err(PdfError::InvalidImage(format!(
                    "Unsupported number of components: {n}"
                )))
            }
        };
        Ok(Self::jpeg(data, header.width, header.height, gray))
    }

    /// Bitonal JBIG2 page stream depending on the globals segment `globals`
    pub fn jbig2(data: Vec<u8>, width: u32, height: u32, globals: usize) -> Self {
        Self {
            kind: ImageKind::Jbig2,
            gray: true,
            width,
            height,
            jbig2_globals: Some(globals),
            placement: Placement::default(),
            data,
        }
    }

    /// Set the placement rectangle
    pub fn placed(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    /// Images without encoded bytes are treated as absent
    pub fn is_present(&self) -> bool {
        !self.data.is_empty()
    }
}

/// Facts read from a JPEG start-of-frame segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegHeader {
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

/// Parse a JPEG stream up to its first SOF marker
pub fn parse_jpeg_header(data: &[u8]) -> Result<JpegHeader> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(PdfError::InvalidImage("Not a valid JPEG file".to_string()));
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            return Err(PdfError::InvalidImage("Invalid JPEG marker".to_string()));
        }

        let marker = data[pos + 1];
        pos += 2;

        match marker {
            // Fill bytes
            0xFF => pos -= 1,
            // SOF0..SOF15 except DHT, JPG and DAC
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                if pos + 7 >= data.len() {
                    return Err(PdfError::InvalidImage("Truncated JPEG file".to_string()));
                }
                // Skip segment length and precision
                let p = pos + 3;
                let height = u32::from(data[p]) << 8 | u32::from(data[p + 1]);
                let width = u32::from(data[p + 2]) << 8 | u32::from(data[p + 3]);
                let components = data[p + 4];
                if width == 0 || height == 0 {
                    return Err(PdfError::InvalidImage(
                        "Could not find image dimensions".to_string(),
                    ));
                }
                return Ok(JpegHeader {
                    width,
                    height,
                    components,
                });
            }
            0xD9 => break,
            0xD8 | 0xD0..=0xD7 | 0x01 => {}
            _ => {
                if pos + 1 >= data.len() {
                    return Err(PdfError::InvalidImage("Truncated JPEG file".to_string()));
                }
                let length = usize::from(data[pos]) << 8 | usize::from(data[pos + 1]);
                pos += length;
            }
        }
    }

    Err(PdfError::InvalidImage(
        "Could not find image dimensions".to_string(),
    ))
}
