//! JSON description of a document to assemble
//!
//! Image paths are resolved relative to the manifest's directory. Image bytes
//! are loaded by the worker that renders the page, not up front.

use anyhow::{bail, Context, Result};
use incremental_pdf::{
    DocumentLayout, DocumentMetadata, ImageKind, OutlineNode, PageImage, PageInfo, PageSource,
    PdfError, Placement,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Jpeg,
    Jbig2,
}

impl From<ImageFormat> for ImageKind {
    fn from(format: ImageFormat) -> Self {
        match format {
            ImageFormat::Jpeg => ImageKind::Jpeg,
            ImageFormat::Jbig2 => ImageKind::Jbig2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageEntry {
    pub kind: ImageFormat,
    pub file: PathBuf,
    /// Pixel size; read from the header for JPEG files when omitted
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub gray: Option<bool>,
    /// Index into the manifest's `jbig2_globals` list
    pub globals: Option<usize>,
    /// `[x, y, width, height]` in points, the whole page when omitted
    pub placement: Option<[f64; 4]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageEntry {
    pub width: f64,
    pub height: f64,
    pub image: Option<ImageEntry>,
    pub background: Option<ImageEntry>,
    pub mask: Option<ImageEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub outline: Vec<OutlineNode>,
    #[serde(default)]
    pub jbig2_globals: Vec<PathBuf>,
    pub pages: Vec<PageEntry>,
    #[serde(skip)]
    base_dir: PathBuf,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let mut manifest: Manifest = serde_json::from_str(&text)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        if manifest.pages.is_empty() {
            bail!("Manifest {} lists no pages", path.display());
        }
        manifest.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(manifest)
    }

    fn resolve(&self, file: &Path) -> PathBuf {
        self.base_dir.join(file)
    }

    pub fn layout(&self) -> DocumentLayout {
        let metadata: DocumentMetadata = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        DocumentLayout::new(self.pages.len())
            .with_outline(self.outline.clone())
            .with_metadata(metadata)
            .with_jbig2_globals(self.jbig2_globals.len())
    }

    /// Read every JBIG2 globals stream, in index order
    pub fn load_globals(&self) -> Result<Vec<Vec<u8>>> {
        self.jbig2_globals
            .iter()
            .map(|file| {
                let path = self.resolve(file);
                fs::read(&path)
                    .with_context(|| format!("Failed to read JBIG2 globals {}", path.display()))
            })
            .collect()
    }

    fn load_image(&self, entry: &ImageEntry, page: &PageEntry) -> incremental_pdf::Result<PageImage> {
        let data = fs::read(self.resolve(&entry.file))?;
        let placement = entry
            .placement
            .map(|[x, y, w, h]| Placement::new(x, y, w, h))
            .unwrap_or_else(|| Placement::full_page(page.width, page.height));

        let mut image = match ImageKind::from(entry.kind) {
            ImageKind::Jpeg => match (entry.width, entry.height) {
                (Some(w), Some(h)) => PageImage::jpeg(data, w, h, entry.gray.unwrap_or(false)),
                _ => PageImage::jpeg_from_data(data)?,
            },
            ImageKind::Jbig2 => {
                let (Some(w), Some(h)) = (entry.width, entry.height) else {
                    return Err(PdfError::InvalidImage(format!(
                        "{}: JBIG2 images need width and height",
                        entry.file.display()
                    )));
                };
                let mut image = PageImage::jbig2(data, w, h, 0);
                image.jbig2_globals = entry.globals;
                image
            }
        };
        if let (ImageKind::Jpeg, Some(gray)) = (image.kind, entry.gray) {
            image.gray = gray;
        }
        Ok(image.placed(placement))
    }
}

impl PageSource for Manifest {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render(&self, index: usize) -> incremental_pdf::Result<PageInfo> {
        let count = self.pages.len();
        let entry = self
            .pages
            .get(index)
            .ok_or(PdfError::PageIndexOutOfRange { index, count })?;

        let mut page = PageInfo::new(entry.width, entry.height);
        if let Some(image) = &entry.image {
            page.image = Some(self.load_image(image, entry)?);
        }
        if let Some(background) = &entry.background {
            page.background = Some(self.load_image(background, entry)?);
        }
        if let Some(mask) = &entry.mask {
            page.mask = Some(self.load_image(mask, entry)?);
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "metadata": { "title": "Atlas", "year": "1910" },
        "outline": [ { "title": "Maps", "page": 0, "children": [ { "title": "Europe", "page": 1 } ] } ],
        "jbig2_globals": ["globals.jb2"],
        "pages": [
            { "width": 612, "height": 792,
              "image": { "kind": "jpeg", "file": "p0.jpg", "width": 10, "height": 10, "gray": true } },
            { "width": 612, "height": 792,
              "background": { "kind": "jpeg", "file": "p0.jpg", "width": 10, "height": 10 },
              "mask": { "kind": "jbig2", "file": "p1.jb2", "width": 40, "height": 40, "globals": 0,
                        "placement": [0, 0, 306, 396] } }
        ]
    }"#;

    fn fixture() -> (TempDir, Manifest) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("p0.jpg"), [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        fs::write(dir.path().join("p1.jb2"), [0x00, 0x01]).unwrap();
        fs::write(dir.path().join("globals.jb2"), [0x02]).unwrap();
        let path = dir.path().join("book.json");
        fs::write(&path, MANIFEST).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        (dir, manifest)
    }

    #[test]
    fn test_layout_from_manifest() {
        let (_dir, manifest) = fixture();
        let layout = manifest.layout();
        assert_eq!(layout.page_count, 2);
        assert_eq!(layout.jbig2_global_slots(), 1);
        assert_eq!(layout.outline[0].children.len(), 1);
        assert_eq!(layout.metadata.get("title"), Some(&b"Atlas"[..]));
        assert_eq!(manifest.load_globals().unwrap(), vec![vec![0x02]]);
    }

    #[test]
    fn test_render_pages() {
        let (_dir, manifest) = fixture();
        let first = manifest.render(0).unwrap();
        assert!(first.image.as_ref().unwrap().gray);

        let second = manifest.render(1).unwrap();
        let mask = second.mask.unwrap();
        assert_eq!(mask.kind, ImageKind::Jbig2);
        assert_eq!(mask.jbig2_globals, Some(0));
        assert_eq!(mask.placement, Placement::new(0.0, 0.0, 306.0, 396.0));
        assert_eq!(
            second.background.unwrap().placement,
            Placement::full_page(612.0, 792.0)
        );
    }

    #[test]
    fn test_missing_image_file_fails_page() {
        let (dir, manifest) = fixture();
        fs::remove_file(dir.path().join("p1.jb2")).unwrap();
        assert!(manifest.render(0).is_ok());
        assert!(matches!(manifest.render(1), Err(PdfError::Io(_))));
    }

    #[test]
    fn test_empty_manifest_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.json");
        fs::write(&path, r#"{ "pages": [] }"#).unwrap();
        assert!(Manifest::load(&path).is_err());
    }
}
