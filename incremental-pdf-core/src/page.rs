use crate::graphics::PageImage;

/// Everything the writer needs to emit one page
///
/// A page is either *simple* (one image in `image`) or *compound* (a JPEG
/// `background` with a JBIG2 stencil `mask` painted over it, the usual shape
/// of a scanned page whose text and picture layers were separated).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageInfo {
    /// Page width in points
    pub width: f64,
    /// Page height in points
    pub height: f64,
    pub image: Option<PageImage>,
    pub background: Option<PageImage>,
    pub mask: Option<PageImage>,
}

fn present(image: &Option<PageImage>) -> Option<&PageImage> {
    image.as_ref().filter(|img| img.is_present())
}

/// How a page will be painted, decided from which images carry data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageLayout<'a> {
    Compound {
        background: &'a PageImage,
        mask: &'a PageImage,
    },
    Single(&'a PageImage),
    Empty,
}

impl PageLayout<'_> {
    /// Number of image XObjects the page uses
    pub fn image_count(&self) -> usize {
        match self {
            PageLayout::Compound { .. } => 2,
            PageLayout::Single(_) => 1,
            PageLayout::Empty => 0,
        }
    }
}

impl PageInfo {
    /// An empty page of the given size in points
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// US Letter page (612 x 792 points)
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// A4 page (595 x 842 points)
    pub fn a4() -> Self {
        Self::new(595.0, 842.0)
    }

    /// Paint a single image
    pub fn with_image(mut self, image: PageImage) -> Self {
        self.image = Some(image);
        self
    }

    /// Paint a background picture with a text mask on top
    pub fn with_layers(mut self, background: PageImage, mask: PageImage) -> Self {
        self.background = Some(background);
        self.mask = Some(mask);
        self
    }

    /// Classify the page.
    ///
    /// Compound when both layers carry bytes, otherwise the plain image if it
    /// carries bytes, otherwise empty.
    pub fn layout(&self) -> PageLayout<'_> {
        match (present(&self.background), present(&self.mask)) {
            (Some(background), Some(mask)) => PageLayout::Compound { background, mask },
            _ => match present(&self.image) {
                Some(image) => PageLayout::Single(image),
                None => PageLayout::Empty,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{ImageKind, Placement};

    fn jpeg() -> PageImage {
        PageImage::jpeg(vec![0xFF, 0xD8, 0xFF, 0xD9], 100, 100, false)
            .placed(Placement::new(0.0, 0.0, 72.0, 72.0))
    }

    fn mask() -> PageImage {
        PageImage::jbig2(vec![0x00, 0x01], 100, 100, 0)
    }

    #[test]
    fn test_page_sizes() {
        let page = PageInfo::letter();
        assert_eq!((page.width, page.height), (612.0, 792.0));
        let page = PageInfo::a4();
        assert_eq!((page.width, page.height), (595.0, 842.0));
    }

    #[test]
    fn test_compound_layout() {
        let page = PageInfo::letter().with_layers(jpeg(), mask());
        assert!(matches!(page.layout(), PageLayout::Compound { .. }));
        assert_eq!(page.layout().image_count(), 2);
    }

    #[test]
    fn test_compound_wins_over_plain_image() {
        let page = PageInfo::letter()
            .with_image(jpeg())
            .with_layers(jpeg(), mask());
        assert_eq!(page.layout().image_count(), 2);
    }

    #[test]
    fn test_empty_mask_falls_back_to_single() {
        let empty_mask = PageImage::jbig2(Vec::new(), 100, 100, 0);
        let page = PageInfo::letter()
            .with_image(jpeg())
            .with_layers(jpeg(), empty_mask);
        match page.layout() {
            PageLayout::Single(img) => assert_eq!(img.kind, ImageKind::Jpeg),
            other => panic!("expected single layout, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_layout() {
        let page = PageInfo::a4();
        assert_eq!(page.layout(), PageLayout::Empty);
        assert_eq!(page.layout().image_count(), 0);

        let page = PageInfo::a4().with_image(PageImage::jpeg(Vec::new(), 1, 1, true));
        assert_eq!(page.layout(), PageLayout::Empty);
    }
}
