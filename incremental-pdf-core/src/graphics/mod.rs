mod image;

pub use image::{parse_jpeg_header, ImageKind, JpegHeader, PageImage, Placement};

use crate::objects::format_real;

/// Builder for the small content programs that paint page images
#[derive(Clone, Debug, Default)]
pub struct GraphicsContext {
    operations: String,
}

impl GraphicsContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_state(&mut self) -> &mut Self {
        self.operations.push_str("q\n");
        self
    }

    pub fn restore_state(&mut self) -> &mut Self {
        self.operations.push_str("Q\n");
        self
    }

    /// Set the non-stroking color to a gray level
    pub fn set_fill_gray(&mut self, gray: f64) -> &mut Self {
        self.operations
            .push_str(&format!("{} g\n", format_real(gray)));
        self
    }

    /// Concatenate a scale-and-translate matrix
    pub fn transform(&mut self, placement: &Placement) -> &mut Self {
        self.operations.push_str(&format!(
            "{} 0 0 {} {} {} cm\n",
            format_real(placement.width),
            format_real(placement.height),
            format_real(placement.x),
            format_real(placement.y)
        ));
        self
    }

    /// Paint the named XObject
    pub fn draw_xobject(&mut self, name: &str) -> &mut Self {
        self.operations.push_str(&format!("/{name} Do\n"));
        self
    }

    /// Paint an image into `placement` inside its own graphics state
    pub fn draw_image(&mut self, name: &str, placement: &Placement) -> &mut Self {
        self.save_state()
            .transform(placement)
            .draw_xobject(name)
            .restore_state()
    }

    /// Paint a stencil mask in black into `placement`
    pub fn draw_mask(&mut self, name: &str, placement: &Placement) -> &mut Self {
        self.save_state()
            .set_fill_gray(0.0)
            .transform(placement)
            .draw_xobject(name)
            .restore_state()
    }

    pub fn operations(&self) -> &str {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.operations.into_bytes()
    }
}
