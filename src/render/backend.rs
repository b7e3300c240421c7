use std::borrow::Cow;
use std::sync::Arc;

use crate::document::element::Element;
use crate::document::files::FileStore;
use crate::document::slide::Slide;
use crate::fonts::FontRegistry;
use crate::foundation::core::DocumentSize;
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::foundation::math::{flatten_premul_over, mul_div255_u16, unpremultiply_rgba8_in_place};
use crate::render::raster::{FontBook, rasterize_svg_to_premul_rgba8};
use crate::render::svg::SvgWriter;
use crate::render::vector::{VectorScene, vectorize_slide};

/// A rendered frame as RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Straight-alpha RGBA8 copy of the pixels.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        if self.premultiplied {
            unpremultiply_rgba8_in_place(&mut data);
        }
        data
    }

    /// Pixels in premultiplied form, borrowing when they already are.
    pub fn premultiplied_data(&self) -> Cow<'_, [u8]> {
        if self.premultiplied {
            return Cow::Borrowed(&self.data);
        }
        let mut d = self.data.clone();
        for px in d.chunks_exact_mut(4) {
            let a = u16::from(px[3]);
            for c in &mut px[..3] {
                *c = mul_div255_u16(u16::from(*c), a) as u8;
            }
        }
        Cow::Owned(d)
    }

    /// Opaque RGB8 pixels composited over `bg`.
    pub fn to_rgb_over(&self, bg: [u8; 4]) -> Vec<u8> {
        let premul = self.premultiplied_data();
        let mut flat = vec![0u8; premul.len()];
        flatten_premul_over(&mut flat, &premul, bg);
        flat.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect()
    }

    pub fn to_rgba_image(&self) -> InkdeckResult<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.to_straight_rgba())
            .ok_or_else(|| InkdeckError::encode("frame buffer does not match its dimensions"))
    }
}

/// Which representation an encoder consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameKind {
    Raster,
    Vector,
}

/// Everything needed to serialize vector frames outside the renderer.
#[derive(Clone, Debug, Default)]
pub struct SvgResources {
    pub fonts: FontRegistry,
    pub files: FileStore,
}

impl SvgResources {
    pub fn writer(&self) -> SvgWriter<'_> {
        SvgWriter::new(&self.fonts, &self.files)
    }
}

#[derive(Clone, Debug)]
pub struct VectorFrame {
    pub scene: VectorScene,
    pub resources: Arc<SvgResources>,
}

impl VectorFrame {
    pub fn to_svg(&self) -> String {
        self.resources.writer().write(&self.scene)
    }
}

#[derive(Clone, Debug)]
pub enum RenderedSlide {
    Raster(FrameRGBA),
    Vector(VectorFrame),
}

/// Per-slide render input.
#[derive(Clone, Copy, Debug)]
pub struct SlideContext<'a> {
    pub index: usize,
    pub slide: &'a Slide,
    pub size: DocumentSize,
    pub background: &'a str,
    pub scale: f64,
}

/// Turns one slide into one frame. Implementations are driven strictly in slide order.
pub trait SlideRenderer {
    fn render(&mut self, ctx: &SlideContext<'_>, kind: FrameKind) -> InkdeckResult<RenderedSlide>;
}

/// Default renderer: vectorize, serialize to SVG, rasterize with resvg when pixels are needed.
pub struct SvgSlideRenderer {
    resources: Arc<SvgResources>,
    book: Option<(bool, FontBook)>,
}

impl SvgSlideRenderer {
    pub fn new(fonts: FontRegistry, files: FileStore) -> Self {
        Self {
            resources: Arc::new(SvgResources { fonts, files }),
            book: None,
        }
    }

    fn book(&mut self, system_fonts: bool) -> FontBook {
        match &self.book {
            Some((loaded_system, book)) if *loaded_system || !system_fonts => book.clone(),
            _ => {
                let book = FontBook::from_registry(&self.resources.fonts, system_fonts);
                self.book = Some((system_fonts, book.clone()));
                book
            }
        }
    }
}

fn has_text(elements: &[Element]) -> bool {
    elements.iter().any(|e| e.font_ref().is_some())
}

impl SlideRenderer for SvgSlideRenderer {
    fn render(&mut self, ctx: &SlideContext<'_>, kind: FrameKind) -> InkdeckResult<RenderedSlide> {
        let scene = vectorize_slide(ctx.slide, ctx.index, ctx.size, ctx.background)?;
        match kind {
            FrameKind::Vector => Ok(RenderedSlide::Vector(VectorFrame {
                scene,
                resources: self.resources.clone(),
            })),
            FrameKind::Raster => {
                let (w, h) = ctx
                    .size
                    .scaled(ctx.scale)
                    .map_err(|e| InkdeckError::render(ctx.index, e.to_string()))?;
                let svg = self.resources.writer().write(&scene);
                let book = self.book(has_text(&ctx.slide.elements));
                let data = rasterize_svg_to_premul_rgba8(&svg, &book, w, h)
                    .map_err(|e| InkdeckError::render(ctx.index, e.to_string()))?;
                Ok(RenderedSlide::Raster(FrameRGBA {
                    width: w,
                    height: h,
                    data,
                    premultiplied: true,
                }))
            }
        }
    }
}
