//! Slide rendering for export: elements → [`vector::VectorScene`] → SVG → RGBA frame.

pub mod backend;
pub mod raster;
pub mod svg;
pub mod vector;

pub use backend::{FrameRGBA, RenderedSlide, SlideRenderer, SvgSlideRenderer};
