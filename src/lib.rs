//! Inkdeck is a slide-deck editor core for freeform vector drawings.
//!
//! A session owns one [`Document`] (ordered slides sharing a size and background), drives an
//! interactive [`scene::surface::DrawingSurface`] through a one-way synchronizer, and exports the
//! deck through a single [`FrameSink`]:
//!
//! - PNG stills and an in-app presentation
//! - animated GIF
//! - MP4 (requires `ffmpeg` on PATH)
//! - PDF, one page per slide
//! - stroke-animated SVG
#![forbid(unsafe_code)]

mod foundation;

pub mod config;
pub mod document;
pub mod encode;
pub mod export;
pub mod fonts;
pub mod persist;
pub mod render;
pub mod scene;
pub mod selection;
pub mod session;

pub use crate::foundation::color::Rgba8;
pub use crate::foundation::core::{
    Affine, BezPath, DocumentSize, Point, Rect, SlideId, Vec2, now_millis,
};
pub use crate::foundation::error::{InkdeckError, InkdeckResult};

pub use crate::config::{EditorConfig, ExportDefaults};
pub use crate::document::element::{Element, ElementKind};
pub use crate::document::files::{FileAttachment, FileId, FileStore};
pub use crate::document::model::{Document, SizeLimits};
pub use crate::document::slide::Slide;
pub use crate::encode::animate::{StrokeAnimationOpts, StrokeAnimationSink};
pub use crate::encode::ffmpeg::{VideoSink, VideoSinkOpts, is_ffmpeg_on_path};
pub use crate::encode::gif::{GifSink, GifSinkOpts};
pub use crate::encode::pdf::{PdfSink, PdfSinkOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::encode::stills::{StillsSink, StillsSinkOpts};
pub use crate::export::job::{CancelToken, ExportJob, ExportOptions, ExportReport, Exporter};
pub use crate::export::progress::{JobState, ProgressObserver};
pub use crate::fonts::{FontId, FontRegistry};
pub use crate::persist::snapshot::{SNAPSHOT_EXTENSION, Snapshot};
pub use crate::render::backend::FrameRGBA;
pub use crate::session::{Command, Editor};
