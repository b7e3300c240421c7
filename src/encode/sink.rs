use std::path::Path;

use crate::foundation::color::Rgba8;
use crate::foundation::core::DocumentSize;
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::render::backend::{FrameKind, FrameRGBA, RenderedSlide};

/// Configuration provided to a [`FrameSink`] before any slide is rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    /// Output width in pixels (document width × scale).
    pub width: u32,
    /// Output height in pixels (document height × scale).
    pub height: u32,
    /// Unscaled document size.
    pub document_size: DocumentSize,
    /// Number of slides that will be pushed.
    pub frame_count: usize,
    pub background: Rgba8,
}

/// Sink contract for consuming rendered slides in deck order.
///
/// Ordering contract: `push_frame` is called with strictly increasing slide indices starting at
/// zero. `begin` is the place to report missing capabilities, since it runs before any slide is
/// rendered. After a failure the job calls `abort` instead of `end`.
pub trait FrameSink: Send {
    /// Representation this sink wants the renderer to produce.
    fn frame_kind(&self) -> FrameKind {
        FrameKind::Raster
    }
    fn begin(&mut self, cfg: SinkConfig) -> InkdeckResult<()>;
    fn push_frame(&mut self, index: usize, frame: &RenderedSlide) -> InkdeckResult<()>;
    /// Finalize the artifact.
    fn end(&mut self) -> InkdeckResult<()>;
    /// Discard partial output.
    fn abort(&mut self) {}
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    kind: Option<FrameKind>,
    cfg: Option<SinkConfig>,
    frames: Vec<(usize, RenderedSlide)>,
    ended: bool,
    aborted: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vector() -> Self {
        Self {
            kind: Some(FrameKind::Vector),
            ..Self::default()
        }
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[(usize, RenderedSlide)] {
        &self.frames
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSink for InMemorySink {
    fn frame_kind(&self) -> FrameKind {
        self.kind.unwrap_or(FrameKind::Raster)
    }

    fn begin(&mut self, cfg: SinkConfig) -> InkdeckResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        self.aborted = false;
        Ok(())
    }

    fn push_frame(&mut self, index: usize, frame: &RenderedSlide) -> InkdeckResult<()> {
        self.frames.push((index, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> InkdeckResult<()> {
        self.ended = true;
        Ok(())
    }

    fn abort(&mut self) {
        self.frames.clear();
        self.aborted = true;
    }
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> InkdeckResult<()> {
    if let Some(parent) = path.parent() {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Write `bytes` to `path`, creating parent directories.
pub fn write_artifact(path: &Path, bytes: &[u8]) -> InkdeckResult<()> {
    use anyhow::Context as _;
    ensure_parent_dir(path)?;
    std::fs::write(path, bytes).with_context(|| format!("write '{}'", path.display()))?;
    Ok(())
}

/// Best-effort removal of a partially written artifact.
pub fn discard_artifact(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "discarded partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to discard partial output"),
    }
}

/// Pull a raster frame out of a rendered slide.
pub(crate) fn expect_raster(index: usize, frame: &RenderedSlide) -> InkdeckResult<&FrameRGBA> {
    match frame {
        RenderedSlide::Raster(f) => Ok(f),
        RenderedSlide::Vector(_) => Err(InkdeckError::encode(format!(
            "slide {index}: raster encoder received a vector frame"
        ))),
    }
}
