use std::io::Cursor;
use std::path::PathBuf;

use crate::encode::sink::{FrameSink, SinkConfig, discard_artifact, expect_raster, write_artifact};
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::render::backend::{FrameRGBA, RenderedSlide};

/// Options for [`StillsSink`].
#[derive(Clone, Debug)]
pub struct StillsSinkOpts {
    /// Directory receiving `<stem>-NNN.png`; `None` keeps the stills in memory only.
    pub out_dir: Option<PathBuf>,
    pub file_stem: String,
}

impl Default for StillsSinkOpts {
    fn default() -> Self {
        Self {
            out_dir: None,
            file_stem: "slide".to_owned(),
        }
    }
}

impl StillsSinkOpts {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: Some(dir.into()),
            ..Self::default()
        }
    }
}

/// One encoded still.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Still {
    pub index: usize,
    pub png: Vec<u8>,
}

/// One PNG per slide.
pub struct StillsSink {
    opts: StillsSinkOpts,
    stills: Vec<Still>,
    written: Vec<PathBuf>,
}

impl StillsSink {
    pub fn new(opts: StillsSinkOpts) -> Self {
        Self {
            opts,
            stills: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn stills(&self) -> &[Still] {
        &self.stills
    }

    /// Files written by `end`, in slide order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_presentation(self) -> Presentation {
        Presentation::new(self.stills)
    }
}

impl FrameSink for StillsSink {
    fn begin(&mut self, _cfg: SinkConfig) -> InkdeckResult<()> {
        if self.opts.file_stem.trim().is_empty() {
            return Err(InkdeckError::validation("stills file stem must be non-empty"));
        }
        self.stills.clear();
        self.written.clear();
        Ok(())
    }

    fn push_frame(&mut self, index: usize, frame: &RenderedSlide) -> InkdeckResult<()> {
        let img = expect_raster(index, frame)?.to_rgba_image()?;
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| InkdeckError::encode(format!("slide {index}: png encode: {e}")))?;
        self.stills.push(Still {
            index,
            png: out.into_inner(),
        });
        Ok(())
    }

    fn end(&mut self) -> InkdeckResult<()> {
        let Some(dir) = self.opts.out_dir.clone() else {
            return Ok(());
        };
        for still in &self.stills {
            let path = dir.join(format!("{}-{:03}.png", self.opts.file_stem, still.index + 1));
            if let Err(e) = write_artifact(&path, &still.png) {
                self.abort();
                return Err(e);
            }
            self.written.push(path);
        }
        tracing::debug!(count = self.written.len(), dir = %dir.display(), "wrote stills");
        Ok(())
    }

    fn abort(&mut self) {
        self.stills.clear();
        for path in self.written.drain(..) {
            discard_artifact(&path);
        }
    }
}

/// Lazy, finite, restartable playback over encoded stills.
///
/// Frames are decoded on demand; only the current one is kept decoded.
pub struct Presentation {
    stills: Vec<Still>,
    pos: usize,
    decoded: Option<(usize, FrameRGBA)>,
}

impl Presentation {
    pub fn new(stills: Vec<Still>) -> Self {
        Self {
            stills,
            pos: 0,
            decoded: None,
        }
    }

    pub fn len(&self) -> usize {
        self.stills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stills.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn next(&mut self) -> bool {
        self.jump(self.pos + 1)
    }

    pub fn prev(&mut self) -> bool {
        match self.pos.checked_sub(1) {
            Some(i) => self.jump(i),
            None => false,
        }
    }

    /// Move to slide `i`. Out-of-range targets leave the position unchanged.
    pub fn jump(&mut self, i: usize) -> bool {
        if i >= self.stills.len() || i == self.pos {
            return false;
        }
        self.pos = i;
        true
    }

    pub fn restart(&mut self) {
        self.pos = 0;
    }

    pub fn current_png(&self) -> Option<&[u8]> {
        self.stills.get(self.pos).map(|s| s.png.as_slice())
    }

    /// Decode (or reuse) the frame at the current position.
    pub fn current_frame(&mut self) -> InkdeckResult<&FrameRGBA> {
        let pos = self.pos;
        if self.decoded.as_ref().is_none_or(|(i, _)| *i != pos) {
            let still = self
                .stills
                .get(pos)
                .ok_or_else(|| InkdeckError::validation("presentation is empty"))?;
            let img = image::load_from_memory(&still.png)
                .map_err(|e| InkdeckError::encode(format!("decode still {pos}: {e}")))?
                .to_rgba8();
            let (width, height) = img.dimensions();
            self.decoded = Some((
                pos,
                FrameRGBA {
                    width,
                    height,
                    data: img.into_raw(),
                    premultiplied: false,
                },
            ));
        }
        match &self.decoded {
            Some((_, frame)) => Ok(frame),
            None => Err(InkdeckError::validation("presentation frame unavailable")),
        }
    }
}
