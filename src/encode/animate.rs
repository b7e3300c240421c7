use std::path::PathBuf;

use crate::encode::sink::{FrameSink, SinkConfig, discard_artifact, write_artifact};
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::render::backend::{FrameKind, RenderedSlide, VectorFrame};
use crate::render::svg::StrokeTiming;

/// Options for [`StrokeAnimationSink`].
#[derive(Clone, Debug)]
pub struct StrokeAnimationOpts {
    /// Directory receiving `<stem>-NNN.svg`; `None` keeps the animations in memory only.
    pub out_dir: Option<PathBuf>,
    pub file_stem: String,
    /// Pen speed in document pixels per millisecond.
    pub pen_speed: f64,
    pub min_stroke_ms: u64,
    pub max_stroke_ms: u64,
    /// Pause between consecutive strokes.
    pub gap_ms: u64,
}

impl Default for StrokeAnimationOpts {
    fn default() -> Self {
        Self {
            out_dir: None,
            file_stem: "slide".to_owned(),
            pen_speed: 1.0,
            min_stroke_ms: 80,
            max_stroke_ms: 2_000,
            gap_ms: 40,
        }
    }
}

impl StrokeAnimationOpts {
    pub fn validate(&self) -> InkdeckResult<()> {
        if !self.pen_speed.is_finite() || self.pen_speed <= 0.0 {
            return Err(InkdeckError::validation("pen speed must be positive"));
        }
        if self.min_stroke_ms > self.max_stroke_ms {
            return Err(InkdeckError::validation(
                "min stroke duration must not exceed max stroke duration",
            ));
        }
        if self.file_stem.trim().is_empty() {
            return Err(InkdeckError::validation("file stem must be non-empty"));
        }
        Ok(())
    }
}

/// One slide drawn stroke by stroke.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnimatedSlide {
    pub index: usize,
    pub svg: String,
    /// Time at which the last stroke finishes.
    pub finish_ms: u64,
}

/// Plan stroke-in timings: strokes draw one after another in z-order.
pub fn plan_stroke_timings(
    frame: &VectorFrame,
    opts: &StrokeAnimationOpts,
) -> (Vec<Option<StrokeTiming>>, u64) {
    let mut cursor = 0u64;
    let mut finish = 0u64;
    let timings = frame
        .scene
        .items
        .iter()
        .map(|item| {
            if item.stroke_length <= 0.0 {
                return None;
            }
            let dur = ((item.stroke_length / opts.pen_speed).ceil() as u64)
                .clamp(opts.min_stroke_ms, opts.max_stroke_ms);
            let t = StrokeTiming {
                begin_ms: cursor,
                dur_ms: dur,
            };
            finish = cursor + dur;
            cursor = finish + opts.gap_ms;
            Some(t)
        })
        .collect();
    (timings, finish)
}

/// Stroke-animated vector encoder (SMIL `stroke-dashoffset`).
pub struct StrokeAnimationSink {
    opts: StrokeAnimationOpts,
    slides: Vec<AnimatedSlide>,
    written: Vec<PathBuf>,
}

impl StrokeAnimationSink {
    pub fn new(opts: StrokeAnimationOpts) -> Self {
        Self {
            opts,
            slides: Vec::new(),
            written: Vec::new(),
        }
    }

    pub fn slides(&self) -> &[AnimatedSlide] {
        &self.slides
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.written
    }

    pub fn into_player(self) -> StrokePlayer {
        StrokePlayer::new(self.slides)
    }
}

impl FrameSink for StrokeAnimationSink {
    fn frame_kind(&self) -> FrameKind {
        FrameKind::Vector
    }

    fn begin(&mut self, _cfg: SinkConfig) -> InkdeckResult<()> {
        self.opts.validate()?;
        self.slides.clear();
        self.written.clear();
        Ok(())
    }

    fn push_frame(&mut self, index: usize, frame: &RenderedSlide) -> InkdeckResult<()> {
        let RenderedSlide::Vector(frame) = frame else {
            return Err(InkdeckError::encode(format!(
                "slide {index}: stroke animation needs a vector frame"
            )));
        };
        let (timings, finish_ms) = plan_stroke_timings(frame, &self.opts);
        let svg = frame
            .resources
            .writer()
            .write_with_timings(&frame.scene, &timings);
        self.slides.push(AnimatedSlide {
            index,
            svg,
            finish_ms,
        });
        Ok(())
    }

    fn end(&mut self) -> InkdeckResult<()> {
        let Some(dir) = self.opts.out_dir.clone() else {
            return Ok(());
        };
        for slide in &self.slides {
            let path = dir.join(format!("{}-{:03}.svg", self.opts.file_stem, slide.index + 1));
            if let Err(e) = write_artifact(&path, slide.svg.as_bytes()) {
                self.abort();
                return Err(e);
            }
            self.written.push(path);
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.slides.clear();
        for path in self.written.drain(..) {
            discard_artifact(&path);
        }
    }
}

/// Manual stepping over animated slides.
///
/// `generation` changes on every (re)start so a host can restart playback of the same SVG.
pub struct StrokePlayer {
    slides: Vec<AnimatedSlide>,
    pos: usize,
    generation: u64,
}

impl StrokePlayer {
    pub fn new(slides: Vec<AnimatedSlide>) -> Self {
        Self {
            slides,
            pos: 0,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current(&self) -> Option<&AnimatedSlide> {
        self.slides.get(self.pos)
    }

    pub fn next(&mut self) -> Option<&AnimatedSlide> {
        if self.pos + 1 >= self.slides.len() {
            return None;
        }
        self.pos += 1;
        self.generation += 1;
        self.current()
    }

    pub fn prev(&mut self) -> Option<&AnimatedSlide> {
        self.pos = self.pos.checked_sub(1)?;
        self.generation += 1;
        self.current()
    }

    /// Restart the current slide's animation.
    pub fn replay(&mut self) -> Option<&AnimatedSlide> {
        self.generation += 1;
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::element::Element;
    use crate::document::files::FileStore;
    use crate::document::slide::Slide;
    use crate::fonts::FontRegistry;
    use crate::foundation::color::Rgba8;
    use crate::foundation::core::{DocumentSize, Rect, SlideId};
    use crate::render::backend::{FrameKind, SlideContext, SlideRenderer, SvgSlideRenderer};

    fn vector_frame(els: Vec<Element>) -> RenderedSlide {
        let mut slide = Slide::new(SlideId(0), DocumentSize::new(100, 100));
        slide.elements.extend(els);
        let mut r = SvgSlideRenderer::new(FontRegistry::new(), FileStore::new());
        r.render(
            &SlideContext {
                index: 0,
                slide: &slide,
                size: DocumentSize::new(100, 100),
                background: "#fff",
                scale: 1.0,
            },
            FrameKind::Vector,
        )
        .unwrap()
    }

    fn cfg() -> SinkConfig {
        SinkConfig {
            width: 100,
            height: 100,
            document_size: DocumentSize::new(100, 100),
            frame_count: 2,
            background: Rgba8::WHITE,
        }
    }

    #[test]
    fn strokes_draw_sequentially() {
        let RenderedSlide::Vector(frame) = vector_frame(vec![
            Element::rectangle("a", Rect::new(0.0, 0.0, 50.0, 50.0)),
            Element::rectangle("b", Rect::new(0.0, 0.0, 10.0, 10.0)),
        ]) else {
            panic!("expected vector frame");
        };
        let opts = StrokeAnimationOpts::default();
        let (timings, finish) = plan_stroke_timings(&frame, &opts);
        let a = timings[0].unwrap();
        let b = timings[1].unwrap();
        assert_eq!((a.begin_ms, a.dur_ms), (0, 200));
        assert_eq!((b.begin_ms, b.dur_ms), (240, 80));
        assert_eq!(finish, 320);
    }

    #[test]
    fn sink_collects_animated_slides_and_player_steps() {
        let mut sink = StrokeAnimationSink::new(StrokeAnimationOpts::default());
        sink.begin(cfg()).unwrap();
        sink.push_frame(
            0,
            &vector_frame(vec![Element::ellipse("e", Rect::new(0.0, 0.0, 20.0, 20.0))]),
        )
        .unwrap();
        sink.push_frame(1, &vector_frame(vec![])).unwrap();
        sink.end().unwrap();

        assert!(sink.slides()[0].svg.contains("<animate"));
        assert!(sink.slides()[0].finish_ms > 0);
        assert_eq!(sink.slides()[1].finish_ms, 0);

        let mut player = sink.into_player();
        assert!(player.prev().is_none());
        let g0 = player.generation();
        assert_eq!(player.next().unwrap().index, 1);
        assert!(player.next().is_none());
        assert_eq!(player.replay().unwrap().index, 1);
        assert_eq!(player.generation(), g0 + 2);
        assert_eq!(player.prev().unwrap().index, 0);
    }

    #[test]
    fn raster_frames_are_rejected() {
        let mut sink = StrokeAnimationSink::new(StrokeAnimationOpts::default());
        sink.begin(cfg()).unwrap();
        let raster = RenderedSlide::Raster(crate::render::backend::FrameRGBA {
            width: 1,
            height: 1,
            data: vec![0; 4],
            premultiplied: true,
        });
        assert!(sink.push_frame(0, &raster).is_err());
    }
}
