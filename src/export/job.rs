use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::document::files::FileStore;
use crate::document::model::Document;
use crate::document::slide::{Slide, referenced_files, used_fonts};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::export::progress::{JobState, ProgressObserver};
use crate::fonts::FontRegistry;
use crate::foundation::color::Rgba8;
use crate::foundation::core::DocumentSize;
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::render::backend::{SlideContext, SlideRenderer, SvgSlideRenderer};

/// Cooperative cancellation flag, checked between slides.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options shared by every encoder.
#[derive(Clone, Debug)]
pub struct ExportOptions {
    /// Output pixels per document pixel.
    pub scale: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl ExportOptions {
    pub fn validate(&self) -> InkdeckResult<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(InkdeckError::validation(format!(
                "export scale must be a positive number (got {})",
                self.scale
            )));
        }
        Ok(())
    }
}

/// Point-in-time copy of everything an export needs. Edits made to the document after the job
/// is built never reach it.
#[derive(Clone, Debug)]
pub struct ExportJob {
    slides: Vec<Slide>,
    size: DocumentSize,
    background: String,
    files: FileStore,
    fonts: FontRegistry,
    opts: ExportOptions,
    cancel: CancelToken,
}

impl ExportJob {
    /// Snapshot `doc`, keeping only the attachments and font families the slides reference.
    pub fn from_document(doc: &Document, fonts: &FontRegistry, opts: ExportOptions) -> Self {
        let slides = doc.slides().to_vec();
        let files = referenced_files(doc.files(), &slides);
        let used = fonts.subset(&used_fonts(&slides));
        Self {
            slides,
            size: doc.document_size(),
            background: doc.background_color().to_owned(),
            files,
            fonts: used,
            opts,
            cancel: CancelToken::new(),
        }
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
}

/// Outcome of a successful export.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportReport {
    pub slides: usize,
    pub width: u32,
    pub height: u32,
    pub elapsed: Duration,
}

/// Runs export jobs one at a time.
///
/// Clones share the in-flight flag, so a second job started from any clone while one is
/// running fails with [`InkdeckError::JobInFlight`].
#[derive(Clone, Debug, Default)]
pub struct Exporter {
    in_flight: Arc<AtomicBool>,
}

struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

struct Reporter<'a> {
    observer: Option<&'a mut dyn ProgressObserver>,
}

impl Reporter<'_> {
    fn state(&mut self, state: JobState) {
        if let Some(o) = self.observer.as_deref_mut() {
            o.on_state(state);
        }
    }

    fn progress(&mut self, fraction: f64) {
        if let Some(o) = self.observer.as_deref_mut() {
            o.on_progress(fraction);
        }
    }
}

impl Exporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Export with the default SVG/resvg renderer.
    pub fn run(
        &self,
        job: ExportJob,
        sink: &mut dyn FrameSink,
        observer: Option<&mut dyn ProgressObserver>,
    ) -> InkdeckResult<ExportReport> {
        let mut renderer = SvgSlideRenderer::new(job.fonts.clone(), job.files.clone());
        self.run_with(job, &mut renderer, sink, observer)
    }

    /// Render every slide in order into `sink`. Any failure aborts the sink and the job.
    #[tracing::instrument(skip_all, fields(slides = job.slide_count(), scale = job.opts.scale))]
    pub fn run_with(
        &self,
        job: ExportJob,
        renderer: &mut dyn SlideRenderer,
        sink: &mut dyn FrameSink,
        observer: Option<&mut dyn ProgressObserver>,
    ) -> InkdeckResult<ExportReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!("export rejected: another job is in flight");
            return Err(InkdeckError::JobInFlight);
        }
        let _guard = InFlightGuard(self.in_flight.clone());
        let mut report = Reporter { observer };
        let started = Instant::now();

        let total = job.slides.len();
        let setup = job.opts.validate().and_then(|_| {
            if total == 0 {
                return Err(InkdeckError::validation("nothing to export"));
            }
            job.size.scaled(job.opts.scale)
        });
        let (width, height) = match setup {
            Ok(dims) => dims,
            Err(e) => {
                report.state(JobState::Failed { slide: None });
                return Err(e);
            }
        };

        report.state(JobState::Rendering { done: 0, total });
        tracing::info!(slides = total, width, height, "export started");

        let cfg = SinkConfig {
            width,
            height,
            document_size: job.size,
            frame_count: total,
            background: Rgba8::parse_or(&job.background, Rgba8::WHITE),
        };
        if let Err(e) = sink.begin(cfg) {
            tracing::error!(error = %e, "encoder unavailable");
            report.state(JobState::Failed { slide: None });
            return Err(e);
        }

        let kind = sink.frame_kind();
        for (i, slide) in job.slides.iter().enumerate() {
            if job.cancel.is_cancelled() {
                return Err(fail(sink, &mut report, InkdeckError::Cancelled { slide: i }));
            }
            let ctx = SlideContext {
                index: i,
                slide,
                size: job.size,
                background: &job.background,
                scale: job.opts.scale,
            };
            let frame = match renderer.render(&ctx, kind) {
                Ok(f) => f,
                Err(e) => {
                    let e = match e {
                        InkdeckError::Render { .. } => e,
                        other => InkdeckError::render(i, other.to_string()),
                    };
                    return Err(fail(sink, &mut report, e));
                }
            };
            if let Err(e) = sink.push_frame(i, &frame) {
                let e = match e {
                    InkdeckError::Render { .. } => e,
                    other => InkdeckError::render(i, other.to_string()),
                };
                return Err(fail(sink, &mut report, e));
            }
            report.state(JobState::Rendering { done: i + 1, total });
            if i + 1 < total {
                report.progress((i + 1) as f64 / total as f64);
            }
        }

        report.state(JobState::Encoding);
        if let Err(e) = sink.end() {
            return Err(fail(sink, &mut report, e));
        }
        report.state(JobState::Complete);
        report.progress(1.0);

        let elapsed = started.elapsed();
        tracing::info!(slides = total, elapsed_ms = elapsed.as_millis() as u64, "export complete");
        Ok(ExportReport {
            slides: total,
            width,
            height,
            elapsed,
        })
    }
}

fn fail(sink: &mut dyn FrameSink, report: &mut Reporter<'_>, err: InkdeckError) -> InkdeckError {
    sink.abort();
    let slide = err.failed_slide();
    tracing::error!(error = %err, ?slide, "export failed");
    report.state(JobState::Failed { slide });
    err
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::document::element::Element;
    use crate::document::model::SizeLimits;
    use crate::encode::sink::InMemorySink;
    use crate::export::progress::RecordingObserver;
    use crate::foundation::core::Rect;
    use crate::render::backend::{FrameKind, RenderedSlide};

    fn deck(n: usize) -> Document {
        let limits = SizeLimits {
            min: DocumentSize::new(1, 1),
            max: DocumentSize::new(64, 64),
        };
        let mut doc = Document::new(DocumentSize::new(8, 6), limits);
        for _ in 1..n {
            doc.add_slide();
        }
        doc
    }

    /// Renderer that fails on one slide and otherwise delegates.
    struct FailingAt(usize, SvgSlideRenderer);

    impl SlideRenderer for FailingAt {
        fn render(
            &mut self,
            ctx: &SlideContext<'_>,
            kind: FrameKind,
        ) -> InkdeckResult<RenderedSlide> {
            if ctx.index == self.0 {
                return Err(InkdeckError::render(ctx.index, "boom"));
            }
            self.1.render(ctx, kind)
        }
    }

    #[test]
    fn progress_is_monotonic_and_completes_once() {
        let doc = deck(4);
        let job = ExportJob::from_document(&doc, &FontRegistry::new(), ExportOptions::default());
        let mut sink = InMemorySink::new();
        let mut obs = RecordingObserver::default();
        let report = Exporter::new()
            .run(job, &mut sink, Some(&mut obs))
            .unwrap();
        assert_eq!(report.slides, 4);
        assert_eq!(obs.progress, vec![0.25, 0.5, 0.75, 1.0]);
        assert_eq!(obs.progress.iter().filter(|p| **p == 1.0).count(), 1);
        assert_eq!(obs.states.first(), Some(&JobState::Rendering { done: 0, total: 4 }));
        assert_eq!(obs.states.last(), Some(&JobState::Complete));
        let indices: Vec<usize> = sink.frames().iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn failing_slide_aborts_job_and_reports_index() {
        let doc = deck(3);
        let job = ExportJob::from_document(&doc, &FontRegistry::new(), ExportOptions::default());
        let mut sink = InMemorySink::new();
        let mut obs = RecordingObserver::default();
        let mut renderer = FailingAt(1, SvgSlideRenderer::new(FontRegistry::new(), FileStore::new()));
        let err = Exporter::new()
            .run_with(job, &mut renderer, &mut sink, Some(&mut obs))
            .unwrap_err();
        assert_eq!(err.failed_slide(), Some(1));
        assert!(sink.aborted());
        assert!(sink.frames().is_empty());
        assert!(!sink.ended());
        assert_eq!(obs.states.last(), Some(&JobState::Failed { slide: Some(1) }));
        assert!(!obs.progress.contains(&1.0));
    }

    #[test]
    fn cancellation_stops_between_slides() {
        let doc = deck(2);
        let job = ExportJob::from_document(&doc, &FontRegistry::new(), ExportOptions::default());
        job.cancel_token().cancel();
        let mut sink = InMemorySink::new();
        let err = Exporter::new().run(job, &mut sink, None).unwrap_err();
        assert!(matches!(err, InkdeckError::Cancelled { slide: 0 }));
        assert!(sink.aborted());
    }

    #[test]
    fn job_is_a_point_in_time_copy() {
        let mut doc = deck(1);
        let job = ExportJob::from_document(&doc, &FontRegistry::new(), ExportOptions::default());
        let mut els = doc.current_slide().elements.clone();
        els.push(Element::rectangle("late", Rect::new(0.0, 0.0, 1.0, 1.0)));
        doc.update_slide(0, els).unwrap();
        assert_eq!(job.slides()[0].elements.len(), 1);
    }

    #[test]
    fn job_keeps_only_fonts_its_slides_use() {
        let mut doc = deck(1);
        let mut fonts = FontRegistry::new();
        let used = fonts
            .add_face("Caveat", crate::fonts::FontFace::new("data:font/woff2;base64,AAAA"))
            .unwrap();
        fonts
            .add_face("Spare", crate::fonts::FontFace::new("spare.woff2"))
            .unwrap();
        let mut els = doc.current_slide().elements.clone();
        els.push(Element::text("t", Rect::new(0.0, 0.0, 4.0, 4.0), "hi", used));
        doc.update_slide(0, els).unwrap();

        let job = ExportJob::from_document(&doc, &fonts, ExportOptions::default());
        assert_eq!(job.fonts.len(), 1);
        assert_eq!(job.fonts.resolve(used), Some("Caveat"));
        assert!(job.fonts.faces("Spare").is_none());
    }

    #[test]
    fn bad_scale_fails_before_the_sink_starts() {
        let doc = deck(1);
        let job = ExportJob::from_document(&doc, &FontRegistry::new(), ExportOptions { scale: 0.0 });
        let mut sink = InMemorySink::new();
        assert!(Exporter::new().run(job, &mut sink, None).is_err());
        assert!(sink.config().is_none());
    }

    struct Blocking {
        started: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
        inner: SvgSlideRenderer,
    }

    impl SlideRenderer for Blocking {
        fn render(
            &mut self,
            ctx: &SlideContext<'_>,
            kind: FrameKind,
        ) -> InkdeckResult<RenderedSlide> {
            let _ = self.started.send(());
            let _ = self.release.recv();
            self.inner.render(ctx, kind)
        }
    }

    #[test]
    fn second_job_is_rejected_while_one_is_in_flight() {
        let exporter = Exporter::new();
        let doc = deck(1);
        let job = ExportJob::from_document(&doc, &FontRegistry::new(), ExportOptions::default());
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();

        let background = exporter.clone();
        let first_job = job.clone();
        let handle = std::thread::spawn(move || {
            let mut renderer = Blocking {
                started: started_tx,
                release: release_rx,
                inner: SvgSlideRenderer::new(FontRegistry::new(), FileStore::new()),
            };
            let mut sink = InMemorySink::new();
            background.run_with(first_job, &mut renderer, &mut sink, None)
        });

        started_rx.recv().unwrap();
        assert!(exporter.is_busy());
        let mut sink = InMemorySink::new();
        let err = exporter.run(job, &mut sink, None).unwrap_err();
        assert!(matches!(err, InkdeckError::JobInFlight));

        release_tx.send(()).unwrap();
        handle.join().unwrap().unwrap();
        assert!(!exporter.is_busy());
    }
}
