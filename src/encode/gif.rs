use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::JoinHandle;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame, RgbaImage};

use crate::encode::sink::{FrameSink, SinkConfig, discard_artifact, expect_raster, write_artifact};
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::render::backend::RenderedSlide;

/// Options for [`GifSink`].
#[derive(Clone, Debug)]
pub struct GifSinkOpts {
    /// Output file; `None` keeps the artifact in memory only.
    pub out_path: Option<PathBuf>,
    /// Fixed inter-frame delay.
    pub delay_ms: u32,
}

impl Default for GifSinkOpts {
    fn default() -> Self {
        Self {
            out_path: None,
            delay_ms: 1000,
        }
    }
}

impl GifSinkOpts {
    pub fn validate(&self) -> InkdeckResult<()> {
        if self.delay_ms == 0 {
            return Err(InkdeckError::validation("gif frame delay must be non-zero"));
        }
        Ok(())
    }
}

/// Finished looping GIF.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GifArtifact {
    pub bytes: Vec<u8>,
    /// Delay attached to each encoded frame, in order.
    pub frame_delays_ms: Vec<u32>,
}

type Completion = Box<dyn FnOnce(&GifArtifact) + Send>;

enum WorkerMsg {
    Frame(RgbaImage),
}

/// Looping GIF encoder.
///
/// Quantization and LZW compression run on a worker thread; the sink only converts frames and
/// hands them over. The artifact is delivered to the completion callback from `end`.
pub struct GifSink {
    opts: GifSinkOpts,
    tx: Option<mpsc::Sender<WorkerMsg>>,
    worker: Option<JoinHandle<InkdeckResult<GifArtifact>>>,
    on_complete: Option<Completion>,
    artifact: Option<GifArtifact>,
}

impl GifSink {
    pub fn new(opts: GifSinkOpts) -> Self {
        Self {
            opts,
            tx: None,
            worker: None,
            on_complete: None,
            artifact: None,
        }
    }

    /// Register the completion callback that receives the finished artifact.
    pub fn on_complete(mut self, f: impl FnOnce(&GifArtifact) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn artifact(&self) -> Option<&GifArtifact> {
        self.artifact.as_ref()
    }

    pub fn into_artifact(self) -> Option<GifArtifact> {
        self.artifact
    }

    fn shutdown_worker(&mut self) -> Option<InkdeckResult<GifArtifact>> {
        drop(self.tx.take());
        let worker = self.worker.take()?;
        Some(
            worker
                .join()
                .unwrap_or_else(|_| Err(InkdeckError::encode("gif worker panicked"))),
        )
    }
}

fn encode_worker(rx: mpsc::Receiver<WorkerMsg>, delay_ms: u32) -> InkdeckResult<GifArtifact> {
    let mut bytes = Vec::new();
    let mut delays = Vec::new();
    {
        let mut enc = GifEncoder::new(&mut bytes);
        enc.set_repeat(Repeat::Infinite)
            .map_err(|e| InkdeckError::encode(format!("gif repeat: {e}")))?;
        for WorkerMsg::Frame(img) in rx {
            let frame = Frame::from_parts(img, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1));
            enc.encode_frame(frame)
                .map_err(|e| InkdeckError::encode(format!("gif frame {}: {e}", delays.len())))?;
            delays.push(delay_ms);
        }
    }
    Ok(GifArtifact {
        bytes,
        frame_delays_ms: delays,
    })
}

impl FrameSink for GifSink {
    fn begin(&mut self, _cfg: SinkConfig) -> InkdeckResult<()> {
        self.opts.validate()?;
        self.artifact = None;
        let (tx, rx) = mpsc::channel();
        let delay_ms = self.opts.delay_ms;
        let worker = std::thread::Builder::new()
            .name("inkdeck-gif".to_owned())
            .spawn(move || encode_worker(rx, delay_ms))
            .map_err(|e| InkdeckError::unsupported(format!("cannot spawn gif worker: {e}")))?;
        self.tx = Some(tx);
        self.worker = Some(worker);
        Ok(())
    }

    fn push_frame(&mut self, index: usize, frame: &RenderedSlide) -> InkdeckResult<()> {
        let img = expect_raster(index, frame)?.to_rgba_image()?;
        let sent = self
            .tx
            .as_ref()
            .map(|tx| tx.send(WorkerMsg::Frame(img)).is_ok())
            .unwrap_or(false);
        if sent {
            return Ok(());
        }
        // The worker hung up early; surface its error.
        match self.shutdown_worker() {
            Some(Err(e)) => Err(e),
            _ => Err(InkdeckError::encode("gif sink not started")),
        }
    }

    fn end(&mut self) -> InkdeckResult<()> {
        let artifact = self
            .shutdown_worker()
            .ok_or_else(|| InkdeckError::encode("gif sink not started"))??;
        if let Some(path) = &self.opts.out_path {
            write_artifact(path, &artifact.bytes)?;
        }
        tracing::debug!(
            frames = artifact.frame_delays_ms.len(),
            bytes = artifact.bytes.len(),
            "gif finalized"
        );
        if let Some(cb) = self.on_complete.take() {
            cb(&artifact);
        }
        self.artifact = Some(artifact);
        Ok(())
    }

    fn abort(&mut self) {
        let _ = self.shutdown_worker();
        self.artifact = None;
        if let Some(path) = &self.opts.out_path {
            discard_artifact(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use image::AnimationDecoder;

    use super::*;
    use crate::foundation::color::Rgba8;
    use crate::foundation::core::DocumentSize;
    use crate::render::backend::FrameRGBA;

    fn solid(rgb: [u8; 3]) -> RenderedSlide {
        RenderedSlide::Raster(FrameRGBA {
            width: 4,
            height: 4,
            data: [rgb[0], rgb[1], rgb[2], 255].repeat(16),
            premultiplied: true,
        })
    }

    fn cfg(n: usize) -> SinkConfig {
        SinkConfig {
            width: 4,
            height: 4,
            document_size: DocumentSize::new(4, 4),
            frame_count: n,
            background: Rgba8::WHITE,
        }
    }

    #[test]
    fn frames_keep_order_and_delay() {
        let delivered = Arc::new(Mutex::new(None));
        let slot = delivered.clone();
        let mut sink = GifSink::new(GifSinkOpts {
            out_path: None,
            delay_ms: 200,
        })
        .on_complete(move |a| *slot.lock().unwrap() = Some(a.clone()));

        let colors = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];
        sink.begin(cfg(3)).unwrap();
        for (i, c) in colors.iter().enumerate() {
            sink.push_frame(i, &solid(*c)).unwrap();
        }
        sink.end().unwrap();

        let artifact = delivered.lock().unwrap().clone().unwrap();
        assert_eq!(artifact.frame_delays_ms, vec![200, 200, 200]);
        assert_eq!(sink.artifact(), Some(&artifact));

        let decoder =
            image::codecs::gif::GifDecoder::new(std::io::Cursor::new(artifact.bytes)).unwrap();
        let frames = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(frames.len(), 3);
        for (frame, c) in frames.iter().zip(colors) {
            assert_eq!(Duration::from(frame.delay()), Duration::from_millis(200));
            let px = frame.buffer().get_pixel(1, 1).0;
            for (got, want) in px[..3].iter().zip(c) {
                assert!(got.abs_diff(want) <= 8, "{px:?} vs {c:?}");
            }
        }
    }

    #[test]
    fn zero_delay_is_rejected_before_frames() {
        let mut sink = GifSink::new(GifSinkOpts {
            out_path: None,
            delay_ms: 0,
        });
        assert!(sink.begin(cfg(1)).is_err());
    }

    #[test]
    fn abort_removes_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck.gif");
        std::fs::write(&path, b"stale").unwrap();
        let mut sink = GifSink::new(GifSinkOpts {
            out_path: Some(path.clone()),
            delay_ms: 100,
        });
        sink.begin(cfg(1)).unwrap();
        sink.push_frame(0, &solid([1, 2, 3])).unwrap();
        sink.abort();
        assert!(!path.exists());
        assert!(sink.artifact().is_none());
    }
}
