use std::io::Cursor;
use std::sync::mpsc;
use std::thread::JoinHandle;

use crate::foundation::core::SlideId;
use crate::foundation::error::{InkdeckError, InkdeckResult};

/// Read pixel dimensions from an encoded image header without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> InkdeckResult<(u32, u32)> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| InkdeckError::validation(format!("probe image format: {e}")))?;
    reader
        .into_dimensions()
        .map_err(|e| InkdeckError::validation(format!("probe image dimensions: {e}")))
}

#[derive(Debug)]
pub(crate) struct ProbeRequest {
    pub(crate) slide: SlideId,
    pub(crate) element_id: String,
    pub(crate) payload: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct ProbeResult {
    pub(crate) slide: SlideId,
    pub(crate) element_id: String,
    pub(crate) dims: Result<(u32, u32), String>,
}

/// Background worker that probes attachment dimensions off the interactive path.
///
/// Requests are processed in submission order; results are collected on the caller's thread.
pub(crate) struct DimensionProber {
    tx: Option<mpsc::Sender<ProbeRequest>>,
    rx: mpsc::Receiver<ProbeResult>,
    worker: Option<JoinHandle<()>>,
    pending: usize,
}

impl DimensionProber {
    pub(crate) fn spawn() -> Self {
        let (req_tx, req_rx) = mpsc::channel::<ProbeRequest>();
        let (res_tx, res_rx) = mpsc::channel::<ProbeResult>();
        let worker = std::thread::Builder::new()
            .name("inkdeck-probe".to_owned())
            .spawn(move || {
                for req in req_rx {
                    let dims = probe_dimensions(&req.payload).map_err(|e| e.to_string());
                    let res = ProbeResult {
                        slide: req.slide,
                        element_id: req.element_id,
                        dims,
                    };
                    if res_tx.send(res).is_err() {
                        break;
                    }
                }
            })
            .ok();
        if worker.is_none() {
            tracing::warn!("failed to spawn probe worker; attachment sizes will not be probed");
        }
        Self {
            tx: worker.as_ref().map(|_| req_tx),
            rx: res_rx,
            worker,
            pending: 0,
        }
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending
    }

    pub(crate) fn submit(&mut self, req: ProbeRequest) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        if tx.send(req).is_ok() {
            self.pending += 1;
        }
    }

    /// Results that are ready now.
    pub(crate) fn try_drain(&mut self) -> Vec<ProbeResult> {
        let mut out = Vec::new();
        while let Ok(res) = self.rx.try_recv() {
            out.push(res);
        }
        self.pending -= out.len();
        out
    }

    /// Block until every submitted request has a result.
    pub(crate) fn wait_all(&mut self) -> Vec<ProbeResult> {
        let mut out = Vec::with_capacity(self.pending);
        while self.pending > out.len() {
            match self.rx.recv() {
                Ok(res) => out.push(res),
                Err(_) => break,
            }
        }
        self.pending -= out.len();
        out
    }
}

impl Drop for DimensionProber {
    fn drop(&mut self) {
        drop(self.tx.take());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(w, h, image::Rgba([200, 10, 10, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn probes_png_header() {
        assert_eq!(probe_dimensions(&png_bytes(7, 3)).unwrap(), (7, 3));
        assert!(probe_dimensions(b"definitely not an image").is_err());
    }

    #[test]
    fn worker_returns_results_in_order() {
        let mut prober = DimensionProber::spawn();
        prober.submit(ProbeRequest {
            slide: SlideId(1),
            element_id: "a".to_owned(),
            payload: png_bytes(4, 5),
        });
        prober.submit(ProbeRequest {
            slide: SlideId(1),
            element_id: "b".to_owned(),
            payload: b"junk".to_vec(),
        });
        assert_eq!(prober.pending(), 2);
        let results = prober.wait_all();
        assert_eq!(prober.pending(), 0);
        assert_eq!(results[0].element_id, "a");
        assert_eq!(results[0].dims, Ok((4, 5)));
        assert!(results[1].dims.is_err());
    }
}
