//! Minimal PDF 1.4 writer: one page per slide, each page a single full-bleed RGB image.

use std::io::Write as _;
use std::path::PathBuf;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::encode::sink::{FrameSink, SinkConfig, discard_artifact, expect_raster, write_artifact};
use crate::foundation::core::DocumentSize;
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::render::backend::RenderedSlide;

#[derive(Clone, Debug, Default)]
pub struct PdfSinkOpts {
    /// Output file; `None` keeps the document in memory only.
    pub out_path: Option<PathBuf>,
}

struct PdfPage {
    width: u32,
    height: u32,
    /// Zlib-compressed RGB8 samples.
    samples: Vec<u8>,
}

/// Paged document sink. Pages use the native document size in points; the embedded image keeps
/// the rendered (possibly scaled) pixel size.
pub struct PdfSink {
    opts: PdfSinkOpts,
    page_size: DocumentSize,
    bg_rgba: [u8; 4],
    pages: Vec<PdfPage>,
    bytes: Option<Vec<u8>>,
}

impl PdfSink {
    pub fn new(opts: PdfSinkOpts) -> Self {
        Self {
            opts,
            page_size: DocumentSize::default(),
            bg_rgba: [255, 255, 255, 255],
            pages: Vec::new(),
            bytes: None,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }
}

impl FrameSink for PdfSink {
    fn begin(&mut self, cfg: SinkConfig) -> InkdeckResult<()> {
        self.page_size = cfg.document_size;
        self.bg_rgba = cfg.background.to_array();
        if cfg.background.is_transparent() {
            self.bg_rgba = [255, 255, 255, 255];
        }
        self.pages.clear();
        self.bytes = None;
        Ok(())
    }

    fn push_frame(&mut self, index: usize, frame: &RenderedSlide) -> InkdeckResult<()> {
        let frame = expect_raster(index, frame)?;
        let rgb = frame.to_rgb_over(self.bg_rgba);
        let mut enc = ZlibEncoder::new(Vec::with_capacity(rgb.len() / 4), Compression::default());
        enc.write_all(&rgb)
            .and_then(|_| enc.flush())
            .map_err(|e| InkdeckError::encode(format!("slide {index}: compress page: {e}")))?;
        let samples = enc
            .finish()
            .map_err(|e| InkdeckError::encode(format!("slide {index}: compress page: {e}")))?;
        self.pages.push(PdfPage {
            width: frame.width,
            height: frame.height,
            samples,
        });
        Ok(())
    }

    fn end(&mut self) -> InkdeckResult<()> {
        let bytes = write_pdf(self.page_size, &self.pages);
        self.pages.clear();
        if let Some(path) = &self.opts.out_path {
            write_artifact(path, &bytes)?;
        }
        tracing::debug!(bytes = bytes.len(), "pdf finalized");
        self.bytes = Some(bytes);
        Ok(())
    }

    fn abort(&mut self) {
        self.pages.clear();
        self.bytes = None;
        if let Some(path) = &self.opts.out_path {
            discard_artifact(path);
        }
    }
}

struct PdfWriter {
    out: Vec<u8>,
    offsets: Vec<usize>,
}

impl PdfWriter {
    fn new() -> Self {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        Self {
            out,
            offsets: Vec::new(),
        }
    }

    /// Objects must be written in id order starting at 1.
    fn object(&mut self, id: usize, dict: &str, stream: Option<&[u8]>) {
        debug_assert_eq!(id, self.offsets.len() + 1);
        self.offsets.push(self.out.len());
        self.out
            .extend_from_slice(format!("{id} 0 obj\n{dict}\n").as_bytes());
        if let Some(data) = stream {
            self.out.extend_from_slice(b"stream\n");
            self.out.extend_from_slice(data);
            self.out.extend_from_slice(b"\nendstream\n");
        }
        self.out.extend_from_slice(b"endobj\n");
    }

    fn finish(mut self, root: usize) -> Vec<u8> {
        let xref = self.out.len();
        let mut tail = format!("xref\n0 {}\n0000000000 65535 f \n", self.offsets.len() + 1);
        for off in &self.offsets {
            tail.push_str(&format!("{off:010} 00000 n \n"));
        }
        tail.push_str(&format!(
            "trailer\n<< /Size {} /Root {root} 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            self.offsets.len() + 1
        ));
        self.out.extend_from_slice(tail.as_bytes());
        self.out
    }
}

fn write_pdf(page_size: DocumentSize, pages: &[PdfPage]) -> Vec<u8> {
    let mut w = PdfWriter::new();
    let page_id = |k: usize| 3 + 3 * k;
    let kids = (0..pages.len())
        .map(|k| format!("{} 0 R", page_id(k)))
        .collect::<Vec<_>>()
        .join(" ");

    w.object(1, "<< /Type /Catalog /Pages 2 0 R >>", None);
    w.object(
        2,
        &format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()),
        None,
    );
    let (pw, ph) = (page_size.width, page_size.height);
    for (k, page) in pages.iter().enumerate() {
        let id = page_id(k);
        w.object(
            id,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {pw} {ph}] /Resources << /XObject << /Im0 {} 0 R >> >> /Contents {} 0 R >>",
                id + 2,
                id + 1
            ),
            None,
        );
        let content = format!("q\n{pw} 0 0 {ph} 0 0 cm\n/Im0 Do\nQ");
        w.object(
            id + 1,
            &format!("<< /Length {} >>", content.len()),
            Some(content.as_bytes()),
        );
        w.object(
            id + 2,
            &format!(
                "<< /Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode /Length {} >>",
                page.width,
                page.height,
                page.samples.len()
            ),
            Some(&page.samples),
        );
    }
    w.finish(1)
}

#[cfg(test)]
mod tests {
    use std::io::Read as _;

    use super::*;
    use crate::foundation::color::Rgba8;
    use crate::render::backend::FrameRGBA;

    fn frame(v: u8) -> RenderedSlide {
        RenderedSlide::Raster(FrameRGBA {
            width: 2,
            height: 1,
            data: [v, 0, 0, 255].repeat(2),
            premultiplied: true,
        })
    }

    fn render(n: usize) -> Vec<u8> {
        let mut sink = PdfSink::new(PdfSinkOpts::default());
        sink.begin(SinkConfig {
            width: 2,
            height: 1,
            document_size: DocumentSize::new(640, 320),
            frame_count: n,
            background: Rgba8::WHITE,
        })
        .unwrap();
        for i in 0..n {
            sink.push_frame(i, &frame(10 * i as u8 + 10)).unwrap();
        }
        sink.end().unwrap();
        sink.bytes().unwrap().to_vec()
    }

    fn count(hay: &[u8], needle: &str) -> usize {
        hay.windows(needle.len())
            .filter(|w| *w == needle.as_bytes())
            .count()
    }

    #[test]
    fn one_native_size_page_per_slide() {
        let pdf = render(3);
        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(pdf.ends_with(b"%%EOF\n"));
        assert_eq!(count(&pdf, "/Type /Page "), 3);
        assert_eq!(count(&pdf, "/MediaBox [0 0 640 320]"), 3);
        assert_eq!(count(&pdf, "/Kids [3 0 R 6 0 R 9 0 R]"), 1);
    }

    #[test]
    fn xref_points_at_objects() {
        let pdf = render(1);
        let text = String::from_utf8_lossy(&pdf);
        let start: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|s| s.lines().next())
            .unwrap()
            .parse()
            .unwrap();
        assert!(pdf[start..].starts_with(b"xref"));
        let first_entry = text[start..].lines().nth(3).unwrap();
        let off: usize = first_entry[..10].parse().unwrap();
        assert!(pdf[off..].starts_with(b"1 0 obj"));
    }

    #[test]
    fn image_stream_holds_flattened_rgb() {
        let pdf = render(1);
        let marker = b"stream\n";
        let positions: Vec<usize> = pdf
            .windows(marker.len())
            .enumerate()
            .filter(|(i, w)| *w == marker && (*i == 0 || pdf[i - 1] != b'd'))
            .map(|(i, _)| i + marker.len())
            .collect();
        // Content stream first, image second.
        let mut dec = flate2::read::ZlibDecoder::new(&pdf[positions[1]..]);
        let mut rgb = Vec::new();
        dec.read_to_end(&mut rgb).unwrap();
        assert_eq!(rgb, vec![10, 0, 0, 10, 0, 0]);
    }
}
