use std::fmt::Write as _;

use crate::document::files::FileStore;
use crate::fonts::{FontId, FontRegistry};
use crate::foundation::color::Rgba8;
use crate::foundation::core::Affine;
use crate::render::vector::{VectorItem, VectorScene, VectorShape};

const FALLBACK_STACK: &str = "Helvetica, Arial, sans-serif";
const LINE_HEIGHT: f64 = 1.25;

/// Stroke-in timing for one item, in milliseconds from the start of the slide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrokeTiming {
    pub begin_ms: u64,
    pub dur_ms: u64,
}

/// Serializes a [`VectorScene`] to a standalone SVG document.
///
/// Fonts resolve through the built-in stacks first, then the custom registry. Images are inlined
/// from the attachment store; an image whose attachment is missing is left out.
pub struct SvgWriter<'a> {
    fonts: &'a FontRegistry,
    files: &'a FileStore,
}

impl<'a> SvgWriter<'a> {
    pub fn new(fonts: &'a FontRegistry, files: &'a FileStore) -> Self {
        Self { fonts, files }
    }

    pub fn write(&self, scene: &VectorScene) -> String {
        self.write_with_timings(scene, &[])
    }

    /// Like [`SvgWriter::write`], attaching a SMIL stroke-dash animation to every item that has
    /// a timing at the same position.
    pub fn write_with_timings(&self, scene: &VectorScene, timings: &[Option<StrokeTiming>]) -> String {
        let vp = scene.viewport;
        let mut out = String::with_capacity(256 + scene.items.len() * 160);
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{}" height="{}" viewBox="{} {} {} {}">"#,
            scene.size.width,
            scene.size.height,
            num(vp.x0),
            num(vp.y0),
            scene.size.width,
            scene.size.height,
        );
        if !scene.background.is_transparent() {
            let _ = write!(
                out,
                r#"<rect x="{}" y="{}" width="{}" height="{}"{}/>"#,
                num(vp.x0),
                num(vp.y0),
                scene.size.width,
                scene.size.height,
                paint_attr("fill", scene.background),
            );
        }
        for (i, item) in scene.items.iter().enumerate() {
            let timing = timings.get(i).copied().flatten();
            self.write_item(&mut out, item, timing);
        }
        out.push_str("</svg>");
        out
    }

    fn write_item(&self, out: &mut String, item: &VectorItem, timing: Option<StrokeTiming>) {
        let common = common_attrs(item);
        match &item.shape {
            VectorShape::Path(path) => {
                let fill = item
                    .fill
                    .map(|c| paint_attr("fill", c))
                    .unwrap_or_else(|| r#" fill="none""#.to_owned());
                let stroke = item
                    .stroke
                    .map(|(c, w)| {
                        format!(
                            r#"{} stroke-width="{}" stroke-linecap="round" stroke-linejoin="round""#,
                            paint_attr("stroke", c),
                            num(w)
                        )
                    })
                    .unwrap_or_default();
                match timing.filter(|_| item.stroke_length > 0.0) {
                    None => {
                        let _ = write!(out, r#"<path d="{}"{fill}{stroke}{common}/>"#, path.to_svg());
                    }
                    Some(t) => {
                        let len = num(item.stroke_length);
                        let _ = write!(
                            out,
                            r#"<path d="{}"{fill}{stroke}{common} stroke-dasharray="{len}" stroke-dashoffset="{len}"><animate attributeName="stroke-dashoffset" from="{len}" to="0" begin="{}ms" dur="{}ms" fill="freeze"/></path>"#,
                            path.to_svg(),
                            t.begin_ms,
                            t.dur_ms.max(1),
                        );
                    }
                }
            }
            VectorShape::Text {
                lines,
                origin,
                font,
                font_size,
            } => {
                let color = item.stroke.map(|(c, _)| c).unwrap_or(Rgba8::BLACK);
                let _ = write!(
                    out,
                    r#"<text x="{}" y="{}" font-family="{}" font-size="{}"{}{common}>"#,
                    num(origin.x),
                    num(origin.y + font_size),
                    escape(&self.font_stack(*font)),
                    num(*font_size),
                    paint_attr("fill", color),
                );
                for (n, line) in lines.iter().enumerate() {
                    let dy = if n == 0 { 0.0 } else { font_size * LINE_HEIGHT };
                    let _ = write!(
                        out,
                        r#"<tspan x="{}" dy="{}">{}</tspan>"#,
                        num(origin.x),
                        num(dy),
                        escape(line)
                    );
                }
                out.push_str("</text>");
            }
            VectorShape::Image { file_id, rect } => {
                let Some(att) = self.files.get(file_id) else {
                    tracing::warn!(element = %item.element_id, file = %file_id, "image attachment missing; skipped");
                    return;
                };
                let _ = write!(
                    out,
                    r#"<image x="{}" y="{}" width="{}" height="{}" preserveAspectRatio="none" xlink:href="{}"{common}/>"#,
                    num(rect.x0),
                    num(rect.y0),
                    num(rect.width()),
                    num(rect.height()),
                    escape(&att.data_url),
                );
            }
        }
    }

    fn font_stack(&self, font: FontId) -> String {
        if let Some(stack) = font.builtin_stack() {
            return stack.to_owned();
        }
        match self.fonts.resolve(font) {
            Some(family) => format!("'{family}', {FALLBACK_STACK}"),
            None => FALLBACK_STACK.to_owned(),
        }
    }
}

fn common_attrs(item: &VectorItem) -> String {
    let mut s = String::new();
    if item.opacity < 1.0 {
        let _ = write!(s, r#" opacity="{}""#, num(item.opacity));
    }
    if item.transform != Affine::IDENTITY {
        let [a, b, c, d, e, f] = item.transform.as_coeffs();
        let _ = write!(
            s,
            r#" transform="matrix({} {} {} {} {} {})""#,
            num(a),
            num(b),
            num(c),
            num(d),
            num(e),
            num(f)
        );
    }
    s
}

fn paint_attr(name: &str, c: Rgba8) -> String {
    if c.a == 255 {
        format!(r#" {name}="{}""#, c.to_hex_rgb())
    } else {
        format!(
            r#" {name}="{}" {name}-opacity="{}""#,
            c.to_hex_rgb(),
            num(c.alpha_f64())
        )
    }
}

fn num(v: f64) -> String {
    let r = (v * 1000.0).round() / 1000.0;
    if r == r.trunc() {
        format!("{}", r as i64)
    } else {
        format!("{r}")
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
