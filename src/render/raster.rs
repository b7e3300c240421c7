use std::sync::Arc;

use crate::document::files::decode_data_url;
use crate::fonts::FontRegistry;
use crate::foundation::error::{InkdeckError, InkdeckResult};

/// Font database handed to `usvg` when parsing slide SVGs.
///
/// Custom faces whose source is a `data:` URL are loaded from memory. System fonts are loaded
/// only when asked, since scanning them is slow and slides without text never need them.
#[derive(Clone)]
pub struct FontBook {
    db: Arc<usvg::fontdb::Database>,
}

impl FontBook {
    pub fn empty() -> Self {
        Self {
            db: Arc::new(usvg::fontdb::Database::new()),
        }
    }

    pub fn from_registry(fonts: &FontRegistry, system_fonts: bool) -> Self {
        let mut db = usvg::fontdb::Database::new();
        if system_fonts {
            db.load_system_fonts();
        }
        for (family, faces) in fonts.families() {
            for face in faces {
                if !face.source.starts_with("data:") {
                    continue;
                }
                match decode_data_url(&face.source) {
                    Ok(bytes) => db.load_font_data(bytes),
                    Err(err) => {
                        tracing::warn!(family = %family, error = %err, "skipping unreadable font face")
                    }
                }
            }
        }
        Self { db: Arc::new(db) }
    }

    pub fn face_count(&self) -> usize {
        self.db.faces().count()
    }
}

/// Parse `svg` and rasterize it into a `width`×`height` premultiplied RGBA8 buffer, scaling the
/// SVG's intrinsic size to fill the target.
pub fn rasterize_svg_to_premul_rgba8(
    svg: &str,
    book: &FontBook,
    width: u32,
    height: u32,
) -> InkdeckResult<Vec<u8>> {
    let opts = usvg::Options {
        fontdb: book.db.clone(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(svg, &opts)
        .map_err(|e| InkdeckError::validation(format!("parse svg tree: {e}")))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| InkdeckError::validation("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(&tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.take())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_whole_target_at_scale() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="2" viewBox="0 0 4 2"><rect x="0" y="0" width="4" height="2" fill="#ff0000"/></svg>"##;
        let px = rasterize_svg_to_premul_rgba8(svg, &FontBook::empty(), 8, 4).unwrap();
        assert_eq!(px.len(), 8 * 4 * 4);
        assert!(px.chunks_exact(4).all(|p| p == [255, 0, 0, 255]));
    }

    #[test]
    fn rejects_garbage() {
        assert!(rasterize_svg_to_premul_rgba8("<nope", &FontBook::empty(), 2, 2).is_err());
    }

    #[test]
    fn bad_custom_faces_are_skipped() {
        let mut reg = FontRegistry::new();
        reg.add_face(
            "Broken",
            crate::fonts::FontFace::new("data:font/woff2;base64,!!!"),
        )
        .unwrap();
        assert_eq!(FontBook::from_registry(&reg, false).face_count(), 0);
    }
}
