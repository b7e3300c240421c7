use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::document::element::{Element, FRAME_ID};
use crate::document::files::{FileId, FileStore};
use crate::fonts::FontId;
use crate::foundation::core::{DocumentSize, SlideId};
use crate::foundation::error::{InkdeckError, InkdeckResult};

/// One slide: stable identity plus an ordered (z-order) element list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub id: SlideId,
    pub elements: Vec<Element>,
}

impl Slide {
    /// New slide holding only a frame boundary sized to `size`.
    pub fn new(id: SlideId, size: DocumentSize) -> Self {
        Self {
            id,
            elements: vec![Element::frame(size)],
        }
    }

    pub fn frame(&self) -> Option<&Element> {
        self.elements.iter().find(|e| e.is_frame())
    }

    pub fn frame_mut(&mut self) -> Option<&mut Element> {
        self.elements.iter_mut().find(|e| e.is_frame())
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.id == id)
    }

    /// Structural checks applied whenever a slide crosses a boundary (import, paste).
    pub fn validate(&self) -> InkdeckResult<()> {
        validate_elements(&self.elements).map_err(|e| match e {
            InkdeckError::Validation(msg) => InkdeckError::validation(format!("{}: {msg}", self.id)),
            other => other,
        })?;
        let frames = self.elements.iter().filter(|e| e.is_frame()).count();
        if frames != 1 {
            return Err(InkdeckError::validation(format!(
                "{} must have exactly one \"{FRAME_ID}\" element, found {frames}",
                self.id
            )));
        }
        Ok(())
    }
}

/// Per-element checks plus id uniqueness across the list. The frame count is not checked; see
/// [`normalize_frame`].
pub fn validate_elements(elements: &[Element]) -> InkdeckResult<()> {
    let mut seen = BTreeSet::new();
    for el in elements {
        el.validate()?;
        if !seen.insert(el.id.as_str()) {
            return Err(InkdeckError::validation(format!(
                "duplicate element id \"{}\"",
                el.id
            )));
        }
    }
    Ok(())
}

/// Enforce the frame-boundary invariant on an element list: exactly one frame, sized to `size`.
///
/// A missing frame is synthesized at the bottom of the z-order; extra frames are dropped.
pub fn normalize_frame(mut elements: Vec<Element>, size: DocumentSize) -> Vec<Element> {
    let mut found = false;
    elements.retain(|e| {
        if !e.is_frame() {
            return true;
        }
        let keep = !found;
        found = true;
        keep
    });

    match elements.iter_mut().find(|e| e.is_frame()) {
        Some(frame) => {
            frame.width = f64::from(size.width);
            frame.height = f64::from(size.height);
        }
        None => elements.insert(0, Element::frame(size)),
    }
    elements
}

/// Attachments referenced by at least one image element across `slides`.
pub fn referenced_files(files: &FileStore, slides: &[Slide]) -> FileStore {
    let used: BTreeSet<&FileId> = slides
        .iter()
        .flat_map(|s| s.elements.iter().filter_map(Element::file_ref))
        .collect();
    files
        .iter()
        .filter(|(id, _)| used.contains(id))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Font ids referenced by text elements across `slides`.
pub fn used_fonts(slides: &[Slide]) -> BTreeSet<FontId> {
    slides
        .iter()
        .flat_map(|s| s.elements.iter().filter_map(Element::font_ref))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::Rect;

    fn rect(id: &str) -> Element {
        Element::rectangle(id, Rect::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn new_slide_has_one_sized_frame() {
        let s = Slide::new(SlideId(1), DocumentSize::new(800, 600));
        s.validate().unwrap();
        let f = s.frame().unwrap();
        assert_eq!((f.width, f.height), (800.0, 600.0));
    }

    #[test]
    fn validate_rejects_missing_or_duplicate_frames() {
        let s = Slide {
            id: SlideId(1),
            elements: vec![rect("a")],
        };
        assert!(s.validate().is_err());

        let size = DocumentSize::default();
        let s = Slide {
            id: SlideId(1),
            elements: vec![Element::frame(size), Element::frame(size)],
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_ids() {
        let mut s = Slide::new(SlideId(1), DocumentSize::default());
        s.elements.push(rect("a"));
        s.elements.push(rect("a"));
        assert!(s.validate().is_err());
    }

    #[test]
    fn element_lists_need_unique_ids_but_not_a_frame() {
        validate_elements(&[rect("a"), rect("b")]).unwrap();
        let err = validate_elements(&[rect("a"), rect("b"), rect("a")]).unwrap_err();
        assert!(err.to_string().contains("duplicate element id \"a\""));
    }

    #[test]
    fn normalize_inserts_resizes_and_dedups() {
        let size = DocumentSize::new(100, 50);
        let out = normalize_frame(vec![rect("a")], size);
        assert!(out[0].is_frame());
        assert_eq!(out.len(), 2);

        let mut stale = Element::frame(DocumentSize::new(1, 1));
        stale.x = 3.0;
        let out = normalize_frame(vec![rect("a"), stale, Element::frame(size)], size);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "a");
        assert_eq!((out[1].x, out[1].width, out[1].height), (3.0, 100.0, 50.0));
    }
}
