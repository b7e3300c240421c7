use crate::document::model::Document;
use crate::foundation::error::InkdeckResult;
use crate::selection::clipboard::{Clipboard, decode_slide_envelope, encode_slide_envelope};

/// Vertical navigation direction in the slide list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    fn step(self, i: usize, len: usize) -> usize {
        match self {
            Direction::Up => i.saturating_sub(1),
            Direction::Down => (i + 1).min(len.saturating_sub(1)),
        }
    }
}

/// Inclusive range between an anchor and a moving end.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SelectionRange {
    pub anchor: usize,
    pub moving: usize,
}

impl SelectionRange {
    pub fn start(self) -> usize {
        self.anchor.min(self.moving)
    }

    pub fn end(self) -> usize {
        self.anchor.max(self.moving)
    }

    pub fn contains(self, i: usize) -> bool {
        (self.start()..=self.end()).contains(&i)
    }

    pub fn len(self) -> usize {
        self.end() - self.start() + 1
    }
}

/// What a drag gesture carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPayload {
    Single(usize),
    Range { start: usize, end: usize },
}

/// Multi-select, drag/drop and slide clipboard commands layered over the document's current
/// slide index.
#[derive(Clone, Debug, Default)]
pub struct SelectionController {
    range: Option<SelectionRange>,
    drag: Option<DragPayload>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn range(&self) -> Option<SelectionRange> {
        self.range
    }

    pub fn drag(&self) -> Option<DragPayload> {
        self.drag
    }

    pub fn clear(&mut self) {
        self.range = None;
    }

    /// Whether slide `i` carries the "lifted" marker of an in-progress drag.
    pub fn is_lifted(&self, i: usize) -> bool {
        match self.drag {
            Some(DragPayload::Single(s)) => s == i,
            Some(DragPayload::Range { start, end }) => (start..=end).contains(&i),
            None => false,
        }
    }

    /// Plain up/down: collapse any range and move the current slide by one, clamped.
    pub fn navigate(&mut self, doc: &mut Document, dir: Direction) -> InkdeckResult<bool> {
        self.range = None;
        let next = dir.step(doc.current_slide_index(), doc.len());
        doc.set_current_slide_index(next)
    }

    /// Range-extend up/down: anchor at the slide current before the first extend, then keep
    /// moving the far end.
    pub fn extend(&mut self, doc: &mut Document, dir: Direction) -> InkdeckResult<bool> {
        let current = doc.current_slide_index();
        let mut range = self.valid_range(doc.len()).unwrap_or(SelectionRange {
            anchor: current,
            moving: current,
        });
        range.moving = dir.step(range.moving, doc.len());
        self.range = Some(range);
        doc.set_current_slide_index(range.moving)?;
        Ok(true)
    }

    /// Plain click collapses to `index`; modified click spans from the previous current slide
    /// (or the existing anchor) to `index`.
    pub fn click(&mut self, doc: &mut Document, index: usize, extend: bool) -> InkdeckResult<bool> {
        let index = index.min(doc.len() - 1);
        if extend {
            let anchor = self
                .valid_range(doc.len())
                .map(|r| r.anchor)
                .unwrap_or_else(|| doc.current_slide_index());
            self.range = Some(SelectionRange {
                anchor,
                moving: index,
            });
        } else {
            self.range = None;
        }
        doc.set_current_slide_index(index)
    }

    /// Begin dragging slide `index`. A slide inside the active range drags the whole range;
    /// anything else drags alone and clears the range.
    pub fn drag_start(&mut self, index: usize) -> DragPayload {
        let payload = match self.range {
            Some(r) if r.contains(index) && r.len() > 1 => DragPayload::Range {
                start: r.start(),
                end: r.end(),
            },
            _ => {
                self.range = None;
                DragPayload::Single(index)
            }
        };
        self.drag = Some(payload);
        payload
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    /// Drop the current drag payload onto slide position `target`.
    pub fn drop_at(&mut self, doc: &mut Document, target: usize) -> InkdeckResult<bool> {
        let Some(payload) = self.drag.take() else {
            return Ok(false);
        };
        let target = target.min(doc.len() - 1);
        match payload {
            DragPayload::Single(from) => doc.reorder_slides(from, target),
            DragPayload::Range { start, end } => {
                if (start..=end).contains(&target) {
                    return Ok(false);
                }
                // Past the block the drop target is the slide the block lands on, so insert
                // after it.
                let to = if target > end { target + 1 } else { target };
                let moved = doc.reorder_consecutive_slides(start, end, to)?;
                if moved {
                    let len = end - start;
                    let new_start = if target > end { target - len } else { target };
                    self.range = self.range.map(|r| {
                        if r.anchor <= r.moving {
                            SelectionRange {
                                anchor: new_start,
                                moving: new_start + len,
                            }
                        } else {
                            SelectionRange {
                                anchor: new_start + len,
                                moving: new_start,
                            }
                        }
                    });
                }
                Ok(moved)
            }
        }
    }

    /// Clone the current slide into a new slide right after it and select the copy.
    pub fn duplicate(&mut self, doc: &mut Document) -> InkdeckResult<usize> {
        let current = doc.current_slide_index();
        let elements = doc.current_slide().elements.clone();
        let at = doc.add_slide_after_index(current, elements)?;
        self.range = None;
        doc.set_current_slide_index(at)?;
        Ok(at)
    }

    /// Delete the current slide (ranges are not deleted as a unit). Refused below two slides.
    pub fn delete_current(&mut self, doc: &mut Document) -> InkdeckResult<bool> {
        self.range = None;
        doc.delete_slide(doc.current_slide_index())
    }

    /// Put the current slide on the clipboard. Failures are logged and reported as `false`.
    pub fn copy(&self, doc: &Document, clipboard: &mut dyn Clipboard) -> bool {
        let text = match encode_slide_envelope(doc.current_slide()) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode slide for clipboard");
                return false;
            }
        };
        match clipboard.write_text(&text) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "clipboard write failed");
                false
            }
        }
    }

    /// Insert the clipboard slide after the current one and select it. Malformed clipboard
    /// content is logged and ignored.
    pub fn paste(&mut self, doc: &mut Document, clipboard: &mut dyn Clipboard) -> Option<usize> {
        let text = match clipboard.read_text() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "clipboard read failed");
                return None;
            }
        };
        let slide = match decode_slide_envelope(&text) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring clipboard paste");
                return None;
            }
        };
        let current = doc.current_slide_index();
        let at = match doc.add_slide_after_index(current, slide.elements) {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!(error = %e, "failed to insert pasted slide");
                return None;
            }
        };
        self.range = None;
        if let Err(e) = doc.set_current_slide_index(at) {
            tracing::warn!(error = %e, "failed to select pasted slide");
        }
        Some(at)
    }

    fn valid_range(&self, len: usize) -> Option<SelectionRange> {
        self.range.filter(|r| r.end() < len)
    }
}
