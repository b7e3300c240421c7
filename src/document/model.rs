use crate::config::EditorConfig;
use crate::document::element::Element;
use crate::document::files::FileStore;
use crate::document::slide::{Slide, normalize_frame, validate_elements};
use crate::foundation::color::Rgba8;
use crate::foundation::core::{DocumentSize, SlideId};
use crate::foundation::error::{InkdeckError, InkdeckResult};

/// Bounds applied by [`Document::set_document_size`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeLimits {
    pub min: DocumentSize,
    pub max: DocumentSize,
}

impl SizeLimits {
    /// `max` is `default` scaled by `max_multiple` on both axes.
    pub fn new(default: DocumentSize, min: DocumentSize, max_multiple: u32) -> Self {
        let m = max_multiple.max(1);
        Self {
            min,
            max: DocumentSize::new(
                default.width.saturating_mul(m),
                default.height.saturating_mul(m),
            ),
        }
    }
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self::new(DocumentSize::default(), DocumentSize::new(100, 100), 4)
    }
}

/// The canonical deck.
///
/// Invariants held by every method:
/// - `slides` is never empty.
/// - `current_slide_index < slides.len()`.
/// - every slide has exactly one frame boundary sized to `document_size`.
///
/// Every observable mutation bumps [`Document::revision`]; suppressed writes do not.
#[derive(Clone, Debug)]
pub struct Document {
    background_color: String,
    document_size: DocumentSize,
    files: FileStore,
    slides: Vec<Slide>,
    current_slide_index: usize,
    filename: String,
    limits: SizeLimits,
    next_slide_id: u64,
    revision: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

impl Document {
    /// A single-slide document.
    pub fn new(size: DocumentSize, limits: SizeLimits) -> Self {
        let size = size.clamped(limits.min, limits.max);
        Self {
            background_color: "#ffffff".to_owned(),
            document_size: size,
            files: FileStore::new(),
            slides: vec![Slide::new(SlideId(0), size)],
            current_slide_index: 0,
            filename: "untitled".to_owned(),
            limits,
            next_slide_id: 1,
            revision: 0,
        }
    }

    pub fn from_config(cfg: &EditorConfig) -> Self {
        let mut doc = Self::new(cfg.document_size, cfg.size_limits());
        doc.background_color = cfg.background_color.clone();
        doc
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide(&self, i: usize) -> Option<&Slide> {
        self.slides.get(i)
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn current_slide_index(&self) -> usize {
        self.current_slide_index
    }

    pub fn current_slide(&self) -> &Slide {
        &self.slides[self.current_slide_index]
    }

    pub fn slide_index_of(&self, id: SlideId) -> Option<usize> {
        self.slides.iter().position(|s| s.id == id)
    }

    pub fn document_size(&self) -> DocumentSize {
        self.document_size
    }

    pub fn size_limits(&self) -> SizeLimits {
        self.limits
    }

    pub fn background_color(&self) -> &str {
        &self.background_color
    }

    pub fn files(&self) -> &FileStore {
        &self.files
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn alloc_slide_id(&mut self) -> SlideId {
        let id = SlideId(self.next_slide_id);
        self.next_slide_id += 1;
        id
    }

    fn check_index(&self, i: usize, what: &str) -> InkdeckResult<()> {
        if i >= self.slides.len() {
            return Err(InkdeckError::validation(format!(
                "{what} index {i} out of bounds (len {})",
                self.slides.len()
            )));
        }
        Ok(())
    }

    /// Append a fresh slide and make it current. Returns its index.
    pub fn add_slide(&mut self) -> usize {
        let id = self.alloc_slide_id();
        self.slides.push(Slide::new(id, self.document_size));
        self.current_slide_index = self.slides.len() - 1;
        self.touch();
        tracing::debug!(slide = %id, index = self.current_slide_index, "added slide");
        self.current_slide_index
    }

    /// Insert a new slide holding `elements` right after index `i`. The current index is left
    /// for the caller to set. Returns the new slide's index.
    pub fn add_slide_after_index(
        &mut self,
        i: usize,
        elements: Vec<Element>,
    ) -> InkdeckResult<usize> {
        self.check_index(i, "insert-after")?;
        let elements = normalize_frame(elements, self.document_size);
        validate_elements(&elements)?;
        let id = self.alloc_slide_id();
        self.slides.insert(i + 1, Slide { id, elements });
        if self.current_slide_index > i {
            // Keep the same slide current; it shifted one to the right.
            self.current_slide_index += 1;
        }
        self.touch();
        tracing::debug!(slide = %id, index = i + 1, "inserted slide");
        Ok(i + 1)
    }

    /// Replace slide `i`'s elements. Returns `false` (and mutates nothing) when the normalized
    /// list is structurally equal to the current one. Invalid elements or repeated ids are
    /// refused.
    pub fn update_slide(&mut self, i: usize, elements: Vec<Element>) -> InkdeckResult<bool> {
        self.check_index(i, "update")?;
        let elements = normalize_frame(elements, self.document_size);
        validate_elements(&elements)?;
        if self.slides[i].elements == elements {
            return Ok(false);
        }
        self.slides[i].elements = elements;
        self.touch();
        Ok(true)
    }

    /// Remove slide `i`. Refused (returns `false`, state untouched) when it is the last slide.
    pub fn delete_slide(&mut self, i: usize) -> InkdeckResult<bool> {
        self.check_index(i, "delete")?;
        if self.slides.len() <= 1 {
            tracing::debug!("refusing to delete the only slide");
            return Ok(false);
        }
        let removed = self.slides.remove(i);
        let shift = usize::from(i <= self.current_slide_index);
        self.current_slide_index = self
            .current_slide_index
            .saturating_sub(shift)
            .min(self.slides.len() - 1);
        self.touch();
        tracing::debug!(slide = %removed.id, index = i, "deleted slide");
        Ok(true)
    }

    /// Move one slide from `from` to `to` (array-move semantics: it ends up at index `to`).
    pub fn reorder_slides(&mut self, from: usize, to: usize) -> InkdeckResult<bool> {
        self.check_index(from, "reorder source")?;
        self.check_index(to, "reorder destination")?;
        if from == to {
            return Ok(false);
        }
        let current = self.current_slide().id;
        let slide = self.slides.remove(from);
        self.slides.insert(to, slide);
        self.follow_current(current);
        self.touch();
        Ok(true)
    }

    /// Move the inclusive block `[start, end]` as a unit so it is inserted before the slide that
    /// was at index `to` (`to == len` appends). Internal order is preserved; a destination inside
    /// the block, or directly after it, is a no-op.
    pub fn reorder_consecutive_slides(
        &mut self,
        start: usize,
        end: usize,
        to: usize,
    ) -> InkdeckResult<bool> {
        if start > end {
            return Err(InkdeckError::validation(format!(
                "block start {start} must be <= end {end}"
            )));
        }
        self.check_index(end, "block end")?;
        if to > self.slides.len() {
            return Err(InkdeckError::validation(format!(
                "block destination {to} out of bounds (len {})",
                self.slides.len()
            )));
        }
        if (start..=end + 1).contains(&to) {
            return Ok(false);
        }

        let current = self.current_slide().id;
        let block: Vec<Slide> = self.slides.drain(start..=end).collect();
        let insert_at = if to > end { to - block.len() } else { to };
        self.slides.splice(insert_at..insert_at, block);
        self.follow_current(current);
        self.touch();
        Ok(true)
    }

    fn follow_current(&mut self, id: SlideId) {
        self.current_slide_index = self
            .slide_index_of(id)
            .unwrap_or(0)
            .min(self.slides.len() - 1);
    }

    pub fn set_current_slide_index(&mut self, i: usize) -> InkdeckResult<bool> {
        self.check_index(i, "current slide")?;
        if self.current_slide_index == i {
            return Ok(false);
        }
        self.current_slide_index = i;
        self.touch();
        Ok(true)
    }

    /// Clamp `size` into the configured limits and cascade it to every slide's frame boundary.
    /// Returns the size actually applied.
    pub fn set_document_size(&mut self, size: DocumentSize) -> DocumentSize {
        let size = size.clamped(self.limits.min, self.limits.max);
        if size == self.document_size {
            return size;
        }
        self.document_size = size;
        for slide in &mut self.slides {
            let elements = std::mem::take(&mut slide.elements);
            slide.elements = normalize_frame(elements, size);
        }
        self.touch();
        tracing::debug!(width = size.width, height = size.height, "document resized");
        size
    }

    /// Store a document-level background color. Never written into any element.
    pub fn set_background_color(&mut self, color: impl Into<String>) -> InkdeckResult<bool> {
        let color = color.into();
        Rgba8::parse(&color)?;
        if color == self.background_color {
            return Ok(false);
        }
        self.background_color = color;
        self.touch();
        Ok(true)
    }

    /// Replace the attachment map wholesale. Unreferenced entries are kept.
    pub fn set_files(&mut self, files: FileStore) -> bool {
        if files == self.files {
            return false;
        }
        self.files = files;
        self.touch();
        true
    }

    pub fn set_filename(&mut self, name: impl Into<String>) {
        let name = name.into();
        if name != self.filename {
            self.filename = name;
            self.touch();
        }
    }

    /// Apply `f` to one element of one slide, located by ids. Returns whether anything changed.
    pub fn update_element(
        &mut self,
        slide: SlideId,
        element_id: &str,
        f: impl FnOnce(&mut Element),
    ) -> bool {
        let Some(idx) = self.slide_index_of(slide) else {
            return false;
        };
        let Some(el) = self.slides[idx]
            .elements
            .iter_mut()
            .find(|e| e.id == element_id)
        else {
            return false;
        };
        let before = el.clone();
        f(el);
        if *el == before {
            return false;
        }
        self.touch();
        true
    }

    /// Wholesale replacement used by snapshot import. Inputs are validated by the caller.
    pub(crate) fn replace_contents(
        &mut self,
        filename: String,
        background_color: String,
        size: DocumentSize,
        files: FileStore,
        slides: Vec<Slide>,
    ) {
        debug_assert!(!slides.is_empty());
        let max_id = slides.iter().map(|s| s.id.0).max().unwrap_or(0);
        self.next_slide_id = self.next_slide_id.max(max_id + 1);
        self.filename = filename;
        self.background_color = background_color;
        self.document_size = size;
        self.files = files;
        self.slides = slides;
        self.current_slide_index = 0;
        self.touch();
    }
}
