use std::collections::BTreeSet;

use crate::document::element::{Element, ElementKind, FRAME_ID};
use crate::document::files::{FileId, FileStore, newest_attachment};
use crate::document::model::Document;
use crate::document::slide::{normalize_frame, validate_elements};
use crate::foundation::core::{DocumentSize, SlideId};
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::scene::probe::{DimensionProber, ProbeRequest, ProbeResult};
use crate::scene::surface::{DrawingSurface, SurfaceChange, ViewState};

/// What a single surface notification did to the document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// `update_slide` was issued and produced an observable mutation.
    pub committed: bool,
    /// An attachment was bound to an image placeholder.
    pub bound: Option<FileId>,
    /// The live list had no frame boundary and a fresh one was synthesized.
    pub healed: bool,
    /// The notification failed validation and was dropped.
    pub rejected: bool,
}

/// Result of merging externally pasted elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasteOutcome {
    /// Ids overlap with the live slide; the surface merges on its own.
    Deferred,
    /// Elements were appended to the canonical list and pushed back into the surface.
    Merged(usize),
}

/// Diff-driven adapter between the canonical [`Document`] and the live [`DrawingSurface`].
///
/// Canonical state flows into the surface only on activation, resize and healing. Surface
/// state flows back only on selection change, a completed pointer gesture, or attachment
/// binding.
pub struct SceneSynchronizer {
    live: Option<SlideId>,
    last_elements: Vec<Element>,
    last_files: FileStore,
    last_selected: BTreeSet<String>,
    pointer_down: bool,
    pending_fit: Option<String>,
    prober: DimensionProber,
}

impl Default for SceneSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneSynchronizer {
    pub fn new() -> Self {
        Self {
            live: None,
            last_elements: Vec::new(),
            last_files: FileStore::new(),
            last_selected: BTreeSet::new(),
            pointer_down: false,
            pending_fit: None,
            prober: DimensionProber::spawn(),
        }
    }

    /// Id of the slide currently mirrored into the surface.
    pub fn live_slide(&self) -> Option<SlideId> {
        self.live
    }

    pub fn pending_fit(&self) -> Option<&str> {
        self.pending_fit.as_deref()
    }

    pub fn pending_probes(&self) -> usize {
        self.prober.pending()
    }

    /// Make the document's current slide live if it is not already. Returns whether a switch
    /// happened.
    pub fn ensure_live(&mut self, doc: &Document, surface: &mut dyn DrawingSurface) -> bool {
        if self.live == Some(doc.current_slide().id) {
            return false;
        }
        self.activate(doc, surface);
        true
    }

    /// Push the current slide's canonical elements into the surface, dropping any previous live
    /// state.
    pub fn activate(&mut self, doc: &Document, surface: &mut dyn DrawingSurface) {
        let slide = doc.current_slide();
        tracing::debug!(slide = %slide.id, previous = ?self.live, "activating slide");
        self.live = Some(slide.id);
        self.last_elements = slide.elements.clone();
        self.last_files = doc.files().clone();
        self.last_selected.clear();
        self.pointer_down = false;
        surface.replace_elements(&slide.elements);
        surface.replace_view(&ViewState {
            background_color: doc.background_color().to_owned(),
        });
        self.pending_fit = Some(FRAME_ID.to_owned());
    }

    /// Apply deferred view work once the surface has painted.
    pub fn on_paint(&mut self, surface: &mut dyn DrawingSurface) {
        if let Some(target) = self.pending_fit.take() {
            surface.fit_to(&target);
        }
    }

    pub fn on_pointer_down(&mut self) {
        self.pointer_down = true;
    }

    /// Close a pointer gesture and commit whatever the surface last reported.
    pub fn on_pointer_up(&mut self, doc: &mut Document) -> InkdeckResult<bool> {
        if !std::mem::take(&mut self.pointer_down) {
            return Ok(false);
        }
        tracing::debug!("pointer gesture completed");
        self.commit(doc)
    }

    /// Handle one change notification from the surface.
    pub fn on_change(
        &mut self,
        doc: &mut Document,
        surface: &mut dyn DrawingSurface,
        change: SurfaceChange,
    ) -> InkdeckResult<SyncOutcome> {
        let mut outcome = SyncOutcome::default();
        if self.live_index(doc).is_none() {
            tracing::debug!("notification for a stale live slide; re-activating");
            self.activate(doc, surface);
            outcome.rejected = true;
            return Ok(outcome);
        }

        if let Err(err) = validate_elements(&change.elements) {
            tracing::warn!(error = %err, "dropping invalid surface notification");
            outcome.rejected = true;
            return Ok(outcome);
        }

        if change.elements.is_empty() {
            outcome.committed = self.heal(doc, surface)?;
            outcome.healed = true;
            return Ok(outcome);
        }

        let SurfaceChange {
            mut elements,
            files,
            selected_ids,
        } = change;

        if files != self.last_files {
            outcome.bound = self.bind_attachment(doc, &mut elements, &files)?;
            if outcome.bound.is_some() {
                surface.replace_elements(&elements);
            }
            self.last_files = files;
        }

        let normalized = normalize_frame(elements.clone(), doc.document_size());
        if normalized != elements {
            tracing::warn!("live list lost its frame boundary; re-seeding");
            surface.replace_elements(&normalized);
            self.pending_fit = Some(FRAME_ID.to_owned());
            elements = normalized;
            outcome.healed = true;
        }
        self.last_elements = elements;

        let selection_changed = selected_ids != self.last_selected;
        if selection_changed {
            self.last_selected = selected_ids;
            tracing::debug!(selected = self.last_selected.len(), "selection changed");
        }
        if selection_changed || outcome.bound.is_some() || outcome.healed {
            outcome.committed = self.commit(doc)?;
        }
        Ok(outcome)
    }

    /// Apply any finished dimension probes. Returns how many elements were resized.
    pub fn poll_probes(&mut self, doc: &mut Document, surface: &mut dyn DrawingSurface) -> usize {
        let results = self.prober.try_drain();
        self.apply_probes(doc, surface, results)
    }

    /// Block until every outstanding probe has finished, then apply the results.
    pub fn wait_probes(&mut self, doc: &mut Document, surface: &mut dyn DrawingSurface) -> usize {
        let results = self.prober.wait_all();
        self.apply_probes(doc, surface, results)
    }

    /// Resize the document and refresh the live surface from the cascaded frame.
    pub fn set_document_size(
        &mut self,
        doc: &mut Document,
        surface: &mut dyn DrawingSurface,
        size: DocumentSize,
    ) -> DocumentSize {
        let applied = doc.set_document_size(size);
        if let Some(idx) = self.live_index(doc) {
            let elements = doc.slides()[idx].elements.clone();
            surface.replace_elements(&elements);
            self.last_elements = elements;
            self.pending_fit = Some(FRAME_ID.to_owned());
        }
        applied
    }

    /// Store the background on the document and show it on the surface. Elements are untouched.
    pub fn set_background_color(
        &mut self,
        doc: &mut Document,
        surface: &mut dyn DrawingSurface,
        color: &str,
    ) -> InkdeckResult<bool> {
        let changed = doc.set_background_color(color)?;
        if changed {
            surface.replace_view(&ViewState {
                background_color: doc.background_color().to_owned(),
            });
        }
        Ok(changed)
    }

    /// Merge elements pasted from outside the editor into the live slide.
    pub fn paste_external(
        &mut self,
        doc: &mut Document,
        surface: &mut dyn DrawingSurface,
        pasted: Vec<Element>,
    ) -> InkdeckResult<PasteOutcome> {
        let Some(idx) = self.live_index(doc) else {
            return Err(InkdeckError::validation("no live slide to paste into"));
        };
        let current = &doc.slides()[idx].elements;
        let existing: BTreeSet<&str> = current.iter().map(|e| e.id.as_str()).collect();
        if pasted.iter().any(|e| existing.contains(e.id.as_str())) {
            tracing::debug!("pasted ids overlap live slide; surface merges");
            return Ok(PasteOutcome::Deferred);
        }
        let count = pasted.len();
        let mut merged = current.clone();
        merged.extend(pasted);
        validate_elements(&merged)?;
        doc.update_slide(idx, merged)?;
        let merged = doc.slides()[idx].elements.clone();
        surface.replace_elements(&merged);
        self.last_elements = merged;
        Ok(PasteOutcome::Merged(count))
    }

    fn live_index(&self, doc: &Document) -> Option<usize> {
        let live = self.live?;
        if doc.current_slide().id != live {
            return None;
        }
        doc.slide_index_of(live)
    }

    fn commit(&mut self, doc: &mut Document) -> InkdeckResult<bool> {
        let Some(idx) = self.live_index(doc) else {
            return Ok(false);
        };
        let changed = doc.update_slide(idx, self.last_elements.clone())?;
        if changed {
            tracing::debug!(index = idx, revision = doc.revision(), "committed live slide");
        }
        Ok(changed)
    }

    fn heal(&mut self, doc: &mut Document, surface: &mut dyn DrawingSurface) -> InkdeckResult<bool> {
        tracing::warn!("live slide lost its frame boundary; re-seeding");
        let frame = Element::frame(doc.document_size());
        let elements = vec![frame];
        surface.replace_elements(&elements);
        self.last_elements = elements;
        self.pending_fit = Some(FRAME_ID.to_owned());
        self.commit(doc)
    }

    fn bind_attachment(
        &mut self,
        doc: &mut Document,
        elements: &mut [Element],
        files: &FileStore,
    ) -> InkdeckResult<Option<FileId>> {
        let mut store = doc.files().clone();
        store.extend(files.iter().map(|(k, v)| (k.clone(), v.clone())));
        doc.set_files(store);

        let Some(newest) = newest_attachment(files) else {
            return Ok(None);
        };
        if elements.iter().any(|e| e.file_ref() == Some(&newest.id)) {
            return Ok(None);
        }
        let Some(placeholder) = elements
            .iter_mut()
            .rev()
            .find(|e| matches!(e.kind, ElementKind::Image { file_id: None }))
        else {
            return Ok(None);
        };

        placeholder.kind = ElementKind::Image {
            file_id: Some(newest.id.clone()),
        };
        tracing::debug!(element = %placeholder.id, file = %newest.id, "bound attachment");

        match (self.live, newest.decode_payload()) {
            (Some(slide), Ok(payload)) => self.prober.submit(ProbeRequest {
                slide,
                element_id: placeholder.id.clone(),
                payload,
            }),
            (_, Err(err)) => tracing::warn!(error = %err, "attachment payload unreadable"),
            (None, _) => {}
        }
        Ok(Some(newest.id.clone()))
    }

    fn apply_probes(
        &mut self,
        doc: &mut Document,
        surface: &mut dyn DrawingSurface,
        results: Vec<ProbeResult>,
    ) -> usize {
        let mut applied = 0;
        for res in results {
            let (w, h) = match res.dims {
                Ok(dims) => dims,
                Err(err) => {
                    tracing::warn!(element = %res.element_id, error = %err, "dimension probe failed");
                    continue;
                }
            };
            let changed = doc.update_element(res.slide, &res.element_id, |el| {
                el.width = f64::from(w);
                el.height = f64::from(h);
            });
            if !changed {
                continue;
            }
            applied += 1;
            if self.live == Some(res.slide)
                && let Some(idx) = self.live_index(doc)
            {
                let elements = doc.slides()[idx].elements.clone();
                surface.replace_elements(&elements);
                self.last_elements = elements;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::document::files::FileAttachment;
    use crate::foundation::core::Rect;
    use crate::scene::surface::HeadlessSurface;

    fn live_doc() -> (Document, SceneSynchronizer, HeadlessSurface) {
        let doc = Document::default();
        let mut sync = SceneSynchronizer::new();
        let mut surface = HeadlessSurface::default();
        sync.activate(&doc, &mut surface);
        (doc, sync, surface)
    }

    fn with_rect(doc: &Document) -> Vec<Element> {
        let mut els = doc.current_slide().elements.clone();
        els.push(Element::rectangle("r1", Rect::new(10.0, 10.0, 50.0, 40.0)));
        els
    }

    fn png(w: u32, h: u32) -> Vec<u8> {
        let img = image::RgbaImage::new(w, h);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn activation_pushes_canonical_and_fits_after_paint() {
        let (doc, mut sync, mut surface) = live_doc();
        assert_eq!(surface.elements, doc.current_slide().elements);
        assert_eq!(surface.view.as_ref().unwrap().background_color, "#ffffff");
        assert!(surface.fits.is_empty());
        sync.on_paint(&mut surface);
        assert_eq!(surface.fits, vec![FRAME_ID.to_owned()]);
        assert!(!sync.ensure_live(&doc, &mut surface));
    }

    #[test]
    fn moves_do_not_commit_until_selection_changes() {
        let (mut doc, mut sync, mut surface) = live_doc();
        let rev = doc.revision();
        let change = SurfaceChange::new(with_rect(&doc));
        let out = sync.on_change(&mut doc, &mut surface, change).unwrap();
        assert!(!out.committed);
        assert_eq!(doc.revision(), rev);

        let change = SurfaceChange::new(with_rect(&doc)).with_selection(["r1"]);
        let out = sync.on_change(&mut doc, &mut surface, change).unwrap();
        assert!(out.committed);
        assert_eq!(doc.current_slide().elements.len(), 2);
    }

    #[test]
    fn pointer_gesture_commits_once() {
        let (mut doc, mut sync, mut surface) = live_doc();
        sync.on_pointer_down();
        for x in [10.0, 20.0, 30.0] {
            let mut els = with_rect(&doc);
            els[1].x = x;
            sync.on_change(&mut doc, &mut surface, SurfaceChange::new(els))
                .unwrap();
        }
        let rev = doc.revision();
        assert!(sync.on_pointer_up(&mut doc).unwrap());
        assert_eq!(doc.revision(), rev + 1);
        assert_eq!(doc.current_slide().elements[1].x, 30.0);
        assert!(!sync.on_pointer_up(&mut doc).unwrap());
    }

    #[test]
    fn empty_list_self_heals() {
        let (mut doc, mut sync, mut surface) = live_doc();
        sync.on_paint(&mut surface);
        let out = sync
            .on_change(&mut doc, &mut surface, SurfaceChange::default())
            .unwrap();
        assert!(out.healed);
        assert_eq!(surface.elements.len(), 1);
        assert!(surface.elements[0].is_frame());
        assert!(doc.current_slide().frame().is_some());
        assert_eq!(sync.pending_fit(), Some(FRAME_ID));
        sync.on_paint(&mut surface);
        assert_eq!(surface.fits.len(), 2);
    }

    #[test]
    fn invalid_notification_is_dropped() {
        let (mut doc, mut sync, mut surface) = live_doc();
        let mut els = with_rect(&doc);
        els[1].width = f64::NAN;
        let rev = doc.revision();
        let out = sync
            .on_change(
                &mut doc,
                &mut surface,
                SurfaceChange::new(els).with_selection(["r1"]),
            )
            .unwrap();
        assert!(out.rejected);
        assert_eq!(doc.revision(), rev);
    }

    #[test]
    fn new_attachment_binds_to_latest_placeholder_and_probes() {
        let (mut doc, mut sync, mut surface) = live_doc();
        let mut els = doc.current_slide().elements.clone();
        els.push(Element::image("img-a", Rect::new(0.0, 0.0, 1.0, 1.0), None));
        els.push(Element::image("img-b", Rect::new(0.0, 0.0, 1.0, 1.0), None));
        let mut files = FileStore::new();
        let old = FileAttachment::from_bytes(FileId::new("old"), "image/png", &png(2, 2), 1);
        let new = FileAttachment::from_bytes(FileId::new("new"), "image/png", &png(12, 8), 2);
        files.insert(old.id.clone(), old);
        files.insert(new.id.clone(), new);

        let out = sync
            .on_change(&mut doc, &mut surface, SurfaceChange::new(els).with_files(files))
            .unwrap();
        assert_eq!(out.bound, Some(FileId::new("new")));
        assert!(out.committed);
        assert_eq!(doc.files().len(), 2);

        let slide = doc.current_slide();
        assert_eq!(slide.element("img-b").unwrap().file_ref(), Some(&FileId::new("new")));
        assert_eq!(slide.element("img-a").unwrap().file_ref(), None);

        assert_eq!(sync.wait_probes(&mut doc, &mut surface), 1);
        let img = doc.current_slide().element("img-b").unwrap();
        assert_eq!((img.width, img.height), (12.0, 8.0));
        assert_eq!(surface.elements, doc.current_slide().elements);
    }

    #[test]
    fn resize_refreshes_live_surface() {
        let (mut doc, mut sync, mut surface) = live_doc();
        doc.add_slide();
        sync.ensure_live(&doc, &mut surface);
        let applied = sync.set_document_size(&mut doc, &mut surface, DocumentSize::new(1280, 720));
        assert_eq!(applied, DocumentSize::new(1280, 720));
        let frame = surface.elements.iter().find(|e| e.is_frame()).unwrap();
        assert_eq!((frame.width, frame.height), (1280.0, 720.0));
        for slide in doc.slides() {
            let f = slide.frame().unwrap();
            assert_eq!((f.width, f.height), (1280.0, 720.0));
        }
    }

    #[test]
    fn background_goes_to_view_only() {
        let (mut doc, mut sync, mut surface) = live_doc();
        let before = doc.current_slide().elements.clone();
        assert!(sync.set_background_color(&mut doc, &mut surface, "#101820").unwrap());
        assert_eq!(surface.view.unwrap().background_color, "#101820");
        assert_eq!(doc.current_slide().elements, before);
        assert!(sync.set_background_color(&mut doc, &mut HeadlessSurface::default(), "nope").is_err());
    }

    #[test]
    fn external_paste_merges_or_defers() {
        let (mut doc, mut sync, mut surface) = live_doc();
        let pasted = vec![Element::ellipse("e1", Rect::new(0.0, 0.0, 5.0, 5.0))];
        assert_eq!(
            sync.paste_external(&mut doc, &mut surface, pasted.clone()).unwrap(),
            PasteOutcome::Merged(1)
        );
        assert_eq!(surface.elements.len(), 2);
        assert_eq!(doc.current_slide().elements.len(), 2);

        let rev = doc.revision();
        assert_eq!(
            sync.paste_external(&mut doc, &mut surface, pasted).unwrap(),
            PasteOutcome::Deferred
        );
        assert_eq!(doc.revision(), rev);
    }

    #[test]
    fn repeated_ids_in_notification_are_rejected() {
        let (mut doc, mut sync, mut surface) = live_doc();
        let mut els = with_rect(&doc);
        els.push(els[1].clone());
        let rev = doc.revision();
        let out = sync
            .on_change(
                &mut doc,
                &mut surface,
                SurfaceChange::new(els).with_selection(["r1"]),
            )
            .unwrap();
        assert!(out.rejected);
        assert!(!out.committed);
        assert_eq!(doc.revision(), rev);
        doc.current_slide().validate().unwrap();
    }

    #[test]
    fn external_paste_with_repeated_ids_is_refused() {
        let (mut doc, mut sync, mut surface) = live_doc();
        let p = Element::ellipse("p", Rect::new(0.0, 0.0, 5.0, 5.0));
        let before = doc.current_slide().clone();
        let err = sync
            .paste_external(&mut doc, &mut surface, vec![p.clone(), p])
            .unwrap_err();
        assert!(matches!(err, InkdeckError::Validation(_)));
        assert_eq!(doc.current_slide(), &before);
        assert_eq!(surface.elements, before.elements);
    }

    #[test]
    fn lost_frame_is_reseeded_into_the_surface() {
        let (mut doc, mut sync, mut surface) = live_doc();
        sync.on_paint(&mut surface);
        let els = vec![Element::rectangle("r1", Rect::new(10.0, 10.0, 50.0, 40.0))];
        let out = sync
            .on_change(&mut doc, &mut surface, SurfaceChange::new(els))
            .unwrap();
        assert!(out.healed);
        assert!(out.committed);
        assert_eq!(surface.elements.iter().filter(|e| e.is_frame()).count(), 1);
        assert_eq!(surface.elements, doc.current_slide().elements);
        assert!(doc.current_slide().element("r1").is_some());
        assert_eq!(sync.pending_fit(), Some(FRAME_ID));
    }
}
