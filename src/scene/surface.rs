use std::collections::BTreeSet;

use crate::document::element::Element;
use crate::document::files::FileStore;

/// View state owned by the document but rendered by the surface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub background_color: String,
}

/// Imperative side of the external interactive canvas engine.
pub trait DrawingSurface {
    /// Replace every live element.
    fn replace_elements(&mut self, elements: &[Element]);
    /// Replace view state (background etc.).
    fn replace_view(&mut self, view: &ViewState);
    /// Scroll/zoom so the element with `element_id` fills the viewport.
    fn fit_to(&mut self, element_id: &str);
}

/// One change notification emitted by the surface on an interaction tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceChange {
    pub elements: Vec<Element>,
    pub files: FileStore,
    pub selected_ids: BTreeSet<String>,
}

impl SurfaceChange {
    pub fn new(elements: Vec<Element>) -> Self {
        Self {
            elements,
            ..Self::default()
        }
    }

    pub fn with_selection<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selected_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_files(mut self, files: FileStore) -> Self {
        self.files = files;
        self
    }
}

/// Surface that only records what it was told; used for headless sessions and tests.
#[derive(Clone, Debug, Default)]
pub struct HeadlessSurface {
    pub elements: Vec<Element>,
    pub view: Option<ViewState>,
    pub fits: Vec<String>,
    pub replace_count: usize,
}

impl DrawingSurface for HeadlessSurface {
    fn replace_elements(&mut self, elements: &[Element]) {
        self.elements = elements.to_vec();
        self.replace_count += 1;
    }

    fn replace_view(&mut self, view: &ViewState) {
        self.view = Some(view.clone());
    }

    fn fit_to(&mut self, element_id: &str) {
        self.fits.push(element_id.to_owned());
    }
}
