use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::document::files::FileStore;
use crate::document::model::Document;
use crate::document::slide::{Slide, normalize_frame, referenced_files, used_fonts};
use crate::fonts::{FontFamilies, FontRegistry};
use crate::foundation::color::Rgba8;
use crate::foundation::core::DocumentSize;
use crate::foundation::error::{InkdeckError, InkdeckResult};

/// File extension used for saved decks and the drag-and-drop import trigger.
pub const SNAPSHOT_EXTENSION: &str = "inkdeck";

/// Self-contained `{ name, document, fonts }` snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub document: DocumentSnapshot,
    #[serde(default)]
    pub fonts: FontSnapshot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub background_color: String,
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub files: FileStore,
    pub document_size: DocumentSize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSnapshot {
    #[serde(default)]
    pub custom_fonts: FontFamilies,
}

/// What an import changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportSummary {
    pub slides: usize,
    pub files: usize,
    /// Font families newly added to the registry.
    pub fonts_added: usize,
}

impl Snapshot {
    /// Snapshot `doc` and `fonts`, dropping attachments no image references and font families no
    /// text element uses.
    pub fn export(doc: &Document, fonts: &FontRegistry) -> Self {
        let slides = doc.slides().to_vec();
        let files = referenced_files(doc.files(), &slides);
        let custom_fonts = fonts.referenced(&used_fonts(&slides));
        tracing::debug!(
            slides = slides.len(),
            files = files.len(),
            dropped_files = doc.files().len() - files.len(),
            fonts = custom_fonts.len(),
            "snapshot exported"
        );
        Self {
            name: doc.filename().to_owned(),
            document: DocumentSnapshot {
                background_color: doc.background_color().to_owned(),
                slides,
                files,
                document_size: doc.document_size(),
            },
            fonts: FontSnapshot { custom_fonts },
        }
    }

    /// Replace the document wholesale and merge missing font families. Everything is validated
    /// first; on error neither `doc` nor `fonts` is touched.
    pub fn import_into(
        &self,
        doc: &mut Document,
        fonts: &mut FontRegistry,
    ) -> InkdeckResult<ImportSummary> {
        let d = &self.document;
        let limits = doc.size_limits();
        let size = d.document_size;
        if size.clamped(limits.min, limits.max) != size {
            return Err(InkdeckError::validation(format!(
                "snapshot document size {}x{} is outside {}x{}..{}x{}",
                size.width,
                size.height,
                limits.min.width,
                limits.min.height,
                limits.max.width,
                limits.max.height
            )));
        }
        Rgba8::parse(&d.background_color)?;
        if d.slides.is_empty() {
            return Err(InkdeckError::validation("snapshot has no slides"));
        }

        let mut ids = BTreeSet::new();
        let mut slides = Vec::with_capacity(d.slides.len());
        for slide in &d.slides {
            if !ids.insert(slide.id) {
                return Err(InkdeckError::validation(format!(
                    "duplicate slide id {}",
                    slide.id
                )));
            }
            let normalized = Slide {
                id: slide.id,
                elements: normalize_frame(slide.elements.clone(), size),
            };
            normalized.validate()?;
            slides.push(normalized);
        }

        for (key, att) in &d.files {
            if *key != att.id {
                return Err(InkdeckError::validation(format!(
                    "attachment key '{key}' does not match its id '{}'",
                    att.id
                )));
            }
            att.decode_payload()?;
        }

        let mut merged = fonts.clone();
        let fonts_added = merged.merge_missing(&self.fonts.custom_fonts)?;

        let summary = ImportSummary {
            slides: slides.len(),
            files: d.files.len(),
            fonts_added,
        };
        doc.replace_contents(
            self.name.clone(),
            d.background_color.clone(),
            size,
            d.files.clone(),
            slides,
        );
        *fonts = merged;
        tracing::info!(
            name = %self.name,
            slides = summary.slides,
            fonts_added,
            "snapshot imported"
        );
        Ok(summary)
    }

    pub fn to_json(&self) -> InkdeckResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> InkdeckResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| InkdeckError::validation(format!("malformed snapshot: {e}")))
    }

    pub fn save(&self, path: &Path) -> InkdeckResult<()> {
        let json = self.to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create directory '{}'", parent.display()))?;
        }
        std::fs::write(path, json).with_context(|| format!("write '{}'", path.display()))?;
        Ok(())
    }

    pub fn load(path: &Path) -> InkdeckResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read snapshot '{}'", path.display()))?;
        Self::from_json(&raw)
    }
}

/// Whether `path` names a snapshot file (by extension, case-insensitive).
pub fn is_snapshot_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(SNAPSHOT_EXTENSION))
}
