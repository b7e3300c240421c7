use std::path::Path;

use crate::config::EditorConfig;
use crate::document::element::Element;
use crate::document::model::Document;
use crate::encode::sink::FrameSink;
use crate::export::job::{ExportJob, ExportOptions, ExportReport, Exporter};
use crate::export::progress::ProgressObserver;
use crate::fonts::FontRegistry;
use crate::foundation::error::{InkdeckError, InkdeckResult};
use crate::persist::remote::{SnippetSource, load_remote};
use crate::persist::snapshot::{ImportSummary, Snapshot, is_snapshot_path};
use crate::scene::surface::{DrawingSurface, SurfaceChange};
use crate::scene::synchronizer::{PasteOutcome, SceneSynchronizer, SyncOutcome};
use crate::selection::clipboard::Clipboard;
use crate::selection::controller::SelectionController;
use crate::session::command::Command;

/// One editing session. Owns every service; nothing is global.
pub struct Editor<S: DrawingSurface, C: Clipboard> {
    config: EditorConfig,
    doc: Document,
    fonts: FontRegistry,
    selection: SelectionController,
    sync: SceneSynchronizer,
    surface: S,
    clipboard: C,
    exporter: Exporter,
}

impl<S: DrawingSurface, C: Clipboard> Editor<S, C> {
    /// Create the session's single default document and make its slide live.
    pub fn new(config: EditorConfig, surface: S, clipboard: C) -> Self {
        let doc = Document::from_config(&config);
        let mut editor = Self {
            config,
            doc,
            fonts: FontRegistry::new(),
            selection: SelectionController::new(),
            sync: SceneSynchronizer::new(),
            surface,
            clipboard,
            exporter: Exporter::new(),
        };
        editor.sync.activate(&editor.doc, &mut editor.surface);
        editor
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn fonts(&self) -> &FontRegistry {
        &self.fonts
    }

    pub fn fonts_mut(&mut self) -> &mut FontRegistry {
        &mut self.fonts
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    pub fn synchronizer(&self) -> &SceneSynchronizer {
        &self.sync
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn clipboard(&self) -> &C {
        &self.clipboard
    }

    pub fn exporter(&self) -> &Exporter {
        &self.exporter
    }

    /// Run one command. Interactive failures are logged and reported as `Ok(false)`; only
    /// persistence errors propagate.
    pub fn dispatch(&mut self, cmd: Command) -> InkdeckResult<bool> {
        tracing::debug!(?cmd, "dispatch");
        let moves_current = cmd.moves_current();
        let result = self.apply(cmd);
        if moves_current {
            self.sync.ensure_live(&self.doc, &mut self.surface);
        }
        result
    }

    fn apply(&mut self, cmd: Command) -> InkdeckResult<bool> {
        let doc = &mut self.doc;
        let interactive = match cmd {
            Command::Move(dir) => self.selection.navigate(doc, dir),
            Command::Extend(dir) => self.selection.extend(doc, dir),
            Command::Click { index, extend } => self.selection.click(doc, index, extend),
            Command::AddSlide => {
                self.selection.clear();
                doc.add_slide();
                Ok(true)
            }
            Command::Delete => self.selection.delete_current(doc),
            Command::Duplicate => self.selection.duplicate(doc).map(|_| true),
            Command::Copy => Ok(self.selection.copy(doc, &mut self.clipboard)),
            Command::Paste => Ok(self
                .selection
                .paste(doc, &mut self.clipboard)
                .is_some()),
            Command::DragStart(index) => {
                self.selection.drag_start(index);
                Ok(false)
            }
            Command::Drop(target) => self.selection.drop_at(doc, target),
            Command::CancelDrag => {
                self.selection.cancel_drag();
                Ok(false)
            }
            Command::Resize(size) => {
                let before = doc.document_size();
                let applied = self.sync.set_document_size(doc, &mut self.surface, size);
                Ok(applied != before)
            }
            Command::SetBackground(color) => {
                self.sync
                    .set_background_color(doc, &mut self.surface, &color)
            }
            Command::Save(path) => return self.save(&path).map(|_| true),
            Command::Open(path) => return self.open(&path).map(|_| true),
        };
        match interactive {
            Ok(changed) => Ok(changed),
            Err(e) => {
                tracing::warn!(error = %e, "command ignored");
                Ok(false)
            }
        }
    }

    /// Forward a surface change notification.
    pub fn on_surface_change(&mut self, change: SurfaceChange) -> InkdeckResult<SyncOutcome> {
        self.sync.on_change(&mut self.doc, &mut self.surface, change)
    }

    pub fn on_pointer_down(&mut self) {
        self.sync.on_pointer_down();
    }

    pub fn on_pointer_up(&mut self) -> InkdeckResult<bool> {
        self.sync.on_pointer_up(&mut self.doc)
    }

    /// Called after the surface paints; applies deferred fits and finished probes.
    pub fn on_paint(&mut self) {
        self.sync.on_paint(&mut self.surface);
        self.sync.poll_probes(&mut self.doc, &mut self.surface);
    }

    pub fn wait_probes(&mut self) -> usize {
        self.sync.wait_probes(&mut self.doc, &mut self.surface)
    }

    pub fn paste_external(&mut self, elements: Vec<Element>) -> InkdeckResult<PasteOutcome> {
        self.sync
            .paste_external(&mut self.doc, &mut self.surface, elements)
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::export(&self.doc, &self.fonts)
    }

    pub fn save(&self, path: &Path) -> InkdeckResult<()> {
        self.snapshot().save(path)?;
        tracing::info!(path = %path.display(), "saved snapshot");
        Ok(())
    }

    pub fn import(&mut self, snapshot: &Snapshot) -> InkdeckResult<ImportSummary> {
        let summary = snapshot.import_into(&mut self.doc, &mut self.fonts)?;
        self.selection.clear();
        self.sync.activate(&self.doc, &mut self.surface);
        Ok(summary)
    }

    /// Import a snapshot file. Files without the snapshot extension are refused.
    pub fn open(&mut self, path: &Path) -> InkdeckResult<ImportSummary> {
        if !is_snapshot_path(path) {
            return Err(InkdeckError::validation(format!(
                "'{}' is not a snapshot file",
                path.display()
            )));
        }
        let snap = Snapshot::load(path)?;
        self.import(&snap)
    }

    /// Fetch a remote snippet and import it. `name` picks among several candidates.
    pub fn open_remote(
        &mut self,
        source: &dyn SnippetSource,
        reference: &str,
        name: Option<&str>,
    ) -> InkdeckResult<ImportSummary> {
        let snap = load_remote(source, reference)?.choose(name)?;
        self.import(&snap)
    }

    /// Export a point-in-time copy of the deck into `sink`.
    pub fn export(
        &self,
        sink: &mut dyn FrameSink,
        opts: ExportOptions,
        observer: Option<&mut dyn ProgressObserver>,
    ) -> InkdeckResult<ExportReport> {
        let job = ExportJob::from_document(&self.doc, &self.fonts, opts);
        self.exporter.run(job, sink, observer)
    }
}
