//! Editor and export defaults.
//!
//! Every field has a default, so an empty JSON object (or no config file at all) is a valid
//! configuration.

use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::document::model::SizeLimits;
use crate::foundation::color::Rgba8;
use crate::foundation::core::DocumentSize;
use crate::foundation::error::{InkdeckError, InkdeckResult};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct EditorConfig {
    /// Size of the first slide of a new document.
    pub document_size: DocumentSize,
    /// Lower bound for `set_document_size`.
    pub min_document_size: DocumentSize,
    /// Upper bound for `set_document_size`, as a multiple of `document_size`.
    pub max_size_multiple: u32,
    pub background_color: String,
    pub export: ExportDefaults,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            document_size: DocumentSize::default(),
            min_document_size: DocumentSize::new(100, 100),
            max_size_multiple: 4,
            background_color: "#ffffff".to_owned(),
            export: ExportDefaults::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ExportDefaults {
    /// Inter-frame delay for animated exports, milliseconds.
    pub frame_delay_ms: u32,
    /// Video surface frame rate.
    pub video_fps: u32,
    /// Extra hold on the last video frame so the recorder captures it.
    pub video_flush_ms: u32,
    /// Default raster scale factor.
    pub scale: f64,
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            frame_delay_ms: 1000,
            video_fps: 30,
            video_flush_ms: 100,
            scale: 1.0,
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> InkdeckResult<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> InkdeckResult<()> {
        if self.document_size.width == 0 || self.document_size.height == 0 {
            return Err(InkdeckError::validation("documentSize must be non-zero"));
        }
        if self.min_document_size.width == 0 || self.min_document_size.height == 0 {
            return Err(InkdeckError::validation("minDocumentSize must be non-zero"));
        }
        if self.max_size_multiple == 0 {
            return Err(InkdeckError::validation("maxSizeMultiple must be >= 1"));
        }
        Rgba8::parse(&self.background_color)?;
        if self.export.video_fps == 0 {
            return Err(InkdeckError::validation("export.videoFps must be >= 1"));
        }
        if self.export.frame_delay_ms == 0 {
            return Err(InkdeckError::validation("export.frameDelayMs must be >= 1"));
        }
        if !(self.export.scale.is_finite() && self.export.scale > 0.0) {
            return Err(InkdeckError::validation("export.scale must be > 0"));
        }
        Ok(())
    }

    pub fn size_limits(&self) -> SizeLimits {
        SizeLimits::new(
            self.document_size,
            self.min_document_size,
            self.max_size_multiple,
        )
    }
}
