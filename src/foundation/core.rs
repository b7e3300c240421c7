use serde::{Deserialize, Serialize};

use crate::foundation::error::{InkdeckError, InkdeckResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Shared width/height applied to every slide's frame boundary and to rendered output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentSize {
    /// Width in document pixels.
    pub width: u32,
    /// Height in document pixels.
    pub height: u32,
}

impl DocumentSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp each axis into `[min, max]`.
    pub fn clamped(self, min: DocumentSize, max: DocumentSize) -> Self {
        Self {
            width: self.width.clamp(min.width, max.width.max(min.width)),
            height: self.height.clamp(min.height, max.height.max(min.height)),
        }
    }

    /// Output pixel size after applying an export scale factor (never below 1x1).
    pub fn scaled(self, scale: f64) -> InkdeckResult<(u32, u32)> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(InkdeckError::validation("export scale must be finite and > 0"));
        }
        let w = (f64::from(self.width) * scale).round().max(1.0);
        let h = (f64::from(self.height) * scale).round().max(1.0);
        const MAX_DIM: f64 = 16_384.0;
        if w > MAX_DIM || h > MAX_DIM {
            return Err(InkdeckError::validation(format!(
                "scaled output {w}x{h} exceeds {MAX_DIM}x{MAX_DIM}"
            )));
        }
        Ok((w as u32, h as u32))
    }

    pub fn as_rect(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

impl Default for DocumentSize {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

/// Stable slide identity. Allocated from a monotonically increasing counter and never reused.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SlideId(pub u64);

impl std::fmt::Display for SlideId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "slide-{}", self.0)
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
