use serde::{Deserialize, Serialize};

use crate::document::files::FileId;
use crate::fonts::FontId;
use crate::foundation::core::{DocumentSize, Point, Rect};
use crate::foundation::error::{InkdeckError, InkdeckResult};

/// Reserved id of the frame-boundary element every slide carries.
pub const FRAME_ID: &str = "frame";

const FRAME_STROKE: &str = "#bbbbbb";

/// A drawable element on a slide.
///
/// The common geometry/style fields live on the struct; the kind-specific payload is the
/// internally tagged [`ElementKind`] (`"type"` in JSON).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Element {
    pub id: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    /// Rotation around the element center, radians.
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f64,
    /// 0..=100
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub locked: bool,
    #[serde(flatten)]
    pub kind: ElementKind,
}

/// Kind-specific element payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Diamond,
    /// Polyline; points are relative to `(x, y)`.
    Line { points: Vec<[f64; 2]> },
    /// Polyline with an arrowhead at the last point.
    Arrow { points: Vec<[f64; 2]> },
    /// Freehand stroke; points are relative to `(x, y)`.
    Freedraw { points: Vec<[f64; 2]> },
    #[serde(rename_all = "camelCase")]
    Text {
        text: String,
        font_family: FontId,
        #[serde(default = "default_font_size")]
        font_size: f64,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        #[serde(default)]
        file_id: Option<FileId>,
    },
    /// The slide's crop/viewport boundary. Never exported as visible ink.
    Frame,
}

fn default_stroke_color() -> String {
    "#1e1e1e".to_owned()
}

fn default_background_color() -> String {
    "transparent".to_owned()
}

fn default_stroke_width() -> f64 {
    2.0
}

fn default_opacity() -> f64 {
    100.0
}

fn default_font_size() -> f64 {
    20.0
}

impl Element {
    fn with_kind(id: impl Into<String>, bounds: Rect, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            x: bounds.x0,
            y: bounds.y0,
            width: bounds.width(),
            height: bounds.height(),
            angle: 0.0,
            stroke_color: default_stroke_color(),
            background_color: default_background_color(),
            stroke_width: default_stroke_width(),
            opacity: default_opacity(),
            locked: false,
            kind,
        }
    }

    /// Fresh frame-boundary element sized to `size`.
    pub fn frame(size: DocumentSize) -> Self {
        let mut el = Self::with_kind(FRAME_ID, size.as_rect(), ElementKind::Frame);
        el.stroke_color = FRAME_STROKE.to_owned();
        el.stroke_width = 1.0;
        el.locked = true;
        el
    }

    pub fn rectangle(id: impl Into<String>, bounds: Rect) -> Self {
        Self::with_kind(id, bounds, ElementKind::Rectangle)
    }

    pub fn ellipse(id: impl Into<String>, bounds: Rect) -> Self {
        Self::with_kind(id, bounds, ElementKind::Ellipse)
    }

    pub fn freedraw(id: impl Into<String>, x: f64, y: f64, points: Vec<[f64; 2]>) -> Self {
        let bounds = points_bounds(&points).with_origin(Point::new(x, y));
        Self::with_kind(id, bounds, ElementKind::Freedraw { points })
    }

    pub fn arrow(id: impl Into<String>, x: f64, y: f64, points: Vec<[f64; 2]>) -> Self {
        let bounds = points_bounds(&points).with_origin(Point::new(x, y));
        Self::with_kind(id, bounds, ElementKind::Arrow { points })
    }

    pub fn text(id: impl Into<String>, bounds: Rect, text: impl Into<String>, font: FontId) -> Self {
        Self::with_kind(
            id,
            bounds,
            ElementKind::Text {
                text: text.into(),
                font_family: font,
                font_size: default_font_size(),
            },
        )
    }

    /// Image placeholder; `file_id` is `None` until an attachment is bound to it.
    pub fn image(id: impl Into<String>, bounds: Rect, file_id: Option<FileId>) -> Self {
        Self::with_kind(id, bounds, ElementKind::Image { file_id })
    }

    pub fn is_frame(&self) -> bool {
        matches!(self.kind, ElementKind::Frame)
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ElementKind::Rectangle => "rectangle",
            ElementKind::Ellipse => "ellipse",
            ElementKind::Diamond => "diamond",
            ElementKind::Line { .. } => "line",
            ElementKind::Arrow { .. } => "arrow",
            ElementKind::Freedraw { .. } => "freedraw",
            ElementKind::Text { .. } => "text",
            ElementKind::Image { .. } => "image",
            ElementKind::Frame => "frame",
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Attachment referenced by this element, if it is a bound image.
    pub fn file_ref(&self) -> Option<&FileId> {
        match &self.kind {
            ElementKind::Image { file_id } => file_id.as_ref(),
            _ => None,
        }
    }

    /// Font referenced by this element, if it is text.
    pub fn font_ref(&self) -> Option<FontId> {
        match &self.kind {
            ElementKind::Text { font_family, .. } => Some(*font_family),
            _ => None,
        }
    }

    /// Boundary validation applied on import, paste and surface notifications.
    pub fn validate(&self) -> InkdeckResult<()> {
        if self.id.trim().is_empty() {
            return Err(InkdeckError::validation("element id must be non-empty"));
        }
        if (self.id == FRAME_ID) != self.is_frame() {
            return Err(InkdeckError::validation(format!(
                "reserved id \"{FRAME_ID}\" must be used by exactly the frame boundary (got {} \"{}\")",
                self.kind_name(),
                self.id
            )));
        }
        for (name, v) in [
            ("x", self.x),
            ("y", self.y),
            ("width", self.width),
            ("height", self.height),
            ("angle", self.angle),
            ("strokeWidth", self.stroke_width),
        ] {
            if !v.is_finite() {
                return Err(InkdeckError::validation(format!(
                    "element \"{}\" has non-finite {name}",
                    self.id
                )));
            }
        }
        if self.width < 0.0 || self.height < 0.0 || self.stroke_width < 0.0 {
            return Err(InkdeckError::validation(format!(
                "element \"{}\" has negative size or stroke width",
                self.id
            )));
        }
        if !(0.0..=100.0).contains(&self.opacity) {
            return Err(InkdeckError::validation(format!(
                "element \"{}\" opacity must be within 0..=100",
                self.id
            )));
        }
        match &self.kind {
            ElementKind::Line { points }
            | ElementKind::Arrow { points }
            | ElementKind::Freedraw { points } => {
                if points.iter().flatten().any(|v| !v.is_finite()) {
                    return Err(InkdeckError::validation(format!(
                        "element \"{}\" has non-finite points",
                        self.id
                    )));
                }
            }
            ElementKind::Text { font_size, .. } if !(font_size.is_finite() && *font_size > 0.0) => {
                return Err(InkdeckError::validation(format!(
                    "text element \"{}\" font size must be > 0",
                    self.id
                )));
            }
            _ => {}
        }
        Ok(())
    }
}

fn points_bounds(points: &[[f64; 2]]) -> Rect {
    let mut it = points.iter();
    let Some(first) = it.next() else {
        return Rect::ZERO;
    };
    let mut r = Rect::new(first[0], first[1], first[0], first[1]);
    for p in it {
        r = r.union_pt(Point::new(p[0], p[1]));
    }
    // Points are relative to the element origin; keep the origin at (0, 0).
    Rect::new(0.0, 0.0, r.x1.max(0.0), r.y1.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_is_locked_and_sized() {
        let f = Element::frame(DocumentSize::new(640, 480));
        assert_eq!(f.id, FRAME_ID);
        assert!(f.is_frame());
        assert!(f.locked);
        assert_eq!((f.width, f.height), (640.0, 480.0));
        f.validate().unwrap();
    }

    #[test]
    fn json_is_tagged_by_type() {
        let el = Element::rectangle("r1", Rect::new(1.0, 2.0, 11.0, 22.0));
        let v = serde_json::to_value(&el).unwrap();
        assert_eq!(v["type"], "rectangle");
        assert_eq!(v["strokeColor"], "#1e1e1e");
        let back: Element = serde_json::from_value(v).unwrap();
        assert_eq!(back, el);
    }

    #[test]
    fn deserializes_sparse_text_element() {
        let el: Element = serde_json::from_value(json!({
            "type": "text",
            "id": "t1",
            "x": 5,
            "y": 6,
            "text": "hello",
            "fontFamily": 2
        }))
        .unwrap();
        assert_eq!(el.font_ref(), Some(FontId(2)));
        assert_eq!(el.opacity, 100.0);
        match el.kind {
            ElementKind::Text { font_size, .. } => assert_eq!(font_size, 20.0),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let res: Result<Element, _> = serde_json::from_value(json!({"type": "blob", "id": "b"}));
        assert!(res.is_err());
    }

    #[test]
    fn validate_rejects_reserved_id_misuse() {
        let el = Element::rectangle(FRAME_ID, Rect::new(0.0, 0.0, 1.0, 1.0));
        assert!(el.validate().is_err());

        let mut frame = Element::frame(DocumentSize::default());
        frame.id = "not-frame".to_owned();
        assert!(frame.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_geometry() {
        let mut el = Element::rectangle("r", Rect::new(0.0, 0.0, 1.0, 1.0));
        el.width = f64::NAN;
        assert!(el.validate().is_err());

        let mut el = Element::rectangle("r", Rect::new(0.0, 0.0, 1.0, 1.0));
        el.opacity = 140.0;
        assert!(el.validate().is_err());
    }

    #[test]
    fn freedraw_bounds_cover_points() {
        let el = Element::freedraw("f", 10.0, 20.0, vec![[0.0, 0.0], [30.0, 5.0], [12.0, 40.0]]);
        assert_eq!((el.x, el.y), (10.0, 20.0));
        assert_eq!((el.width, el.height), (30.0, 40.0));
    }
}
