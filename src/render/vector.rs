use kurbo::{ParamCurveArclen, Shape};

use crate::document::element::{Element, ElementKind};
use crate::document::files::FileId;
use crate::document::slide::Slide;
use crate::fonts::FontId;
use crate::foundation::color::Rgba8;
use crate::foundation::core::{Affine, BezPath, DocumentSize, Point, Rect, Vec2};
use crate::foundation::error::{InkdeckError, InkdeckResult};

const PATH_TOLERANCE: f64 = 0.1;
const ARCLEN_ACCURACY: f64 = 1e-3;
const ARROWHEAD_LEN: f64 = 16.0;
const ARROWHEAD_ANGLE: f64 = 0.45;

#[derive(Clone, Debug, PartialEq)]
pub enum VectorShape {
    Path(BezPath),
    Text {
        lines: Vec<String>,
        origin: Point,
        font: FontId,
        font_size: f64,
    },
    Image {
        file_id: FileId,
        rect: Rect,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct VectorItem {
    pub element_id: String,
    pub shape: VectorShape,
    pub transform: Affine,
    pub stroke: Option<(Rgba8, f64)>,
    pub fill: Option<Rgba8>,
    /// 0.0..=1.0
    pub opacity: f64,
    /// Total arc length of the outline; 0 for text and images.
    pub stroke_length: f64,
}

/// Ordered, export-ready drawing of one slide.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorScene {
    pub size: DocumentSize,
    /// Document-space rectangle that maps onto the output surface.
    pub viewport: Rect,
    pub background: Rgba8,
    pub items: Vec<VectorItem>,
}

impl VectorScene {
    pub fn total_stroke_length(&self) -> f64 {
        self.items.iter().map(|i| i.stroke_length).sum()
    }
}

/// Copy of `elements` with the frame boundary's stroke made invisible.
pub fn export_elements(elements: &[Element]) -> Vec<Element> {
    let mut out = elements.to_vec();
    for el in out.iter_mut().filter(|e| e.is_frame()) {
        el.stroke_color = "transparent".to_owned();
        el.stroke_width = 0.0;
    }
    out
}

/// Vectorize one slide for export. `slide_index` is only used for error reporting.
pub fn vectorize_slide(
    slide: &Slide,
    slide_index: usize,
    size: DocumentSize,
    background: &str,
) -> InkdeckResult<VectorScene> {
    let background = Rgba8::parse(background)
        .map_err(|e| InkdeckError::render(slide_index, format!("background: {e}")))?;
    let elements = export_elements(&slide.elements);
    let viewport = elements
        .iter()
        .find(|e| e.is_frame())
        .map(|f| Rect::new(f.x, f.y, f.x + f64::from(size.width), f.y + f64::from(size.height)))
        .unwrap_or_else(|| size.as_rect());

    let mut items = Vec::with_capacity(elements.len());
    for el in &elements {
        el.validate()
            .map_err(|e| InkdeckError::render(slide_index, e.to_string()))?;
        if let Some(item) = vectorize_element(el) {
            items.push(item);
        }
    }

    Ok(VectorScene {
        size,
        viewport,
        background,
        items,
    })
}

fn paint(color: &str) -> Option<Rgba8> {
    Rgba8::parse(color).ok().filter(|c| !c.is_transparent())
}

fn vectorize_element(el: &Element) -> Option<VectorItem> {
    let bounds = el.bounds();
    let stroke = paint(&el.stroke_color)
        .filter(|_| el.stroke_width > 0.0)
        .map(|c| (c, el.stroke_width));
    let fill = paint(&el.background_color);
    let origin = Vec2::new(el.x, el.y);

    let shape = match &el.kind {
        ElementKind::Frame => {
            if stroke.is_none() && fill.is_none() {
                return None;
            }
            VectorShape::Path(bounds.to_path(PATH_TOLERANCE))
        }
        ElementKind::Rectangle => VectorShape::Path(bounds.to_path(PATH_TOLERANCE)),
        ElementKind::Ellipse => {
            VectorShape::Path(kurbo::Ellipse::from_rect(bounds).to_path(PATH_TOLERANCE))
        }
        ElementKind::Diamond => VectorShape::Path(diamond(bounds)),
        ElementKind::Line { points } | ElementKind::Freedraw { points } => {
            VectorShape::Path(polyline(points, origin))
        }
        ElementKind::Arrow { points } => {
            let mut path = polyline(points, origin);
            append_arrowhead(&mut path, points, origin);
            VectorShape::Path(path)
        }
        ElementKind::Text {
            text,
            font_family,
            font_size,
        } => VectorShape::Text {
            lines: text.lines().map(str::to_owned).collect(),
            origin: Point::new(el.x, el.y),
            font: *font_family,
            font_size: *font_size,
        },
        ElementKind::Image { file_id } => VectorShape::Image {
            file_id: file_id.clone()?,
            rect: bounds,
        },
    };

    let stroke_length = match &shape {
        VectorShape::Path(path) if stroke.is_some() => arc_length(path),
        _ => 0.0,
    };
    let transform = if el.angle == 0.0 {
        Affine::IDENTITY
    } else {
        Affine::rotate_about(el.angle, bounds.center())
    };

    Some(VectorItem {
        element_id: el.id.clone(),
        shape,
        transform,
        stroke,
        fill,
        opacity: (el.opacity / 100.0).clamp(0.0, 1.0),
        stroke_length,
    })
}

fn diamond(r: Rect) -> BezPath {
    let c = r.center();
    let mut p = BezPath::new();
    p.move_to((c.x, r.y0));
    p.line_to((r.x1, c.y));
    p.line_to((c.x, r.y1));
    p.line_to((r.x0, c.y));
    p.close_path();
    p
}

fn polyline(points: &[[f64; 2]], origin: Vec2) -> BezPath {
    let mut p = BezPath::new();
    for (i, [x, y]) in points.iter().enumerate() {
        let pt = Point::new(*x, *y) + origin;
        if i == 0 {
            p.move_to(pt);
        } else {
            p.line_to(pt);
        }
    }
    p
}

fn append_arrowhead(path: &mut BezPath, points: &[[f64; 2]], origin: Vec2) {
    let [.., a, b] = points else {
        return;
    };
    let tip = Point::new(b[0], b[1]) + origin;
    let from = Point::new(a[0], a[1]) + origin;
    let dir = tip - from;
    if dir.hypot() < f64::EPSILON {
        return;
    }
    let back = -dir.normalize() * ARROWHEAD_LEN;
    for angle in [ARROWHEAD_ANGLE, -ARROWHEAD_ANGLE] {
        let wing = Affine::rotate(angle) * Point::new(back.x, back.y);
        path.move_to(tip + wing.to_vec2());
        path.line_to(tip);
    }
}

fn arc_length(path: &BezPath) -> f64 {
    path.segments().map(|s| s.arclen(ARCLEN_ACCURACY)).sum()
}
