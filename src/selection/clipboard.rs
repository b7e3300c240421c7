use serde::{Deserialize, Serialize};

use crate::document::slide::Slide;
use crate::foundation::error::{InkdeckError, InkdeckResult};

/// Tag carried by the clipboard envelope.
pub const SLIDE_ENVELOPE_TYPE: &str = "SLIDE";

/// System clipboard seam. Implementations may fail; callers treat failures as non-fatal.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> anyhow::Result<()>;
    fn read_text(&mut self) -> anyhow::Result<String>;
}

/// Process-local clipboard.
#[derive(Debug, Default, Clone)]
pub struct MemoryClipboard {
    text: Option<String>,
}

impl MemoryClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.text = Some(text.to_owned());
        Ok(())
    }

    fn read_text(&mut self) -> anyhow::Result<String> {
        self.text
            .clone()
            .ok_or_else(|| anyhow::anyhow!("clipboard is empty"))
    }
}

#[derive(Serialize)]
struct EnvelopeOut<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: &'a Slide,
}

#[derive(Deserialize)]
struct EnvelopeIn {
    #[serde(rename = "type")]
    kind: Option<String>,
    data: Option<serde_json::Value>,
}

/// `{ "type": "SLIDE", "data": <slide> }`
pub fn encode_slide_envelope(slide: &Slide) -> InkdeckResult<String> {
    Ok(serde_json::to_string(&EnvelopeOut {
        kind: SLIDE_ENVELOPE_TYPE,
        data: slide,
    })?)
}

/// Parse and validate a clipboard envelope. Anything but a well-formed `SLIDE` envelope is a
/// validation error.
pub fn decode_slide_envelope(text: &str) -> InkdeckResult<Slide> {
    let env: EnvelopeIn = serde_json::from_str(text)
        .map_err(|e| InkdeckError::validation(format!("clipboard is not a slide envelope: {e}")))?;
    match env.kind.as_deref() {
        Some(SLIDE_ENVELOPE_TYPE) => {}
        Some(other) => {
            return Err(InkdeckError::validation(format!(
                "clipboard envelope has type \"{other}\", expected \"{SLIDE_ENVELOPE_TYPE}\""
            )));
        }
        None => return Err(InkdeckError::validation("clipboard envelope has no type tag")),
    }
    let data = env
        .data
        .ok_or_else(|| InkdeckError::validation("clipboard envelope has no data"))?;
    let slide: Slide = serde_json::from_value(data)
        .map_err(|e| InkdeckError::validation(format!("clipboard slide is malformed: {e}")))?;
    slide.validate()?;
    Ok(slide)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::element::Element;
    use crate::foundation::core::{DocumentSize, Rect, SlideId};

    fn slide() -> Slide {
        let mut s = Slide::new(SlideId(4), DocumentSize::new(320, 240));
        s.elements
            .push(Element::rectangle("r", Rect::new(1.0, 1.0, 9.0, 9.0)));
        s
    }

    #[test]
    fn envelope_has_slide_tag() {
        let text = encode_slide_envelope(&slide()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["type"], "SLIDE");
        assert_eq!(v["data"]["id"], 4);
        assert_eq!(decode_slide_envelope(&text).unwrap(), slide());
    }

    #[test]
    fn rejects_wrong_or_missing_tags() {
        let data = serde_json::to_value(slide()).unwrap();
        let wrong = serde_json::json!({"type": "ELEMENTS", "data": data}).to_string();
        assert!(decode_slide_envelope(&wrong).is_err());

        let missing = serde_json::json!({"data": data}).to_string();
        assert!(decode_slide_envelope(&missing).is_err());

        assert!(decode_slide_envelope("plain text").is_err());
        assert!(decode_slide_envelope(r#"{"type":"SLIDE"}"#).is_err());
    }

    #[test]
    fn rejects_slides_without_frame() {
        let text = serde_json::json!({
            "type": "SLIDE",
            "data": {"id": 1, "elements": []}
        })
        .to_string();
        assert!(decode_slide_envelope(&text).is_err());
    }

    #[test]
    fn memory_clipboard_round_trips_text() {
        let mut cb = MemoryClipboard::new();
        assert!(cb.read_text().is_err());
        cb.write_text("hi").unwrap();
        assert_eq!(cb.read_text().unwrap(), "hi");
    }
}
