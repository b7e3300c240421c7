use crate::foundation::error::{InkdeckError, InkdeckResult};

/// Straight-alpha RGBA8 color parsed from the CSS-ish strings stored on elements and the document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const TRANSPARENT: Rgba8 = Rgba8::new(0, 0, 0, 0);
    pub const WHITE: Rgba8 = Rgba8::new(255, 255, 255, 255);
    pub const BLACK: Rgba8 = Rgba8::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `transparent`, `white` or `black`.
    pub fn parse(s: &str) -> InkdeckResult<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "transparent" | "none" => return Ok(Self::TRANSPARENT),
            "white" => return Ok(Self::WHITE),
            "black" => return Ok(Self::BLACK),
            _ => {}
        }

        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| InkdeckError::validation(format!("unsupported color \"{s}\"")))?;

        fn hex_byte(pair: &str) -> InkdeckResult<u8> {
            u8::from_str_radix(pair, 16)
                .map_err(|_| InkdeckError::validation(format!("invalid hex byte \"{pair}\"")))
        }
        fn hex_nibble(c: &str) -> InkdeckResult<u8> {
            let v = hex_byte(c)?;
            Ok(v * 17)
        }

        if !hex.is_ascii() {
            return Err(InkdeckError::validation(format!("unsupported color \"{s}\"")));
        }

        match hex.len() {
            3 => Ok(Self::new(
                hex_nibble(&hex[0..1])?,
                hex_nibble(&hex[1..2])?,
                hex_nibble(&hex[2..3])?,
                255,
            )),
            6 => Ok(Self::new(
                hex_byte(&hex[0..2])?,
                hex_byte(&hex[2..4])?,
                hex_byte(&hex[4..6])?,
                255,
            )),
            8 => Ok(Self::new(
                hex_byte(&hex[0..2])?,
                hex_byte(&hex[2..4])?,
                hex_byte(&hex[4..6])?,
                hex_byte(&hex[6..8])?,
            )),
            _ => Err(InkdeckError::validation(
                "hex color must be #RGB, #RRGGBB or #RRGGBBAA",
            )),
        }
    }

    /// Parse, falling back to `fallback` for unparseable input.
    pub fn parse_or(s: &str, fallback: Rgba8) -> Self {
        Self::parse(s).unwrap_or(fallback)
    }

    pub fn is_transparent(self) -> bool {
        self.a == 0
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// `#rrggbb` form used in generated SVG (alpha goes into a separate opacity attribute).
    pub fn to_hex_rgb(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn alpha_f64(self) -> f64 {
        f64::from(self.a) / 255.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(Rgba8::parse("#ff0000").unwrap(), Rgba8::new(255, 0, 0, 255));
        assert_eq!(Rgba8::parse("#0000ff80").unwrap(), Rgba8::new(0, 0, 255, 128));
        assert_eq!(Rgba8::parse("#fff").unwrap(), Rgba8::WHITE);
    }

    #[test]
    fn parses_keywords() {
        assert!(Rgba8::parse("transparent").unwrap().is_transparent());
        assert_eq!(Rgba8::parse(" Black ").unwrap(), Rgba8::BLACK);
    }

    #[test]
    fn rejects_garbage() {
        assert!(Rgba8::parse("red-ish").is_err());
        assert!(Rgba8::parse("#12345").is_err());
        assert!(Rgba8::parse("#gg0000").is_err());
        assert_eq!(Rgba8::parse_or("nope", Rgba8::BLACK), Rgba8::BLACK);
    }

    #[test]
    fn hex_rgb_drops_alpha() {
        assert_eq!(Rgba8::new(1, 2, 255, 3).to_hex_rgb(), "#0102ff");
    }
}
