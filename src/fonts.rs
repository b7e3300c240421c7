//! Custom font registry.
//!
//! Families are keyed by name and resolve to a [`FontId`] derived from an xxh3 hash of the
//! trimmed family string, so the same family gets the same id regardless of registration order
//! or document. Distinct families that hash to the same id are rejected at registration rather
//! than silently aliased.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::foundation::error::{InkdeckError, InkdeckResult};

/// Numeric font family id referenced by text elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FontId(pub u64);

impl FontId {
    pub const HAND_DRAWN: FontId = FontId(1);
    pub const SANS: FontId = FontId(2);
    pub const MONO: FontId = FontId(3);

    pub fn for_family(family: &str) -> FontId {
        FontId(xxhash_rust::xxh3::xxh3_64(family.trim().as_bytes()))
    }

    pub fn is_builtin(self) -> bool {
        (1..=3).contains(&self.0)
    }

    /// CSS font stack for the built-in families.
    pub fn builtin_stack(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("Virgil, 'Segoe Print', 'Comic Sans MS', cursive"),
            2 => Some("Helvetica, Arial, sans-serif"),
            3 => Some("'Cascadia Code', 'DejaVu Sans Mono', monospace"),
            _ => None,
        }
    }
}

/// One `@font-face` descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontFace {
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_weight")]
    pub weight: String,
    /// `url(...)` target or `data:` URL of the font file.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode_range: Option<String>,
}

fn default_style() -> String {
    "normal".to_owned()
}

fn default_weight() -> String {
    "400".to_owned()
}

impl FontFace {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            style: default_style(),
            weight: default_weight(),
            source: source.into(),
            unicode_range: None,
        }
    }
}

/// Family name -> ordered face list, as persisted in snapshots.
pub type FontFamilies = BTreeMap<String, Vec<FontFace>>;

/// Parses `@font-face` rules out of arbitrary style-sheet text.
pub trait FontFaceParser {
    /// Returns `(family, face)` pairs in source order.
    fn parse(&self, stylesheet: &str) -> anyhow::Result<Vec<(String, FontFace)>>;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FontRegistry {
    families: FontFamilies,
    ids: BTreeMap<FontId, String>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn families(&self) -> &FontFamilies {
        &self.families
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    pub fn faces(&self, family: &str) -> Option<&[FontFace]> {
        self.families.get(family.trim()).map(Vec::as_slice)
    }

    pub fn resolve(&self, id: FontId) -> Option<&str> {
        self.ids.get(&id).map(String::as_str)
    }

    pub fn id_of(&self, family: &str) -> Option<FontId> {
        let id = FontId::for_family(family);
        self.ids.contains_key(&id).then_some(id)
    }

    fn check_id(&self, family: &str) -> InkdeckResult<FontId> {
        if family.is_empty() {
            return Err(InkdeckError::validation("font family name must be non-empty"));
        }
        let id = FontId::for_family(family);
        if id.is_builtin() {
            return Err(InkdeckError::validation(format!(
                "font family \"{family}\" hashes onto a built-in font id"
            )));
        }
        match self.ids.get(&id) {
            Some(existing) if existing != family => Err(InkdeckError::validation(format!(
                "font id collision between \"{existing}\" and \"{family}\""
            ))),
            _ => Ok(id),
        }
    }

    /// Append a face to `family`, creating the family if needed.
    pub fn add_face(&mut self, family: &str, face: FontFace) -> InkdeckResult<FontId> {
        let family = family.trim();
        let id = self.check_id(family)?;
        self.ids.insert(id, family.to_owned());
        self.families.entry(family.to_owned()).or_default().push(face);
        Ok(id)
    }

    /// Register the faces of a style sheet through an external `@font-face` parser.
    pub fn import_stylesheet(
        &mut self,
        parser: &dyn FontFaceParser,
        stylesheet: &str,
    ) -> InkdeckResult<Vec<FontId>> {
        let parsed = parser
            .parse(stylesheet)
            .map_err(|e| InkdeckError::validation(format!("font stylesheet: {e}")))?;
        let mut out = Vec::new();
        for (family, face) in parsed {
            let id = self.add_face(&family, face)?;
            if !out.contains(&id) {
                out.push(id);
            }
        }
        Ok(out)
    }

    /// Add every family in `incoming` that is not registered yet. Existing families are never
    /// overwritten. All-or-nothing: a collision aborts before anything is added.
    pub fn merge_missing(&mut self, incoming: &FontFamilies) -> InkdeckResult<usize> {
        let mut staged = BTreeMap::<FontId, &str>::new();
        for family in incoming.keys() {
            let family = family.trim();
            if self.families.contains_key(family) {
                continue;
            }
            let id = self.check_id(family)?;
            if let Some(other) = staged.insert(id, family)
                && other != family
            {
                return Err(InkdeckError::validation(format!(
                    "font id collision between \"{other}\" and \"{family}\""
                )));
            }
        }

        let mut added = 0usize;
        for (family, faces) in incoming {
            let family = family.trim();
            if self.families.contains_key(family) {
                continue;
            }
            self.ids.insert(FontId::for_family(family), family.to_owned());
            self.families.insert(family.to_owned(), faces.clone());
            added += 1;
        }
        Ok(added)
    }

    /// Families whose id is in `used`.
    pub fn referenced(&self, used: &BTreeSet<FontId>) -> FontFamilies {
        self.families
            .iter()
            .filter(|(family, _)| used.contains(&FontId::for_family(family)))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Registry restricted to the families whose id is in `used`.
    pub fn subset(&self, used: &BTreeSet<FontId>) -> FontRegistry {
        let ids: BTreeMap<FontId, String> = self
            .ids
            .iter()
            .filter(|(id, _)| used.contains(id))
            .map(|(id, family)| (*id, family.clone()))
            .collect();
        let families = ids
            .values()
            .filter_map(|family| Some((family.clone(), self.families.get(family)?.clone())))
            .collect();
        FontRegistry { families, ids }
    }
}
