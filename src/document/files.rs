use std::collections::BTreeMap;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::foundation::error::{InkdeckError, InkdeckResult};

/// Opaque attachment key referenced by image elements.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attachment map keyed by id. May hold entries no element references; those are only
/// collected when a snapshot is exported.
pub type FileStore = BTreeMap<FileId, FileAttachment>;

/// Binary attachment (e.g. an embedded picture) stored as a base64 `data:` URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub id: FileId,
    pub mime_type: String,
    #[serde(rename = "dataURL")]
    pub data_url: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub created: u64,
}

impl FileAttachment {
    pub fn from_bytes(
        id: FileId,
        mime_type: impl Into<String>,
        bytes: &[u8],
        created: u64,
    ) -> Self {
        let mime_type = mime_type.into();
        let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self {
            id,
            data_url: format!("data:{mime_type};base64,{b64}"),
            mime_type,
            created,
        }
    }

    /// Decode the payload bytes out of the data URL.
    pub fn decode_payload(&self) -> InkdeckResult<Vec<u8>> {
        decode_data_url(&self.data_url)
            .map_err(|e| InkdeckError::validation(format!("attachment '{}': {e}", self.id)))
    }
}

/// Decode a `data:<mime>;base64,<payload>` URL.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, String> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| "not a data: URL".to_owned())?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| "data URL is missing ','".to_owned())?;
    if !meta.ends_with(";base64") {
        return Err("only base64 data URLs are supported".to_owned());
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("invalid base64 payload: {e}"))
}

/// Newest attachment by creation timestamp; ties resolve to the greatest id.
pub fn newest_attachment(files: &FileStore) -> Option<&FileAttachment> {
    files
        .values()
        .max_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)))
}
