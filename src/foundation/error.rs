pub type InkdeckResult<T> = Result<T, InkdeckError>;

#[derive(thiserror::Error, Debug)]
pub enum InkdeckError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error on slide {slide}: {message}")]
    Render { slide: usize, message: String },

    #[error("unsupported capability: {0}")]
    UnsupportedCapability(String),

    #[error("resource fetch error: {0}")]
    ResourceFetch(String),

    #[error("an export job is already in flight")]
    JobInFlight,

    #[error("export cancelled before slide {slide}")]
    Cancelled { slide: usize },

    #[error("encode error: {0}")]
    Encode(String),

    #[error("serialization error: {0}")]
    Serde(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl InkdeckError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(slide: usize, msg: impl Into<String>) -> Self {
        Self::Render {
            slide,
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::UnsupportedCapability(msg.into())
    }

    pub fn fetch(msg: impl Into<String>) -> Self {
        Self::ResourceFetch(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Index of the slide that failed an export job, if this error carries one.
    pub fn failed_slide(&self) -> Option<usize> {
        match self {
            Self::Render { slide, .. } => Some(*slide),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for InkdeckError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            InkdeckError::validation("x")
                .to_string()
                .contains("validation error:")
        );
        assert!(
            InkdeckError::render(3, "x")
                .to_string()
                .contains("render error on slide 3:")
        );
        assert!(
            InkdeckError::unsupported("x")
                .to_string()
                .contains("unsupported capability:")
        );
        assert!(
            InkdeckError::fetch("x")
                .to_string()
                .contains("resource fetch error:")
        );
        assert!(
            InkdeckError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn failed_slide_only_for_render_errors() {
        assert_eq!(InkdeckError::render(2, "boom").failed_slide(), Some(2));
        assert_eq!(InkdeckError::validation("boom").failed_slide(), None);
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = InkdeckError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
