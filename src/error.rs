use thiserror::Error;

/// Central error type for the stem-mixer-core crate.
#[derive(Debug, Error)]
pub enum MixerError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Domain-specific variants
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Upload rejected: {0}")]
    Upload(String),

    #[error("Progress stream broken: {0}")]
    Progress(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),
}

// --- Implement From conversions for common errors ---
impl From<std::io::Error> for MixerError {
    fn from(e: std::io::Error) -> Self {
        MixerError::Anyhow(e.into())
    }
}

impl From<serde_json::Error> for MixerError {
    fn from(e: serde_json::Error) -> Self {
        MixerError::Anyhow(e.into())
    }
}

pub type Result<T> = std::result::Result<T, MixerError>;
