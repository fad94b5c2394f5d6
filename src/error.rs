/// Canonical error type used across all modules.
///
/// No variant ever crosses the public `parse` boundary — failures are
/// absorbed by the tier chain and surface only as diagnostics in
/// [`crate::parser::ParseOutcome::error`] and in the stats error breakdown.
#[derive(Debug, thiserror::Error)]
pub enum SalvageError {
    #[error("extraction failed: {0}")]
    Extract(String),
    #[error("sanitization failed: {0}")]
    Sanitize(String),
    #[error("JSON decode failed: {0}")]
    Decode(String),
    #[error("structural validation failed: {0}")]
    Validation(String),
    #[error("all parse tiers exhausted: {0}")]
    Exhausted(String),
}

impl SalvageError {
    /// Stable label used as the key in the stats error breakdown.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SalvageError::Extract(_) => "extract",
            SalvageError::Sanitize(_) => "sanitize",
            SalvageError::Decode(_) => "decode",
            SalvageError::Validation(_) => "validation",
            SalvageError::Exhausted(_) => "exhausted",
        }
    }

    /// Whether the schema tier may retry after this failure.
    ///
    /// Extraction failures are terminal for that tier: the input has no
    /// JSON-like span and re-running the same pipeline cannot produce one.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, SalvageError::Decode(_) | SalvageError::Validation(_))
    }
}
