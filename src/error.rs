//! Error types for tubemap

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why an embedded JSON object could not be isolated
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("marker {0:?} not found")]
    MarkerNotFound(String),

    #[error("no opening brace after marker")]
    NoOpeningBrace,

    #[error("braces never balance before end of input")]
    Unbalanced,
}

/// Stage of the signature pipeline that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherStage {
    /// The dispatch call site naming the transform function was not found
    Locator,
    /// The named function or its helper object could not be found
    Definition,
    /// The function body uses something the interpreter does not know
    UnsupportedOperation,
}

impl fmt::Display for CipherStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CipherStage::Locator => "locator",
            CipherStage::Definition => "definition",
            CipherStage::UnsupportedOperation => "unsupported-operation",
        };
        f.write_str(name)
    }
}

/// Main error type for tubemap operations
#[derive(Debug, Error)]
pub enum TubemapError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Stream map decode error: {0}")]
    Decode(String),

    #[error("Cipher error ({stage}): {cause}. The signature scheme may have changed upstream")]
    Cipher { stage: CipherStage, cause: String },

    #[error("get() matched {0} streams, expected at most one")]
    MultipleMatches(usize),

    #[error("Age restricted content")]
    AgeRestricted,

    #[error("Missing field in player config: {0}")]
    MissingField(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Fetch of {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    #[error(transparent)]
    Shared(Arc<TubemapError>),
}

impl TubemapError {
    /// Build a cipher error for the given stage
    pub fn cipher(stage: CipherStage, cause: impl Into<String>) -> Self {
        TubemapError::Cipher {
            stage,
            cause: cause.into(),
        }
    }

    /// Recover an owned error from one shared between cache waiters.
    ///
    /// Variants holding plain data are rebuilt as-is. Only errors wrapping a
    /// non-clonable source (`Fetch`, `JsonError`) stay behind `Shared`.
    pub fn from_shared(error: Arc<TubemapError>) -> Self {
        let error = match Arc::try_unwrap(error) {
            Ok(owned) => return owned,
            Err(shared) => shared,
        };
        match &*error {
            TubemapError::Extraction(e) => TubemapError::Extraction(e.clone()),
            TubemapError::Decode(msg) => TubemapError::Decode(msg.clone()),
            TubemapError::Cipher { stage, cause } => TubemapError::Cipher {
                stage: *stage,
                cause: cause.clone(),
            },
            TubemapError::MultipleMatches(n) => TubemapError::MultipleMatches(*n),
            TubemapError::AgeRestricted => TubemapError::AgeRestricted,
            TubemapError::MissingField(field) => TubemapError::MissingField(*field),
            TubemapError::InvalidUrl(url) => TubemapError::InvalidUrl(url.clone()),
            TubemapError::HttpStatus { url, status } => TubemapError::HttpStatus {
                url: url.clone(),
                status: *status,
            },
            TubemapError::UrlError(e) => TubemapError::UrlError(*e),
            TubemapError::RegexError(e) => TubemapError::RegexError(e.clone()),
            TubemapError::Shared(inner) => TubemapError::from_shared(inner.clone()),
            TubemapError::Fetch(_) | TubemapError::JsonError(_) => {
                TubemapError::Shared(Arc::clone(&error))
            }
        }
    }

    /// The underlying error, looking through shared wrappers
    pub fn root(&self) -> &TubemapError {
        match self {
            TubemapError::Shared(inner) => inner.root(),
            other => other,
        }
    }

    /// Check if error came from the transport and may succeed on retry
    pub fn is_retryable(&self) -> bool {
        match self.root() {
            TubemapError::Fetch(_) => true,
            TubemapError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Check if error means the page or player script format changed upstream
    pub fn is_upstream_change(&self) -> bool {
        matches!(
            self.root(),
            TubemapError::Extraction(_)
                | TubemapError::MissingField(_)
                | TubemapError::Cipher { .. }
        )
    }

    /// Cipher stage, if this is a cipher failure
    pub fn cipher_stage(&self) -> Option<CipherStage> {
        match self.root() {
            TubemapError::Cipher { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
