use std::path::PathBuf;

/// Main error type for the library
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image decoding or encoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The embedder could not process a file
    #[error("Embedding failed for {}: {reason}", path.display())]
    Embedding {
        /// The file that failed.
        path: PathBuf,
        /// Why it failed.
        reason: String,
    },

    /// A match was requested against a catalog with no entries
    #[error("Catalog is empty")]
    EmptyCatalog,

    /// Two embeddings of different length were compared
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// Dimension of the reference embedding.
        expected: usize,
        /// Dimension of the offending embedding.
        found: usize,
    },

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MatchError {
    /// Build an [`MatchError::Embedding`] for `path`.
    pub fn embedding<P: Into<PathBuf>>(path: P, reason: impl std::fmt::Display) -> Self {
        Self::Embedding {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<tempfile::PersistError> for MatchError {
    fn from(err: tempfile::PersistError) -> Self {
        MatchError::Io(err.error)
    }
}

#[cfg(feature = "embeddings")]
impl From<tch::TchError> for MatchError {
    fn from(err: tch::TchError) -> Self {
        MatchError::Internal(format!("PyTorch error: {}", err))
    }
}

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, MatchError>;

/// Extension trait for working with Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static;

    /// Add context to an error if the result is an error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
    {
        self.map_err(|e| MatchError::Internal(format!("{}: {}", context, e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: std::fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| {
            let context = f();
            MatchError::Internal(format!("{}: {}", context, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_message() {
        let err = MatchError::embedding("DATA/cats/1.jpg", "unsupported format");
        assert_eq!(
            err.to_string(),
            "Embedding failed for DATA/cats/1.jpg: unsupported format"
        );
    }

    #[test]
    fn test_context_wraps_source() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        ));
        let err = res.context("writing cache").unwrap_err();
        assert!(matches!(err, MatchError::Internal(ref m) if m == "writing cache: disk full"));
    }
}
