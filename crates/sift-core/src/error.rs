use std::path::PathBuf;

/// Errors that can occur across the sift workspace.
///
/// Library crates return this type directly. It also implements
/// [`miette::Diagnostic`], so the binary can propagate it with `?` into a
/// `miette::Result`.
///
/// # Examples
///
/// ```
/// use sift_core::SiftError;
///
/// let err = SiftError::Config("overlap must be smaller than line_count".into());
/// assert!(err.to_string().contains("overlap"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum SiftError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check the values in .sift.toml or the command-line flags"))]
    Config(String),

    /// Source code parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// A file could not be read or decoded.
    #[error("cannot access {}: {reason}", .path.display())]
    FileAccess {
        /// Path of the offending file.
        path: PathBuf,
        /// Why the file was rejected.
        reason: String,
    },

    /// Embedding provider failure.
    #[error("embedding error: {message}")]
    Embedding {
        /// Provider or transport message.
        message: String,
        /// Whether repeating the request may succeed.
        retryable: bool,
    },

    /// A background worker panicked or was cancelled.
    #[error("worker failure: {0}")]
    Worker(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SiftError {
    /// Build a non-retryable embedding error.
    pub fn embedding(message: impl Into<String>) -> Self {
        SiftError::Embedding {
            message: message.into(),
            retryable: false,
        }
    }

    /// Build an embedding error that the caller may retry.
    pub fn embedding_retryable(message: impl Into<String>) -> Self {
        SiftError::Embedding {
            message: message.into(),
            retryable: true,
        }
    }

    /// Whether repeating the failed operation may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// use sift_core::SiftError;
    ///
    /// assert!(SiftError::embedding_retryable("429 Too Many Requests").is_retryable());
    /// assert!(!SiftError::Config("bad".into()).is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SiftError::Embedding {
                retryable: true,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SiftError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = SiftError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_access_shows_path_and_reason() {
        let err = SiftError::FileAccess {
            path: PathBuf::from("/tmp/latin1.py"),
            reason: "not valid UTF-8".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/latin1.py"));
        assert!(msg.contains("not valid UTF-8"));
    }

    #[test]
    fn only_retryable_embedding_errors_are_retryable() {
        assert!(SiftError::embedding_retryable("timeout").is_retryable());
        assert!(!SiftError::embedding("401 Unauthorized").is_retryable());
        assert!(!SiftError::Parse("grammar".into()).is_retryable());
    }
}
