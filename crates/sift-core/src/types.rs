use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A ranked code fragment returned by retrieval.
///
/// # Examples
///
/// ```
/// use sift_core::SearchResult;
/// use std::path::PathBuf;
///
/// let result = SearchResult {
///     file_path: PathBuf::from("src/db.py"),
///     line_start: 10,
///     line_end: 25,
///     snippet: "def connect():\n    ...".into(),
///     score: 0.85,
///     lexical_score: Some(0.5),
///     vector_score: 0.1,
/// };
/// assert_eq!(result.denotation(), "src/db.py:10-25");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Path to the file containing the match, relative to the repository root.
    pub file_path: PathBuf,
    /// First line of the chunk (1-indexed).
    pub line_start: u32,
    /// Last line of the chunk (1-indexed, inclusive).
    pub line_end: u32,
    /// Line-numbered snippet.
    pub snippet: String,
    /// Blended ranking score.
    pub score: f64,
    /// Normalized BM25 score, if the chunk matched any query token.
    pub lexical_score: Option<f64>,
    /// Vector similarity used for blending.
    pub vector_score: f64,
}

impl SearchResult {
    /// The `path:start-end` key of the chunk.
    pub fn denotation(&self) -> String {
        format!(
            "{}:{}-{}",
            self.file_path.display(),
            self.line_start,
            self.line_end
        )
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use sift_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable listing.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
