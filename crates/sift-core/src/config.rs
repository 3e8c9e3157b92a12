use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SiftError;

/// Top-level configuration loaded from `.sift.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use sift_core::SiftConfig;
///
/// let config = SiftConfig::default();
/// assert_eq!(config.chunking.max_chars, 2000);
/// assert_eq!(config.ranking.top_k, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiftConfig {
    /// Span chunker settings.
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// Repository walker filters.
    #[serde(default)]
    pub walker: WalkerConfig,
    /// Embedding provider settings for semantic scoring.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    /// BM25 parameters.
    #[serde(default)]
    pub lexical: LexicalConfig,
    /// Score blending and result count.
    #[serde(default)]
    pub ranking: RankingConfig,
}

impl SiftConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::Io`] if the file cannot be read, or
    /// [`SiftError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sift_core::SiftConfig;
    /// use std::path::Path;
    ///
    /// let config = SiftConfig::from_file(Path::new(".sift.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, SiftError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use sift_core::SiftConfig;
    ///
    /// let toml = r#"
    /// [chunking]
    /// max_chars = 1500
    /// "#;
    /// let config = SiftConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.chunking.max_chars, 1500);
    /// assert_eq!(config.chunking.coalesce, 80);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, SiftError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Span chunker configuration.
///
/// # Examples
///
/// ```
/// use sift_core::ChunkingConfig;
///
/// let config = ChunkingConfig::default();
/// assert_eq!(config.max_chars, 2000);
/// assert_eq!(config.coalesce, 80);
/// assert_eq!(config.naive_line_count, 50);
/// assert_eq!(config.naive_overlap, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Byte budget for a structural span (default: 2000).
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Non-whitespace characters needed before a span is finalized (default: 80).
    #[serde(default = "default_coalesce")]
    pub coalesce: usize,
    /// Window size of the fallback line chunker (default: 50).
    #[serde(default = "default_naive_line_count")]
    pub naive_line_count: usize,
    /// Lines shared between consecutive fallback windows (default: 0).
    #[serde(default)]
    pub naive_overlap: usize,
}

fn default_max_chars() -> usize {
    2000
}

fn default_coalesce() -> usize {
    80
}

fn default_naive_line_count() -> usize {
    50
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            coalesce: default_coalesce(),
            naive_line_count: default_naive_line_count(),
            naive_overlap: 0,
        }
    }
}

/// Repository walker filters.
///
/// # Examples
///
/// ```
/// use sift_core::WalkerConfig;
///
/// let config = WalkerConfig::default();
/// assert_eq!(config.min_file_bytes, 10);
/// assert_eq!(config.max_file_bytes, 240_000);
/// assert_eq!(config.max_dir_files, 240);
/// assert!(config.exclude_dirs.iter().any(|d| d == "node_modules"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkerConfig {
    /// Files smaller than this many bytes are skipped (default: 10).
    #[serde(default = "default_min_file_bytes")]
    pub min_file_bytes: u64,
    /// Files larger than this many bytes are skipped (default: 240000).
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
    /// Files in a directory holding more entries than this are skipped (default: 240).
    #[serde(default = "default_max_dir_files")]
    pub max_dir_files: usize,
    /// Files whose mean line length exceeds this are skipped (default: 200).
    #[serde(default = "default_max_avg_line_length")]
    pub max_avg_line_length: usize,
    /// Relative path prefixes to exclude.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,
    /// File name suffixes to exclude (extensions, lock files, ...).
    #[serde(default = "default_exclude_exts")]
    pub exclude_exts: Vec<String>,
    /// Additional glob patterns to skip.
    #[serde(default)]
    pub skip_patterns: Vec<String>,
}

fn default_min_file_bytes() -> u64 {
    10
}

fn default_max_file_bytes() -> u64 {
    240_000
}

fn default_max_dir_files() -> usize {
    240
}

fn default_max_avg_line_length() -> usize {
    200
}

fn default_exclude_dirs() -> Vec<String> {
    [
        ".git",
        ".vscode",
        ".idea",
        "node_modules",
        "build",
        "dist",
        "target",
        "package-lock.json",
        ".venv",
        "venv",
        "patch",
        "packages/blobs",
        ".docker",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_exclude_exts() -> Vec<String> {
    [
        // vcs and docs
        ".gitignore", ".md", "LICENSE", ".sh", ".patch",
        // images
        ".png", ".jpg", ".jpeg", ".gif", ".ico", ".bmp", ".tiff", ".svg", ".webp",
        // audio / video
        ".mp3", ".mp4", ".avi", ".mkv", ".mov", ".wav", ".ogg", ".flac", ".iso", ".bin",
        // fonts
        ".woff", ".woff2", ".eot", ".otf", ".ttf",
        // bundled web assets
        ".min.js", ".min.js.map", ".min.css", ".min.css.map", ".css", ".scss", ".less",
        // lock and build artifacts
        ".lock", "pnpm-lock.yaml", ".pyc", ".coverage", ".jar", ".class", ".o", ".so",
        ".dll", ".exe", ".tfstate", ".ipynb",
        // archives and documents
        ".tar", ".zip", ".7z", ".gz", ".rar", ".pdf", ".xml", ".yml", ".yaml", ".csv",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            min_file_bytes: default_min_file_bytes(),
            max_file_bytes: default_max_file_bytes(),
            max_dir_files: default_max_dir_files(),
            max_avg_line_length: default_max_avg_line_length(),
            exclude_dirs: default_exclude_dirs(),
            exclude_exts: default_exclude_exts(),
            skip_patterns: Vec::new(),
        }
    }
}

/// Configuration for the embedding provider used by semantic scoring.
///
/// # Examples
///
/// ```
/// use sift_core::EmbeddingConfig;
///
/// let config = EmbeddingConfig::default();
/// assert_eq!(config.provider, "openai");
/// assert_eq!(config.model, "text-embedding-3-small");
/// assert_eq!(config.batch_size, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name (default: `"openai"`, the only one supported). Other
    /// OpenAI-compatible servers are reached through `base_url`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Model name (default: `"text-embedding-3-small"`).
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL for API requests.
    pub base_url: Option<String>,
    /// Texts per request (default: 64).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Requests in flight at once (default: 4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Retries per failed batch (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Estimated tokens above which a diff query is split (default: 8191).
    #[serde(default = "default_query_token_limit")]
    pub query_token_limit: usize,
}

fn default_embedding_provider() -> String {
    "openai".into()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}

fn default_batch_size() -> usize {
    64
}

fn default_concurrency() -> usize {
    4
}

fn default_max_retries() -> u32 {
    5
}

fn default_query_token_limit() -> usize {
    8191
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            api_key: None,
            base_url: None,
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
            query_token_limit: default_query_token_limit(),
        }
    }
}

/// BM25 parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexicalConfig {
    /// Term frequency saturation (default: 1.2).
    #[serde(default = "default_k1")]
    pub k1: f64,
    /// Document length normalization (default: 0.75).
    #[serde(default = "default_b")]
    pub b: f64,
}

fn default_k1() -> f64 {
    1.2
}

fn default_b() -> f64 {
    0.75
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
        }
    }
}

/// Score blending constants.
///
/// # Examples
///
/// ```
/// use sift_core::RankingConfig;
///
/// let config = RankingConfig::default();
/// assert_eq!(config.top_k, 10);
/// assert_eq!(config.vector_weight, 3.5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// Number of chunks returned (default: 10).
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Vector score assumed for chunks without an embedding (default: 0.04).
    #[serde(default = "default_vector_score")]
    pub default_vector_score: f64,
    /// Multiplier on the vector score when a lexical hit exists (default: 3.5).
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
    /// Multiplier on the vector score when there is no lexical hit (default: 0.02).
    #[serde(default = "default_vector_only_factor")]
    pub vector_only_factor: f64,
}

fn default_top_k() -> usize {
    10
}

fn default_vector_score() -> f64 {
    0.04
}

fn default_vector_weight() -> f64 {
    3.5
}

fn default_vector_only_factor() -> f64 {
    0.02
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            default_vector_score: default_vector_score(),
            vector_weight: default_vector_weight(),
            vector_only_factor: default_vector_only_factor(),
        }
    }
}
