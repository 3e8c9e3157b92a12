//! Semantic similarity between a query and chunk windows.

use std::collections::HashMap;
use std::sync::OnceLock;

use futures::stream::{self, StreamExt, TryStreamExt};
use regex::Regex;
use sift_core::{EmbeddingConfig, SiftError};

use crate::chunk::Chunk;
use crate::embedding::EmbeddingProvider;

/// Lines per diff piece when a diff query is too long to embed whole.
pub const DIFF_MAX_LINES: usize = 200;
/// Lines repeated at the start of the next diff piece.
pub const DIFF_OVERLAP: usize = 15;

fn file_header_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^(diff --git )?a/.+ b/.+$").expect("invalid diff header regex"))
}

/// Scores chunks by cosine similarity to the query embedding.
///
/// # Examples
///
/// ```
/// use sift_core::{EmbeddingConfig, SiftError};
/// use sift_codelens::embedding::EmbeddingProvider;
/// use sift_codelens::vector::VectorScorer;
///
/// struct Constant;
///
/// impl EmbeddingProvider for Constant {
///     async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SiftError> {
///         Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
///     }
/// }
///
/// let scorer = VectorScorer::new(Constant, &EmbeddingConfig::default());
/// assert_eq!(scorer.batch_size(), 64);
/// ```
#[derive(Debug)]
pub struct VectorScorer<P> {
    provider: P,
    batch_size: usize,
    concurrency: usize,
    query_token_limit: usize,
}

impl<P: EmbeddingProvider> VectorScorer<P> {
    pub fn new(provider: P, config: &EmbeddingConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            concurrency: config.concurrency.max(1),
            query_token_limit: config.query_token_limit,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Embed `texts` in batches, keeping input order.
    ///
    /// A batch that fails, or returns the wrong number of vectors, yields
    /// `None` for each of its texts.
    pub async fn embed_texts(&self, texts: &[String]) -> Vec<Option<Vec<f32>>> {
        let results: Vec<_> = stream::iter(
            texts
                .chunks(self.batch_size)
                .map(|batch| self.provider.embed(batch)),
        )
        .buffered(self.concurrency)
        .collect()
        .await;

        let mut vectors = Vec::with_capacity(texts.len());
        for (i, (batch, result)) in texts.chunks(self.batch_size).zip(results).enumerate() {
            match result {
                Ok(embedded) if embedded.len() == batch.len() => {
                    vectors.extend(embedded.into_iter().map(Some));
                }
                Ok(embedded) => {
                    tracing::warn!(
                        batch = i,
                        expected = batch.len(),
                        got = embedded.len(),
                        "embedding batch size mismatch"
                    );
                    vectors.extend(std::iter::repeat_with(|| None).take(batch.len()));
                }
                Err(e) => {
                    tracing::warn!(batch = i, size = batch.len(), error = %e, "embedding batch failed");
                    vectors.extend(std::iter::repeat_with(|| None).take(batch.len()));
                }
            }
        }
        vectors
    }

    /// Similarity of every chunk to `query`, keyed by denotation.
    ///
    /// Long diff queries are split with [`split_diff_query`] and a chunk's
    /// similarity is the mean over the pieces. Chunks whose embedding failed
    /// or has a different dimension than the query are left out.
    ///
    /// # Errors
    ///
    /// Returns the provider's [`SiftError::Embedding`] if the query itself
    /// cannot be embedded.
    pub async fn score(&self, query: &str, chunks: &[Chunk]) -> Result<HashMap<String, f64>, SiftError> {
        let pieces = split_diff_query(query, DIFF_MAX_LINES, DIFF_OVERLAP, self.query_token_limit);
        let query_batches: Vec<Vec<Vec<f32>>> = stream::iter(
            pieces
                .chunks(self.batch_size)
                .map(|batch| self.provider.embed(batch)),
        )
        .buffered(self.concurrency)
        .try_collect()
        .await?;
        let query_vectors: Vec<Vec<f32>> = query_batches.into_iter().flatten().collect();
        let Some(dimension) = query_vectors.first().map(Vec::len) else {
            return Err(SiftError::embedding("provider returned no query embedding"));
        };
        if query_vectors.len() != pieces.len() || query_vectors.iter().any(|v| v.len() != dimension) {
            return Err(SiftError::embedding("inconsistent query embeddings"));
        }

        let mut unique: HashMap<String, usize> = HashMap::new();
        let mut texts = Vec::new();
        let slots: Vec<usize> = chunks
            .iter()
            .map(|chunk| {
                *unique.entry(chunk.content_hash()).or_insert_with(|| {
                    texts.push(chunk.text());
                    texts.len() - 1
                })
            })
            .collect();

        tracing::info!(
            chunks = chunks.len(),
            unique = texts.len(),
            query_pieces = pieces.len(),
            "embedding chunks"
        );
        let embedded = self.embed_texts(&texts).await;

        let mut scores = HashMap::with_capacity(chunks.len());
        let mut skipped = 0usize;
        for (chunk, slot) in chunks.iter().zip(slots) {
            let Some(vector) = embedded[slot].as_ref().filter(|v| v.len() == dimension) else {
                skipped += 1;
                continue;
            };
            let total: f64 = query_vectors
                .iter()
                .map(|q| cosine_similarity(q, vector))
                .sum();
            scores
                .entry(chunk.denotation())
                .or_insert(total / query_vectors.len() as f64);
        }

        if skipped > 0 {
            tracing::warn!(skipped, "chunks without usable embeddings get the default score");
        }
        Ok(scores)
    }
}

/// Cosine similarity, or 0 when either vector has zero norm.
///
/// # Examples
///
/// ```
/// use sift_codelens::vector::cosine_similarity;
///
/// assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 2.0]), 0.0);
/// assert!((cosine_similarity(&[1.0, 1.0], &[2.0, 2.0]) - 1.0).abs() < 1e-9);
/// assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Split a query that is too long to embed into overlapping pieces.
///
/// Token count is estimated as one token per four characters. Below
/// `token_limit` the query is returned whole. Otherwise a new piece starts
/// at every `a/... b/...` file header, and a piece reaching `max_lines` is
/// flushed with the next one restarting from the current header plus the
/// last `overlap` lines.
///
/// # Examples
///
/// ```
/// use sift_codelens::vector::split_diff_query;
///
/// assert_eq!(split_diff_query("fix login", 200, 15, 8191), vec!["fix login"]);
/// ```
pub fn split_diff_query(diff: &str, max_lines: usize, overlap: usize, token_limit: usize) -> Vec<String> {
    if diff.chars().count() / 4 < token_limit {
        return vec![diff.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut header: Option<&str> = None;

    for line in diff.split('\n') {
        if file_header_regex().is_match(line) {
            if !current.is_empty() {
                pieces.push(current.join("\n"));
            }
            header = Some(line);
            current = vec![line];
            continue;
        }

        current.push(line);
        if current.len() >= max_lines.max(1) {
            pieces.push(current.join("\n"));
            let tail = current[current.len().saturating_sub(overlap)..].to_vec();
            current = header.into_iter().collect();
            current.extend(tail);
        }
    }
    if !current.is_empty() {
        pieces.push(current.join("\n"));
    }
    pieces
}
