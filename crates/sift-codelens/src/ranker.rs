//! Final ordering of chunks from lexical and vector scores.

use std::collections::HashMap;

use sift_core::{RankingConfig, SearchResult};

use crate::chunk::Chunk;

/// A chunk with its blended score.
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f64,
    /// Normalized BM25 score, if the chunk matched any query token.
    pub lexical_score: Option<f64>,
    /// Cosine similarity, or the default when the chunk has no embedding.
    pub vector_score: f64,
}

impl RankedChunk {
    /// Output form with an ellipsized, line-numbered snippet.
    pub fn to_search_result(&self) -> SearchResult {
        SearchResult {
            file_path: self.chunk.source().to_path_buf(),
            line_start: self.chunk.start() as u32,
            line_end: self.chunk.end() as u32,
            snippet: self.chunk.snippet(true, true),
            score: self.score,
            lexical_score: self.lexical_score,
            vector_score: self.vector_score,
        }
    }
}

/// Rank with the default constants and `top_k`.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use std::path::PathBuf;
/// use std::sync::Arc;
/// use sift_codelens::chunk::Chunk;
/// use sift_codelens::ranker::rank;
/// use sift_walker::Language;
///
/// let content: Arc<str> = Arc::from("a\nb\n");
/// let a = Chunk::new(content.clone(), PathBuf::from("f.py"), 1, 1, Language::Python);
/// let b = Chunk::new(content, PathBuf::from("f.py"), 2, 2, Language::Python);
///
/// let lexical = HashMap::from([("f.py:1-1".to_string(), 0.5)]);
/// let vector = HashMap::from([("f.py:1-1".to_string(), 0.1), ("f.py:2-2".to_string(), 0.9)]);
///
/// let ranked = rank(vec![b, a], &lexical, &vector, 10);
/// assert_eq!(ranked[0].chunk.denotation(), "f.py:1-1");
/// assert!((ranked[0].score - 0.85).abs() < 1e-9);
/// assert!((ranked[1].score - 0.018).abs() < 1e-9);
/// ```
pub fn rank(
    chunks: Vec<Chunk>,
    lexical: &HashMap<String, f64>,
    vector: &HashMap<String, f64>,
    top_k: usize,
) -> Vec<RankedChunk> {
    let config = RankingConfig {
        top_k,
        ..RankingConfig::default()
    };
    rank_with(chunks, lexical, vector, &config)
}

/// Blend scores and keep the best `config.top_k` chunks.
///
/// A chunk with a lexical hit scores `lexical + vector * vector_weight`.
/// Without one it scores `vector * vector_only_factor`, so lexical matches
/// always dominate. Ties keep input order.
pub fn rank_with(
    chunks: Vec<Chunk>,
    lexical: &HashMap<String, f64>,
    vector: &HashMap<String, f64>,
    config: &RankingConfig,
) -> Vec<RankedChunk> {
    let mut ranked: Vec<RankedChunk> = chunks
        .into_iter()
        .map(|chunk| {
            let key = chunk.denotation();
            let vector_score = vector.get(&key).copied().unwrap_or(config.default_vector_score);
            let lexical_score = lexical.get(&key).copied();
            let score = match lexical_score {
                Some(lex) => lex + vector_score * config.vector_weight,
                None => config.vector_only_factor * vector_score,
            };
            RankedChunk {
                chunk,
                score,
                lexical_score,
                vector_score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(config.top_k);
    ranked
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use sift_walker::Language;

    use super::*;

    fn chunks(n: usize) -> Vec<Chunk> {
        let content: Arc<str> = Arc::from("line\n".repeat(n));
        (1..=n)
            .map(|i| Chunk::new(content.clone(), PathBuf::from("m.rs"), i, i, Language::Rust))
            .collect()
    }

    fn scores(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn lexical_hit_dominates_vector_only() {
        let ranked = rank(
            chunks(2),
            &scores(&[("m.rs:1-1", 0.5)]),
            &scores(&[("m.rs:1-1", 0.1), ("m.rs:2-2", 0.9)]),
            10,
        );
        assert_eq!(ranked.len(), 2);
        assert!((ranked[0].score - 0.85).abs() < 1e-9);
        assert_eq!(ranked[0].lexical_score, Some(0.5));
        assert!((ranked[1].score - 0.018).abs() < 1e-9);
        assert_eq!(ranked[1].lexical_score, None);
    }

    #[test]
    fn missing_vector_uses_default() {
        let ranked = rank(chunks(2), &scores(&[("m.rs:2-2", 0.0)]), &HashMap::new(), 10);
        assert_eq!(ranked[0].chunk.start(), 2);
        assert!((ranked[0].score - 0.04 * 3.5).abs() < 1e-9);
        assert!((ranked[1].score - 0.02 * 0.04).abs() < 1e-12);
        assert_eq!(ranked[1].vector_score, 0.04);
    }

    #[test]
    fn ties_keep_input_order_and_top_k_truncates() {
        let ranked = rank(chunks(5), &HashMap::new(), &HashMap::new(), 3);
        let starts: Vec<usize> = ranked.iter().map(|r| r.chunk.start()).collect();
        assert_eq!(starts, vec![1, 2, 3]);
    }

    #[test]
    fn custom_weights_apply() {
        let config = RankingConfig {
            top_k: 1,
            default_vector_score: 0.0,
            vector_weight: 1.0,
            vector_only_factor: 1.0,
        };
        let ranked = rank_with(
            chunks(2),
            &scores(&[("m.rs:1-1", 0.2)]),
            &scores(&[("m.rs:2-2", 0.9)]),
            &config,
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].chunk.denotation(), "m.rs:2-2");
    }

    #[test]
    fn search_result_carries_snippet_and_lines() {
        let ranked = rank(chunks(3), &scores(&[("m.rs:2-2", 1.0)]), &HashMap::new(), 1);
        let result = ranked[0].to_search_result();
        assert_eq!(result.file_path, PathBuf::from("m.rs"));
        assert_eq!((result.line_start, result.line_end), (2, 2));
        assert_eq!(result.snippet, "...\n2: line\n...");
        assert_eq!(result.denotation(), "m.rs:2-2");
    }
}
