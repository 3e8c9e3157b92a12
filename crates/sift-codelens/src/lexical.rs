//! BM25 inverted index over chunk text.
//!
//! The index is built per retrieval request from the chunk store and never
//! updated in place. Scores are min-max normalized so they blend on a fixed
//! scale with vector similarities.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;
use sift_core::LexicalConfig;

use crate::chunk::Chunk;
use crate::tokenizer::{term_counts, tokenize};

/// A titled unit of text for the lexical index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// `"{path}:{start}-{end}"`, the denotation of the source chunk.
    pub title: String,
    pub content: String,
}

impl Document {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn from_chunk(chunk: &Chunk) -> Self {
        Self::new(chunk.denotation(), chunk.text())
    }
}

/// Inverted index with BM25 scoring.
///
/// # Examples
///
/// ```
/// use sift_core::LexicalConfig;
/// use sift_codelens::lexical::{Document, LexicalIndex};
/// use sift_codelens::tokenizer::tokenize;
///
/// let docs = vec![
///     Document::new("db.py:1-10", "def open_connection(url): ..."),
///     Document::new("ui.py:1-10", "def render_button(label): ..."),
/// ];
/// let index = LexicalIndex::build(&docs, &LexicalConfig::default());
/// let scores = index.search(&tokenize("openConnection"));
/// assert_eq!(scores.len(), 1);
/// assert_eq!(scores["db.py:1-10"], 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    inverted_index: HashMap<String, Vec<Posting>>,
    titles: Vec<String>,
    doc_lengths: Vec<usize>,
    total_doc_length: f64,
    k1: f64,
    b: f64,
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: usize,
    frequency: usize,
}

impl LexicalIndex {
    /// Tokenize every document (in parallel on the current rayon pool) and
    /// build the postings.
    pub fn build(documents: &[Document], config: &LexicalConfig) -> Self {
        let counts: Vec<HashMap<String, usize>> = documents
            .par_iter()
            .map(|d| term_counts(&d.content))
            .collect();

        let mut inverted_index: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(documents.len());

        for (doc, terms) in counts.into_iter().enumerate() {
            doc_lengths.push(terms.values().sum());
            for (token, frequency) in terms {
                inverted_index
                    .entry(token)
                    .or_default()
                    .push(Posting { doc, frequency });
            }
        }

        let total_doc_length = doc_lengths.iter().sum::<usize>() as f64;
        tracing::debug!(
            documents = documents.len(),
            terms = inverted_index.len(),
            "lexical index built"
        );

        Self {
            inverted_index,
            titles: documents.iter().map(|d| d.title.clone()).collect(),
            doc_lengths,
            total_doc_length,
            k1: config.k1,
            b: config.b,
        }
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    /// Raw BM25 scores per document index, for documents matching any token.
    fn raw_scores(&self, query_tokens: &[String]) -> Vec<(usize, f64)> {
        let n_docs = self.titles.len() as f64;
        if n_docs == 0.0 || self.total_doc_length == 0.0 {
            return Vec::new();
        }
        let avg_len = self.total_doc_length / n_docs;

        let mut scores: HashMap<usize, f64> = HashMap::new();
        let mut seen = HashSet::new();

        for token in query_tokens {
            if !seen.insert(token.as_str()) {
                continue;
            }
            let Some(postings) = self.inverted_index.get(token) else {
                continue;
            };

            let n = postings.len() as f64;
            let idf = ((n_docs - n + 0.5) / (n + 0.5) + 1.0).ln();

            for posting in postings {
                let f = posting.frequency as f64;
                let dl = self.doc_lengths[posting.doc] as f64;
                let tf = (f * (self.k1 + 1.0))
                    / (f + self.k1 * (1.0 - self.b + self.b * dl / avg_len));
                *scores.entry(posting.doc).or_insert(0.0) += idf * tf;
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }

    /// Score documents against `query_tokens`.
    ///
    /// Returns normalized scores in `[0, 1]` keyed by document title, for
    /// documents that matched at least one token. When several documents
    /// share a title the best scoring one is kept.
    pub fn search(&self, query_tokens: &[String]) -> HashMap<String, f64> {
        let ranked = self.raw_scores(query_tokens);
        let (Some(&(_, max)), Some(&(_, lowest))) = (ranked.first(), ranked.last()) else {
            return HashMap::new();
        };
        let min = if lowest < max { lowest } else { 0.0 };
        let range = max - min;

        let mut normalized = HashMap::with_capacity(ranked.len());
        for (doc, score) in ranked {
            let value = if range > 0.0 { (score - min) / range } else { 0.0 };
            normalized
                .entry(self.titles[doc].clone())
                .or_insert(value);
        }
        normalized
    }

    /// Tokenize `query` and search.
    pub fn search_text(&self, query: &str) -> HashMap<String, f64> {
        self.search(&tokenize(query))
    }
}
