//! Syntax-aware chunking and hybrid retrieval.
//!
//! Files are split into line windows along tree-sitter node boundaries,
//! scored with BM25 over identifier-aware tokens and, when an embedding
//! provider is configured, with cosine similarity. The two scores are blended
//! by [`ranker::rank`] so lexical matches always lead.

pub mod chunk;
pub mod chunker;
pub mod embedding;
pub mod lexical;
pub mod pool;
pub mod ranker;
pub mod search;
pub mod store;
pub mod tokenizer;
pub mod vector;
