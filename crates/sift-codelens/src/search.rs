//! End-to-end retrieval: walk, chunk, score and rank.

use std::collections::HashMap;
use std::path::Path;

use sift_core::{SiftConfig, SiftError};
use sift_walker::walk_repo;

use crate::embedding::EmbeddingProvider;
use crate::lexical::LexicalIndex;
use crate::pool::run_blocking;
use crate::ranker::{rank_with, RankedChunk};
use crate::store::ChunkStore;
use crate::tokenizer::tokenize;
use crate::vector::VectorScorer;

/// Hybrid retriever over a repository.
///
/// Without a provider every chunk gets the default vector score, so the
/// ranking is purely lexical.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use sift_core::SiftConfig;
/// use sift_codelens::embedding::EmbeddingClient;
/// use sift_codelens::search::Retriever;
///
/// # async fn example() {
/// let config = SiftConfig::default();
/// let client = EmbeddingClient::with_config(&config.embedding).unwrap();
/// let retriever = Retriever::new(config, Some(client));
/// let results = retriever.retrieve(Path::new("."), "retry with backoff").await.unwrap();
/// for ranked in results {
///     println!("{} {:.3}", ranked.chunk.denotation(), ranked.score);
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct Retriever<P> {
    config: SiftConfig,
    scorer: Option<VectorScorer<P>>,
}

impl<P: EmbeddingProvider> Retriever<P> {
    pub fn new(config: SiftConfig, provider: Option<P>) -> Self {
        let scorer = provider.map(|p| VectorScorer::new(p, &config.embedding));
        Self { config, scorer }
    }

    pub fn config(&self) -> &SiftConfig {
        &self.config
    }

    /// Whether vector scoring is enabled.
    pub fn is_hybrid(&self) -> bool {
        self.scorer.is_some()
    }

    /// Walk `root` and chunk every accepted file on the worker pool.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::FileAccess`] if `root` is not a directory,
    /// [`SiftError::Config`] for invalid walker or chunking settings, or
    /// [`SiftError::Worker`] if the pool fails.
    pub async fn index(&self, root: &Path) -> Result<ChunkStore, SiftError> {
        let root = root.to_path_buf();
        let walker = self.config.walker.clone();
        let chunking = self.config.chunking.clone();

        run_blocking(move || {
            let files = walk_repo(&root, &walker)?;
            ChunkStore::from_files(&files, &chunking)
        })
        .await?
    }

    /// Retrieve the best chunks under `root` for `query`.
    ///
    /// # Errors
    ///
    /// Everything [`Retriever::index`] and [`Retriever::rank_store`] return.
    pub async fn retrieve(&self, root: &Path, query: &str) -> Result<Vec<RankedChunk>, SiftError> {
        let store = self.index(root).await?;
        self.rank_store(store, query).await
    }

    /// Score and rank an already built store.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::Embedding`] if the query cannot be embedded, or
    /// [`SiftError::Worker`] if the pool fails.
    pub async fn rank_store(&self, store: ChunkStore, query: &str) -> Result<Vec<RankedChunk>, SiftError> {
        if store.is_empty() {
            tracing::info!("no chunks to rank");
            return Ok(Vec::new());
        }

        let documents = store.documents();
        let lexical_config = self.config.lexical.clone();
        let tokens = tokenize(query);
        let query_tokens = tokens.len();
        let lexical = run_blocking(move || {
            LexicalIndex::build(&documents, &lexical_config).search(&tokens)
        })
        .await?;
        tracing::info!(query_tokens, matches = lexical.len(), "lexical search done");

        let vector = match &self.scorer {
            Some(scorer) => {
                let scores = scorer.score(query, store.chunks()).await?;
                tracing::info!(scored = scores.len(), "vector scoring done");
                scores
            }
            None => HashMap::new(),
        };

        let ranked = rank_with(store.chunks().to_vec(), &lexical, &vector, &self.config.ranking);
        tracing::info!(
            candidates = store.len(),
            returned = ranked.len(),
            "ranking done"
        );
        Ok(ranked)
    }
}
