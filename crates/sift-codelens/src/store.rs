//! In-memory chunk collection for one retrieval run.

use rayon::prelude::*;
use sift_core::{ChunkingConfig, SiftError};
use sift_walker::SourceFile;

use crate::chunk::Chunk;
use crate::chunker::chunk_file;
use crate::lexical::Document;

/// All chunks produced for a repository, in walk order.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use sift_core::ChunkingConfig;
/// use sift_codelens::store::ChunkStore;
/// use sift_walker::{Language, SourceFile};
///
/// let files = vec![SourceFile {
///     path: PathBuf::from("lib.py"),
///     language: Language::Python,
///     content: "def answer():\n    return 42\n".into(),
/// }];
/// let store = ChunkStore::from_files(&files, &ChunkingConfig::default()).unwrap();
/// assert_eq!(store.len(), 1);
/// assert_eq!(store.chunks()[0].denotation(), "lib.py:1-2");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    /// Chunk every file, in parallel on the current rayon pool.
    ///
    /// Output order follows `files`, then line order within each file.
    ///
    /// # Errors
    ///
    /// Returns [`SiftError::Config`] if the chunking configuration is invalid.
    pub fn from_files(files: &[SourceFile], config: &ChunkingConfig) -> Result<Self, SiftError> {
        let per_file = files
            .par_iter()
            .map(|file| chunk_file(&file.path, &file.content, file.language, config))
            .collect::<Result<Vec<_>, _>>()?;

        let chunks: Vec<Chunk> = per_file.into_iter().flatten().collect();
        tracing::info!(files = files.len(), chunks = chunks.len(), "chunk store built");
        Ok(Self { chunks })
    }

    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// One lexical document per chunk, titled by denotation.
    pub fn documents(&self) -> Vec<Document> {
        self.chunks.iter().map(Document::from_chunk).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use sift_walker::Language;

    fn file(path: &str, language: Language, content: String) -> SourceFile {
        SourceFile {
            path: PathBuf::from(path),
            language,
            content,
        }
    }

    #[test]
    fn chunks_keep_file_order() {
        let files = vec![
            file("b.txt", Language::Unknown, "row\n".repeat(120)),
            file("a.py", Language::Python, "x = 1\ny = 2\n".into()),
        ];
        let store = ChunkStore::from_files(&files, &ChunkingConfig::default()).unwrap();
        let keys: Vec<String> = store.chunks().iter().map(Chunk::denotation).collect();
        assert_eq!(keys, vec!["b.txt:1-50", "b.txt:51-100", "b.txt:101-120", "a.py:1-2"]);
    }

    #[test]
    fn documents_mirror_chunks() {
        let files = vec![file("m.py", Language::Python, "import os\n".into())];
        let store = ChunkStore::from_files(&files, &ChunkingConfig::default()).unwrap();
        let docs = store.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "m.py:1-1");
        assert_eq!(docs[0].content, "import os");
    }

    #[test]
    fn invalid_config_is_reported() {
        let files = vec![file("a.txt", Language::Unknown, "text\n".into())];
        let config = ChunkingConfig {
            naive_line_count: 5,
            naive_overlap: 7,
            ..ChunkingConfig::default()
        };
        assert!(ChunkStore::from_files(&files, &config).is_err());
        assert!(ChunkStore::default().is_empty());
    }
}
