//! Spans and chunks.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use sift_walker::Language;

/// A half-open interval over byte offsets or line indices.
///
/// # Examples
///
/// ```
/// use sift_codelens::chunk::Span;
///
/// let a = Span::new(0, 10);
/// let b = Span::new(12, 30);
/// assert_eq!(a.extend(b), Span::new(0, 30));
/// assert_eq!(a.shift(5), Span::new(5, 15));
/// assert_eq!(b.len(), 18);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// An empty span at `at`.
    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Span from `self.start` to `other.end`.
    pub fn extend(self, other: Span) -> Span {
        Span::new(self.start, other.end)
    }

    /// Move both ends by `by`.
    pub fn shift(self, by: usize) -> Span {
        Span::new(self.start + by, self.end + by)
    }

    /// The text a byte span covers, or `""` if it does not fall on character
    /// boundaries of `source`.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or_default()
    }
}

/// A line window over a source file.
///
/// The chunk shares the whole file content and addresses its lines as a
/// 1-indexed inclusive range. It is immutable once built.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use std::sync::Arc;
/// use sift_codelens::chunk::Chunk;
/// use sift_walker::Language;
///
/// let content: Arc<str> = Arc::from("import os\n\ndef main():\n    print(os.getcwd())\n");
/// let chunk = Chunk::new(content, PathBuf::from("app/main.py"), 3, 4, Language::Python);
/// assert_eq!(chunk.denotation(), "app/main.py:3-4");
/// assert_eq!(chunk.text(), "def main():\n    print(os.getcwd())");
/// assert_eq!(chunk.snippet(true, true), "...\n3: def main():\n4:     print(os.getcwd())");
/// ```
#[derive(Debug, Clone)]
pub struct Chunk {
    content: Arc<str>,
    source: PathBuf,
    start: usize,
    end: usize,
    language: Language,
}

impl Chunk {
    /// Create a chunk covering lines `start..=end` (1-indexed) of `content`.
    pub fn new(
        content: Arc<str>,
        source: PathBuf,
        start: usize,
        end: usize,
        language: Language,
    ) -> Self {
        Self {
            content,
            source,
            start,
            end,
            language,
        }
    }

    /// Full text of the file this chunk belongs to.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// First line (1-indexed).
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last line (1-indexed, inclusive).
    pub fn end(&self) -> usize {
        self.end
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Number of lines in the whole file.
    pub fn file_lines(&self) -> usize {
        self.content.lines().count()
    }

    /// The `path:start-end` key used by every score map.
    pub fn denotation(&self) -> String {
        format!("{}:{}-{}", self.source.display(), self.start, self.end)
    }

    fn window(&self) -> impl Iterator<Item = (usize, &str)> {
        let skip = self.start.saturating_sub(1);
        let take = (self.end + 1).saturating_sub(self.start.max(1));
        self.content
            .lines()
            .enumerate()
            .skip(skip)
            .take(take)
            .map(|(i, line)| (i + 1, line))
    }

    /// Raw text of the chunk's lines.
    pub fn text(&self) -> String {
        self.window()
            .map(|(_, line)| line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Render the chunk for a prompt.
    ///
    /// With `add_line_numbers` every line is prefixed `"{n}: "`. With
    /// `add_ellipsis` a `...` line marks text cut before the first line or
    /// after the last one.
    pub fn snippet(&self, add_ellipsis: bool, add_line_numbers: bool) -> String {
        let mut snippet = self
            .window()
            .map(|(n, line)| {
                if add_line_numbers {
                    format!("{n}: {line}")
                } else {
                    line.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        if add_ellipsis {
            if self.start > 1 {
                snippet.insert_str(0, "...\n");
            }
            if self.end < self.file_lines() {
                snippet.push_str("\n...");
            }
        }
        snippet
    }

    /// SHA-256 of the chunk text, for deduplication.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.denotation())
    }
}
