//! Syntax-aware span chunking using tree-sitter.
//!
//! Files with a grammar are split along their syntax tree into spans of at
//! most `max_chars` bytes, small neighbours are coalesced, and the result is
//! mapped onto whole lines. Files without a grammar fall back to fixed line
//! windows. Every emitted chunk list covers each line of the file exactly
//! once.

use std::path::Path;
use std::sync::Arc;

use sift_core::{ChunkingConfig, SiftError};
use sift_walker::Language;
use tree_sitter::{Node, Parser, Tree};

use crate::chunk::{Chunk, Span};

/// Characters that, leading a span, attach it to the preceding chunk.
const CLOSERS: [char; 3] = [')', '}', ']'];

/// Chunk a file, picking the strategy from its extension.
///
/// Uses `max_chars` and `coalesce` for structural chunking and the naive
/// window defaults (50 lines, no overlap) for files without a grammar.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use sift_codelens::chunker::chunk;
///
/// let source = "def add(a, b):\n    return a + b\n\n\ndef sub(a, b):\n    return a - b\n";
/// let chunks = chunk(source, Path::new("calc.py"), 2000, 80);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!((chunks[0].start(), chunks[0].end()), (1, 6));
/// ```
pub fn chunk(content: &str, path: &Path, max_chars: usize, coalesce: usize) -> Vec<Chunk> {
    let config = ChunkingConfig {
        max_chars,
        coalesce,
        ..ChunkingConfig::default()
    };
    // default naive settings are always valid
    chunk_file(path, content, Language::from_path(path), &config).unwrap_or_default()
}

/// Chunk a file with explicit language and configuration.
///
/// Parse failures never propagate: a grammar that cannot be loaded or a parse
/// that yields no tree falls back to line windows. An empty file yields no
/// chunks.
///
/// # Errors
///
/// Returns [`SiftError::Config`] if `naive_overlap >= naive_line_count`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use sift_core::ChunkingConfig;
/// use sift_codelens::chunker::chunk_file;
/// use sift_walker::Language;
///
/// let text = (1..=120).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
/// let chunks = chunk_file(Path::new("notes.txt"), &text, Language::Unknown, &ChunkingConfig::default()).unwrap();
/// let ranges: Vec<_> = chunks.iter().map(|c| (c.start(), c.end())).collect();
/// assert_eq!(ranges, vec![(1, 50), (51, 100), (101, 120)]);
/// ```
pub fn chunk_file(
    path: &Path,
    content: &str,
    language: Language,
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>, SiftError> {
    validate_window(config.naive_line_count, config.naive_overlap)?;

    let lines = LineIndex::new(content);
    if lines.count() == 0 {
        return Ok(Vec::new());
    }
    let shared: Arc<str> = Arc::from(content);

    let line_spans = match language
        .tree_sitter_language()
        .and_then(|grammar| parse(path, content, &grammar))
    {
        Some(tree) => {
            let spans = chunk_tree(&tree, content, config.max_chars, config.coalesce);
            // 0-indexed inclusive → 1-indexed inclusive
            spans
                .into_iter()
                .map(|s| Span::new(s.start + 1, (s.end + 1).min(lines.count())))
                .collect()
        }
        None => naive_chunk_spans(
            lines.count(),
            config.naive_line_count,
            config.naive_overlap,
        )?,
    };

    tracing::debug!(
        path = %path.display(),
        chunks = line_spans.len(),
        structural = language.tree_sitter_language().is_some(),
        "file chunked"
    );

    Ok(line_spans
        .into_iter()
        .map(|s| Chunk::new(shared.clone(), path.to_path_buf(), s.start, s.end, language))
        .collect())
}

fn parse(path: &Path, content: &str, grammar: &tree_sitter::Language) -> Option<Tree> {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(grammar) {
        tracing::warn!(path = %path.display(), error = %e, "grammar rejected, using line windows");
        return None;
    }
    let tree = parser.parse(content, None);
    if tree.is_none() {
        tracing::warn!(path = %path.display(), "parser produced no tree, using line windows");
    }
    tree
}

/// Split `code` into windows of `line_count` lines sharing `overlap` lines.
///
/// # Errors
///
/// Returns [`SiftError::Config`] if `overlap >= line_count`.
///
/// # Examples
///
/// ```
/// use sift_codelens::chunker::naive_chunker;
///
/// let code = "a\nb\nc\nd\ne";
/// assert_eq!(naive_chunker(code, 3, 1).unwrap(), vec!["a\nb\nc", "c\nd\ne", "e"]);
/// assert!(naive_chunker(code, 30, 30).is_err());
/// ```
pub fn naive_chunker(code: &str, line_count: usize, overlap: usize) -> Result<Vec<String>, SiftError> {
    let lines: Vec<&str> = code.lines().collect();
    Ok(naive_chunk_spans(lines.len(), line_count, overlap)?
        .into_iter()
        .map(|s| lines[s.start - 1..s.end].join("\n"))
        .collect())
}

/// Window line ranges (1-indexed, inclusive) for a file of `total` lines.
///
/// # Errors
///
/// Returns [`SiftError::Config`] if `overlap >= line_count`.
pub fn naive_chunk_spans(
    total: usize,
    line_count: usize,
    overlap: usize,
) -> Result<Vec<Span>, SiftError> {
    validate_window(line_count, overlap)?;
    let step = line_count - overlap;
    Ok((0..total)
        .step_by(step)
        .map(|start| Span::new(start + 1, (start + line_count).min(total)))
        .collect())
}

fn validate_window(line_count: usize, overlap: usize) -> Result<(), SiftError> {
    if overlap >= line_count {
        return Err(SiftError::Config(format!(
            "overlap ({overlap}) must be smaller than line_count ({line_count})"
        )));
    }
    Ok(())
}

/// Structural chunking of a parsed file.
///
/// Returns 0-indexed inclusive line spans. The first span starts at line 0
/// and consecutive spans are contiguous. The last span may end one past the
/// final line index.
pub fn chunk_tree(tree: &Tree, source: &str, max_chars: usize, coalesce: usize) -> Vec<Span> {
    let root = tree.root_node();
    let lines = LineIndex::new(source);
    let total = root.end_byte().max(source.len());

    let spans = build_spans(root, max_chars);
    if spans.is_empty() {
        return Vec::new();
    }
    if spans.len() < 2 {
        return vec![Span::new(0, lines.line_of(total))];
    }

    let spans = fill_gaps(spans, total);
    let spans = coalesce_spans(&spans, source, coalesce);
    if spans.is_empty() {
        return Vec::new();
    }
    let line_spans = to_line_spans(&spans, &lines);
    drop_degenerate(line_spans, coalesce)
}

/// Depth-first span building: children are packed into spans of at most
/// `max_chars` bytes, oversized children are split recursively.
pub(crate) fn build_spans(node: Node, max_chars: usize) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut current = Span::empty(node.start_byte());
    let mut cursor = node.walk();

    for child in node.children(&mut cursor) {
        let child_span = Span::new(child.start_byte(), child.end_byte());
        if child_span.len() > max_chars {
            spans.push(current);
            spans.extend(build_spans(child, max_chars));
            current = Span::empty(child_span.end);
        } else if current.extend(child_span).len() > max_chars {
            spans.push(current);
            current = child_span;
        } else {
            current = current.extend(child_span);
        }
    }

    spans.push(current);
    spans
}

/// Stretch every span to the start of its successor and the last one to `total`.
pub(crate) fn fill_gaps(mut spans: Vec<Span>, total: usize) -> Vec<Span> {
    for i in 0..spans.len().saturating_sub(1) {
        spans[i].end = spans[i + 1].start;
    }
    if let Some(last) = spans.last_mut() {
        last.end = total;
    }
    spans
}

/// Merge small spans until each holds more than `coalesce` non-whitespace
/// characters across at least one newline. Spans opening with a closing
/// delimiter join the previous chunk.
pub(crate) fn coalesce_spans(spans: &[Span], source: &str, coalesce: usize) -> Vec<Span> {
    let mut merged: Vec<Span> = Vec::new();
    let mut current = Span::empty(0);

    for &span in spans {
        current = current.extend(span);
        let text = current.text(source);
        let opens_with_closer = text
            .trim()
            .chars()
            .next()
            .is_some_and(|c| CLOSERS.contains(&c));

        if let Some(prev) = merged.last_mut().filter(|_| opens_with_closer) {
            *prev = prev.extend(span);
            current = Span::empty(span.end);
        } else if non_whitespace_len(text) > coalesce && text.contains('\n') {
            merged.push(current);
            current = Span::empty(span.end);
        }
    }

    if !current.is_empty() {
        merged.push(current);
    }
    merged
}

fn to_line_spans(spans: &[Span], lines: &LineIndex) -> Vec<Span> {
    let Some((first, rest)) = spans.split_first() else {
        return Vec::new();
    };

    let mut line_spans = vec![Span::new(0, lines.line_of(first.end))];
    for span in rest {
        let start = lines.line_of(span.start) + 1;
        let end = lines.line_of(span.end);
        line_spans.push(Span::new(start, start.max(end)));
    }
    line_spans
}

/// Drop zero-length line spans and fold a short tail into its predecessor.
///
/// Survivors are stretched over the lines of dropped spans, so the result
/// still starts at line 0 and ends where the input ended.
fn drop_degenerate(line_spans: Vec<Span>, coalesce: usize) -> Vec<Span> {
    let Some(last_line) = line_spans.last().map(|s| s.end) else {
        return Vec::new();
    };

    let mut kept: Vec<Span> = line_spans.into_iter().filter(|s| !s.is_empty()).collect();
    if kept.is_empty() {
        return vec![Span::new(0, last_line)];
    }

    for i in 1..kept.len() {
        kept[i - 1].end = kept[i].start - 1;
    }
    kept[0].start = 0;
    if let Some(last) = kept.last_mut() {
        last.end = last.end.max(last_line);
    }

    if kept.len() > 1 && kept.last().is_some_and(|last| last.len() < coalesce) {
        if let Some(last) = kept.pop() {
            if let Some(prev) = kept.last_mut() {
                *prev = prev.extend(last);
            }
        }
    }
    kept
}

fn non_whitespace_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Byte offset → 0-indexed line lookups.
struct LineIndex {
    newlines: Vec<usize>,
    count: usize,
    len: usize,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        Self {
            newlines: source
                .bytes()
                .enumerate()
                .filter_map(|(i, b)| (b == b'\n').then_some(i))
                .collect(),
            count: source.lines().count(),
            len: source.len(),
        }
    }

    fn count(&self) -> usize {
        self.count
    }

    /// Index of the line holding `offset`; offsets at or past the end map to
    /// the line count.
    fn line_of(&self, offset: usize) -> usize {
        if offset >= self.len {
            return self.count;
        }
        self.newlines.partition_point(|&nl| nl < offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;
    use std::path::PathBuf;

    use proptest::prelude::*;

    fn parse_python(source: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&Language::Python.tree_sitter_language().unwrap())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    fn python_function(name: &str, statements: usize) -> String {
        let mut body = format!("def {name}(items, options=None):\n");
        for i in 0..statements {
            writeln!(
                body,
                "    value_{i} = compute_{name}(items[{i}], options, threshold={i})"
            )
            .unwrap();
        }
        body.push_str("    return value_0\n");
        body
    }

    /// Python module: `sizes[i]` statements per function, blank lines between.
    fn python_module(sizes: &[usize]) -> String {
        let mut source = String::from("import os\nimport sys\n\n");
        for (i, &n) in sizes.iter().enumerate() {
            source.push_str(&python_function(&format!("handler_{i}"), n));
            source.push_str("\n\n");
        }
        source
    }

    fn assert_covers(chunks: &[Chunk], total_lines: usize) {
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].start(), 1, "first chunk must start at line 1");
        for pair in chunks.windows(2) {
            assert_eq!(
                pair[1].start(),
                pair[0].end() + 1,
                "gap or overlap between {} and {}",
                pair[0],
                pair[1]
            );
        }
        for c in chunks {
            assert!(c.start() <= c.end(), "inverted chunk {c}");
        }
        assert_eq!(chunks.last().unwrap().end(), total_lines);
    }

    #[test]
    fn naive_rejects_overlap_equal_to_window() {
        let err = naive_chunker("a\nb\nc", 30, 30).unwrap_err();
        assert!(matches!(err, SiftError::Config(_)));
        assert!(naive_chunker("a\nb\nc", 30, 15).is_ok());
    }

    #[test]
    fn naive_windows_overlap_and_stop_at_end() {
        let spans = naive_chunk_spans(100, 30, 15).unwrap();
        let ranges: Vec<_> = spans.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(
            ranges,
            vec![(1, 30), (16, 45), (31, 60), (46, 75), (61, 90), (76, 100), (91, 100)]
        );
        assert!(naive_chunk_spans(0, 50, 0).unwrap().is_empty());
    }

    #[test]
    fn invalid_window_config_fails_even_with_a_grammar() {
        let config = ChunkingConfig {
            naive_line_count: 10,
            naive_overlap: 10,
            ..ChunkingConfig::default()
        };
        let result = chunk_file(Path::new("a.py"), "x = 1\n", Language::Python, &config);
        assert!(matches!(result, Err(SiftError::Config(_))));
    }

    #[test]
    fn unknown_extension_uses_line_windows() {
        let text = "key = value\n".repeat(60);
        let chunks = chunk(&text, Path::new("settings.ini"), 2000, 80);
        let ranges: Vec<_> = chunks.iter().map(|c| (c.start(), c.end())).collect();
        assert_eq!(ranges, vec![(1, 50), (51, 60)]);
    }

    #[test]
    fn empty_file_has_no_chunks() {
        assert!(chunk("", Path::new("empty.py"), 2000, 80).is_empty());
    }

    #[test]
    fn step_one_spans_respect_budget() {
        let source = python_module(&[3, 40, 5, 12, 2, 60]);
        let tree = parse_python(&source);
        for span in build_spans(tree.root_node(), 600) {
            assert!(span.len() <= 600, "span {span:?} exceeds budget");
        }
    }

    #[test]
    fn gap_filling_makes_spans_contiguous() {
        let spans = vec![Span::new(0, 5), Span::new(8, 12), Span::new(15, 20)];
        let filled = fill_gaps(spans, 25);
        assert_eq!(filled, vec![Span::new(0, 8), Span::new(8, 15), Span::new(15, 25)]);
    }

    #[test]
    fn closing_brace_joins_previous_chunk() {
        let source = "fn a() {\n    let alpha = compute_something(1, 2, 3);\n    let beta = 4;\n\n}\nfn b() {}\n";
        let close = source.find("}\n").unwrap();
        let spans = vec![
            Span::new(0, close - 2),
            Span::new(close - 2, close + 2),
            Span::new(close + 2, source.len()),
        ];
        let merged = coalesce_spans(&spans, source, 20);
        assert_eq!(merged[0], Span::new(0, close + 2));
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn short_spans_accumulate_until_threshold() {
        let source = "a = 1\nb = 2\nc = 3\nd = 4\n";
        let spans: Vec<Span> = (0..4).map(|i| Span::new(i * 6, i * 6 + 6)).collect();
        let merged = coalesce_spans(&spans, source, 5);
        // "a = 1\nb = 2\n" holds 6 non-whitespace characters
        assert_eq!(merged, vec![Span::new(0, 12), Span::new(12, 24)]);
    }

    #[test]
    fn degenerate_line_spans_are_absorbed() {
        let spans = vec![Span::new(0, 4), Span::new(5, 5), Span::new(6, 9)];
        assert_eq!(
            drop_degenerate(spans, 1),
            vec![Span::new(0, 5), Span::new(6, 9)]
        );
    }

    #[test]
    fn short_tail_merges_into_previous() {
        let spans = vec![Span::new(0, 100), Span::new(101, 200), Span::new(201, 210)];
        assert_eq!(
            drop_degenerate(spans, 80),
            vec![Span::new(0, 100), Span::new(101, 210)]
        );
    }

    #[test]
    fn line_index_maps_offsets() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.count(), 4);
        assert_eq!(index.line_of(0), 0);
        assert_eq!(index.line_of(2), 0);
        assert_eq!(index.line_of(3), 1);
        assert_eq!(index.line_of(6), 2);
        assert_eq!(index.line_of(8), 3);
        assert_eq!(index.line_of(9), 4);
        assert_eq!(index.line_of(100), 4);
    }

    #[test]
    fn oversized_function_in_long_python_file_is_isolated() {
        // ~500 lines: small helpers around one function well over 2000 bytes
        let mut sizes = vec![4; 30];
        sizes.insert(15, 60);
        let mut source = python_module(&sizes);
        while source.lines().count() < 500 {
            source.push_str("CONSTANT_VALUE = 42  # padding\n");
        }
        let total = source.lines().count();

        let big = python_function("handler_15", 60);
        assert!(big.len() > 2000);
        let big_start = source[..source.find("def handler_15").unwrap()].lines().count() + 1;
        let big_end = big_start + big.lines().count() - 1;

        let chunks = chunk(&source, Path::new("service.py"), 2000, 80);
        assert!(chunks.len() >= 2, "got {} chunks", chunks.len());
        assert_covers(&chunks, total);

        let holders: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.start() <= big_end && c.end() >= big_start)
            .collect();
        assert!(
            holders.len() >= 2,
            "oversized function should be split across its own chunks"
        );
        // no chunk spills beyond the oversized function into both neighbours
        for c in &holders {
            assert!(
                !(c.start() < big_start && c.end() > big_end),
                "chunk {c} swallows the whole oversized function"
            );
        }
    }

    #[test]
    fn chunks_share_file_content() {
        let source = python_module(&[30, 30, 30]);
        let chunks = chunk(&source, Path::new("m.py"), 800, 80);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.content() == source));
        assert_eq!(chunks[0].source(), PathBuf::from("m.py").as_path());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn structural_chunks_cover_every_line_once(
            sizes in proptest::collection::vec(0usize..40, 1..12),
            max_chars in 200usize..2500,
            coalesce in 10usize..120,
        ) {
            let source = python_module(&sizes);
            let config = ChunkingConfig { max_chars, coalesce, ..ChunkingConfig::default() };
            let chunks = chunk_file(Path::new("gen.py"), &source, Language::Python, &config).unwrap();
            assert_covers(&chunks, source.lines().count());
        }

        #[test]
        fn coalescing_is_idempotent(
            sizes in proptest::collection::vec(0usize..25, 1..10),
            max_chars in 150usize..1500,
            coalesce in 10usize..150,
        ) {
            let source = python_module(&sizes);
            let tree = parse_python(&source);
            let spans = build_spans(tree.root_node(), max_chars);
            let filled = fill_gaps(spans, source.len());
            let once = coalesce_spans(&filled, &source, coalesce);
            let twice = coalesce_spans(&once, &source, coalesce);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn step_one_spans_never_exceed_budget(
            sizes in proptest::collection::vec(0usize..40, 1..8),
            max_chars in 120usize..2000,
        ) {
            let source = python_module(&sizes);
            let tree = parse_python(&source);
            for span in build_spans(tree.root_node(), max_chars) {
                prop_assert!(span.len() <= max_chars);
            }
        }
    }
}
