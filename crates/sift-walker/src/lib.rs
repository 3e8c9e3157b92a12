//! Repository traversal and file filtering.
//!
//! [`walk_repo`] turns a directory tree into the list of text files worth
//! chunking, and [`Language`] maps file extensions to tree-sitter grammars.

mod language;
mod walker;

pub use language::Language;
pub use walker::{walk_repo, SourceFile};
