//! Core types, configuration, and error handling for sift.
//!
//! This crate provides the shared foundation used by the other sift crates:
//! - [`SiftError`]: unified error type using `thiserror`
//! - [`SiftConfig`]: configuration loaded from `.sift.toml`
//! - Shared output types: [`SearchResult`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    ChunkingConfig, EmbeddingConfig, LexicalConfig, RankingConfig, SiftConfig, WalkerConfig,
};
pub use error::SiftError;
pub use types::{OutputFormat, SearchResult};

/// A convenience `Result` type for sift operations.
pub type Result<T> = std::result::Result<T, SiftError>;
