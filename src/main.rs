use std::io::IsTerminal;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use sift_codelens::chunk::Chunk;
use sift_codelens::embedding::EmbeddingClient;
use sift_codelens::ranker::RankedChunk;
use sift_codelens::search::Retriever;
use sift_core::{OutputFormat, SiftConfig};
use sift_walker::Language;

#[derive(Parser)]
#[command(
    name = "sift",
    version,
    about = "Syntax-aware code chunking and hybrid retrieval",
    long_about = "Sift splits a repository into syntax-aware chunks and ranks them against a\n\
                   query or a diff, blending BM25 keyword scores with embedding similarity.\n\n\
                   Examples:\n  \
                     sift search 'retry with backoff'       Hybrid search in the current repo\n  \
                     git diff main | sift search --diff     Find code related to a diff\n  \
                     sift search 'parse config' --lexical-only   Keyword search, no API calls\n  \
                     sift chunk src/main.rs                 Show how a file is chunked\n  \
                     sift init                              Write a default .sift.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .sift.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable listing (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Log pipeline stages to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Rank repository chunks against a query or a diff
    #[command(long_about = "Rank repository chunks against a query or a diff.\n\n\
        Walks the repository, chunks every accepted file along syntax boundaries, and\n\
        scores the chunks with BM25 plus embedding similarity. Without an embedding\n\
        API key, pass --lexical-only.\n\n\
        Examples:\n  sift search 'token refresh'\n  sift search --diff-file changes.patch --top-k 5\n  git diff | sift search --diff")]
    Search {
        /// Search query
        #[arg(required_unless_present_any = ["diff_file", "diff"])]
        query: Option<String>,

        /// Use the contents of a diff file as the query
        #[arg(long, conflicts_with_all = ["query", "diff"])]
        diff_file: Option<PathBuf>,

        /// Read a diff from stdin and use it as the query
        #[arg(long, conflicts_with = "query")]
        diff: bool,

        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,

        /// Number of chunks to return (default: from config, 10)
        #[arg(long)]
        top_k: Option<usize>,

        /// Byte budget per structural chunk (default: from config, 2000)
        #[arg(long)]
        max_chars: Option<usize>,

        /// Minimum non-whitespace characters per chunk (default: from config, 80)
        #[arg(long)]
        coalesce: Option<usize>,

        /// Skip embeddings and rank by keyword score only
        #[arg(long)]
        lexical_only: bool,
    },
    /// Show the chunks of a single file
    Chunk {
        /// File to chunk
        file: PathBuf,

        /// Byte budget per structural chunk (default: from config, 2000)
        #[arg(long)]
        max_chars: Option<usize>,

        /// Minimum non-whitespace characters per chunk (default: from config, 80)
        #[arg(long)]
        coalesce: Option<usize>,
    },
    /// Create a default .sift.toml configuration file
    Init,
}

const DEFAULT_CONFIG: &str = r#"# sift configuration

[chunking]
max_chars = 2000
coalesce = 80
# fallback line windows for files without a grammar
naive_line_count = 50
naive_overlap = 0

[walker]
min_file_bytes = 10
max_file_bytes = 240000
# directories holding more files than this are treated as generated
max_dir_files = 240
max_avg_line_length = 200
# skip_patterns = ["**/fixtures/**", "*.generated.ts"]

[embedding]
provider = "openai"  # OpenAI-compatible API; use base_url for other servers
model = "text-embedding-3-small"
# api_key = "sk-..."  # or SIFT_EMBEDDING_API_KEY / OPENAI_API_KEY
# base_url = "http://localhost:11434/v1"
batch_size = 64
concurrency = 4
max_retries = 5
query_token_limit = 8191

[lexical]
k1 = 1.2
b = 0.75

[ranking]
top_k = 10
default_vector_score = 0.04
vector_weight = 3.5
vector_only_factor = 0.02
"#;

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SiftConfig> {
    match path {
        Some(path) => SiftConfig::from_file(path)
            .wrap_err_with(|| format!("failed to load {}", path.display())),
        None => {
            let default_path = Path::new(".sift.toml");
            if default_path.exists() {
                Ok(SiftConfig::from_file(default_path)?)
            } else {
                Ok(SiftConfig::default())
            }
        }
    }
}

fn read_query(query: Option<String>, diff_file: Option<&Path>, diff: bool) -> Result<String> {
    let text = if let Some(file) = diff_file {
        std::fs::read_to_string(file)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read diff from {}", file.display()))?
    } else if diff {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .into_diagnostic()
            .wrap_err("failed to read diff from stdin")?;
        buf
    } else {
        query.unwrap_or_default()
    };

    if text.trim().is_empty() {
        miette::bail!(miette::miette!(
            help = "pass a query, --diff-file <FILE>, or pipe a diff with --diff",
            "empty query"
        ));
    }
    Ok(text)
}

fn spinner(message: &str) -> Option<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    if let Ok(style) = indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

fn print_results(results: &[RankedChunk], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let out: Vec<_> = results.iter().map(RankedChunk::to_search_result).collect();
            println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            if results.is_empty() {
                println!("No results found.");
                return Ok(());
            }
            println!("# Search Results\n");
            for (i, r) in results.iter().enumerate() {
                println!(
                    "## {}. `{}` (score: {:.4})\n\n```{}\n{}\n```\n",
                    i + 1,
                    r.chunk.denotation(),
                    r.score,
                    r.chunk.language().name(),
                    r.chunk.snippet(true, true),
                );
            }
        }
        OutputFormat::Text => {
            if results.is_empty() {
                println!("No results found.");
                return Ok(());
            }
            for (i, r) in results.iter().enumerate() {
                let lexical = r
                    .lexical_score
                    .map_or_else(|| "-".to_string(), |s| format!("{s:.3}"));
                println!(
                    "{}. {} (score: {:.4}, lexical: {lexical}, vector: {:.3})",
                    i + 1,
                    r.chunk.denotation(),
                    r.score,
                    r.vector_score,
                );
                let preview: String = r
                    .chunk
                    .snippet(false, true)
                    .lines()
                    .take(3)
                    .map(|l| format!("   {l}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                println!("{preview}\n");
            }
        }
    }
    Ok(())
}

fn print_chunks(chunks: &[Chunk], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let out: Vec<_> = chunks
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "filePath": c.source(),
                        "lineStart": c.start(),
                        "lineEnd": c.end(),
                        "text": c.text(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
        }
        OutputFormat::Markdown => {
            println!("# Chunks\n");
            for c in chunks {
                println!(
                    "## `{}`\n\n```{}\n{}\n```\n",
                    c.denotation(),
                    c.language().name(),
                    c.snippet(false, true),
                );
            }
        }
        OutputFormat::Text => {
            for c in chunks {
                println!("── {} ──", c.denotation());
                println!("{}\n", c.snippet(false, true));
            }
            println!("{} chunks", chunks.len());
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Search {
            query,
            diff_file,
            diff,
            path,
            top_k,
            max_chars,
            coalesce,
            lexical_only,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(top_k) = top_k {
                config.ranking.top_k = top_k;
            }
            if let Some(max_chars) = max_chars {
                config.chunking.max_chars = max_chars;
            }
            if let Some(coalesce) = coalesce {
                config.chunking.coalesce = coalesce;
            }

            let query = read_query(query, diff_file.as_deref(), diff)?;

            let provider = if lexical_only {
                None
            } else {
                Some(EmbeddingClient::with_config(&config.embedding)?)
            };
            let retriever = Retriever::new(config, provider);

            let pb = spinner(&format!("Searching {} ...", path.display()));
            let results = retriever.retrieve(&path, &query).await.inspect_err(|_e| {
                if let Some(pb) = &pb {
                    pb.finish_and_clear();
                }
            })?;
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }

            print_results(&results, cli.format)?;
        }
        Command::Chunk {
            file,
            max_chars,
            coalesce,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(max_chars) = max_chars {
                config.chunking.max_chars = max_chars;
            }
            if let Some(coalesce) = coalesce {
                config.chunking.coalesce = coalesce;
            }

            let content = std::fs::read_to_string(&file)
                .into_diagnostic()
                .wrap_err_with(|| format!("failed to read {}", file.display()))?;
            let chunks = sift_codelens::chunker::chunk_file(
                &file,
                &content,
                Language::from_path(&file),
                &config.chunking,
            )?;
            print_chunks(&chunks, cli.format)?;
        }
        Command::Init => {
            let path = Path::new(".sift.toml");
            if path.exists() {
                miette::bail!(".sift.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .sift.toml with default configuration");
        }
    }

    Ok(())
}
