use std::collections::HashMap;
use std::path::{Path, PathBuf};

use sift_core::{SiftError, WalkerConfig};

use crate::language::Language;

/// Directory names that are never descended into, at any depth.
const PRUNED_DIRS: &[&str] = &[".git", "node_modules", ".venv", "venv", "build", "dist", "patch"];

/// A source file discovered during repository walking.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use sift_walker::{Language, SourceFile};
///
/// let file = SourceFile {
///     path: PathBuf::from("src/main.rs"),
///     language: Language::Rust,
///     content: "fn main() {}".to_string(),
/// };
/// assert_eq!(file.language, Language::Rust);
/// ```
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Detected programming language (`Unknown` files are still returned).
    pub language: Language,
    /// Full file content.
    pub content: String,
}

/// Why a candidate file was left out of the walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    ExcludedDir,
    ExcludedExtension,
    SkipPattern,
    TooSmall,
    TooLarge,
    CrowdedDir,
    Binary,
    NotUtf8,
    LongLines,
    Unreadable,
}

/// Walk a repository, returning the text files worth chunking.
///
/// `.gitignore` rules are honoured. On top of them the walker applies, in
/// order: directory exclusion, suffix exclusion, `skip_patterns` globs, byte
/// size bounds, the per-directory fan-out cap, a NUL-byte binary check, UTF-8
/// decoding and the mean line length limit. Rejected files are logged at
/// `debug` (`warn` for undecodable ones) and never abort the walk.
///
/// Returned paths are relative to `root` and sorted.
///
/// # Errors
///
/// Returns [`SiftError::FileAccess`] if `root` is not a readable directory, or
/// [`SiftError::Config`] if a skip pattern is not a valid glob.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use sift_core::WalkerConfig;
/// use sift_walker::walk_repo;
///
/// let files = walk_repo(Path::new("."), &WalkerConfig::default()).unwrap();
/// for f in &files {
///     println!("{}: {:?}", f.path.display(), f.language);
/// }
/// ```
pub fn walk_repo(root: &Path, config: &WalkerConfig) -> Result<Vec<SourceFile>, SiftError> {
    if !root.is_dir() {
        return Err(SiftError::FileAccess {
            path: root.to_path_buf(),
            reason: "not a directory".into(),
        });
    }

    let skip_patterns = config
        .skip_patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p)
                .map_err(|e| SiftError::Config(format!("invalid skip pattern {p:?}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let walker = ignore::WalkBuilder::new(root)
        .filter_entry(|entry| {
            let is_dir = entry.depth() > 0 && entry.file_type().is_some_and(|t| t.is_dir());
            !(is_dir
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| PRUNED_DIRS.contains(&name)))
        })
        .build();

    let mut dir_sizes: HashMap<PathBuf, usize> = HashMap::new();
    let mut files = Vec::new();
    let mut skipped = 0usize;

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!(error = %e, "walk entry error");
                continue;
            }
        };

        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }

        let path = entry.path();
        let relative = match path.strip_prefix(root) {
            Ok(r) => r.to_path_buf(),
            Err(_) => path.to_path_buf(),
        };

        match load_file(path, &relative, config, &skip_patterns, &mut dir_sizes) {
            Ok(content) => files.push(SourceFile {
                language: Language::from_path(&relative),
                path: relative,
                content,
            }),
            Err(reason) => {
                skipped += 1;
                if reason == Skip::NotUtf8 {
                    tracing::warn!(path = %relative.display(), "skipping file that is not valid UTF-8");
                } else {
                    tracing::debug!(path = %relative.display(), ?reason, "skipping file");
                }
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::info!(files = files.len(), skipped, root = %root.display(), "repository walked");
    Ok(files)
}

fn load_file(
    path: &Path,
    relative: &Path,
    config: &WalkerConfig,
    skip_patterns: &[glob::Pattern],
    dir_sizes: &mut HashMap<PathBuf, usize>,
) -> Result<String, Skip> {
    if config
        .exclude_dirs
        .iter()
        .any(|dir| relative.starts_with(dir))
    {
        return Err(Skip::ExcludedDir);
    }

    let name = relative
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if config.exclude_exts.iter().any(|ext| name.ends_with(ext.as_str())) {
        return Err(Skip::ExcludedExtension);
    }

    if skip_patterns.iter().any(|p| p.matches_path(relative)) {
        return Err(Skip::SkipPattern);
    }

    let size = std::fs::metadata(path).map_err(|_| Skip::Unreadable)?.len();
    if size < config.min_file_bytes {
        return Err(Skip::TooSmall);
    }
    if size > config.max_file_bytes {
        return Err(Skip::TooLarge);
    }

    if let Some(parent) = path.parent() {
        let count = *dir_sizes
            .entry(parent.to_path_buf())
            .or_insert_with(|| count_files(parent));
        if count > config.max_dir_files {
            return Err(Skip::CrowdedDir);
        }
    }

    let bytes = std::fs::read(path).map_err(|_| Skip::Unreadable)?;
    if bytes.contains(&0) {
        return Err(Skip::Binary);
    }

    let content = String::from_utf8(bytes).map_err(|_| Skip::NotUtf8)?;

    let line_count = content.split('\n').count();
    if content.len() > config.max_avg_line_length.saturating_mul(line_count) {
        return Err(Skip::LongLines);
    }

    Ok(content)
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
                .count()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn paths(files: &[SourceFile]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.path.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn make_temp_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {\n    run();\n}\n").unwrap();
        fs::write(root.join("src/app.py"), "def hello():\n    return 1\n").unwrap();
        fs::write(root.join("Makefile"), "all:\n\tcargo build --release\n").unwrap();

        fs::write(root.join("README.md"), "# Hello world, this is a readme").unwrap();
        fs::write(root.join("Cargo.lock"), "# generated lock file contents").unwrap();
        fs::write(root.join("bundle.min.js"), "var a=1;var b=2;var c=3;").unwrap();

        dir
    }

    #[test]
    fn walk_keeps_source_and_unknown_text_files() {
        let dir = make_temp_repo();
        let files = walk_repo(dir.path(), &WalkerConfig::default()).unwrap();

        assert_eq!(paths(&files), vec!["Makefile", "src/app.py", "src/main.rs"]);
        assert_eq!(files[0].language, Language::Unknown);
        assert_eq!(files[1].language, Language::Python);
        assert_eq!(files[2].language, Language::Rust);
    }

    #[test]
    fn walk_prunes_dependency_dirs_at_any_depth() {
        let dir = make_temp_repo();
        let root = dir.path();
        fs::create_dir_all(root.join("web/node_modules/left-pad")).unwrap();
        fs::write(
            root.join("web/node_modules/left-pad/index.js"),
            "module.exports = function pad() {};",
        )
        .unwrap();
        fs::create_dir_all(root.join("tools/venv/lib")).unwrap();
        fs::write(root.join("tools/venv/lib/site.py"), "import sys\nprint(sys.path)\n").unwrap();
        fs::create_dir_all(root.join("web/dist")).unwrap();
        fs::write(root.join("web/app.js"), "export const app = () => 1;\n").unwrap();
        fs::write(root.join("web/dist/bundle.js"), "export const app = () => 1;\n").unwrap();

        let files = walk_repo(root, &WalkerConfig::default()).unwrap();
        let walked = paths(&files);
        assert!(walked.contains(&"web/app.js".to_string()), "{walked:?}");
        for p in walked {
            assert!(!p.contains("node_modules"), "pruned dir leaked: {p}");
            assert!(!p.contains("venv"), "pruned dir leaked: {p}");
            assert!(!p.contains("dist/"), "pruned dir leaked: {p}");
        }
    }

    #[test]
    fn excluded_dir_matches_whole_components_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::write(root.join("dist/out.js"), "console.log('bundled output');").unwrap();
        fs::write(root.join("distance.py"), "def distance(a, b):\n    return b - a\n").unwrap();

        let files = walk_repo(root, &WalkerConfig::default()).unwrap();
        assert_eq!(paths(&files), vec!["distance.py"]);
    }

    #[test]
    fn walk_respects_gitignore() {
        let dir = make_temp_repo();
        let root = dir.path();

        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join("generated/out.rs"), "fn ignored() {}\n").unwrap();
        fs::write(root.join(".gitignore"), "generated/\n").unwrap();

        let files = walk_repo(root, &WalkerConfig::default()).unwrap();
        assert!(paths(&files).iter().all(|p| !p.starts_with("generated")));
    }

    #[test]
    fn walk_skips_binary_and_non_utf8_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        let mut binary = b"fn main() { ".to_vec();
        binary.push(0);
        binary.extend_from_slice(b" }");
        fs::write(root.join("binary.rs"), &binary).unwrap();
        fs::write(root.join("latin1.py"), b"name = 'caf\xe9 au lait'\n").unwrap();
        fs::write(root.join("normal.rs"), "fn normal() {}\n").unwrap();

        let files = walk_repo(root, &WalkerConfig::default()).unwrap();
        assert_eq!(paths(&files), vec!["normal.rs"]);
    }

    #[test]
    fn walk_applies_size_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::write(root.join("tiny.rs"), "fn a(){}").unwrap();
        fs::write(root.join("huge.rs"), "// padding\n".repeat(30_000)).unwrap();
        fs::write(root.join("ok.rs"), "fn ok() {}\n").unwrap();

        let files = walk_repo(root, &WalkerConfig::default()).unwrap();
        assert_eq!(paths(&files), vec!["ok.rs"]);
    }

    #[test]
    fn walk_skips_minified_looking_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::write(root.join("packed.js"), "x".repeat(5_000)).unwrap();
        fs::write(root.join("plain.js"), "const x = 1;\nconst y = 2;\n").unwrap();

        let files = walk_repo(root, &WalkerConfig::default()).unwrap();
        assert_eq!(paths(&files), vec!["plain.js"]);
    }

    #[test]
    fn average_line_length_is_not_rounded_down() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        // 401 bytes over two lines: 200.5 per line
        fs::write(root.join("over.js"), format!("{}\n", "x".repeat(400))).unwrap();
        // 400 bytes over two lines: exactly at the limit
        fs::write(root.join("at.js"), format!("{}\n", "x".repeat(399))).unwrap();

        let files = walk_repo(root, &WalkerConfig::default()).unwrap();
        assert_eq!(paths(&files), vec!["at.js"]);
    }

    #[test]
    fn walk_caps_directory_fan_out() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::create_dir_all(root.join("fixtures")).unwrap();
        for i in 0..6 {
            fs::write(
                root.join(format!("fixtures/case_{i}.py")),
                format!("CASE = {i}\nEXPECTED = {i}\n"),
            )
            .unwrap();
        }
        fs::write(root.join("main.py"), "print('entry point')\n").unwrap();

        let config = WalkerConfig {
            max_dir_files: 5,
            ..WalkerConfig::default()
        };
        let files = walk_repo(root, &config).unwrap();
        assert_eq!(paths(&files), vec!["main.py"]);
    }

    #[test]
    fn skip_patterns_filter_paths() {
        let dir = make_temp_repo();
        let config = WalkerConfig {
            skip_patterns: vec!["src/*.py".into()],
            ..WalkerConfig::default()
        };
        let files = walk_repo(dir.path(), &config).unwrap();
        assert!(!paths(&files).contains(&"src/app.py".to_string()));
        assert!(paths(&files).contains(&"src/main.rs".to_string()));
    }

    #[test]
    fn invalid_skip_pattern_is_config_error() {
        let dir = make_temp_repo();
        let config = WalkerConfig {
            skip_patterns: vec!["[".into()],
            ..WalkerConfig::default()
        };
        let err = walk_repo(dir.path(), &config).unwrap_err();
        assert!(matches!(err, SiftError::Config(_)));
    }

    #[test]
    fn missing_root_is_file_access_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = walk_repo(&dir.path().join("nope"), &WalkerConfig::default()).unwrap_err();
        assert!(matches!(err, SiftError::FileAccess { .. }));
    }
}
