//! Gitignore-aware file discovery.
//!
//! Walks a project root honoring `.gitignore`/`.ignore` files the same way a
//! developer's own tooling would, layering the index's own default excludes
//! and the user-controlled exclusion rules on top.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::config::IndexingConfig;
use crate::exclusions::ExclusionRules;
use crate::types::Language;

/// A file discovered by a scan, with enough metadata to decide whether it
/// needs (re-)indexing without reading its contents.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// Detected language, by extension.
    pub language: Language,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Last modification time, as a Unix timestamp.
    pub mtime: i64,
}

/// Walks `root`, yielding every file that passes the default excludes, the
/// size cap, the binary sniff, and the caller-supplied exclusion rules.
pub fn scan(
    root: &Path,
    indexing: &IndexingConfig,
    exclusions: &ExclusionRules,
) -> Vec<ScannedFile> {
    let mut builder = WalkBuilder::new(root);
    builder
        .follow_links(indexing.follow_symlinks)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true);

    let default_excludes = build_default_exclude_set(&indexing.exclude_patterns);

    let mut files = Vec::new();
    for entry in builder.build().filter_map(Result::ok) {
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_file() {
            continue;
        }
        let path = entry.path();

        if default_excludes.is_match(path) || exclusions.is_excluded(path) {
            continue;
        }

        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let size_bytes = metadata.len();
        if size_bytes > indexing.max_file_size {
            continue;
        }
        if size_bytes == 0 {
            continue;
        }
        if looks_binary(path) {
            continue;
        }

        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs() as i64);

        let language = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(Language::Unknown, Language::from_extension);

        files.push(ScannedFile {
            path: path.to_path_buf(),
            language,
            size_bytes,
            mtime,
        });
    }

    files
}

fn build_default_exclude_set(patterns: &[String]) -> globset::GlobSet {
    let mut builder = globset::GlobSetBuilder::new();
    for pattern in patterns {
        // Bare directory-name patterns (no glob metacharacters) match that
        // component anywhere in the path, mirroring how `.gitignore` treats
        // an unrooted name like `node_modules`.
        let expanded = if pattern.contains(['*', '?', '[']) {
            pattern.clone()
        } else {
            format!("**/{pattern}/**")
        };
        if let Ok(glob) = globset::Glob::new(&expanded) {
            builder.add(glob);
        }
        if let Ok(glob) = globset::Glob::new(pattern) {
            builder.add(glob);
        }
    }
    builder.build().unwrap_or_else(|_| globset::GlobSet::empty())
}

/// A crude but effective binary sniff: a NUL byte in the first 8 KiB means
/// "not text", matching the common heuristic used by diff tools and editors.
fn looks_binary(path: &Path) -> bool {
    use std::io::Read;
    let Ok(mut file) = std::fs::File::open(path) else {
        return false;
    };
    let mut buf = [0u8; 8192];
    let Ok(n) = file.read(&mut buf) else {
        return false;
    };
    buf[..n].contains(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_skips_excluded_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("node_modules/lib.js"), "module.exports = 1;").unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let indexing = IndexingConfig::default();
        let exclusions = ExclusionRules::default();
        let files = scan(dir.path(), &indexing, &exclusions);

        assert!(files.iter().any(|f| f.path.ends_with("main.rs")));
        assert!(!files.iter().any(|f| f.path.ends_with("lib.js")));
    }

    #[test]
    fn scan_skips_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), vec![b'a'; 128]).unwrap();

        let mut indexing = IndexingConfig::default();
        indexing.max_file_size = 64;
        let exclusions = ExclusionRules::default();
        let files = scan(dir.path(), &indexing, &exclusions);

        assert!(!files.iter().any(|f| f.path.ends_with("big.txt")));
    }

    #[test]
    fn scan_skips_binary_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.bin"), [0u8, 1, 2, 0, 3]).unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();

        let indexing = IndexingConfig::default();
        let exclusions = ExclusionRules::default();
        let files = scan(dir.path(), &indexing, &exclusions);

        assert!(!files.iter().any(|f| f.path.ends_with("data.bin")));
        assert!(files.iter().any(|f| f.path.ends_with("main.rs")));
    }
}
