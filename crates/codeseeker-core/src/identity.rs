//! Deterministic project identity.
//!
//! A project's id is derived solely from its absolute, normalized path so the
//! same project always resolves to the same data directory across runs and
//! processes, without any on-disk marker file.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Length, in hex characters, of a project id.
pub const PROJECT_ID_LEN: usize = 32;

/// Compute the deterministic project id for `path`.
///
/// `hex(sha256(normalize(absolute(path))))[0..32]`. Normalization lowercases
/// Windows drive letters and strips the `\\?\` extended-path prefix so the
/// same physical directory always hashes the same way; it does not resolve
/// symlinks (two different symlinked paths to the same inode intentionally
/// get different ids, matching the path-identity rather than inode-identity
/// contract used throughout the rest of the index).
#[must_use]
pub fn project_id(path: &Path) -> String {
    let absolute = to_absolute(path);
    let normalized = normalize(&absolute);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();
    let full = hex::encode(digest);
    full[..PROJECT_ID_LEN].to_string()
}

fn to_absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn normalize(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let stripped = raw.strip_prefix(r"\\?\").unwrap_or(&raw);
    let with_forward_slashes = stripped.replace('\\', "/");
    let trimmed = with_forward_slashes.trim_end_matches('/');
    if cfg!(windows) {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_absolute_path_yields_same_id() {
        let a = project_id(Path::new("/home/dev/project"));
        let b = project_id(Path::new("/home/dev/project"));
        assert_eq!(a, b);
    }

    #[test]
    fn different_paths_yield_different_ids() {
        let a = project_id(Path::new("/home/dev/project-a"));
        let b = project_id(Path::new("/home/dev/project-b"));
        assert_ne!(a, b);
    }

    #[test]
    fn trailing_slash_does_not_change_id() {
        let a = project_id(Path::new("/home/dev/project"));
        let b = project_id(Path::new("/home/dev/project/"));
        assert_eq!(a, b);
    }

    #[test]
    fn id_has_expected_length() {
        let id = project_id(Path::new("/home/dev/project"));
        assert_eq!(id.len(), PROJECT_ID_LEN);
    }
}
