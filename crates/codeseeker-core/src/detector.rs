//! Two-stage change detection.
//!
//! Stage one is a cheap `(mtime, size)` comparison against the last-indexed
//! `FileInfo`; stage two only runs when stage one is inconclusive (mtime
//! changed but size didn't, or the record is missing entirely) and hashes the
//! file's content with SHA-256 to decide whether it truly changed.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::scanner::ScannedFile;
use crate::types::FileInfo;

/// The outcome of comparing a scanned file against its last-known record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// File wasn't indexed before.
    New,
    /// File's content differs from what's indexed.
    Modified,
    /// File's content is identical to what's indexed; no work needed.
    Unchanged,
}

/// Compute the SHA-256 content hash of a file, hex-encoded.
pub fn content_hash(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

/// Determine whether `scanned` has changed relative to `previous`, hashing
/// content only when the cheap mtime/size check can't decide on its own.
pub fn detect_change(
    scanned: &ScannedFile,
    previous: Option<&FileInfo>,
) -> std::io::Result<(ChangeStatus, String)> {
    let Some(previous) = previous else {
        let hash = content_hash(&scanned.path)?;
        return Ok((ChangeStatus::New, hash));
    };

    if (previous.mtime - scanned.mtime).abs() <= 1 && previous.size_bytes == scanned.size_bytes {
        return Ok((ChangeStatus::Unchanged, previous.content_hash.clone()));
    }

    let hash = content_hash(&scanned.path)?;
    if hash == previous.content_hash {
        Ok((ChangeStatus::Unchanged, hash))
    } else {
        Ok((ChangeStatus::Modified, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Language;
    use std::path::PathBuf;

    fn file_info(hash: &str, size: u64, mtime: i64) -> FileInfo {
        FileInfo {
            id: 1,
            path: PathBuf::from("a.rs"),
            language: Language::Rust,
            content_hash: hash.to_string(),
            size_bytes: size,
            mtime,
        }
    }

    fn scanned(path: &Path, size: u64, mtime: i64) -> ScannedFile {
        ScannedFile {
            path: path.to_path_buf(),
            language: Language::Rust,
            size_bytes: size,
            mtime,
        }
    }

    #[test]
    fn missing_record_is_new() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn main() {}").unwrap();
        let s = scanned(&path, 12, 100);

        let (status, hash) = detect_change(&s, None).unwrap();
        assert_eq!(status, ChangeStatus::New);
        assert!(!hash.is_empty());
    }

    #[test]
    fn identical_mtime_and_size_short_circuits_to_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn main() {}").unwrap();
        let s = scanned(&path, 12, 100);
        let prev = file_info("stale-hash-not-actually-checked", 12, 100);

        let (status, hash) = detect_change(&s, Some(&prev)).unwrap();
        assert_eq!(status, ChangeStatus::Unchanged);
        assert_eq!(hash, "stale-hash-not-actually-checked");
    }

    #[test]
    fn mtime_within_one_second_short_circuits_to_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn main() {}").unwrap();
        let s = scanned(&path, 12, 101);
        let prev = file_info("stale-hash-not-actually-checked", 12, 100);

        let (status, hash) = detect_change(&s, Some(&prev)).unwrap();
        assert_eq!(status, ChangeStatus::Unchanged);
        assert_eq!(hash, "stale-hash-not-actually-checked");
    }

    #[test]
    fn changed_mtime_with_same_content_hash_is_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn main() {}").unwrap();
        let real_hash = content_hash(&path).unwrap();
        let s = scanned(&path, 12, 200);
        let prev = file_info(&real_hash, 999, 100);

        let (status, _) = detect_change(&s, Some(&prev)).unwrap();
        assert_eq!(status, ChangeStatus::Unchanged);
    }

    #[test]
    fn changed_content_is_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.rs");
        std::fs::write(&path, "fn main() { println!(\"v2\"); }").unwrap();
        let s = scanned(&path, 30, 200);
        let prev = file_info("old-hash", 12, 100);

        let (status, _) = detect_change(&s, Some(&prev)).unwrap();
        assert_eq!(status, ChangeStatus::Modified);
    }
}
