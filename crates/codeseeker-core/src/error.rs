//! Error types for codeseeker-core.
//!
//! One hierarchical enum so callers can pattern-match on the failure kind. Parser
//! and per-file failures are contained (the pass continues past them); orchestration
//! level failures are surfaced and end the pass.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all codeseeker-core operations.
#[derive(Debug, Error)]
pub enum CodeSeekerError {
    /// Operation requires an index that doesn't exist yet.
    #[error("project is not indexed: {project_id}")]
    NotIndexed {
        /// The project that has no index.
        project_id: String,
    },

    /// More than one project matches the caller's request; disambiguation needed.
    #[error("ambiguous project: {candidates:?}")]
    ProjectAmbiguous {
        /// The candidate project ids that matched.
        candidates: Vec<String>,
    },

    /// A parser produced no usable extraction for a file. Contained, not fatal.
    #[error("extraction failed for {}: {message}", path.display())]
    ExtractionFailed {
        /// File that failed to extract.
        path: PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// The embedding provider failed. The pass degrades to text+graph only.
    #[error("embedding unavailable: {reason}")]
    EmbeddingUnavailable {
        /// Why the embedding provider failed.
        reason: String,
    },

    /// A store write failed for a specific file. Fatal for that file only.
    #[error("store write failed: store={store} file={}", file.display())]
    StoreWriteFailed {
        /// Which store rejected the write (`vector`, `text`, `graph`, `standards`).
        store: &'static str,
        /// The file whose write failed.
        file: PathBuf,
    },

    /// Caller-supplied argument violates the tool's schema.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// What's wrong with the argument.
        message: String,
    },

    /// The operation was cancelled before completion.
    #[error("cancelled after {completed} of {total} files")]
    Cancelled {
        /// Files processed before cancellation.
        completed: usize,
        /// Total files that were queued for the pass.
        total: usize,
    },

    /// Transient I/O failure reading a file; the file is skipped with a warning.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SQLite error from the text/file-record store.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON (de)serialization error (standards profile, exclusions, project record).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML configuration parse error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic internal error for conditions that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience alias for `Result`s in codeseeker-core.
pub type CodeSeekerResult<T> = Result<T, CodeSeekerError>;

impl CodeSeekerError {
    /// Returns true for errors that should end the current index pass (as opposed to
    /// being contained to a single file and logged).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingUnavailable { .. }
                | Self::Database(_)
                | Self::Internal(_)
                | Self::Config(_)
        )
    }
}

impl From<toml::de::Error> for CodeSeekerError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_and_io_errors_are_contained_not_fatal() {
        let err = CodeSeekerError::ExtractionFailed {
            path: PathBuf::from("a.rs"),
            message: "parse timeout".into(),
        };
        assert!(!err.is_fatal());

        let err = CodeSeekerError::Io(std::io::Error::other("transient"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn embedding_and_database_errors_are_fatal() {
        let err = CodeSeekerError::EmbeddingUnavailable {
            reason: "model missing".into(),
        };
        assert!(err.is_fatal());
    }

    #[test]
    fn not_indexed_message_includes_project_id() {
        let err = CodeSeekerError::NotIndexed {
            project_id: "abc123".into(),
        };
        assert!(err.to_string().contains("abc123"));
    }
}
