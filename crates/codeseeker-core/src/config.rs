//! Configuration loading and validation.
//!
//! Configuration is resolved with the following precedence (highest wins):
//!
//! 1. CLI flags
//! 2. Environment variables (`CODESEEKER_*`)
//! 3. Project config (`.codeseeker/config.toml`)
//! 4. User config (`~/.config/codeseeker/config.toml`)
//! 5. Compiled-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CodeSeekerError, CodeSeekerResult};

/// Top-level configuration for CodeSeeker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project root path to index.
    pub project_path: PathBuf,

    /// Indexing configuration.
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,

    /// Embedding configuration.
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Watcher configuration.
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Indexing-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// File/directory name patterns to exclude from indexing (glob syntax).
    #[serde(default = "IndexingConfig::default_excludes")]
    pub exclude_patterns: Vec<String>,

    /// Maximum file size to index (in bytes). Files larger than this are skipped.
    #[serde(default = "IndexingConfig::default_max_file_size")]
    pub max_file_size: u64,

    /// Maximum number of concurrent parse tasks.
    #[serde(default = "IndexingConfig::default_parse_concurrency")]
    pub parse_concurrency: usize,

    /// Hard cap on lines per chunk.
    #[serde(default = "IndexingConfig::default_max_chunk_lines")]
    pub max_chunk_lines: usize,

    /// Whether to follow symbolic links while scanning.
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Overlap fraction for sliding-window splitting of oversized elements
    /// (0.0 - 0.5). Consecutive chunks repeat this fraction of lines so that
    /// boundary context is never lost.
    #[serde(default = "IndexingConfig::default_overlap_fraction")]
    pub overlap_fraction: f64,

    /// Minimum number of consecutive comment/doc lines required before they're
    /// promoted to a standalone `doc` chunk rather than folded into the symbol
    /// they precede.
    #[serde(default = "IndexingConfig::default_doc_run_threshold")]
    pub doc_run_threshold: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            exclude_patterns: Self::default_excludes(),
            max_file_size: Self::default_max_file_size(),
            parse_concurrency: Self::default_parse_concurrency(),
            max_chunk_lines: Self::default_max_chunk_lines(),
            follow_symlinks: false,
            overlap_fraction: Self::default_overlap_fraction(),
            doc_run_threshold: Self::default_doc_run_threshold(),
        }
    }
}

impl IndexingConfig {
    /// Directory/file glob patterns skipped by default, in addition to
    /// whatever `.gitignore` already excludes.
    pub fn default_excludes() -> Vec<String> {
        vec![
            ".git".into(),
            "node_modules".into(),
            "dist".into(),
            "build".into(),
            ".next".into(),
            "target".into(),
            "Library".into(),
            "Temp".into(),
            "__pycache__".into(),
            ".venv".into(),
            "venv".into(),
            "*.lock".into(),
            "*.min.js".into(),
            "*.min.css".into(),
            "*.map".into(),
        ]
    }

    fn default_max_file_size() -> u64 {
        2 * 1024 * 1024 // 2 MiB, per the file scanner's size cap
    }

    fn default_parse_concurrency() -> usize {
        2
    }

    fn default_max_chunk_lines() -> usize {
        80
    }

    fn default_overlap_fraction() -> f64 {
        0.20
    }

    fn default_doc_run_threshold() -> usize {
        3
    }
}

/// Search-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Default number of results to return.
    #[serde(default = "SearchConfig::default_limit")]
    pub default_limit: usize,

    /// Maximum number of results a caller may request.
    #[serde(default = "SearchConfig::default_max_limit")]
    pub max_limit: usize,

    /// Reciprocal rank fusion constant (k parameter).
    #[serde(default = "SearchConfig::default_rrf_k")]
    pub rrf_k: u32,

    /// Visit cap applied to graph traversals invoked from search/context tools.
    #[serde(default = "SearchConfig::default_graph_visit_cap")]
    pub graph_visit_cap: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: Self::default_limit(),
            max_limit: Self::default_max_limit(),
            rrf_k: Self::default_rrf_k(),
            graph_visit_cap: Self::default_graph_visit_cap(),
        }
    }
}

impl SearchConfig {
    fn default_limit() -> usize {
        10
    }
    fn default_max_limit() -> usize {
        100
    }
    fn default_rrf_k() -> u32 {
        60
    }
    fn default_graph_visit_cap() -> usize {
        5000
    }
}

/// Which embedding provider produces chunk vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// Deterministic feature-hashing embedding. No model file, no network,
    /// no floating nondeterminism. The default.
    Hashing,
    /// ONNX neural embedding model. Requires the `neural-embeddings` build
    /// feature and a model file at `model_path`.
    Neural,
}

impl Default for EmbeddingProviderKind {
    fn default() -> Self {
        Self::Hashing
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Which provider to use.
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// Path to the ONNX model file (only consulted when `provider = "neural"`).
    #[serde(default = "EmbeddingConfig::default_model_path")]
    pub model_path: PathBuf,

    /// Output embedding dimensions.
    #[serde(default = "EmbeddingConfig::default_dimensions")]
    pub dimensions: usize,

    /// Batch size for embedding inference.
    #[serde(default = "EmbeddingConfig::default_batch_size")]
    pub batch_size: usize,

    /// Maximum sequence length considered by the provider.
    #[serde(default = "EmbeddingConfig::default_max_seq_length")]
    pub max_seq_length: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model_path: Self::default_model_path(),
            dimensions: Self::default_dimensions(),
            batch_size: Self::default_batch_size(),
            max_seq_length: Self::default_max_seq_length(),
        }
    }
}

impl EmbeddingConfig {
    fn default_model_path() -> PathBuf {
        PathBuf::from("model.onnx")
    }
    fn default_dimensions() -> usize {
        384
    }
    fn default_batch_size() -> usize {
        32
    }
    fn default_max_seq_length() -> usize {
        512
    }
}

/// File watcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Debounce interval in milliseconds.
    #[serde(default = "WatcherConfig::default_debounce_ms")]
    pub debounce_ms: u64,

    /// Interval between full scans (in seconds) for catching missed events.
    #[serde(default = "WatcherConfig::default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: Self::default_debounce_ms(),
            poll_interval_secs: Self::default_poll_interval_secs(),
        }
    }
}

impl WatcherConfig {
    fn default_debounce_ms() -> u64 {
        100
    }
    fn default_poll_interval_secs() -> u64 {
        300
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Whether to output logs as JSON.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".into()
    }
}

/// Where the index's stores live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Index data lives on the local filesystem under the data directory.
    Local,
    /// A remote/shared storage backend. Not implemented; rejected explicitly
    /// at config-validation time rather than silently falling back to local.
    Remote,
}

impl Default for StorageMode {
    fn default() -> Self {
        Self::Local
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend mode.
    #[serde(default)]
    pub mode: StorageMode,

    /// Override for the data directory. When unset, derived from the
    /// platform's local-data directory and the project's identity hash.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::default(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, then overlay user config, then
    /// project config, then environment overrides.
    pub fn load(project_path: &Path) -> CodeSeekerResult<Self> {
        let mut config = Self::defaults(project_path);

        if let Some(user_config_dir) = dirs::config_dir() {
            let user_config_path = user_config_dir.join("codeseeker").join("config.toml");
            if user_config_path.exists() {
                config.merge_from_file(&user_config_path)?;
            }
        }

        let project_config_path = project_path.join(".codeseeker").join("config.toml");
        if project_config_path.exists() {
            config.merge_from_file(&project_config_path)?;
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration for the given project path.
    #[must_use]
    pub fn defaults(project_path: &Path) -> Self {
        Self {
            project_path: project_path.to_path_buf(),
            indexing: IndexingConfig::default(),
            search: SearchConfig::default(),
            embedding: EmbeddingConfig::default(),
            watcher: WatcherConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
        }
    }

    /// Returns the data directory for this project's index files.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.storage.data_dir {
            return dir.clone();
        }
        let id = crate::identity::project_id(&self.project_path);
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("codeseeker")
            .join("projects")
            .join(id)
    }

    /// Reject configurations that name an unsupported storage backend rather
    /// than silently treating them as local.
    fn validate(&self) -> CodeSeekerResult<()> {
        if self.storage.mode == StorageMode::Remote {
            return Err(CodeSeekerError::Config(
                "storage.mode = \"remote\" is not supported; use \"local\"".into(),
            ));
        }
        Ok(())
    }

    /// Merge values from a TOML config file (non-destructive overlay).
    fn merge_from_file(&mut self, path: &Path) -> CodeSeekerResult<()> {
        let content = std::fs::read_to_string(path)?;
        let overlay: toml::Value = toml::from_str(&content)?;

        if let Some(indexing) = overlay.get("indexing") {
            if let Ok(parsed) = indexing.clone().try_into::<IndexingConfig>() {
                self.indexing = parsed;
            }
        }
        if let Some(search) = overlay.get("search") {
            if let Ok(parsed) = search.clone().try_into::<SearchConfig>() {
                self.search = parsed;
            }
        }
        if let Some(embedding) = overlay.get("embedding") {
            if let Ok(parsed) = embedding.clone().try_into::<EmbeddingConfig>() {
                self.embedding = parsed;
            }
        }
        if let Some(watcher) = overlay.get("watcher") {
            if let Ok(parsed) = watcher.clone().try_into::<WatcherConfig>() {
                self.watcher = parsed;
            }
        }
        if let Some(logging) = overlay.get("logging") {
            if let Ok(parsed) = logging.clone().try_into::<LoggingConfig>() {
                self.logging = parsed;
            }
        }
        if let Some(storage) = overlay.get("storage") {
            if let Ok(parsed) = storage.clone().try_into::<StorageConfig>() {
                self.storage = parsed;
            }
        }

        Ok(())
    }

    /// Apply environment variable overrides (`CODESEEKER_*` prefix).
    fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("CODESEEKER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(mode) = std::env::var("CODESEEKER_STORAGE_MODE") {
            self.storage.mode = match mode.as_str() {
                "remote" => StorageMode::Remote,
                _ => StorageMode::Local,
            };
        }
        if let Ok(dir) = std::env::var("CODESEEKER_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::defaults(Path::new("/tmp/test-project"));
        assert_eq!(config.indexing.max_file_size, 2 * 1024 * 1024);
        assert_eq!(config.search.default_limit, 10);
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.watcher.debounce_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn remote_storage_mode_is_rejected() {
        let mut config = Config::defaults(Path::new("/tmp/test-project"));
        config.storage.mode = StorageMode::Remote;
        assert!(config.validate().is_err());
    }

    #[test]
    fn language_from_extension() {
        use crate::types::Language;
        assert_eq!(Language::from_extension("py"), Language::Python);
        assert_eq!(Language::from_extension("rs"), Language::Rust);
        assert_eq!(Language::from_extension("ts"), Language::TypeScript);
        assert_eq!(Language::from_extension("tsx"), Language::TypeScript);
        assert_eq!(Language::from_extension("go"), Language::Go);
        assert_eq!(Language::from_extension("xyz"), Language::Unknown);
    }

    #[test]
    fn chunk_kind_weights() {
        use crate::types::ChunkKind;
        assert!(ChunkKind::Class.default_weight() > ChunkKind::Test.default_weight());
        assert!(ChunkKind::Function.default_weight() > ChunkKind::TopLevel.default_weight());
    }

    #[test]
    fn env_override_sets_storage_mode() {
        let mut config = Config::defaults(Path::new("/tmp/test-project"));
        std::env::set_var("CODESEEKER_STORAGE_MODE", "remote");
        config.apply_env_overrides();
        std::env::remove_var("CODESEEKER_STORAGE_MODE");
        assert_eq!(config.storage.mode, StorageMode::Remote);
    }
}
