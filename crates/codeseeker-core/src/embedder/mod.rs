//! Embedding providers.
//!
//! `EmbeddingProvider` is the seam between the indexing pipeline and whatever
//! turns chunk text into vectors. The default implementation
//! ([`hashing::HashingEmbedder`]) is deterministic and has no external
//! dependency: no model download, no GPU, no network call, and identical
//! output across machines and runs. An optional ONNX-backed neural provider
//! is available behind the `neural-embeddings` build feature for callers who
//! have a real sentence-embedding model on disk and want higher recall.
//!
//! Either way the pipeline only ever holds a `Box<dyn EmbeddingProvider>`, so
//! switching providers is a config change, not a code change.

pub mod hashing;

#[cfg(feature = "neural-embeddings")]
pub mod neural;

use crate::config::{Config, EmbeddingProviderKind};
use crate::error::CodeSeekerResult;

/// Produces embedding vectors for chunk text.
///
/// Implementations must be deterministic for a fixed `model_fingerprint`:
/// the same input text embedded twice under the same fingerprint must
/// produce the same vector, since the vector store uses the fingerprint to
/// decide whether a cached vector can be trusted.
pub trait EmbeddingProvider: Send + Sync {
    /// Whether the provider is ready to embed (model loaded, tokenizer
    /// available). A provider that starts unavailable degrades the pipeline
    /// to text- and graph-only search rather than failing the whole pass.
    fn is_available(&self) -> bool;

    /// Output vector dimensionality.
    fn dimensions(&self) -> usize;

    /// Opaque identifier for the exact model/configuration in use. Stored
    /// alongside vectors so a vector store can refuse to mix vectors from
    /// two different embedding spaces.
    fn model_fingerprint(&self) -> String;

    /// Embed a batch of texts. An entry is `None` when that single input
    /// failed to embed (e.g. tokenizer rejected it); the caller skips it
    /// rather than failing the whole batch.
    fn embed_batch(&self, texts: &[&str]) -> Vec<Option<Vec<f32>>>;

    /// Embed a single text, for interactive query embedding.
    fn embed_single(&self, text: &str) -> CodeSeekerResult<Vec<f32>>;
}

/// Build the embedding provider selected by configuration.
///
/// Falls back to the hashing provider when `provider = "neural"` is
/// requested but the crate was built without the `neural-embeddings`
/// feature, since that combination means the ONNX machinery was compiled
/// out entirely; there is nothing else to dispatch to.
#[must_use]
pub fn build_provider(config: &Config) -> Box<dyn EmbeddingProvider> {
    match config.embedding.provider {
        EmbeddingProviderKind::Hashing => Box::new(hashing::HashingEmbedder::new(&config.embedding)),
        #[cfg(feature = "neural-embeddings")]
        EmbeddingProviderKind::Neural => match neural::NeuralEmbedder::load(&config.embedding) {
            Ok(provider) => Box::new(provider),
            Err(_) => Box::new(hashing::HashingEmbedder::new(&config.embedding)),
        },
        #[cfg(not(feature = "neural-embeddings"))]
        EmbeddingProviderKind::Neural => Box::new(hashing::HashingEmbedder::new(&config.embedding)),
    }
}

/// Prepare a chunk's raw content for embedding. Prepends the symbol path so
/// short chunks (a one-line function signature, a constant) don't embed as
/// near-identical vectors purely on body text.
#[must_use]
pub fn format_chunk_for_embedding(symbol_path: &str, content: &str) -> String {
    format!("{symbol_path}\n{content}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn default_config_builds_the_hashing_provider() {
        let config = Config::defaults(Path::new("/tmp/project"));
        let provider = build_provider(&config);
        assert!(provider.is_available());
        assert_eq!(provider.dimensions(), config.embedding.dimensions);
    }

    #[test]
    fn format_chunk_prefixes_the_symbol_path() {
        let formatted = format_chunk_for_embedding("mod.func", "fn func() {}");
        assert!(formatted.starts_with("mod.func\n"));
        assert!(formatted.contains("fn func()"));
    }
}
