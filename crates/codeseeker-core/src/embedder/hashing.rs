//! Deterministic feature-hashing embedding provider.
//!
//! The default provider: no model file, no network call, no floating-point
//! nondeterminism across platforms. Each token is hashed into one of `dims`
//! buckets; a second, independent hash picks the bucket's sign. The result is
//! L2-normalized so cosine similarity behaves the same as with a learned
//! embedding space. This is the classic "hashing trick" used for bag-of-words
//! feature vectors, applied here to code identifiers and words.

use xxhash_rust::xxh3::xxh3_64;

use crate::config::EmbeddingConfig;
use crate::error::CodeSeekerResult;

use super::EmbeddingProvider;

/// Deterministic, model-free embedding provider.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    /// Create a new hashing embedder with the configured output dimension.
    #[must_use]
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            dimensions: config.dimensions,
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let bucket_hash = xxh3_64(token.as_bytes());
            #[expect(clippy::cast_possible_truncation)]
            let bucket = (bucket_hash % self.dimensions as u64) as usize;

            let sign_hash = xxh3_64(format!("{token}:sign").as_bytes());
            let sign = if sign_hash % 2 == 0 { 1.0 } else { -1.0 };

            vector[bucket] += sign;
        }
        crate::vector::l2_normalize(&mut vector);
        vector
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn is_available(&self) -> bool {
        true
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_fingerprint(&self) -> String {
        format!("hashing-v1-{}", self.dimensions)
    }

    fn embed_batch(&self, texts: &[&str]) -> Vec<Option<Vec<f32>>> {
        texts.iter().map(|t| Some(self.embed_text(t))).collect()
    }

    fn embed_single(&self, text: &str) -> CodeSeekerResult<Vec<f32>> {
        Ok(self.embed_text(text))
    }
}

/// Split into lowercase word/identifier tokens, decomposing `camelCase` and
/// `snake_case` so `getUserName` and `get user name` hash to overlapping
/// buckets the same way the text store's tokenizer does.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if ch.is_uppercase() && prev_lower {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            current.push(ch.to_ascii_lowercase());
            prev_lower = ch.is_lowercase() || ch.is_numeric();
        } else {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn embedder() -> HashingEmbedder {
        let config = crate::config::Config::defaults(Path::new("/tmp/p")).embedding;
        HashingEmbedder::new(&config)
    }

    #[test]
    fn same_text_embeds_identically() {
        let e = embedder();
        let a = e.embed_single("fn validate_token() {}").unwrap();
        let b = e.embed_single("fn validate_token() {}").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_embeds_differently() {
        let e = embedder();
        let a = e.embed_single("fn validate_token() {}").unwrap();
        let b = e.embed_single("class UserRepository {}").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn output_is_l2_normalized() {
        let e = embedder();
        let v = e.embed_single("some code content here").unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4 || norm == 0.0);
    }

    #[test]
    fn output_has_configured_dimensions() {
        let e = embedder();
        let v = e.embed_single("x").unwrap();
        assert_eq!(v.len(), e.dimensions());
    }

    #[test]
    fn always_available_and_no_network() {
        let e = embedder();
        assert!(e.is_available());
    }

    #[test]
    fn tokenize_splits_camel_and_snake_case() {
        assert_eq!(tokenize("getUserName"), vec!["get", "user", "name"]);
        assert_eq!(tokenize("get_user_name"), vec!["get", "user", "name"]);
    }
}
