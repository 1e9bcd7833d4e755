//! ONNX-based neural embedding provider.
//!
//! Loads a sentence-embedding model (e.g. a code-retrieval model exported to
//! ONNX) and a matching tokenizer from disk. Unlike the default hashing
//! provider, this one requires `embedding.model_path` to already point at a
//! real model file -- there is no auto-download. A missing or unloadable
//! model is a hard error at construction time rather than a silent
//! degraded mode, so callers opting into `provider = "neural"` find out
//! immediately if the model isn't where they said it would be.

use std::sync::Mutex;

use ort::session::Session;

use crate::config::EmbeddingConfig;
use crate::error::{CodeSeekerError, CodeSeekerResult};

use super::EmbeddingProvider;

/// Embedding provider backed by a local ONNX Runtime session.
pub struct NeuralEmbedder {
    config: EmbeddingConfig,
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    fingerprint: String,
}

impl NeuralEmbedder {
    /// Load the ONNX model and tokenizer named by `config.model_path`.
    ///
    /// The tokenizer is expected next to the model file as `tokenizer.json`.
    pub fn load(config: &EmbeddingConfig) -> CodeSeekerResult<Self> {
        if !config.model_path.exists() {
            return Err(CodeSeekerError::EmbeddingUnavailable {
                reason: format!("model not found: {}", config.model_path.display()),
            });
        }

        let session = Session::builder()
            .and_then(|b| b.commit_from_file(&config.model_path))
            .map_err(|e| CodeSeekerError::EmbeddingUnavailable {
                reason: format!("failed to load ONNX model: {e}"),
            })?;

        let tokenizer_path = config.model_path.with_file_name("tokenizer.json");
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            CodeSeekerError::EmbeddingUnavailable {
                reason: format!("failed to load tokenizer {}: {e}", tokenizer_path.display()),
            }
        })?;

        let fingerprint = format!(
            "neural-v1-{}-{}",
            config.model_path.display(),
            config.dimensions
        );

        tracing::info!(model = %config.model_path.display(), "loaded ONNX embedding model");

        Ok(Self {
            config: config.clone(),
            session: Mutex::new(session),
            tokenizer,
            fingerprint,
        })
    }

    fn run_inference(&self, session: &mut Session, texts: &[&str]) -> CodeSeekerResult<Vec<Vec<f32>>> {
        let batch_size = texts.len();
        let max_len = self.config.max_seq_length;

        let (input_ids, attention_mask, token_type_ids) = self.tokenize_batch(texts, max_len)?;
        let shape = vec![batch_size as i64, max_len as i64];

        let ids_value = ort::value::Tensor::from_array((shape.clone(), input_ids))
            .map_err(|e| CodeSeekerError::Internal(format!("ONNX tensor error: {e}")))?;
        let mask_value = ort::value::Tensor::from_array((shape.clone(), attention_mask.clone()))
            .map_err(|e| CodeSeekerError::Internal(format!("ONNX tensor error: {e}")))?;

        use std::borrow::Cow;
        let mut inputs: Vec<(Cow<'_, str>, ort::session::SessionInputValue<'_>)> = vec![
            (Cow::Borrowed("input_ids"), ort::session::SessionInputValue::from(ids_value)),
            (Cow::Borrowed("attention_mask"), ort::session::SessionInputValue::from(mask_value)),
        ];

        let expects_token_type = session.inputs().iter().any(|i| i.name() == "token_type_ids");
        if expects_token_type {
            let type_value = ort::value::Tensor::from_array((shape.clone(), token_type_ids)).map_err(|e| {
                CodeSeekerError::Internal(format!("ONNX tensor error (token_type_ids): {e}"))
            })?;
            inputs.push((
                Cow::Borrowed("token_type_ids"),
                ort::session::SessionInputValue::from(type_value),
            ));
        }

        let output_name = session
            .outputs()
            .first()
            .map(|o| o.name().to_string())
            .ok_or_else(|| CodeSeekerError::Internal("model has no outputs".into()))?;

        let outputs = session
            .run(inputs)
            .map_err(|e| CodeSeekerError::Internal(format!("ONNX inference error: {e}")))?;

        let output_value = outputs
            .get(&output_name)
            .ok_or_else(|| CodeSeekerError::Internal("no output tensor found".into()))?;

        let (output_shape, output_data) = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| CodeSeekerError::Internal(format!("output extraction error: {e}")))?;

        let dims: Vec<usize> = output_shape.iter().map(|&d| d as usize).collect();
        let mut embeddings = Vec::with_capacity(batch_size);

        if dims.len() == 3 {
            let seq_len = dims[1];
            let hidden_dim = dims[2];
            for b in 0..batch_size {
                let mut pooled = vec![0.0f32; hidden_dim];
                let mut mask_sum = 0.0f32;
                for s in 0..seq_len {
                    let mask_val = attention_mask[b * max_len + s] as f32;
                    mask_sum += mask_val;
                    let offset = b * seq_len * hidden_dim + s * hidden_dim;
                    for d in 0..hidden_dim {
                        pooled[d] += output_data[offset + d] * mask_val;
                    }
                }
                if mask_sum > 0.0 {
                    for d in &mut pooled {
                        *d /= mask_sum;
                    }
                }
                crate::vector::l2_normalize(&mut pooled);
                embeddings.push(pooled);
            }
        } else if dims.len() == 2 {
            let hidden_dim = dims[1];
            for b in 0..batch_size {
                let offset = b * hidden_dim;
                let mut vec = output_data[offset..offset + hidden_dim].to_vec();
                crate::vector::l2_normalize(&mut vec);
                embeddings.push(vec);
            }
        } else {
            return Err(CodeSeekerError::Internal(format!(
                "unexpected output tensor shape: {dims:?}"
            )));
        }

        Ok(embeddings)
    }

    fn tokenize_batch(&self, texts: &[&str], max_len: usize) -> CodeSeekerResult<(Vec<i64>, Vec<i64>, Vec<i64>)> {
        let mut all_input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut all_attention_mask = Vec::with_capacity(texts.len() * max_len);
        let mut all_token_type_ids = Vec::with_capacity(texts.len() * max_len);

        for text in texts {
            let encoding = self
                .tokenizer
                .encode(*text, true)
                .map_err(|e| CodeSeekerError::Internal(format!("tokenization error: {e}")))?;

            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();
            let type_ids = encoding.get_type_ids();
            let actual_len = ids.len().min(max_len);

            for i in 0..actual_len {
                all_input_ids.push(i64::from(ids[i]));
                all_attention_mask.push(i64::from(mask[i]));
                all_token_type_ids.push(i64::from(type_ids[i]));
            }
            for _ in actual_len..max_len {
                all_input_ids.push(0);
                all_attention_mask.push(0);
                all_token_type_ids.push(0);
            }
        }

        Ok((all_input_ids, all_attention_mask, all_token_type_ids))
    }
}

impl EmbeddingProvider for NeuralEmbedder {
    fn is_available(&self) -> bool {
        true
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn model_fingerprint(&self) -> String {
        self.fingerprint.clone()
    }

    fn embed_batch(&self, texts: &[&str]) -> Vec<Option<Vec<f32>>> {
        let Ok(mut session) = self.session.lock() else {
            return vec![None; texts.len()];
        };

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            match self.run_inference(&mut session, batch) {
                Ok(batch_embeddings) => {
                    all_embeddings.extend(batch_embeddings.into_iter().map(Some));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "batch inference failed; falling back to per-chunk inference");
                    for text in batch {
                        match self.run_inference(&mut session, &[*text]) {
                            Ok(mut single) => all_embeddings.push(Some(single.remove(0))),
                            Err(chunk_err) => {
                                tracing::warn!(error = %chunk_err, "chunk inference failed; skipping");
                                all_embeddings.push(None);
                            }
                        }
                    }
                }
            }
        }
        all_embeddings
    }

    fn embed_single(&self, text: &str) -> CodeSeekerResult<Vec<f32>> {
        let mut results = self.embed_batch(&[text]);
        results
            .pop()
            .flatten()
            .ok_or_else(|| CodeSeekerError::Internal("inference produced no embedding".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn missing_model_file_is_an_error_not_a_silent_degrade() {
        let mut config = crate::config::Config::defaults(Path::new("/tmp/p")).embedding;
        config.model_path = "/nonexistent/model.onnx".into();
        let err = NeuralEmbedder::load(&config).unwrap_err();
        assert!(matches!(err, CodeSeekerError::EmbeddingUnavailable { .. }));
    }
}
