//! Flat-file vector store.
//!
//! Holds chunk embeddings in memory as a flat `Vec<(chunk_id, Vec<f32>)>` and
//! mirrors every write to an append-only on-disk log so the in-memory state
//! can be rebuilt after a restart without re-embedding. Search is a
//! brute-force cosine scan; at the chunk counts a single project's index
//! produces, this is simpler and just as fast as an ANN structure, and it
//! has no tuning knobs to get wrong.
//!
//! The on-disk log is keyed to a `model_fingerprint`: if the embedding
//! provider or its dimensionality changes, the store refuses to reuse a
//! stale log rather than silently mixing incompatible vector spaces.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CodeSeekerError, CodeSeekerResult};

/// A single on-disk log record: either an upsert or a tombstone.
#[derive(Debug, Clone, Serialize, Deserialize)]
enum LogRecord {
    Upsert { chunk_id: i64, vector: Vec<f32> },
    Remove { chunk_id: i64 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogHeader {
    model_fingerprint: String,
    dimensions: usize,
}

/// Append-only, brute-force-scanned vector store.
pub struct VectorStore {
    path: PathBuf,
    dimensions: usize,
    model_fingerprint: String,
    vectors: Vec<(i64, Vec<f32>)>,
    writer: BufWriter<File>,
    /// Number of log records appended since the last compaction. Used to
    /// decide when a rewrite is worth the cost.
    dirty_records: usize,
}

impl VectorStore {
    /// Open or create a vector store at the given path. If the file exists
    /// but was written under a different model fingerprint, it is discarded
    /// and a fresh log started so vectors from an old embedding space are
    /// never mixed with new ones.
    pub fn open(path: &Path, dimensions: usize, model_fingerprint: &str) -> CodeSeekerResult<Self> {
        let (vectors, stale) = if path.exists() {
            match load_log(path, model_fingerprint) {
                Ok(vectors) => (vectors, false),
                Err(_) => (Vec::new(), true),
            }
        } else {
            (Vec::new(), false)
        };

        if stale {
            std::fs::remove_file(path).map_err(CodeSeekerError::Io)?;
        }

        let mut store = Self {
            path: path.to_path_buf(),
            dimensions,
            model_fingerprint: model_fingerprint.to_string(),
            vectors,
            writer: open_writer(path)?,
            dirty_records: 0,
        };

        if !path.exists() || stale {
            store.write_header()?;
        }

        Ok(store)
    }

    fn write_header(&mut self) -> CodeSeekerResult<()> {
        let header = LogHeader {
            model_fingerprint: self.model_fingerprint.clone(),
            dimensions: self.dimensions,
        };
        write_record(&mut self.writer, &header)
    }

    /// Insert or overwrite a chunk's vector.
    pub fn upsert(&mut self, chunk_id: i64, vector: Vec<f32>) -> CodeSeekerResult<()> {
        if vector.len() != self.dimensions {
            return Err(CodeSeekerError::StoreWriteFailed {
                store: "vector",
                file: self.path.clone(),
            });
        }

        write_record(
            &mut self.writer,
            &LogRecord::Upsert {
                chunk_id,
                vector: vector.clone(),
            },
        )?;
        self.writer.flush().map_err(CodeSeekerError::Io)?;
        self.dirty_records += 1;

        match self.vectors.iter_mut().find(|(id, _)| *id == chunk_id) {
            Some((_, existing)) => *existing = vector,
            None => self.vectors.push((chunk_id, vector)),
        }

        if self.dirty_records >= COMPACTION_THRESHOLD {
            self.compact()?;
        }
        Ok(())
    }

    /// Remove a chunk's vector.
    pub fn remove(&mut self, chunk_id: i64) -> CodeSeekerResult<()> {
        write_record(&mut self.writer, &LogRecord::Remove { chunk_id })?;
        self.writer.flush().map_err(CodeSeekerError::Io)?;
        self.dirty_records += 1;
        self.vectors.retain(|(id, _)| *id != chunk_id);

        if self.dirty_records >= COMPACTION_THRESHOLD {
            self.compact()?;
        }
        Ok(())
    }

    /// Rewrite the log to contain only the current in-memory state,
    /// dropping tombstoned and superseded records.
    pub fn compact(&mut self) -> CodeSeekerResult<()> {
        let tmp_path = self.path.with_extension("log.compacting");
        {
            let mut tmp_writer = open_writer(&tmp_path)?;
            write_record(
                &mut tmp_writer,
                &LogHeader {
                    model_fingerprint: self.model_fingerprint.clone(),
                    dimensions: self.dimensions,
                },
            )?;
            for (chunk_id, vector) in &self.vectors {
                write_record(
                    &mut tmp_writer,
                    &LogRecord::Upsert {
                        chunk_id: *chunk_id,
                        vector: vector.clone(),
                    },
                )?;
            }
            tmp_writer.flush().map_err(CodeSeekerError::Io)?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(CodeSeekerError::Io)?;
        self.writer = open_writer(&self.path)?;
        self.dirty_records = 0;
        Ok(())
    }

    /// Brute-force cosine similarity scan for the `k` nearest neighbors.
    /// Returns `(chunk_id, cosine_similarity)` pairs sorted descending.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(i64, f32)> {
        let mut scored: Vec<(i64, f32)> = self
            .vectors
            .iter()
            .map(|(id, vector)| (*id, cosine_similarity(query, vector)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        scored
    }

    /// Number of vectors currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// True if the store holds no vectors.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Configured embedding dimensionality.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

const COMPACTION_THRESHOLD: usize = 500;

fn open_writer(path: &Path) -> CodeSeekerResult<BufWriter<File>> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(CodeSeekerError::Io)?;
    Ok(BufWriter::new(file))
}

fn write_record<T: Serialize>(writer: &mut BufWriter<File>, record: &T) -> CodeSeekerResult<()> {
    let bytes = bincode::serialize(record).map_err(|e| CodeSeekerError::Internal(e.to_string()))?;
    #[expect(clippy::cast_possible_truncation)]
    let len = bytes.len() as u32;
    writer.write_all(&len.to_le_bytes()).map_err(CodeSeekerError::Io)?;
    writer.write_all(&bytes).map_err(CodeSeekerError::Io)?;
    Ok(())
}

/// Replay the on-disk log into an in-memory vector list, rejecting it if the
/// header's fingerprint doesn't match the currently configured provider.
fn load_log(path: &Path, expected_fingerprint: &str) -> CodeSeekerResult<Vec<(i64, Vec<f32>)>> {
    let file = File::open(path).map_err(CodeSeekerError::Io)?;
    let mut reader = BufReader::new(file);

    let header: LogHeader = read_record(&mut reader)?
        .ok_or_else(|| CodeSeekerError::Internal("vector log is empty".into()))?;
    if header.model_fingerprint != expected_fingerprint {
        return Err(CodeSeekerError::EmbeddingUnavailable {
            reason: "vector log was written under a different embedding model".into(),
        });
    }

    let mut vectors: Vec<(i64, Vec<f32>)> = Vec::new();
    while let Some(record) = read_record::<LogRecord, _>(&mut reader)? {
        match record {
            LogRecord::Upsert { chunk_id, vector } => {
                match vectors.iter_mut().find(|(id, _)| *id == chunk_id) {
                    Some((_, existing)) => *existing = vector,
                    None => vectors.push((chunk_id, vector)),
                }
            }
            LogRecord::Remove { chunk_id } => {
                vectors.retain(|(id, _)| *id != chunk_id);
            }
        }
    }
    Ok(vectors)
}

fn read_record<T: for<'de> Deserialize<'de>, R: Read>(reader: &mut R) -> CodeSeekerResult<Option<T>> {
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(CodeSeekerError::Io(e)),
    }
    let len = u32::from_le_bytes(len_bytes) as usize;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(CodeSeekerError::Io)?;
    let record = bincode::deserialize(&buf).map_err(|e| CodeSeekerError::Internal(e.to_string()))?;
    Ok(Some(record))
}

/// Cosine similarity between two equal-length vectors. Returns 0.0 for a
/// zero-magnitude vector rather than dividing by zero.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Normalize a vector to unit L2 length in place. A zero vector is left
/// unchanged rather than producing NaNs.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(dims: usize) -> (tempfile::TempDir, VectorStore) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = VectorStore::open(&dir.path().join("vectors.log"), dims, "test-model-v1")
            .expect("open store");
        (dir, store)
    }

    #[test]
    fn new_store_is_empty() {
        let (_dir, store) = temp_store(4);
        assert!(store.is_empty());
        assert_eq!(store.dimensions(), 4);
    }

    #[test]
    fn upsert_then_search_finds_the_closest_vector() {
        let (_dir, mut store) = temp_store(3);
        store.upsert(1, vec![1.0, 0.0, 0.0]).unwrap();
        store.upsert(2, vec![0.0, 1.0, 0.0]).unwrap();
        store.upsert(3, vec![0.9, 0.1, 0.0]).unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 2);
        assert_eq!(results[0].0, 1);
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn remove_drops_a_vector_from_results() {
        let (_dir, mut store) = temp_store(2);
        store.upsert(1, vec![1.0, 0.0]).unwrap();
        store.remove(1).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn mismatched_dimension_is_rejected() {
        let (_dir, mut store) = temp_store(3);
        let err = store.upsert(1, vec![1.0, 0.0]).unwrap_err();
        assert!(matches!(err, CodeSeekerError::StoreWriteFailed { .. }));
    }

    #[test]
    fn reopening_replays_the_log() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let log_path = dir.path().join("vectors.log");
        {
            let mut store = VectorStore::open(&log_path, 2, "model-a").unwrap();
            store.upsert(1, vec![1.0, 0.0]).unwrap();
            store.upsert(2, vec![0.0, 1.0]).unwrap();
        }
        let reopened = VectorStore::open(&log_path, 2, "model-a").unwrap();
        assert_eq!(reopened.len(), 2);
    }

    #[test]
    fn reopening_with_a_different_fingerprint_discards_the_log() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let log_path = dir.path().join("vectors.log");
        {
            let mut store = VectorStore::open(&log_path, 2, "model-a").unwrap();
            store.upsert(1, vec![1.0, 0.0]).unwrap();
        }
        let reopened = VectorStore::open(&log_path, 2, "model-b").unwrap();
        assert!(reopened.is_empty());
    }

    #[test]
    fn compaction_preserves_current_state_and_drops_tombstones() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let log_path = dir.path().join("vectors.log");
        let mut store = VectorStore::open(&log_path, 2, "model-a").unwrap();
        store.upsert(1, vec![1.0, 0.0]).unwrap();
        store.upsert(2, vec![0.0, 1.0]).unwrap();
        store.remove(2).unwrap();
        store.compact().unwrap();

        let reopened = VectorStore::open(&log_path, 2, "model-a").unwrap();
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![0.3, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_similarity_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn l2_normalize_produces_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-5);
        assert!((v[1] - 0.8).abs() < 1e-5);
    }
}
