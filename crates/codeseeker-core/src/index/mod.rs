//! Metadata and full-text index: SQLite-backed storage for files, chunks,
//! symbols, and relationships, plus FTS5 keyword search over chunk text.
//!
//! This is the "text" side of the hybrid search triad (vector + text + path).
//! Everything here is synchronous; callers from the async pipeline run it
//! inside `spawn_blocking` rather than holding the connection across an await.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::CodeSeekerResult;
use crate::types::{Chunk, ChunkKind, Confidence, FileInfo, Language, Relationship, RelationshipKind, Symbol, Visibility};

const SCHEMA: &str = include_str!("schema.sql");

/// Aggregate counts describing the current state of the index.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexStatistics {
    /// Number of indexed files.
    pub file_count: usize,
    /// Number of stored chunks.
    pub chunk_count: usize,
    /// Number of resolved symbols.
    pub symbol_count: usize,
    /// Number of recorded relationships.
    pub relationship_count: usize,
}

/// A keyword-search hit from the FTS5 index, before fusion with other signals.
#[derive(Debug, Clone)]
pub struct TextHit {
    /// Matched chunk ID.
    pub chunk_id: i64,
    /// BM25 rank (lower is better, as returned by SQLite's `bm25()`).
    pub rank: f64,
}

/// Metadata index and FTS5 text search over a project's files, chunks, and symbols.
pub struct MetadataIndex {
    conn: Connection,
    db_path: PathBuf,
}

impl MetadataIndex {
    /// Open (or create) the SQLite database at `db_path`.
    pub fn open(db_path: &Path) -> CodeSeekerResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "cache_size", -64000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let index = Self { conn, db_path: db_path.to_path_buf() };
        index.ensure_schema()?;
        Ok(index)
    }

    /// Open an independent connection to the same database file.
    ///
    /// `rusqlite::Connection` is `Send` but not `Sync` (its statement cache
    /// uses a `RefCell`), so a single `MetadataIndex` can't be shared by
    /// reference across threads. Search legs that need to run concurrently
    /// each get their own owned replica instead; WAL mode allows multiple
    /// readers alongside the writer.
    pub fn open_replica(&self) -> CodeSeekerResult<Self> {
        Self::open(&self.db_path)
    }

    fn ensure_schema(&self) -> CodeSeekerResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Quick sanity check that the schema's core tables exist.
    pub fn check_integrity(&self) -> CodeSeekerResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('files','chunks','symbols','relationships')",
            [],
            |row| row.get(0),
        )?;
        Ok(count == 4)
    }

    /// Direct access to the underlying connection, for callers (e.g. standards
    /// mining) that need raw queries this surface doesn't expose.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    // -- files ---------------------------------------------------------

    /// Insert a file record, or update it in place if the path already exists.
    /// Returns the file's database ID.
    pub fn upsert_file(&self, file: &FileInfo) -> CodeSeekerResult<i64> {
        let path = file.path.to_string_lossy();
        self.conn.execute(
            "INSERT INTO files (path, language, content_hash, size_bytes, mtime)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                language = excluded.language,
                content_hash = excluded.content_hash,
                size_bytes = excluded.size_bytes,
                mtime = excluded.mtime",
            params![path, file.language.as_str(), file.content_hash, file.size_bytes as i64, file.mtime],
        )?;
        self.get_file_id(&file.path)?.ok_or_else(|| {
            crate::error::CodeSeekerError::Internal(format!("upsert did not produce a row for {}", file.path.display()))
        })
    }

    /// Look up a file's database ID by path.
    pub fn get_file_id(&self, path: &Path) -> CodeSeekerResult<Option<i64>> {
        let id = self
            .conn
            .query_row("SELECT id FROM files WHERE path = ?1", params![path.to_string_lossy()], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    /// Fetch the full record for a file by path, if indexed.
    pub fn get_file(&self, path: &Path) -> CodeSeekerResult<Option<FileInfo>> {
        self.conn
            .query_row(
                "SELECT id, path, language, content_hash, size_bytes, mtime FROM files WHERE path = ?1",
                params![path.to_string_lossy()],
                row_to_file_info,
            )
            .optional()
            .map_err(Into::into)
    }

    /// The stored content hash for a path, used by the change detector's
    /// strong-hash comparison. `None` if the file isn't indexed yet.
    pub fn get_file_hash(&self, path: &Path) -> CodeSeekerResult<Option<String>> {
        let hash = self
            .conn
            .query_row("SELECT content_hash FROM files WHERE path = ?1", params![path.to_string_lossy()], |row| row.get(0))
            .optional()?;
        Ok(hash)
    }

    /// All indexed files, for diffing against a fresh filesystem scan.
    pub fn list_files(&self) -> CodeSeekerResult<Vec<FileInfo>> {
        let mut stmt = self.conn.prepare("SELECT id, path, language, content_hash, size_bytes, mtime FROM files")?;
        let rows = stmt.query_map([], row_to_file_info)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Remove a file and (via `ON DELETE CASCADE`) its chunks, symbols, and
    /// FTS rows. Relationships referencing its symbols are left for the
    /// caller to prune from the graph store; they're not file-scoped here.
    pub fn delete_file(&self, file_id: i64) -> CodeSeekerResult<()> {
        self.conn.execute("DELETE FROM files WHERE id = ?1", params![file_id])?;
        Ok(())
    }

    /// Replace all chunk and symbol rows for `file_id` with a fresh extraction,
    /// then re-tag the file's hash/mtime. This is the "reindex" primitive: a
    /// changed file is always fully re-chunked rather than diffed.
    ///
    /// `symbols[i].chunk_id`, if set, is interpreted as a positional index
    /// into `chunks` rather than a database ID, since the caller builds both
    /// lists before any IDs exist; it's resolved to the real row ID here.
    pub fn reindex_file(&mut self, file: &FileInfo, chunks: &[Chunk], symbols: &[Symbol]) -> CodeSeekerResult<(i64, Vec<i64>)> {
        let tx = self.conn.transaction()?;
        let path = file.path.to_string_lossy();

        tx.execute(
            "INSERT INTO files (path, language, content_hash, size_bytes, mtime)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(path) DO UPDATE SET
                language = excluded.language,
                content_hash = excluded.content_hash,
                size_bytes = excluded.size_bytes,
                mtime = excluded.mtime",
            params![path, file.language.as_str(), file.content_hash, file.size_bytes as i64, file.mtime],
        )?;
        let file_id: i64 = tx.query_row("SELECT id FROM files WHERE path = ?1", params![path], |row| row.get(0))?;

        tx.execute("DELETE FROM symbols WHERE file_id = ?1", params![file_id])?;
        tx.execute("DELETE FROM chunks WHERE file_id = ?1", params![file_id])?;

        let mut chunk_ids = Vec::with_capacity(chunks.len());
        {
            let mut insert_chunk = tx.prepare(
                "INSERT INTO chunks (file_id, symbol_path, kind, visibility, line_start, line_end, content, doc_comment, token_count, weight, vector_id, is_overlap)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for chunk in chunks {
                insert_chunk.execute(params![
                    file_id,
                    chunk.symbol_path,
                    chunk.kind.as_str(),
                    chunk.visibility.as_str(),
                    chunk.line_start,
                    chunk.line_end,
                    chunk.content,
                    chunk.doc_comment,
                    chunk.token_count,
                    chunk.weight,
                    chunk.vector_id.map(|v| v as i64),
                    chunk.is_overlap,
                ])?;
                chunk_ids.push(tx.last_insert_rowid());
            }
        }

        {
            let mut insert_symbol = tx.prepare(
                "INSERT INTO symbols (name, fqn, kind, file_id, line, chunk_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(fqn) DO UPDATE SET
                    name = excluded.name,
                    kind = excluded.kind,
                    file_id = excluded.file_id,
                    line = excluded.line,
                    chunk_id = excluded.chunk_id",
            )?;
            for symbol in symbols {
                let chunk_id = symbol.chunk_id.and_then(|idx| chunk_ids.get(idx as usize).copied());
                insert_symbol.execute(params![symbol.name, symbol.fqn, symbol.kind.as_str(), file_id, symbol.line, chunk_id])?;
            }
        }

        tx.commit()?;
        Ok((file_id, chunk_ids))
    }

    /// Record the vector store ID assigned to a chunk after embedding.
    pub fn set_chunk_vector_id(&self, chunk_id: i64, vector_id: u64) -> CodeSeekerResult<()> {
        self.conn
            .execute("UPDATE chunks SET vector_id = ?1 WHERE id = ?2", params![vector_id as i64, chunk_id])?;
        Ok(())
    }

    /// Fetch a chunk by ID, for assembling search results and file context.
    pub fn get_chunk(&self, chunk_id: i64) -> CodeSeekerResult<Option<Chunk>> {
        self.conn
            .query_row(
                "SELECT id, file_id, symbol_path, kind, visibility, line_start, line_end, content, doc_comment, token_count, weight, vector_id, is_overlap
                 FROM chunks WHERE id = ?1",
                params![chunk_id],
                row_to_chunk,
            )
            .optional()
            .map_err(Into::into)
    }

    /// IDs of every chunk belonging to a file, for superseding their vector
    /// store entries before the rows themselves are deleted or replaced.
    pub fn get_chunk_ids_for_file(&self, file_id: i64) -> CodeSeekerResult<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM chunks WHERE file_id = ?1")?;
        let rows = stmt.query_map(params![file_id], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// All chunks belonging to a file, ordered by position, for context assembly.
    pub fn get_chunks_for_file(&self, file_id: i64) -> CodeSeekerResult<Vec<Chunk>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, file_id, symbol_path, kind, visibility, line_start, line_end, content, doc_comment, token_count, weight, vector_id, is_overlap
             FROM chunks WHERE file_id = ?1 ORDER BY line_start",
        )?;
        let rows = stmt.query_map(params![file_id], row_to_chunk)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Fetch a file record by its database ID.
    pub fn get_file_by_id(&self, file_id: i64) -> CodeSeekerResult<Option<FileInfo>> {
        self.conn
            .query_row(
                "SELECT id, path, language, content_hash, size_bytes, mtime FROM files WHERE id = ?1",
                params![file_id],
                row_to_file_info,
            )
            .optional()
            .map_err(Into::into)
    }

    /// The file path backing a chunk, for surfacing alongside search results.
    pub fn get_file_path_for_chunk(&self, chunk_id: i64) -> CodeSeekerResult<Option<PathBuf>> {
        let path: Option<String> = self
            .conn
            .query_row(
                "SELECT f.path FROM files f JOIN chunks c ON c.file_id = f.id WHERE c.id = ?1",
                params![chunk_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }

    // -- symbols ---------------------------------------------------------

    /// Lookup by primary key, used to label the endpoints of a relationship query.
    pub fn get_symbol_by_id(&self, symbol_id: i64) -> CodeSeekerResult<Option<Symbol>> {
        self.conn
            .query_row(
                "SELECT id, name, fqn, kind, file_id, line, chunk_id FROM symbols WHERE id = ?1",
                params![symbol_id],
                row_to_symbol,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Exact lookup by fully qualified name, used to resolve import/call targets.
    pub fn get_symbol_by_fqn(&self, fqn: &str) -> CodeSeekerResult<Option<Symbol>> {
        self.conn
            .query_row(
                "SELECT id, name, fqn, kind, file_id, line, chunk_id FROM symbols WHERE fqn = ?1",
                params![fqn],
                row_to_symbol,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Fuzzy-ish lookup by short name, used when a reference can't be resolved
    /// to a fully qualified path (heuristic confidence).
    pub fn search_symbols_by_name(&self, name: &str, limit: usize) -> CodeSeekerResult<Vec<Symbol>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, fqn, kind, file_id, line, chunk_id FROM symbols WHERE name = ?1 LIMIT ?2")?;
        let rows = stmt.query_map(params![name, limit as i64], row_to_symbol)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The first (lowest-line) symbol defined in a file, used as the anchor
    /// symbol when a relationship targets "this file" rather than a specific
    /// declaration (e.g. a bare `import foo` with no named members).
    pub fn get_first_symbol_for_file(&self, file_id: i64) -> CodeSeekerResult<Option<Symbol>> {
        self.conn
            .query_row(
                "SELECT id, name, fqn, kind, file_id, line, chunk_id FROM symbols WHERE file_id = ?1 ORDER BY line LIMIT 1",
                params![file_id],
                row_to_symbol,
            )
            .optional()
            .map_err(Into::into)
    }

    /// All symbols defined in a file, for seeding a graph traversal from
    /// "everything this file declares".
    pub fn get_symbols_for_file(&self, file_id: i64) -> CodeSeekerResult<Vec<Symbol>> {
        let mut stmt = self.conn.prepare("SELECT id, name, fqn, kind, file_id, line, chunk_id FROM symbols WHERE file_id = ?1")?;
        let rows = stmt.query_map(params![file_id], row_to_symbol)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// The file path that defines a given symbol ID.
    pub fn get_file_path_for_symbol(&self, symbol_id: i64) -> CodeSeekerResult<Option<PathBuf>> {
        let path: Option<String> = self
            .conn
            .query_row(
                "SELECT f.path FROM files f JOIN symbols s ON s.file_id = f.id WHERE s.id = ?1",
                params![symbol_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(path.map(PathBuf::from))
    }

    // -- relationships ---------------------------------------------------------

    /// Record a resolved relationship between two symbols.
    pub fn insert_relationship(&self, relationship: &Relationship) -> CodeSeekerResult<()> {
        self.conn.execute(
            "INSERT INTO relationships (source_id, target_id, kind, confidence) VALUES (?1, ?2, ?3, ?4)",
            params![
                relationship.source_id,
                relationship.target_id,
                relationship.kind.as_str(),
                confidence_str(relationship.confidence),
            ],
        )?;
        Ok(())
    }

    /// All relationships, for rebuilding the in-memory graph on startup.
    pub fn list_relationships(&self) -> CodeSeekerResult<Vec<Relationship>> {
        let mut stmt = self.conn.prepare("SELECT source_id, target_id, kind, confidence FROM relationships")?;
        let rows = stmt.query_map([], row_to_relationship)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Total relationship count, for status/statistics reporting.
    pub fn relationship_count(&self) -> CodeSeekerResult<usize> {
        let count: i64 = self.conn.query_row("SELECT count(*) FROM relationships", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Files whose relative path contains `query` (case-insensitive), for the
    /// path/fuzzy leg of hybrid search.
    pub fn search_files_by_path_substring(&self, query: &str, limit: usize) -> CodeSeekerResult<Vec<FileInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, path, language, content_hash, size_bytes, mtime FROM files
             WHERE path LIKE '%' || ?1 || '%' COLLATE NOCASE LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![query, limit as i64], row_to_file_info)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Symbols whose name contains `query` (case-insensitive), for the
    /// path/fuzzy leg of hybrid search.
    pub fn search_symbols_by_substring(&self, query: &str, limit: usize) -> CodeSeekerResult<Vec<Symbol>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, fqn, kind, file_id, line, chunk_id FROM symbols
             WHERE name LIKE '%' || ?1 || '%' COLLATE NOCASE LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![query, limit as i64], row_to_symbol)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Approximate total line count of a file, derived from its farthest
    /// chunk boundary. Used to suppress snippets for very large files
    /// regardless of query intent.
    pub fn estimate_file_line_count(&self, file_id: i64) -> CodeSeekerResult<u32> {
        let max_line: Option<u32> = self.conn.query_row("SELECT MAX(line_end) FROM chunks WHERE file_id = ?1", params![file_id], |row| row.get(0))?;
        Ok(max_line.unwrap_or(0))
    }

    // -- search ---------------------------------------------------------

    /// Keyword search over chunk text via FTS5, ranked by BM25 (lower is better).
    /// Query text is decomposed the same way as at index time so identifier
    /// fragments (`getUser` matching a query for `user`) are found.
    pub fn text_search(&self, query: &str, limit: usize) -> CodeSeekerResult<Vec<TextHit>> {
        let match_expr = build_fts_match(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(
            "SELECT rowid, bm25(chunks_fts) AS rank FROM chunks_fts WHERE chunks_fts MATCH ?1 ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![match_expr, limit as i64], |row| {
            Ok(TextHit { chunk_id: row.get(0)?, rank: row.get(1)? })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // -- statistics ---------------------------------------------------------

    /// Aggregate counts across all tracked tables.
    pub fn statistics(&self) -> CodeSeekerResult<IndexStatistics> {
        let file_count: i64 = self.conn.query_row("SELECT count(*) FROM files", [], |row| row.get(0))?;
        let chunk_count: i64 = self.conn.query_row("SELECT count(*) FROM chunks", [], |row| row.get(0))?;
        let symbol_count: i64 = self.conn.query_row("SELECT count(*) FROM symbols", [], |row| row.get(0))?;
        let relationship_count: i64 = self.conn.query_row("SELECT count(*) FROM relationships", [], |row| row.get(0))?;
        Ok(IndexStatistics {
            file_count: file_count as usize,
            chunk_count: chunk_count as usize,
            symbol_count: symbol_count as usize,
            relationship_count: relationship_count as usize,
        })
    }
}

fn confidence_str(confidence: Confidence) -> &'static str {
    match confidence {
        Confidence::Exact => "exact",
        Confidence::Heuristic => "heuristic",
    }
}

fn confidence_from_str(s: &str) -> Confidence {
    match s {
        "exact" => Confidence::Exact,
        _ => Confidence::Heuristic,
    }
}

fn row_to_file_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileInfo> {
    let language: String = row.get(2)?;
    let size_bytes: i64 = row.get(4)?;
    Ok(FileInfo {
        id: row.get(0)?,
        path: PathBuf::from(row.get::<_, String>(1)?),
        language: language_from_str(&language),
        content_hash: row.get(3)?,
        size_bytes: size_bytes as u64,
        mtime: row.get(5)?,
    })
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chunk> {
    let kind: String = row.get(3)?;
    let visibility: String = row.get(4)?;
    let vector_id: Option<i64> = row.get(11)?;
    Ok(Chunk {
        id: row.get(0)?,
        file_id: row.get(1)?,
        symbol_path: row.get(2)?,
        kind: ChunkKind::from_str_lossy(&kind),
        visibility: Visibility::from_str_lossy(&visibility),
        line_start: row.get(5)?,
        line_end: row.get(6)?,
        content: row.get(7)?,
        doc_comment: row.get(8)?,
        token_count: row.get(9)?,
        weight: row.get(10)?,
        vector_id: vector_id.map(|v| v as u64),
        is_overlap: row.get(12)?,
    })
}

fn row_to_symbol(row: &rusqlite::Row<'_>) -> rusqlite::Result<Symbol> {
    let kind: String = row.get(3)?;
    Ok(Symbol {
        id: row.get(0)?,
        name: row.get(1)?,
        fqn: row.get(2)?,
        kind: ChunkKind::from_str_lossy(&kind),
        file_id: row.get(4)?,
        line: row.get(5)?,
        chunk_id: row.get(6)?,
    })
}

fn row_to_relationship(row: &rusqlite::Row<'_>) -> rusqlite::Result<Relationship> {
    let kind: String = row.get(2)?;
    let confidence: String = row.get(3)?;
    Ok(Relationship {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        kind: RelationshipKind::from_str_lossy(&kind),
        confidence: confidence_from_str(&confidence),
    })
}

fn language_from_str(s: &str) -> Language {
    match s {
        "python" => Language::Python,
        "typescript" => Language::TypeScript,
        "javascript" => Language::JavaScript,
        "rust" => Language::Rust,
        "go" => Language::Go,
        "java" => Language::Java,
        "c" => Language::C,
        "cpp" => Language::Cpp,
        "csharp" => Language::CSharp,
        "css" => Language::Css,
        "ruby" => Language::Ruby,
        "php" => Language::Php,
        "swift" => Language::Swift,
        "kotlin" => Language::Kotlin,
        "html" => Language::Html,
        "shell" => Language::Shell,
        "markdown" => Language::Markdown,
        "toml" => Language::Toml,
        "yaml" => Language::Yaml,
        "json" => Language::Json,
        _ => Language::Unknown,
    }
}

/// Build an FTS5 `MATCH` expression from a free-text query: split into terms
/// on non-alphanumeric boundaries, decompose CamelCase/snake_case the same
/// way the embedder's tokenizer does, drop single-character noise, and join
/// with OR so a partial identifier match still surfaces.
fn build_fts_match(query: &str) -> String {
    let mut terms: Vec<String> = Vec::new();
    for raw in query.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        for part in crate::embedder::hashing::tokenize(raw) {
            if part.len() >= 2 {
                terms.push(format!("\"{part}\""));
            }
        }
    }
    terms.dedup();
    terms.join(" OR ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_file() -> FileInfo {
        FileInfo {
            id: 0,
            path: PathBuf::from("src/lib.rs"),
            language: Language::Rust,
            content_hash: "abc123".into(),
            size_bytes: 42,
            mtime: 1000,
        }
    }

    fn sample_chunk() -> Chunk {
        Chunk {
            id: 0,
            file_id: 0,
            symbol_path: "lib::run".into(),
            kind: ChunkKind::Function,
            visibility: Visibility::Public,
            line_start: 1,
            line_end: 5,
            content: "fn run() { do_work(); }".into(),
            doc_comment: Some("Runs the thing.".into()),
            token_count: 6,
            weight: 0.85,
            vector_id: None,
            is_overlap: false,
        }
    }

    #[test]
    fn open_creates_database_with_expected_tables() {
        let dir = tempdir().unwrap();
        let index = MetadataIndex::open(&dir.path().join("index.db")).unwrap();
        assert!(index.check_integrity().unwrap());
    }

    #[test]
    fn upsert_file_is_idempotent_on_path() {
        let dir = tempdir().unwrap();
        let index = MetadataIndex::open(&dir.path().join("index.db")).unwrap();
        let file = sample_file();
        let id1 = index.upsert_file(&file).unwrap();
        let id2 = index.upsert_file(&file).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(index.list_files().unwrap().len(), 1);
    }

    #[test]
    fn reindex_file_replaces_chunks_and_symbols() {
        let dir = tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("index.db")).unwrap();
        let file = sample_file();
        let chunk = sample_chunk();
        let symbol =
            Symbol { id: 0, name: "run".into(), fqn: "lib::run".into(), kind: ChunkKind::Function, file_id: 0, line: 1, chunk_id: Some(0) };

        let (file_id, chunk_ids) = index.reindex_file(&file, &[chunk.clone()], &[symbol]).unwrap();
        assert_eq!(chunk_ids.len(), 1);
        assert_eq!(index.get_chunks_for_file(file_id).unwrap().len(), 1);

        let (file_id_again, chunk_ids_again) = index.reindex_file(&file, &[chunk], &[]).unwrap();
        assert_eq!(file_id, file_id_again);
        assert_eq!(chunk_ids_again.len(), 1);
        assert_eq!(index.get_chunks_for_file(file_id).unwrap().len(), 1, "old chunks must not accumulate");
    }

    #[test]
    fn text_search_finds_chunk_by_identifier_fragment() {
        let dir = tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("index.db")).unwrap();
        let file = sample_file();
        index.reindex_file(&file, &[sample_chunk()], &[]).unwrap();

        let hits = index.text_search("do_work", 10).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn text_search_with_no_alphanumeric_terms_returns_empty() {
        let dir = tempdir().unwrap();
        let index = MetadataIndex::open(&dir.path().join("index.db")).unwrap();
        assert!(index.text_search("???", 10).unwrap().is_empty());
    }

    #[test]
    fn get_symbol_by_fqn_resolves_exact_match() {
        let dir = tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("index.db")).unwrap();
        let file = sample_file();
        let symbol = Symbol { id: 0, name: "run".into(), fqn: "lib::run".into(), kind: ChunkKind::Function, file_id: 0, line: 1, chunk_id: None };
        index.reindex_file(&file, &[], &[symbol]).unwrap();

        assert!(index.get_symbol_by_fqn("lib::run").unwrap().is_some());
        assert!(index.get_symbol_by_fqn("lib::missing").unwrap().is_none());
    }

    #[test]
    fn insert_relationship_and_list_round_trips() {
        let dir = tempdir().unwrap();
        let index = MetadataIndex::open(&dir.path().join("index.db")).unwrap();
        index
            .insert_relationship(&Relationship { source_id: 1, target_id: 2, kind: RelationshipKind::Calls, confidence: Confidence::Exact })
            .unwrap();
        let all = index.list_relationships().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(index.relationship_count().unwrap(), 1);
    }

    #[test]
    fn delete_file_removes_its_chunks_via_cascade() {
        let dir = tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("index.db")).unwrap();
        let file = sample_file();
        let (file_id, _) = index.reindex_file(&file, &[sample_chunk()], &[]).unwrap();
        index.delete_file(file_id).unwrap();
        assert!(index.get_file(&file.path).unwrap().is_none());
        assert!(index.get_chunks_for_file(file_id).unwrap().is_empty());
    }

    #[test]
    fn statistics_reflects_indexed_content() {
        let dir = tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("index.db")).unwrap();
        let file = sample_file();
        let symbol =
            Symbol { id: 0, name: "run".into(), fqn: "lib::run".into(), kind: ChunkKind::Function, file_id: 0, line: 1, chunk_id: Some(0) };
        index.reindex_file(&file, &[sample_chunk()], &[symbol]).unwrap();

        let stats = index.statistics().unwrap();
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.chunk_count, 1);
        assert_eq!(stats.symbol_count, 1);
    }
}
