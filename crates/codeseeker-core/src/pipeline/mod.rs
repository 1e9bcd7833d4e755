//! Indexing and query orchestrator.
//!
//! Wires together every subsystem into one coherent engine. This is the
//! top-level public API of codeseeker-core.
//!
//! ## Phase ordering
//!
//! A single indexing pass runs six phases per changed file, in order:
//!
//! ```text
//! Remove  -- drop the file's prior chunks/symbols/graph nodes, if reindexing
//! Extract -- parse -> structural elements -> chunks -> symbols
//! Embed   -- embed each chunk's text (skipped when the provider is unavailable)
//! Write   -- atomic reindex_file() transaction + vector store upsert
//! Resolve -- turn import/reference names into graph relationships
//! Standards -- re-mine the categories this file's content could affect
//! ```
//!
//! Extract and Embed don't touch any shared store, so a batch of changed
//! files runs them on a `rayon` worker pool sized to CPU count minus one;
//! Remove/Write/Resolve still apply one file at a time against the single
//! `MetadataIndex`/`VectorStore`/`CodeGraph` handles.
//!
//! A project-scoped `tokio::sync::Mutex` serializes pass starts so two
//! concurrent `run_index` calls for the same engine never interleave writes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tokio::sync::{mpsc, Mutex};

use crate::chunker;
use crate::config::Config;
use crate::embedder::{self, EmbeddingProvider};
use crate::error::{CodeSeekerError, CodeSeekerResult};
use crate::exclusions::ExclusionRules;
use crate::graph::{CodeGraph, GraphDirection, NodeAttrs, NodeKey};
use crate::index::MetadataIndex;
use crate::parser;
use crate::search::{QueryIntent, SearchEngine, SearchFilters, SearchOutcome};
use crate::standards::StandardsProfile;
use crate::types::{Confidence, FileInfo, Language, PipelineEvent, Relationship, Symbol};
use crate::vector::VectorStore;
use crate::watcher::FileWatcher;

/// The main CodeSeeker engine.
///
/// Owns every subsystem and coordinates its lifecycle: the primary entry
/// point for the library, used by both the MCP server and the CLI.
pub struct Engine {
    config: Config,
    index: MetadataIndex,
    vector_store: VectorStore,
    embedder: Box<dyn EmbeddingProvider>,
    search_engine: SearchEngine,
    graph: CodeGraph,
    exclusions: ExclusionRules,
    /// Serializes pass starts so two concurrent `run_index` calls for this
    /// project never interleave writes to the same SQLite connection.
    index_lock: Arc<Mutex<()>>,
}

impl Engine {
    /// Create a new engine for the given project, loading `.codeseeker/config.toml`.
    pub fn new(project_path: &Path) -> CodeSeekerResult<Self> {
        let config = Config::load(project_path)?;
        Self::with_config(config)
    }

    /// Create an engine with explicit configuration (for testing and CLI overrides).
    pub fn with_config(config: Config) -> CodeSeekerResult<Self> {
        let data_dir = config.data_dir();
        std::fs::create_dir_all(&data_dir)?;

        let index = MetadataIndex::open(&data_dir.join("index.db"))?;
        let embedder = embedder::build_provider(&config);
        let vector_store = VectorStore::open(&data_dir.join("vectors.bin"), config.embedding.dimensions, &embedder.model_fingerprint())?;
        let search_engine = SearchEngine::new(config.search.rrf_k);
        let graph = CodeGraph::new();
        rebuild_graph(&graph, &index)?;
        let exclusions = ExclusionRules::load(&config.project_path)?;

        tracing::info!(
            project = %config.project_path.display(),
            data_dir = %data_dir.display(),
            embedding_available = embedder.is_available(),
            graph_nodes = graph.node_count(),
            graph_edges = graph.edge_count(),
            "engine initialized"
        );

        Ok(Self { config, index, vector_store, embedder, search_engine, graph, exclusions, index_lock: Arc::new(Mutex::new(())) })
    }

    /// Run a full indexing pass: scan the project, process every discovered
    /// file, persist the vector store, and re-mine coding standards.
    ///
    /// `force_full` re-embeds every discovered file unconditionally; without
    /// it, each file is checked against the two-stage change detector first
    /// (cheap mtime/size, falling back to content hash) and unchanged files
    /// are skipped before they'd otherwise be re-read and re-hashed.
    pub async fn run_index(&mut self, force_full: bool) -> CodeSeekerResult<IndexResult> {
        let project_path = self.config.project_path.clone();
        let (tx, rx) = mpsc::channel::<PipelineEvent>(1024);

        if force_full {
            let watcher = FileWatcher::new(&project_path, &self.config.watcher, &self.config.indexing);
            let file_count = watcher.full_scan(&tx).await?;
            tracing::info!(files = file_count, "full scan complete, processing files");
        } else {
            let scanned = crate::scanner::scan(&project_path, &self.config.indexing, &self.exclusions);
            let mut seen_on_disk = std::collections::HashSet::new();
            let mut changed = 0;
            let mut unchanged = 0;
            for file in scanned {
                let relative = relativize(&file.path, &project_path);
                seen_on_disk.insert(relative.clone());
                let previous = self.index.get_file(&relative)?;
                let (status, _hash) = crate::detector::detect_change(&file, previous.as_ref())?;
                if matches!(status, crate::detector::ChangeStatus::Unchanged) {
                    unchanged += 1;
                    continue;
                }
                changed += 1;
                if tx.send(PipelineEvent::FileChanged { path: file.path }).await.is_err() {
                    break;
                }
            }

            // Remove phase for files that vanished from disk between passes:
            // anything the index still knows about but the scan didn't see.
            let mut deleted = 0;
            for indexed in self.index.list_files()? {
                if !seen_on_disk.contains(&indexed.path) {
                    deleted += 1;
                    if tx.send(PipelineEvent::FileDeleted { path: project_path.join(&indexed.path) }).await.is_err() {
                        break;
                    }
                }
            }
            tracing::info!(changed, unchanged, deleted, "incremental scan complete, processing changed files");
        }
        drop(tx);

        self.drain(rx, force_full).await
    }

    /// Process a stream of live file-change events (from `watch()` or a
    /// single `notify_file_changes` call), without an initial full scan.
    pub async fn run_incremental(&mut self, rx: mpsc::Receiver<PipelineEvent>) -> CodeSeekerResult<IndexResult> {
        self.drain(rx, false).await
    }

    async fn drain(&mut self, mut rx: mpsc::Receiver<PipelineEvent>, full_pass: bool) -> CodeSeekerResult<IndexResult> {
        let _guard = self.index_lock.clone().lock_owned().await;

        let mut result = IndexResult::default();
        let mut changed_files: Vec<PathBuf> = Vec::new();
        let mut changed: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut deleted: Vec<PathBuf> = Vec::new();

        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::FileChanged { path } => {
                    let relative = relativize(&path, &self.config.project_path);
                    changed.push((path, relative));
                }
                PipelineEvent::FileDeleted { path } => {
                    let relative = relativize(&path, &self.config.project_path);
                    deleted.push(relative);
                }
                PipelineEvent::FullScan => {}
                PipelineEvent::Shutdown => break,
            }
        }

        for relative in deleted {
            match self.remove_file(&relative) {
                Ok(()) => result.files_deleted += 1,
                Err(e) => tracing::warn!(path = %relative.display(), error = %e, "failed to remove file from index"),
            }
        }

        // Precheck phase: read + hash each file and drop anything unchanged,
        // sequentially (these are light I/O/SQLite lookups). What's left goes
        // to the worker pool for the CPU-bound parse/chunk/embed phases.
        let mut to_prepare = Vec::new();
        for (absolute, relative) in changed {
            match self.precheck(&absolute, &relative) {
                Ok(Some(prechecked)) => to_prepare.push(prechecked),
                Ok(None) => result.files_processed += 1,
                Err(e) => {
                    tracing::warn!(path = %absolute.display(), error = %e, "failed to read file");
                    result.files_failed += 1;
                }
            }
        }

        let worker_count = std::thread::available_parallelism().map(|n| n.get().saturating_sub(1).max(1)).unwrap_or(1);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(worker_count).build().ok();
        let config = self.config.clone();
        let embedder = self.embedder.as_ref();
        let prepared: Vec<CodeSeekerResult<PreparedFile>> = match &pool {
            Some(pool) => pool.install(|| to_prepare.into_par_iter().map(|p| prepare_file(p, &config, embedder)).collect()),
            None => to_prepare.into_iter().map(|p| prepare_file(p, &config, embedder)).collect(),
        };

        for outcome in prepared {
            match outcome {
                Ok(prepared) => {
                    let path = prepared.relative_path.clone();
                    match self.apply_prepared(prepared) {
                        Ok(stats) => {
                            result.files_processed += 1;
                            result.chunks_created += stats.chunks;
                            result.symbols_extracted += stats.symbols;
                            result.embeddings_generated += stats.embeddings;
                            if stats.is_new {
                                result.files_indexed += 1;
                            } else if stats.chunks > 0 {
                                result.files_updated += 1;
                            }
                            if stats.chunks > 0 {
                                changed_files.push(path);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "failed to process file");
                            result.files_failed += 1;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to prepare file");
                    result.files_failed += 1;
                }
            }
        }

        if let Err(e) = self.vector_store.compact() {
            tracing::warn!(error = %e, "failed to compact vector store");
        }

        let mined = crate::standards::mine(&self.index, if full_pass { &[] } else { &changed_files })?;
        let mut profile = StandardsProfile::load(&self.standards_path())?;
        profile.merge_categories(mined);
        profile.save(&self.standards_path())?;

        tracing::info!(
            files = result.files_processed,
            chunks = result.chunks_created,
            symbols = result.symbols_extracted,
            embeddings = result.embeddings_generated,
            failed = result.files_failed,
            "indexing complete"
        );

        Ok(result)
    }

    fn standards_path(&self) -> PathBuf {
        self.config.data_dir().join("standards.json")
    }

    /// Remove phase: drop a file's chunks/symbols/graph nodes, by its
    /// project-relative path.
    fn remove_file(&mut self, relative_path: &Path) -> CodeSeekerResult<()> {
        let Some(file_id) = self.index.get_file_id(relative_path)? else {
            return Ok(());
        };
        for chunk_id in self.index.get_chunk_ids_for_file(file_id)? {
            if let Err(e) = self.vector_store.remove(chunk_id) {
                tracing::warn!(chunk_id, error = %e, "failed to remove vector for deleted chunk");
            }
        }
        self.graph.delete_symbols_by_file(file_id)?;
        self.index.delete_file(file_id)
    }

    /// Read and hash a file, dropping it here if its content hasn't changed
    /// since the last pass. Touches `self.index` for the hash lookup, so it
    /// stays sequential; everything past this point is pure and runs on the
    /// worker pool.
    fn precheck(&self, absolute_path: &Path, relative_path: &Path) -> CodeSeekerResult<Option<PrecheckedFile>> {
        let content = std::fs::read_to_string(absolute_path)?;
        let language = detect_language(relative_path);
        if matches!(language, Language::Unknown) {
            return Err(CodeSeekerError::ExtractionFailed { path: relative_path.to_path_buf(), message: "unsupported language".into() });
        }

        let hash = compute_file_hash(&content);
        if let Ok(Some(existing_hash)) = self.index.get_file_hash(relative_path) {
            if existing_hash == hash {
                tracing::debug!(path = %relative_path.display(), "file unchanged, skipping");
                return Ok(None);
            }
        }

        let metadata = std::fs::metadata(absolute_path)?;
        let mtime = metadata.modified().ok().and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok()).map_or(0, |d| d.as_secs() as i64);

        Ok(Some(PrecheckedFile { relative_path: relative_path.to_path_buf(), content, hash, mtime, language }))
    }

    /// Write phase: apply a prepared file's chunks/symbols/embeddings to the
    /// shared stores, then resolve its references and imports. Runs
    /// sequentially -- `self.index`, `self.vector_store`, and `self.graph`
    /// are each single, non-shareable handles.
    fn apply_prepared(&mut self, prepared: PreparedFile) -> CodeSeekerResult<FileProcessStats> {
        let PreparedFile { relative_path, file_info, elements, chunks, symbols, imports, embeddings } = prepared;
        let mut stats = FileProcessStats { chunks: chunks.len(), symbols: symbols.len(), ..Default::default() };

        // Remove: drop the file's prior graph nodes and superseded chunk
        // embeddings before writing the new ones, so a shrunk symbol set and
        // its replaced vectors don't leave anything stale behind.
        let existing_id = self.index.get_file_id(&relative_path)?;
        stats.is_new = existing_id.is_none();
        let mut superseded_chunk_ids = Vec::new();
        if let Some(existing_id) = existing_id {
            self.graph.delete_symbols_by_file(existing_id)?;
            superseded_chunk_ids = self.index.get_chunk_ids_for_file(existing_id)?;
        }

        // Write: one transaction replaces the file's chunks/symbols wholesale.
        let (file_id, chunk_ids) = self.index.reindex_file(&file_info, &chunks, &symbols)?;

        for old_chunk_id in superseded_chunk_ids {
            if let Err(e) = self.vector_store.remove(old_chunk_id) {
                tracing::warn!(chunk_id = old_chunk_id, error = %e, "failed to remove superseded vector");
            }
        }

        for symbol in self.index.get_symbols_for_file(file_id)? {
            self.graph.upsert_node(NodeKey::Internal(symbol.id), NodeAttrs { name: symbol.name.clone(), file_path: Some(relative_path.clone()) }, Some(file_id))?;
        }

        for (i, maybe_embedding) in embeddings.into_iter().enumerate() {
            let (Some(embedding), Some(&chunk_id)) = (maybe_embedding, chunk_ids.get(i)) else { continue };
            if let Err(e) = self.vector_store.upsert(chunk_id, embedding) {
                tracing::warn!(error = %e, "failed to add vector");
                continue;
            }
            if let Err(e) = self.index.set_chunk_vector_id(chunk_id, chunk_id as u64) {
                tracing::warn!(error = %e, "failed to set vector_id");
            }
            stats.embeddings += 1;
        }

        // Resolve: references and imports become graph relationships + SQLite rows.
        self.resolve_references(&elements, file_id)?;
        self.resolve_imports(&imports, file_id)?;

        tracing::debug!(
            path = %relative_path.display(),
            chunks = stats.chunks,
            symbols = stats.symbols,
            embeddings = stats.embeddings,
            imports = imports.len(),
            "file processed"
        );

        Ok(stats)
    }

    fn resolve_references(&mut self, elements: &[parser::StructuralElement], file_id: i64) -> CodeSeekerResult<()> {
        for element in elements {
            if element.references.is_empty() || element.symbol_path.is_empty() {
                continue;
            }
            let Some(source) = self.index.get_symbol_by_fqn(&element.symbol_path)? else { continue };

            for ref_name in &element.references {
                let target = self.resolve_symbol_name(ref_name)?;
                if let Some(target) = target {
                    if target.id != source.id {
                        self.record_relationship(source.id, target.id, crate::types::RelationshipKind::Calls, Confidence::Heuristic)?;
                    }
                }
            }
        }
        let _ = file_id;
        Ok(())
    }

    fn resolve_imports(&mut self, imports: &[crate::types::ImportStatement], file_id: i64) -> CodeSeekerResult<()> {
        if imports.is_empty() {
            return Ok(());
        }
        let Some(source) = self.index.get_first_symbol_for_file(file_id)? else { return Ok(()) };

        for import in imports {
            for name in &import.imported_names {
                if name == "*" {
                    continue;
                }
                if let Some(target) = self.resolve_symbol_name(name)? {
                    if target.id != source.id {
                        self.record_relationship(source.id, target.id, crate::types::RelationshipKind::Imports, Confidence::Heuristic)?;
                    }
                }
            }

            match self.index.get_symbol_by_fqn(&import.import_path)?.or(self.resolve_symbol_name(&import.import_path)?) {
                Some(target) if target.id != source.id => {
                    self.record_relationship(source.id, target.id, import.kind, Confidence::Exact)?;
                }
                Some(_) => {}
                None => {
                    let external = NodeKey::external(&import.import_path, "*");
                    self.graph.upsert_node(external.clone(), NodeAttrs { name: import.import_path.clone(), file_path: None }, None)?;
                    self.graph.upsert_edge(NodeKey::Internal(source.id), external, import.kind, Confidence::Heuristic)?;
                }
            }
        }
        Ok(())
    }

    fn resolve_symbol_name(&self, name: &str) -> CodeSeekerResult<Option<Symbol>> {
        if let Some(symbol) = self.index.get_symbol_by_fqn(name)? {
            return Ok(Some(symbol));
        }
        Ok(self.index.search_symbols_by_name(name, 1)?.into_iter().next())
    }

    fn record_relationship(&mut self, source_id: i64, target_id: i64, kind: crate::types::RelationshipKind, confidence: Confidence) -> CodeSeekerResult<()> {
        self.index.insert_relationship(&Relationship { source_id, target_id, kind, confidence })?;
        self.graph.upsert_edge(NodeKey::Internal(source_id), NodeKey::Internal(target_id), kind, confidence)
    }

    /// Execute a hybrid search query.
    pub fn search(&self, query: &str, limit: usize, filters: &SearchFilters, intent: QueryIntent) -> CodeSeekerResult<SearchOutcome> {
        self.search_engine.search(query, limit, &self.index, &self.vector_store, self.embedder.as_ref(), filters, intent)
    }

    /// Assemble a file's content plus its graph neighborhood.
    pub fn file_context(&self, relative_path: &Path, neighborhood_depth: usize) -> CodeSeekerResult<Option<crate::search::context::FileContext>> {
        crate::search::context::get_file_context(&self.config.project_path, relative_path, neighborhood_depth, &self.index, &self.graph)
    }

    /// Direct relationships for a symbol, in the given direction.
    pub fn relationships(&self, symbol_id: i64, direction: GraphDirection) -> CodeSeekerResult<Vec<crate::graph::Edge>> {
        self.graph.neighbors(&NodeKey::Internal(symbol_id), None, direction)
    }

    /// Resolve a `filepath_or_symbol` argument (as accepted by the
    /// relationships tool) to a starting graph node: a bare file path
    /// resolves to that file's first defined symbol, anything else is tried
    /// as a fully-qualified name.
    pub fn resolve_relationship_start(&self, filepath_or_symbol: &str) -> CodeSeekerResult<Option<NodeKey>> {
        let as_path = Path::new(filepath_or_symbol);
        if let Some(file_id) = self.index.get_file_id(as_path)? {
            if let Some(symbol) = self.index.get_first_symbol_for_file(file_id)? {
                return Ok(Some(NodeKey::Internal(symbol.id)));
            }
        }
        if let Some(symbol) = self.resolve_symbol_name(filepath_or_symbol)? {
            return Ok(Some(NodeKey::Internal(symbol.id)));
        }
        Ok(None)
    }

    /// A depth-bounded subgraph reachable from `start`, for the
    /// relationships tool. Cycle-safe: a node is never visited twice.
    pub fn relationship_subgraph(
        &self,
        start: NodeKey,
        depth: usize,
        kind_filter: Option<crate::types::RelationshipKind>,
        direction: GraphDirection,
    ) -> CodeSeekerResult<RelationshipSubgraph> {
        let mut visited = std::collections::HashSet::new();
        visited.insert(start.clone());
        let mut edges = Vec::new();
        let mut frontier = vec![start];

        for _ in 0..depth {
            if frontier.is_empty() {
                break;
            }
            let mut next_frontier = Vec::new();
            for node in &frontier {
                for edge in self.graph.neighbors(node, kind_filter, direction)? {
                    edges.push(RelationshipEdge {
                        from: node_key_label(node),
                        to: node_key_label(&edge.other),
                        kind: edge.kind,
                        confidence: edge.confidence,
                    });
                    if visited.insert(edge.other.clone()) {
                        next_frontier.push(edge.other);
                    }
                }
            }
            frontier = next_frontier;
        }

        let nodes = visited
            .into_iter()
            .map(|key| {
                let attrs = self.graph.node_attrs(&key)?.unwrap_or_default();
                Ok(RelationshipNode { key: node_key_label(&key), name: attrs.name, file_path: attrs.file_path })
            })
            .collect::<CodeSeekerResult<Vec<_>>>()?;

        Ok(RelationshipSubgraph { nodes, edges })
    }

    /// The current coding standards profile.
    pub fn standards(&self) -> CodeSeekerResult<StandardsProfile> {
        StandardsProfile::load(&self.standards_path())
    }

    /// Exclusion rules in effect for this project.
    pub fn exclusions(&mut self) -> &mut ExclusionRules {
        &mut self.exclusions
    }

    /// Persist exclusion rules and apply them to the live scanner state.
    pub fn save_exclusions(&self) -> CodeSeekerResult<()> {
        self.exclusions.save(&self.config.project_path)
    }

    /// Engine status information.
    pub fn status(&self) -> CodeSeekerResult<EngineStatus> {
        let stats = self.index.statistics()?;
        Ok(EngineStatus {
            project_path: self.config.project_path.display().to_string(),
            data_dir: self.config.data_dir().display().to_string(),
            files_indexed: stats.file_count,
            chunks_indexed: stats.chunk_count,
            symbols_indexed: stats.symbol_count,
            vectors_indexed: self.vector_store.len(),
            relationships_indexed: stats.relationship_count,
            graph_nodes: self.graph.node_count(),
            graph_edges: self.graph.edge_count(),
            has_cycles: self.graph.has_cycles(),
            search_mode: if self.embedder.is_available() { "hybrid".into() } else { "keyword-only".into() },
        })
    }

    /// The metadata index, for callers needing direct access (MCP tools).
    #[must_use]
    pub fn metadata_index(&self) -> &MetadataIndex {
        &self.index
    }

    /// The project root path.
    #[must_use]
    pub fn project_path(&self) -> &Path {
        &self.config.project_path
    }

    /// The in-memory relationship graph.
    #[must_use]
    pub fn graph(&self) -> &CodeGraph {
        &self.graph
    }

    /// Start live watching. Runs until `shutdown` fires, reindexing each
    /// debounced batch of changes as it arrives.
    pub async fn watch(&mut self, shutdown: mpsc::Receiver<()>) -> CodeSeekerResult<()> {
        let (tx, rx) = mpsc::channel::<PipelineEvent>(1024);
        let watcher = FileWatcher::new(&self.config.project_path, &self.config.watcher, &self.config.indexing);

        let watch_task = tokio::spawn(async move {
            let _ = watcher.watch(tx, shutdown).await;
        });

        self.run_incremental(rx).await?;
        let _ = watch_task.await;
        Ok(())
    }

    /// Shut down the engine, persisting the vector store to disk.
    pub fn shutdown(&mut self) -> CodeSeekerResult<()> {
        self.vector_store.compact()?;
        tracing::info!("engine shut down");
        Ok(())
    }
}

/// Result of an indexing operation.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IndexResult {
    /// Number of files successfully processed (new or updated).
    pub files_processed: usize,
    /// Of those, how many were seen for the first time.
    pub files_indexed: usize,
    /// Of those, how many replaced a prior version of the same file.
    pub files_updated: usize,
    /// Number of files removed from the index because they no longer exist
    /// on disk (or were explicitly reported deleted).
    pub files_deleted: usize,
    /// Number of files that failed to process.
    pub files_failed: usize,
    /// Total chunks created across all files.
    pub chunks_created: usize,
    /// Total symbols extracted across all files.
    pub symbols_extracted: usize,
    /// Total embeddings generated.
    pub embeddings_generated: usize,
}

/// Status information about the engine.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStatus {
    /// Project path being indexed.
    pub project_path: String,
    /// Data directory for index files.
    pub data_dir: String,
    /// Number of files in the index.
    pub files_indexed: usize,
    /// Number of chunks in the index.
    pub chunks_indexed: usize,
    /// Number of symbols in the index.
    pub symbols_indexed: usize,
    /// Number of vectors in the vector store.
    pub vectors_indexed: usize,
    /// Number of relationship rows in SQLite.
    pub relationships_indexed: usize,
    /// Number of nodes in the in-memory graph.
    pub graph_nodes: usize,
    /// Number of edges in the in-memory graph.
    pub graph_edges: usize,
    /// Whether the graph contains cycles.
    pub has_cycles: bool,
    /// Current search mode (hybrid or keyword-only).
    pub search_mode: String,
}

/// A node in a relationships-query result subgraph.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RelationshipNode {
    /// Stable identifier: `symbol:<id>` for internal nodes, `external:<key>` otherwise.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Defining file, for internal nodes.
    pub file_path: Option<PathBuf>,
}

/// An edge in a relationships-query result subgraph.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RelationshipEdge {
    /// Source node key, in the same format as `RelationshipNode::key`.
    pub from: String,
    /// Target node key, in the same format as `RelationshipNode::key`.
    pub to: String,
    /// Relationship kind.
    pub kind: crate::types::RelationshipKind,
    /// Resolution confidence.
    pub confidence: Confidence,
}

/// A depth-bounded subgraph returned by `Engine::relationship_subgraph`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RelationshipSubgraph {
    /// Every node reached, including the start node.
    pub nodes: Vec<RelationshipNode>,
    /// Every edge traversed to reach them.
    pub edges: Vec<RelationshipEdge>,
}

fn node_key_label(key: &NodeKey) -> String {
    match key {
        NodeKey::Internal(id) => format!("symbol:{id}"),
        NodeKey::External(name) => format!("external:{name}"),
    }
}

#[derive(Debug, Default)]
struct FileProcessStats {
    chunks: usize,
    symbols: usize,
    embeddings: usize,
    is_new: bool,
}

/// A file that read as changed, past the content-hash check, ready for the
/// CPU-bound parse/chunk/embed phases.
struct PrecheckedFile {
    relative_path: PathBuf,
    content: String,
    hash: String,
    mtime: i64,
    language: Language,
}

/// Parsed, chunked, and embedded representation of a file, computed without
/// touching any of the engine's shared stores so a batch of files can be
/// prepared concurrently before their results are applied one at a time.
struct PreparedFile {
    relative_path: PathBuf,
    file_info: FileInfo,
    elements: Vec<parser::StructuralElement>,
    chunks: Vec<crate::types::Chunk>,
    symbols: Vec<Symbol>,
    imports: Vec<crate::types::ImportStatement>,
    embeddings: Vec<Option<Vec<f32>>>,
}

/// Extract -> Embed, pure with respect to the engine: only touches the
/// filesystem, the parser/chunker, and the (`Send + Sync`) embedding
/// provider. Safe to run on a worker pool across many files at once.
fn prepare_file(pre: PrecheckedFile, config: &Config, embedder: &dyn EmbeddingProvider) -> CodeSeekerResult<PreparedFile> {
    let elements = parser::parse_file(&pre.relative_path, pre.content.as_bytes(), pre.language)?;
    let file_info =
        FileInfo { id: 0, path: pre.relative_path.clone(), language: pre.language, content_hash: pre.hash, size_bytes: pre.content.len() as u64, mtime: pre.mtime };
    let chunks = chunker::chunk_elements(&elements, 0, config);
    let symbols: Vec<Symbol> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.symbol_path.is_empty())
        .map(|(i, c)| Symbol {
            id: 0,
            name: c.symbol_path.rsplit(|ch: char| ch == '.' || ch == ':').next().unwrap_or(&c.symbol_path).to_string(),
            fqn: c.symbol_path.clone(),
            kind: c.kind,
            file_id: 0,
            line: c.line_start,
            chunk_id: Some(i as i64),
        })
        .collect();

    let embeddings = if embedder.is_available() && !chunks.is_empty() {
        let texts: Vec<String> = chunks.iter().map(|c| embedder::format_chunk_for_embedding(&c.symbol_path, &c.content)).collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        embedder.embed_batch(&text_refs)
    } else {
        Vec::new()
    };

    let imports = parser::parse_imports(&pre.relative_path, pre.content.as_bytes(), pre.language).unwrap_or_default();

    Ok(PreparedFile { relative_path: pre.relative_path, file_info, elements, chunks, symbols, imports, embeddings })
}

fn compute_file_hash(content: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn detect_language(path: &Path) -> Language {
    path.extension().and_then(|e| e.to_str()).map_or(Language::Unknown, Language::from_extension)
}

fn relativize(path: &Path, project_path: &Path) -> PathBuf {
    path.strip_prefix(project_path).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Rehydrate the in-memory graph from the `symbols`/`relationships` tables
/// on startup, so a restarted engine against an already-indexed project
/// doesn't serve relationship/context queries against an empty graph until
/// the next full reindex.
///
/// Only internal (symbol-to-symbol) edges are restored: `relationships` only
/// stores symbol IDs, so edges to unresolved external imports aren't
/// persisted there. Those are re-derived the next time the referencing file
/// is reindexed, same as on first indexing.
fn rebuild_graph(graph: &CodeGraph, index: &MetadataIndex) -> CodeSeekerResult<()> {
    for file in index.list_files()? {
        for symbol in index.get_symbols_for_file(file.id)? {
            graph.upsert_node(
                NodeKey::Internal(symbol.id),
                NodeAttrs { name: symbol.name.clone(), file_path: Some(file.path.clone()) },
                Some(file.id),
            )?;
        }
    }

    for rel in index.list_relationships()? {
        graph.upsert_edge(NodeKey::Internal(rel.source_id), NodeKey::Internal(rel.target_id), rel.kind, rel.confidence)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_file_hash_is_stable_and_content_sensitive() {
        let hash1 = compute_file_hash("hello world");
        let hash2 = compute_file_hash("hello world");
        let hash3 = compute_file_hash("different content");
        assert_eq!(hash1, hash2);
        assert_ne!(hash1, hash3);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn engine_creation_succeeds_on_a_fresh_project() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::defaults(dir.path());
        let engine = Engine::with_config(config);
        assert!(engine.is_ok());
    }

    #[test]
    fn status_on_a_fresh_project_reports_zero_and_keyword_only() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::defaults(dir.path());
        let engine = Engine::with_config(config).expect("create engine");
        let status = engine.status().expect("get status");
        assert_eq!(status.files_indexed, 0);
        assert_eq!(status.chunks_indexed, 0);
        assert_eq!(status.search_mode, "hybrid");
    }

    #[tokio::test]
    async fn run_index_on_empty_directory_processes_nothing() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::defaults(dir.path());
        let mut engine = Engine::with_config(config).expect("create engine");
        let result = engine.run_index(false).await.expect("index");
        assert_eq!(result.files_processed, 0);
        assert_eq!(result.chunks_created, 0);
    }

    #[tokio::test]
    async fn run_index_processes_a_single_python_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path();
        std::fs::write(root.join("hello.py"), "def greet(name):\n    \"\"\"Say hello.\"\"\"\n    return f'Hello, {name}!'\n").expect("write");

        let config = Config::defaults(root);
        let mut engine = Engine::with_config(config).expect("create engine");
        let result = engine.run_index(false).await.expect("index");

        assert_eq!(result.files_processed, 1);
        assert_eq!(result.files_indexed, 1);
        assert_eq!(result.files_updated, 0);
        assert!(result.chunks_created > 0);

        let status = engine.status().expect("status");
        assert_eq!(status.files_indexed, 1);
        assert!(status.chunks_indexed > 0);
    }

    #[tokio::test]
    async fn run_index_detects_file_removed_from_disk() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path();
        let file_path = root.join("hello.py");
        std::fs::write(&file_path, "def greet():\n    pass\n").expect("write");

        let config = Config::defaults(root);
        let mut engine = Engine::with_config(config).expect("create engine");
        engine.run_index(false).await.expect("initial index");
        assert_eq!(engine.status().unwrap().files_indexed, 1);

        std::fs::remove_file(&file_path).expect("remove");
        let result = engine.run_index(false).await.expect("rescan after deletion");

        assert_eq!(result.files_deleted, 1);
        assert_eq!(engine.status().unwrap().files_indexed, 0);
    }

    #[tokio::test]
    async fn deleted_file_is_removed_on_reindex() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path();
        let file_path = root.join("hello.py");
        std::fs::write(&file_path, "def greet():\n    pass\n").expect("write");

        let config = Config::defaults(root);
        let mut engine = Engine::with_config(config).expect("create engine");
        engine.run_index(false).await.expect("index");
        assert_eq!(engine.status().unwrap().files_indexed, 1);

        std::fs::remove_file(&file_path).expect("remove");
        let (tx, rx) = mpsc::channel(4);
        tx.send(PipelineEvent::FileDeleted { path: file_path }).await.unwrap();
        drop(tx);
        engine.run_incremental(rx).await.expect("incremental");

        assert_eq!(engine.status().unwrap().files_indexed, 0);
    }

    #[test]
    fn search_on_empty_index_returns_not_indexed() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::defaults(dir.path());
        let engine = Engine::with_config(config).expect("create engine");
        let outcome = engine.search("test query", 10, &SearchFilters::default(), QueryIntent::General).expect("search");
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.empty_reason, Some(crate::search::EmptyReason::NotIndexed));
    }

    #[tokio::test]
    async fn relationship_subgraph_reaches_two_hop_neighbor() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path();
        std::fs::write(root.join("a.py"), "def a():\n    b()\n").expect("write a");
        std::fs::write(root.join("b.py"), "def b():\n    c()\n").expect("write b");
        std::fs::write(root.join("c.py"), "def c():\n    pass\n").expect("write c");

        let config = Config::defaults(root);
        let mut engine = Engine::with_config(config).expect("create engine");
        engine.run_index(true).await.expect("index");

        let start = engine.resolve_relationship_start("a.py").expect("resolve").expect("found a start node");
        let subgraph = engine.relationship_subgraph(start, 2, None, GraphDirection::Outgoing).expect("subgraph");

        let names: Vec<&str> = subgraph.nodes.iter().map(|n| n.name.as_str()).collect();
        assert!(names.contains(&"a"));
        assert!(names.contains(&"b"));
        assert!(names.contains(&"c"));
    }

    #[test]
    fn resolve_relationship_start_returns_none_for_unknown_target() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let config = Config::defaults(dir.path());
        let engine = Engine::with_config(config).expect("create engine");
        assert!(engine.resolve_relationship_start("does_not_exist.py").unwrap().is_none());
    }
}
