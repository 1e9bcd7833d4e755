//! File-context neighborhood assembly: a file's content plus the files
//! related to it via the dependency graph, out to a caller-chosen depth.

use std::path::{Path, PathBuf};

use crate::error::CodeSeekerResult;
use crate::graph::{CodeGraph, GraphDirection, NodeKey};
use crate::index::MetadataIndex;
use crate::types::RelationshipKind;

/// A file reachable from the requested file within `neighborhood_depth` hops.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct RelatedFile {
    /// Path of the related file, relative to the project root.
    pub file_path: PathBuf,
}

/// A file's content plus its graph neighborhood.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FileContext {
    /// Path of the requested file, relative to the project root.
    pub file_path: PathBuf,
    /// Full file content, read from disk.
    pub content: String,
    /// Other files reachable within `neighborhood_depth` hops via any
    /// relationship, deduplicated, excluding the file itself.
    pub related_files: Vec<RelatedFile>,
}

/// Assemble a file's context: its content plus related files via the graph.
///
/// `neighborhood_depth` defaults to 1 at the tool surface; it is taken here
/// as an explicit argument since this function has no opinion on defaults.
pub fn get_file_context(
    project_root: &Path,
    file_path: &Path,
    neighborhood_depth: usize,
    index: &MetadataIndex,
    graph: &CodeGraph,
) -> CodeSeekerResult<Option<FileContext>> {
    let Some(file_id) = index.get_file_id(file_path)? else {
        return Ok(None);
    };

    let content = std::fs::read_to_string(project_root.join(file_path))?;

    let mut related_paths = std::collections::BTreeSet::new();
    for symbol in index.get_symbols_for_file(file_id)? {
        let reached = graph.traverse(&NodeKey::Internal(symbol.id), neighborhood_depth, None, GraphDirection::Both)?;
        for node in reached {
            let NodeKey::Internal(symbol_id) = node else { continue };
            if let Some(path) = index.get_file_path_for_symbol(symbol_id)? {
                if path != file_path {
                    related_paths.insert(path);
                }
            }
        }
    }

    Ok(Some(FileContext {
        file_path: file_path.to_path_buf(),
        content,
        related_files: related_paths.into_iter().map(|file_path| RelatedFile { file_path }).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkKind, Confidence, FileInfo, Language, Symbol, Visibility};
    use tempfile::tempdir;

    fn seed(index: &mut MetadataIndex, graph: &CodeGraph, project_root: &Path, path: &str, symbol_name: &str) -> i64 {
        std::fs::write(project_root.join(path), format!("fn {symbol_name}() {{}}")).unwrap();
        let file = FileInfo { id: 0, path: PathBuf::from(path), language: Language::Rust, content_hash: "h".into(), size_bytes: 10, mtime: 0 };
        let chunk = Chunk {
            id: 0,
            file_id: 0,
            symbol_path: symbol_name.into(),
            kind: ChunkKind::Function,
            visibility: Visibility::Public,
            line_start: 1,
            line_end: 1,
            content: format!("fn {symbol_name}() {{}}"),
            doc_comment: None,
            token_count: 1,
            weight: 0.5,
            vector_id: None,
            is_overlap: false,
        };
        let symbol = Symbol { id: 0, name: symbol_name.into(), fqn: symbol_name.into(), kind: ChunkKind::Function, file_id: 0, line: 1, chunk_id: Some(0) };
        let (_file_id, _chunk_ids) = index.reindex_file(&file, &[chunk], &[symbol]).unwrap();
        index.get_symbol_by_fqn(symbol_name).unwrap().unwrap().id
    }

    #[test]
    fn context_includes_related_file_reached_via_graph() {
        let dir = tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("i.db")).unwrap();
        let graph = CodeGraph::new();

        let a_id = seed(&mut index, &graph, dir.path(), "a.rs", "caller");
        let b_id = seed(&mut index, &graph, dir.path(), "b.rs", "callee");
        graph.upsert_edge(NodeKey::Internal(a_id), NodeKey::Internal(b_id), RelationshipKind::Calls, Confidence::Exact).unwrap();

        let context = get_file_context(dir.path(), Path::new("a.rs"), 1, &index, &graph).unwrap().unwrap();
        assert_eq!(context.content, "fn caller() {}");
        assert_eq!(context.related_files, vec![RelatedFile { file_path: PathBuf::from("b.rs") }]);
    }

    #[test]
    fn context_for_unindexed_file_is_none() {
        let dir = tempdir().unwrap();
        let index = MetadataIndex::open(&dir.path().join("i.db")).unwrap();
        let graph = CodeGraph::new();
        assert!(get_file_context(dir.path(), Path::new("missing.rs"), 1, &index, &graph).unwrap().is_none());
    }

    #[test]
    fn depth_zero_returns_no_related_files() {
        let dir = tempdir().unwrap();
        let mut index = MetadataIndex::open(&dir.path().join("i.db")).unwrap();
        let graph = CodeGraph::new();
        let a_id = seed(&mut index, &graph, dir.path(), "a.rs", "caller");
        let b_id = seed(&mut index, &graph, dir.path(), "b.rs", "callee");
        graph.upsert_edge(NodeKey::Internal(a_id), NodeKey::Internal(b_id), RelationshipKind::Calls, Confidence::Exact).unwrap();

        let context = get_file_context(dir.path(), Path::new("a.rs"), 0, &index, &graph).unwrap().unwrap();
        assert!(context.related_files.is_empty());
    }
}
