//! Semantic code chunker.
//!
//! Takes structural elements from the parser and produces chunks suitable for
//! embedding and indexing. Chunks respect AST boundaries and never split
//! mid-expression; oversized elements are split on line boundaries with a
//! sliding overlap so no chunk loses its surrounding context entirely.
//!
//! ## Chunking strategy
//!
//! 1. A doc comment/run spanning at least `doc_run_threshold` lines is
//!    promoted to its own `doc`-kind chunk, bound to the symbol that follows.
//! 2. An element within `max_chunk_lines` becomes a single chunk.
//! 3. A larger element is split into windows of `max_chunk_lines`, each
//!    overlapping the previous by `overlap_fraction` of that cap so context
//!    survives a split boundary.

use crate::config::Config;
use crate::parser::StructuralElement;
use crate::types::{Chunk, ChunkKind};

/// Chunk structural elements into embedding-sized pieces.
///
/// Each chunk is annotated with metadata for the index: symbol path, kind,
/// visibility, line range, weight.
pub fn chunk_elements(elements: &[StructuralElement], file_id: i64, config: &Config) -> Vec<Chunk> {
    let max_lines = config.indexing.max_chunk_lines;
    let overlap_fraction = config.indexing.overlap_fraction.clamp(0.0, 0.5);
    let doc_run_threshold = config.indexing.doc_run_threshold;

    let mut chunks = Vec::new();

    for elem in elements {
        if let Some(doc) = &elem.doc_comment {
            if doc.lines().count() >= doc_run_threshold {
                chunks.push(doc_chunk(elem, doc, file_id));
            }
        }

        let line_count = elem.content.lines().count().max(1);
        if line_count <= max_lines {
            chunks.push(element_chunk(elem, file_id, &elem.content, elem.line_start, elem.line_end, false));
        } else {
            chunks.extend(split_with_overlap(elem, file_id, max_lines, overlap_fraction));
        }
    }

    chunks
}

fn doc_chunk(elem: &StructuralElement, doc: &str, file_id: i64) -> Chunk {
    let token_count = estimate_tokens(doc);
    Chunk {
        id: 0,
        file_id,
        symbol_path: format!("{}#doc", elem.symbol_path),
        kind: ChunkKind::Doc,
        visibility: elem.visibility,
        line_start: elem.line_start,
        line_end: elem.line_start,
        content: doc.to_string(),
        doc_comment: None,
        token_count,
        weight: ChunkKind::Doc.default_weight() * elem.visibility.weight_multiplier(),
        vector_id: None,
        is_overlap: false,
    }
}

fn element_chunk(
    elem: &StructuralElement,
    file_id: i64,
    content: &str,
    line_start: u32,
    line_end: u32,
    is_overlap: bool,
) -> Chunk {
    let token_count = estimate_tokens(content);
    Chunk {
        id: 0,
        file_id,
        symbol_path: elem.symbol_path.clone(),
        kind: elem.kind,
        visibility: elem.visibility,
        line_start,
        line_end,
        content: content.to_string(),
        doc_comment: elem.doc_comment.clone(),
        token_count,
        weight: elem.kind.default_weight() * elem.visibility.weight_multiplier(),
        vector_id: None,
        is_overlap,
    }
}

/// Split an oversized element into `max_lines`-capped windows, each
/// overlapping the previous window's tail by `overlap_fraction`.
fn split_with_overlap(
    elem: &StructuralElement,
    file_id: i64,
    max_lines: usize,
    overlap_fraction: f64,
) -> Vec<Chunk> {
    let lines: Vec<&str> = elem.content.lines().collect();
    let overlap_lines = ((max_lines as f64) * overlap_fraction).round() as usize;
    let stride = max_lines.saturating_sub(overlap_lines).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut first = true;

    while start < lines.len() {
        let end = (start + max_lines).min(lines.len());
        let window = lines[start..end].join("\n");
        let line_start = elem.line_start + start as u32;
        let line_end = elem.line_start + end as u32 - 1;

        chunks.push(element_chunk(elem, file_id, &window, line_start, line_end, !first));

        first = false;
        if end == lines.len() {
            break;
        }
        start += stride;
    }

    chunks
}

/// Rough token estimation: ~4 characters per token for code. Conservative;
/// actual tokenization happens in the embedder.
fn estimate_tokens(content: &str) -> u32 {
    #[expect(clippy::cast_possible_truncation)]
    let estimate = (content.len() / 4) as u32;
    estimate.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Visibility;
    use std::path::Path;

    fn config() -> Config {
        Config::defaults(Path::new("/tmp/project"))
    }

    fn element_with_lines(n: usize) -> StructuralElement {
        let content = (1..=n).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        StructuralElement {
            symbol_path: "mod.func".into(),
            name: "func".into(),
            kind: ChunkKind::Function,
            visibility: Visibility::Public,
            line_start: 1,
            line_end: n as u32,
            content,
            doc_comment: None,
            references: Vec::new(),
            extends: Vec::new(),
            implements: Vec::new(),
        }
    }

    #[test]
    fn estimate_tokens_has_floor_of_one() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcdefgh"), 2);
    }

    #[test]
    fn element_within_cap_becomes_one_chunk() {
        let elements = vec![element_with_lines(40)];
        let chunks = chunk_elements(&elements, 1, &config());
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].is_overlap);
    }

    #[test]
    fn oversized_element_splits_with_overlap() {
        let elements = vec![element_with_lines(200)];
        let chunks = chunk_elements(&elements, 1, &config());
        assert!(chunks.len() > 1, "200 lines should split past an 80-line cap");
        assert!(chunks[0].line_end - chunks[0].line_start + 1 <= 80);
        assert!(chunks[1..].iter().all(|c| c.is_overlap));
    }

    #[test]
    fn split_windows_cover_every_line_without_gaps() {
        let elements = vec![element_with_lines(200)];
        let chunks = chunk_elements(&elements, 1, &config());
        let last = chunks.last().unwrap();
        assert_eq!(last.line_end, 200);
        assert_eq!(chunks[0].line_start, 1);
    }

    #[test]
    fn long_doc_comment_is_promoted_to_its_own_chunk() {
        let mut elem = element_with_lines(10);
        elem.doc_comment = Some("line one\nline two\nline three\nline four".into());
        let chunks = chunk_elements(&[elem], 1, &config());
        assert!(chunks.iter().any(|c| c.kind == ChunkKind::Doc));
    }

    #[test]
    fn short_doc_comment_is_not_promoted() {
        let mut elem = element_with_lines(10);
        elem.doc_comment = Some("one line".into());
        let chunks = chunk_elements(&[elem], 1, &config());
        assert!(!chunks.iter().any(|c| c.kind == ChunkKind::Doc));
    }
}
