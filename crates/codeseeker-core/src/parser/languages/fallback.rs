//! Fallback analyzer for files with no AST grammar and no document format.
//!
//! Used when a file's language can't be mapped to a tree-sitter grammar or a
//! text-block document format. Rather than skip the file entirely (losing it
//! from text/path search), the whole file becomes one `top_level` chunk.

use std::path::Path;

use crate::parser::{LanguageAnalyzer, StructuralElement};
use crate::types::{ChunkKind, Visibility};

/// Whole-file fallback analyzer.
pub struct FallbackAnalyzer;

impl LanguageAnalyzer for FallbackAnalyzer {
    fn language_id(&self) -> &str {
        "fallback"
    }

    fn tree_sitter_language(&self) -> tree_sitter::Language {
        // No grammar is actually applied; extraction bypasses the tree. A
        // grammar that's always linked in is used as a placeholder to keep
        // the shared parse-then-extract call path uniform across analyzers.
        tree_sitter_md::LANGUAGE.into()
    }

    fn extract_structure(
        &self,
        _tree: &tree_sitter::Tree,
        source: &[u8],
        file_path: &Path,
    ) -> Vec<StructuralElement> {
        let content = String::from_utf8_lossy(source).into_owned();
        if content.trim().is_empty() {
            return Vec::new();
        }

        let module_name = crate::parser::build_module_name_from_path(file_path);
        let line_end = content.lines().count().max(1) as u32;

        vec![StructuralElement {
            symbol_path: module_name.clone(),
            name: module_name,
            kind: ChunkKind::TopLevel,
            visibility: Visibility::Public,
            line_start: 1,
            line_end,
            content,
            doc_comment: None,
            references: Vec::new(),
            extends: Vec::new(),
            implements: Vec::new(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_file_becomes_one_chunk() {
        let analyzer = FallbackAnalyzer;
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&analyzer.tree_sitter_language())
            .unwrap();
        let source = b"some unrecognized config format\nkey = value\n";
        let tree = parser.parse(source, None).unwrap();
        let elements = analyzer.extract_structure(&tree, source, Path::new("config.ini"));
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].kind, ChunkKind::TopLevel);
    }

    #[test]
    fn empty_file_yields_no_chunks() {
        let analyzer = FallbackAnalyzer;
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&analyzer.tree_sitter_language())
            .unwrap();
        let tree = parser.parse(b"", None).unwrap();
        let elements = analyzer.extract_structure(&tree, b"", Path::new("empty.ini"));
        assert!(elements.is_empty());
    }
}
