//! AST parsing subsystem using tree-sitter.
//!
//! This module provides language-agnostic AST parsing with per-language
//! structural extractors. Each supported language registers an analyzer that
//! maps tree-sitter AST nodes to CodeSeeker structural elements.
//!
//! ## Architecture
//!
//! ```text
//! Source File -> Language Detection -> tree-sitter Grammar
//!            -> Parse -> CST
//!            -> Structural Extraction -> Vec<StructuralElement>
//! ```
//!
//! The parser is stateless and can be invoked from multiple threads.

pub mod languages;
pub mod registry;

use std::path::Path;

use crate::error::{CodeSeekerError, CodeSeekerResult};
use crate::types::{ChunkKind, ImportStatement, Language, Visibility};

/// A structural element extracted from an AST.
#[derive(Debug, Clone, Default)]
pub struct StructuralElement {
    /// Fully qualified name of this element.
    pub symbol_path: String,
    /// Short name (last component of `symbol_path`).
    pub name: String,
    /// What kind of construct this is.
    pub kind: ChunkKind,
    /// Visibility specifier.
    pub visibility: Visibility,
    /// Starting line (1-indexed).
    pub line_start: u32,
    /// Ending line (1-indexed, inclusive).
    pub line_end: u32,
    /// Raw source code of this element.
    pub content: String,
    /// Extracted doc comment, if present.
    pub doc_comment: Option<String>,
    /// Symbols referenced within this element (for relationship extraction).
    pub references: Vec<String>,
    /// Names this element extends/inherits from (class/struct base lists).
    pub extends: Vec<String>,
    /// Names of traits/interfaces/protocols this element implements.
    pub implements: Vec<String>,
}

/// Trait that each language analyzer must implement.
pub trait LanguageAnalyzer: Send + Sync {
    /// Returns the language identifier (e.g., "python", "rust").
    fn language_id(&self) -> &str;

    /// Returns the tree-sitter `Language` for this analyzer.
    fn tree_sitter_language(&self) -> tree_sitter::Language;

    /// Extract structural elements from a parsed tree.
    fn extract_structure(
        &self,
        tree: &tree_sitter::Tree,
        source: &[u8],
        file_path: &Path,
    ) -> Vec<StructuralElement>;

    /// Extract import statements from a parsed tree for relationship
    /// extraction.
    ///
    /// Default implementation returns empty (languages can override).
    fn extract_imports(
        &self,
        _tree: &tree_sitter::Tree,
        _source: &[u8],
        _file_path: &Path,
    ) -> Vec<ImportStatement> {
        Vec::new()
    }
}

/// Parse a source file and extract its structural elements.
///
/// This is the primary entry point for the parser. It:
/// 1. Looks up the registered analyzer for `language`
/// 2. Parses the source with that analyzer's tree-sitter grammar
/// 3. Extracts structural elements via the language analyzer
pub fn parse_file(
    file_path: &Path,
    source: &[u8],
    language: Language,
) -> CodeSeekerResult<Vec<StructuralElement>> {
    let registry = registry::global_registry();

    let analyzer = registry.get(language).ok_or_else(|| CodeSeekerError::ExtractionFailed {
        path: file_path.to_path_buf(),
        message: format!("no analyzer registered for language: {language}"),
    })?;

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&analyzer.tree_sitter_language())
        .map_err(|e| CodeSeekerError::ExtractionFailed {
            path: file_path.to_path_buf(),
            message: format!("failed to set tree-sitter language: {e}"),
        })?;

    let tree = parser.parse(source, None).ok_or_else(|| CodeSeekerError::ExtractionFailed {
        path: file_path.to_path_buf(),
        message: "tree-sitter returned None (parse timeout or cancellation)".into(),
    })?;

    Ok(analyzer.extract_structure(&tree, source, file_path))
}

/// Extract import statements from a source file.
///
/// Uses the same tree-sitter parse infrastructure as `parse_file`.
pub fn parse_imports(
    file_path: &Path,
    source: &[u8],
    language: Language,
) -> CodeSeekerResult<Vec<ImportStatement>> {
    let registry = registry::global_registry();

    let analyzer = registry.get(language).ok_or_else(|| CodeSeekerError::ExtractionFailed {
        path: file_path.to_path_buf(),
        message: format!("no analyzer registered for language: {language}"),
    })?;

    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&analyzer.tree_sitter_language())
        .map_err(|e| CodeSeekerError::ExtractionFailed {
            path: file_path.to_path_buf(),
            message: format!("failed to set tree-sitter language: {e}"),
        })?;

    let tree = parser.parse(source, None).ok_or_else(|| CodeSeekerError::ExtractionFailed {
        path: file_path.to_path_buf(),
        message: "tree-sitter returned None".into(),
    })?;

    Ok(analyzer.extract_imports(&tree, source, file_path))
}

/// Derive a dotted/slashed module name from a file path relative to a project
/// root, the way each language's own import system would name it: extension
/// stripped, path separators kept as-is for path-style imports (document
/// analyzers) and also exposed dotted for languages that want `a.b.c` style
/// names.
#[must_use]
pub fn build_module_name_from_path(file_path: &Path) -> String {
    let without_ext = file_path.with_extension("");
    let components: Vec<String> = without_ext
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(os) => Some(os.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if components.is_empty() {
        return String::new();
    }

    components.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_file_unknown_language_returns_error() {
        let result = parse_file(Path::new("test.xyz"), b"hello world", Language::Unknown);
        assert!(result.is_err());
    }

    #[test]
    fn module_name_strips_extension_and_joins_with_dots() {
        let name = build_module_name_from_path(Path::new("src/auth/middleware.py"));
        assert_eq!(name, "src.auth.middleware");
    }

    #[test]
    fn module_name_handles_single_component() {
        let name = build_module_name_from_path(Path::new("main.rs"));
        assert_eq!(name, "main");
    }
}
