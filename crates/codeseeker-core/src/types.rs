//! Core domain types shared across all codeseeker-core subsystems.
//!
//! These types form the API contract between modules. Changing them requires
//! updating all consumers, so they should be stable and minimal.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// File-level types
// ---------------------------------------------------------------------------

/// Metadata about an indexed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Database ID.
    pub id: i64,
    /// Path relative to the project root.
    pub path: PathBuf,
    /// Detected programming language.
    pub language: Language,
    /// SHA-256 hash of file content at time of indexing.
    pub content_hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Modification time, as reported by the filesystem, for cheap change checks.
    pub mtime: i64,
}

// ---------------------------------------------------------------------------
// Language
// ---------------------------------------------------------------------------

/// Supported programming languages and document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Python (.py)
    Python,
    /// TypeScript (.ts, .tsx)
    TypeScript,
    /// JavaScript (.js, .jsx)
    JavaScript,
    /// Rust (.rs)
    Rust,
    /// Go (.go)
    Go,
    /// Java (.java)
    Java,
    /// C (.c, .h)
    C,
    /// C++ (.cpp, .cc, .cxx, .hpp, .hxx)
    Cpp,
    /// C# (.cs)
    CSharp,
    /// CSS / SCSS (.css, .scss)
    Css,
    /// Ruby (.rb)
    Ruby,
    /// PHP (.php)
    Php,
    /// Swift (.swift)
    Swift,
    /// Kotlin (.kt, .kts)
    Kotlin,
    /// HTML (.html, .htm)
    Html,
    /// Shell / Bash (.sh, .bash, .zsh)
    Shell,
    /// Markdown (.md, .mdx)
    Markdown,
    /// TOML configuration (.toml)
    Toml,
    /// YAML configuration (.yml, .yaml)
    Yaml,
    /// JSON data (.json, .jsonc)
    Json,
    /// Unknown / unsupported
    Unknown,
}

impl Language {
    /// Detect language from a file extension (without the leading dot).
    #[must_use]
    pub fn from_extension(ext: &str) -> Self {
        match ext {
            "py" => Self::Python,
            "ts" | "tsx" => Self::TypeScript,
            "js" | "jsx" | "mjs" | "cjs" => Self::JavaScript,
            "rs" => Self::Rust,
            "go" => Self::Go,
            "java" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Self::Cpp,
            "cs" => Self::CSharp,
            "css" | "scss" => Self::Css,
            "rb" => Self::Ruby,
            "php" => Self::Php,
            "swift" => Self::Swift,
            "kt" | "kts" => Self::Kotlin,
            "html" | "htm" => Self::Html,
            "sh" | "bash" | "zsh" => Self::Shell,
            "md" | "mdx" => Self::Markdown,
            "toml" => Self::Toml,
            "yml" | "yaml" => Self::Yaml,
            "json" | "jsonc" => Self::Json,
            _ => Self::Unknown,
        }
    }

    /// Returns the language identifier string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::TypeScript => "typescript",
            Self::JavaScript => "javascript",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Css => "css",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Html => "html",
            Self::Shell => "shell",
            Self::Markdown => "markdown",
            Self::Toml => "toml",
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Unknown => "unknown",
        }
    }

    /// Returns true if this is an AST-parseable programming language.
    #[must_use]
    pub fn is_code(&self) -> bool {
        matches!(
            self,
            Self::Python
                | Self::TypeScript
                | Self::JavaScript
                | Self::Rust
                | Self::Go
                | Self::Java
                | Self::C
                | Self::Cpp
                | Self::CSharp
                | Self::Css
                | Self::Ruby
                | Self::Php
                | Self::Swift
                | Self::Kotlin
        )
    }

    /// Returns true if this is a documentation or config format handled by the
    /// text-block document analyzer rather than a tree-sitter grammar.
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(
            self,
            Self::Markdown | Self::Toml | Self::Yaml | Self::Json | Self::Html | Self::Shell
        )
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Chunk types
// ---------------------------------------------------------------------------

/// The kind of code construct a chunk represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Function or method definition.
    Function,
    /// Class, struct, or record definition.
    Class,
    /// Trait, interface, or protocol definition.
    Trait,
    /// Implementation block (Rust `impl`, Java anonymous class, etc.).
    Impl,
    /// Constant or static variable.
    Const,
    /// Type alias or definition.
    TypeDef,
    /// Module or namespace declaration.
    Module,
    /// Test function or test block.
    Test,
    /// A run of documentation/comment text promoted to its own chunk.
    Doc,
    /// Top-level statements that don't fit other categories.
    TopLevel,
}

impl ChunkKind {
    /// Returns the default structural importance weight for this kind.
    #[must_use]
    pub fn default_weight(&self) -> f64 {
        match self {
            Self::Function => 0.85,
            Self::Class | Self::Trait => 0.95,
            Self::Impl => 0.85,
            Self::Const => 0.70,
            Self::TypeDef => 0.90,
            Self::Module => 0.60,
            Self::Test => 0.60,
            Self::Doc => 0.40,
            Self::TopLevel => 0.50,
        }
    }

    /// Convert to database string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Trait => "trait",
            Self::Impl => "impl",
            Self::Const => "const",
            Self::TypeDef => "typedef",
            Self::Module => "module",
            Self::Test => "test",
            Self::Doc => "doc",
            Self::TopLevel => "top_level",
        }
    }

    /// Parse from database string.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "function" => Self::Function,
            "class" => Self::Class,
            "trait" => Self::Trait,
            "impl" => Self::Impl,
            "const" => Self::Const,
            "typedef" => Self::TypeDef,
            "module" => Self::Module,
            "test" => Self::Test,
            "doc" => Self::Doc,
            _ => Self::TopLevel,
        }
    }
}

impl Default for ChunkKind {
    fn default() -> Self {
        Self::TopLevel
    }
}

/// Visibility of a code symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Accessible from outside the module/crate.
    Public,
    /// Accessible only within the current crate/package.
    Crate,
    /// Accessible from parent class or subclasses.
    Protected,
    /// Accessible only within the defining scope.
    Private,
}

impl Visibility {
    /// Convert to database string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Crate => "crate",
            Self::Protected => "protected",
            Self::Private => "private",
        }
    }

    /// Parse from database string.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "public" => Self::Public,
            "crate" => Self::Crate,
            "protected" => Self::Protected,
            _ => Self::Private,
        }
    }

    /// Returns a weight multiplier for public vs private apis.
    #[must_use]
    pub fn weight_multiplier(&self) -> f64 {
        match self {
            Self::Public => 1.0,
            Self::Crate => 0.9,
            Self::Protected => 0.85,
            Self::Private => 0.70,
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Private
    }
}

/// A semantically meaningful chunk of code extracted from a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Database ID (0 if not yet persisted).
    pub id: i64,
    /// ID of the parent file in the index.
    pub file_id: i64,
    /// Fully qualified symbol path (e.g., `crate::auth::middleware::validate_token`).
    pub symbol_path: String,
    /// What kind of code construct this is.
    pub kind: ChunkKind,
    /// Visibility of the symbol.
    pub visibility: Visibility,
    /// Starting line number (1-indexed).
    pub line_start: u32,
    /// Ending line number (1-indexed, inclusive).
    pub line_end: u32,
    /// The source code content of this chunk.
    pub content: String,
    /// Extracted doc comment, if any.
    pub doc_comment: Option<String>,
    /// Estimated token count for this chunk.
    pub token_count: u32,
    /// Structural importance weight (0.0 - 1.0).
    pub weight: f64,
    /// ID of the corresponding vector in the vector store (None if not yet embedded).
    pub vector_id: Option<u64>,
    /// True if this chunk overlaps with the previous chunk in the same file (the
    /// sliding-window tail shared to preserve cross-boundary context).
    pub is_overlap: bool,
}

// ---------------------------------------------------------------------------
// Symbol types
// ---------------------------------------------------------------------------

/// A resolved symbol in the codebase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    /// Database ID.
    pub id: i64,
    /// Short name (e.g., `validate_token`).
    pub name: String,
    /// Fully qualified name (e.g., `crate::auth::middleware::validate_token`).
    pub fqn: String,
    /// What kind of symbol this is.
    pub kind: ChunkKind,
    /// File this symbol is defined in.
    pub file_id: i64,
    /// Line number of definition.
    pub line: u32,
    /// Associated chunk ID, if the full definition was chunked.
    pub chunk_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Relationship (graph edge) types
// ---------------------------------------------------------------------------

/// Confidence of a resolved relationship: exact resolutions come from a
/// successfully bound import/call target, heuristic ones from name-matching
/// when the target couldn't be bound to a specific symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// The target symbol was resolved unambiguously.
    Exact,
    /// The target was matched by name only; may be wrong in the presence of
    /// shadowing or overloads.
    Heuristic,
}

/// The kind of relationship between two symbols or files in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// File/module A imports module B.
    Imports,
    /// Function A calls function B.
    Calls,
    /// Class/struct A extends/inherits from class B.
    Extends,
    /// Struct/class A implements trait/interface B.
    Implements,
    /// Symbol A references symbol B without calling it (type usage, field access).
    References,
    /// File/module A defines symbol B.
    Defines,
    /// Symbol A is lexically contained in symbol B (method inside class, etc.).
    ContainedIn,
    /// Module A re-exports symbol B.
    Exports,
}

impl RelationshipKind {
    /// Convert to database string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::Calls => "calls",
            Self::Extends => "extends",
            Self::Implements => "implements",
            Self::References => "references",
            Self::Defines => "defines",
            Self::ContainedIn => "contained_in",
            Self::Exports => "exports",
        }
    }

    /// Parse from database string.
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "imports" => Self::Imports,
            "extends" => Self::Extends,
            "implements" => Self::Implements,
            "references" => Self::References,
            "defines" => Self::Defines,
            "contained_in" => Self::ContainedIn,
            "exports" => Self::Exports,
            _ => Self::Calls,
        }
    }
}

/// A directed edge in the dependency graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Source symbol ID.
    pub source_id: i64,
    /// Target symbol ID.
    pub target_id: i64,
    /// Kind of relationship.
    pub kind: RelationshipKind,
    /// How the target was resolved.
    pub confidence: Confidence,
}

/// An import statement extracted from source code.
///
/// Used for dependency graph construction. Each import is later resolved to a
/// target symbol in the index.
#[derive(Debug, Clone)]
pub struct ImportStatement {
    /// The raw import path (e.g., "os.path", "crate::config", "./utils").
    pub import_path: String,
    /// Optional specific names imported (e.g., ["Config", "load"]).
    pub imported_names: Vec<String>,
    /// Line number where the import appears.
    pub line: u32,
    /// Kind of relationship this import represents.
    pub kind: RelationshipKind,
}

// ---------------------------------------------------------------------------
// Search types
// ---------------------------------------------------------------------------

/// A search result with scoring details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The matched chunk.
    pub chunk: Chunk,
    /// File path of the matched chunk.
    pub file_path: PathBuf,
    /// Overall relevance score (higher is better).
    pub score: f64,
    /// Breakdown of how the score was computed (for debugging).
    pub score_breakdown: ScoreBreakdown,
    /// Source text for this match, truncated per the query's intent-driven
    /// line budget. `None` when the intent calls for metadata only, or the
    /// source file is too large to snippet regardless of intent.
    pub snippet: Option<String>,
}

/// Detailed scoring breakdown for a search result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Rank from semantic (vector) search (None if keyword-only match).
    pub semantic_rank: Option<u32>,
    /// Rank from keyword (FTS5) search (None if semantic-only match).
    pub keyword_rank: Option<u32>,
    /// Rank from path/fuzzy filename search (None if not a path match).
    pub path_rank: Option<u32>,
    /// Reciprocal rank fusion score across all contributing signals.
    pub rrf_score: f64,
    /// Structural importance weight applied.
    pub structural_weight: f64,
    /// Dependency proximity boost applied.
    pub dependency_boost: f64,
    /// Recency boost applied.
    pub recency_boost: f64,
}

// ---------------------------------------------------------------------------
// Pipeline events
// ---------------------------------------------------------------------------

/// Events flowing through the indexing pipeline.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A file was created or modified and needs (re-)indexing.
    FileChanged {
        /// Absolute path to the file.
        path: PathBuf,
    },
    /// A file was deleted and should be removed from the index.
    FileDeleted {
        /// Absolute path to the deleted file.
        path: PathBuf,
    },
    /// A full project scan is requested.
    FullScan,
    /// Shutdown the pipeline gracefully.
    Shutdown,
}
