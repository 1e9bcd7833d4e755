//! MCP tool definitions for CodeSeeker.
//!
//! Each tool is annotated with `#[tool]` and exposes a code intelligence
//! capability to AI agents via the Model Context Protocol. Every tool
//! returns a JSON-serialized result as its text content rather than
//! markdown prose, so a calling agent can parse it directly.
//!
//! ## Thread Safety
//!
//! `Engine` contains a `rusqlite::Connection` which is `!Sync`. We wrap it
//! in a `tokio::sync::Mutex` so that the MCP server can safely share it
//! across async tasks. This server binds to a single project for its
//! lifetime (the path given at startup); there is no multi-project registry.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars,
    tool, tool_handler, tool_router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};

use codeseeker_core::graph::GraphDirection;
use codeseeker_core::pipeline::IndexResult;
use codeseeker_core::search::{QueryIntent, SearchFilters};
use codeseeker_core::types::{Language, PipelineEvent, RelationshipKind};
use codeseeker_core::Engine;

// -----------------------------------------------------------------------
// Parameter structs for each tool
// -----------------------------------------------------------------------

/// Parameters for `search_code`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchCodeParams {
    /// Search query -- natural language or symbol name.
    pub query: String,
    /// Maximum number of results to return (default: 10).
    pub k: Option<usize>,
    /// One of overview, fix, analyze, explain, modify, create, general.
    /// Classified automatically from `query` when omitted.
    pub intent: Option<String>,
    /// Restrict results to files of this language (e.g. "python", "rust").
    pub language: Option<String>,
    /// Restrict results to files whose relative path starts with this prefix.
    pub path_prefix: Option<String>,
}

/// Parameters for `find_and_read`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct FindAndReadParams {
    /// Search query -- natural language or symbol name.
    pub query: String,
    /// Maximum number of files to return (default: 5).
    pub k: Option<usize>,
}

/// Parameters for `get_file_context`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetFileContextParams {
    /// File path relative to the project root.
    pub file_path: String,
    /// How many relationship hops to include related files from (default: 1).
    pub neighborhood_depth: Option<usize>,
}

/// Parameters for `get_code_relationships`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetCodeRelationshipsParams {
    /// A file path (relative to the project root) or a symbol name/FQN.
    pub filepath_or_symbol: String,
    /// Traversal depth, clamped to [1, 3] (default: 1).
    pub depth: Option<usize>,
    /// One of "outgoing", "incoming", "both" (default: "both").
    pub direction: Option<String>,
    /// Restrict to a single relationship kind (e.g. "calls", "imports").
    pub kind: Option<String>,
}

/// Parameters for `get_coding_standards`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct GetCodingStandardsParams {
    /// Restrict the result to a single category (e.g. "error_handling").
    /// Returns every category when omitted.
    pub category: Option<String>,
}

/// Parameters for `index_project`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct IndexProjectParams {
    /// Project root. Must match the path this server was started with.
    pub path: Option<String>,
    /// Force a full re-embed of every file instead of an incremental pass.
    pub full: Option<bool>,
}

/// Parameters for `notify_file_changes`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct NotifyFileChangesParams {
    /// Paths (relative to the project root) that changed or were deleted.
    pub paths: Vec<String>,
    /// Ignore `paths` and run a full reindex instead.
    pub full_reindex: Option<bool>,
}

/// Parameters for `manage_index`.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ManageIndexParams {
    /// One of "exclude", "include", "list".
    pub action: String,
    /// Glob patterns to add or remove. Ignored for "list".
    pub paths: Option<Vec<String>>,
    /// Optional note explaining why the patterns were excluded; stored with
    /// each new rule. Ignored for "include" and "list".
    pub reason: Option<String>,
}

// -----------------------------------------------------------------------
// Result shapes
// -----------------------------------------------------------------------

/// Common result shape for `index_project` and `notify_file_changes`.
#[derive(Debug, Serialize)]
struct IndexSummary {
    indexed: usize,
    updated: usize,
    deleted: usize,
    failed: usize,
    chunks: usize,
    embeddings: usize,
    duration_ms: u128,
}

impl IndexSummary {
    fn from_result(result: &IndexResult, elapsed: std::time::Duration) -> Self {
        Self {
            indexed: result.files_indexed,
            updated: result.files_updated,
            deleted: result.files_deleted,
            failed: result.files_failed,
            chunks: result.chunks_created,
            embeddings: result.embeddings_generated,
            duration_ms: elapsed.as_millis(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ExclusionsResult<'a> {
    action: &'a str,
    rules: Vec<codeseeker_core::exclusions::ExclusionRule>,
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let body = serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(format!("failed to serialize result: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(body)]))
}

fn parse_language(name: &str) -> Option<Language> {
    match name.to_lowercase().as_str() {
        "python" => Some(Language::Python),
        "typescript" => Some(Language::TypeScript),
        "javascript" => Some(Language::JavaScript),
        "rust" => Some(Language::Rust),
        "go" => Some(Language::Go),
        "java" => Some(Language::Java),
        "c" => Some(Language::C),
        "cpp" | "c++" => Some(Language::Cpp),
        "csharp" | "c#" => Some(Language::CSharp),
        "css" => Some(Language::Css),
        "ruby" => Some(Language::Ruby),
        "php" => Some(Language::Php),
        "swift" => Some(Language::Swift),
        "kotlin" => Some(Language::Kotlin),
        "html" => Some(Language::Html),
        "shell" | "bash" => Some(Language::Shell),
        "markdown" => Some(Language::Markdown),
        "toml" => Some(Language::Toml),
        "yaml" => Some(Language::Yaml),
        "json" => Some(Language::Json),
        _ => None,
    }
}

fn parse_intent(name: &str) -> Option<QueryIntent> {
    match name.to_lowercase().as_str() {
        "overview" => Some(QueryIntent::Overview),
        "fix" => Some(QueryIntent::Fix),
        "analyze" => Some(QueryIntent::Analyze),
        "explain" => Some(QueryIntent::Explain),
        "modify" => Some(QueryIntent::Modify),
        "create" => Some(QueryIntent::Create),
        "general" => Some(QueryIntent::General),
        _ => None,
    }
}

fn parse_direction(name: &str) -> GraphDirection {
    match name.to_lowercase().as_str() {
        "outgoing" | "upstream" => GraphDirection::Outgoing,
        "incoming" | "downstream" => GraphDirection::Incoming,
        _ => GraphDirection::Both,
    }
}

fn parse_relationship_kind(name: &str) -> Option<RelationshipKind> {
    match name.to_lowercase().as_str() {
        "imports" => Some(RelationshipKind::Imports),
        "calls" => Some(RelationshipKind::Calls),
        "extends" => Some(RelationshipKind::Extends),
        "implements" => Some(RelationshipKind::Implements),
        "references" => Some(RelationshipKind::References),
        "defines" => Some(RelationshipKind::Defines),
        "contained_in" => Some(RelationshipKind::ContainedIn),
        "exports" => Some(RelationshipKind::Exports),
        _ => None,
    }
}

// -----------------------------------------------------------------------
// MCP Server
// -----------------------------------------------------------------------

/// CodeSeeker MCP server. Exposes code intelligence tools to AI coding agents.
#[derive(Clone)]
pub struct CodeSeekerServer {
    engine: Arc<Mutex<Engine>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CodeSeekerServer {
    /// Create a new MCP server backed by the given engine.
    pub fn new(engine: Engine) -> Self {
        Self { engine: Arc::new(Mutex::new(engine)), tool_router: Self::tool_router() }
    }

    #[tool(
        name = "search_code",
        description = "Search the codebase using hybrid retrieval (keyword, semantic, and path signals fused by reciprocal rank fusion). Returns ranked code chunks with file paths, scores, and source snippets sized to the query's intent."
    )]
    pub async fn search_code(&self, params: Parameters<SearchCodeParams>) -> Result<CallToolResult, McpError> {
        let SearchCodeParams { query, k, intent, language, path_prefix } = params.0;
        let limit = k.unwrap_or(10);
        let intent = intent.as_deref().and_then(parse_intent).unwrap_or_else(|| QueryIntent::classify(&query));
        let filters = SearchFilters { language: language.as_deref().and_then(parse_language), path_prefix };

        let engine = self.engine.lock().await;
        let outcome = engine.search(&query, limit, &filters, intent).map_err(|e| McpError::internal_error(format!("search failed: {e}"), None))?;
        json_result(&outcome)
    }

    #[tool(
        name = "find_and_read",
        description = "Search the codebase and fetch the full source for each matching region. A convenience wrapper over search_code for callers that want file bytes, not just a ranked snippet."
    )]
    pub async fn find_and_read(&self, params: Parameters<FindAndReadParams>) -> Result<CallToolResult, McpError> {
        let FindAndReadParams { query, k } = params.0;
        let limit = k.unwrap_or(5);
        let intent = QueryIntent::classify(&query);

        let engine = self.engine.lock().await;
        let outcome = engine
            .search(&query, limit, &SearchFilters::default(), intent)
            .map_err(|e| McpError::internal_error(format!("search failed: {e}"), None))?;

        #[derive(Serialize)]
        struct ReadHit {
            file_path: std::path::PathBuf,
            start: u32,
            end: u32,
            content: String,
        }

        let mut hits = Vec::with_capacity(outcome.results.len());
        for result in &outcome.results {
            let absolute = engine.project_path().join(&result.file_path);
            let content = match std::fs::read_to_string(&absolute) {
                Ok(full) => full
                    .lines()
                    .skip(result.chunk.line_start.saturating_sub(1) as usize)
                    .take((result.chunk.line_end - result.chunk.line_start + 1) as usize)
                    .collect::<Vec<_>>()
                    .join("\n"),
                Err(_) => result.chunk.content.clone(),
            };
            hits.push(ReadHit { file_path: result.file_path.clone(), start: result.chunk.line_start, end: result.chunk.line_end, content });
        }
        json_result(&hits)
    }

    #[tool(
        name = "get_file_context",
        description = "Fetch a file's full content plus the files related to it via the dependency graph (imports, calls, containment) out to a chosen depth."
    )]
    pub async fn get_file_context(&self, params: Parameters<GetFileContextParams>) -> Result<CallToolResult, McpError> {
        let GetFileContextParams { file_path, neighborhood_depth } = params.0;
        let depth = neighborhood_depth.unwrap_or(1);

        let engine = self.engine.lock().await;
        let context = engine
            .file_context(Path::new(&file_path), depth)
            .map_err(|e| McpError::internal_error(format!("file context failed: {e}"), None))?;

        match context {
            Some(context) => json_result(&context),
            None => Err(McpError::invalid_params(format!("file not indexed: {file_path}"), None)),
        }
    }

    #[tool(
        name = "get_code_relationships",
        description = "Traverse the dependency graph from a file or symbol, returning every node and edge reached within the given depth and direction. Cycle-safe."
    )]
    pub async fn get_code_relationships(&self, params: Parameters<GetCodeRelationshipsParams>) -> Result<CallToolResult, McpError> {
        let GetCodeRelationshipsParams { filepath_or_symbol, depth, direction, kind } = params.0;
        let depth = depth.unwrap_or(1).clamp(1, 3);
        let direction = direction.as_deref().map_or(GraphDirection::Both, parse_direction);
        let kind_filter = match kind.as_deref() {
            Some(k) => Some(parse_relationship_kind(k).ok_or_else(|| McpError::invalid_params(format!("unknown relationship kind: {k}"), None))?),
            None => None,
        };

        let engine = self.engine.lock().await;
        let start = engine
            .resolve_relationship_start(&filepath_or_symbol)
            .map_err(|e| McpError::internal_error(format!("relationship lookup failed: {e}"), None))?
            .ok_or_else(|| McpError::invalid_params(format!("no file or symbol found matching '{filepath_or_symbol}'"), None))?;

        let subgraph = engine
            .relationship_subgraph(start, depth, kind_filter, direction)
            .map_err(|e| McpError::internal_error(format!("relationship traversal failed: {e}"), None))?;
        json_result(&subgraph)
    }

    #[tool(
        name = "get_coding_standards",
        description = "Return this project's mined coding standards: recurring conventions for validation, error handling, logging, testing, and similar categories, ranked by how consistently they're used."
    )]
    pub async fn get_coding_standards(&self, params: Parameters<GetCodingStandardsParams>) -> Result<CallToolResult, McpError> {
        let engine = self.engine.lock().await;
        let profile = engine.standards().map_err(|e| McpError::internal_error(format!("standards lookup failed: {e}"), None))?;

        match params.0.category {
            Some(category) => match profile.categories.get(&category) {
                Some(candidates) => json_result(candidates),
                None => Err(McpError::invalid_params(
                    format!("unknown category '{category}', expected one of {:?}", codeseeker_core::standards::CATEGORIES),
                    None,
                )),
            },
            None => json_result(&profile),
        }
    }

    #[tool(
        name = "index_project",
        description = "Index or reindex the project: scan for changed files, extract symbols, embed, and write the search index. Pass full=true to force a complete re-embed."
    )]
    pub async fn index_project(&self, params: Parameters<IndexProjectParams>) -> Result<CallToolResult, McpError> {
        let IndexProjectParams { path, full } = params.0;
        let mut engine = self.engine.lock().await;
        ensure_same_project(&engine, path.as_deref())?;

        let started = Instant::now();
        let result = engine.run_index(full.unwrap_or(false)).await.map_err(|e| McpError::internal_error(format!("indexing failed: {e}"), None))?;
        json_result(&IndexSummary::from_result(&result, started.elapsed()))
    }

    #[tool(
        name = "notify_file_changes",
        description = "Tell the indexer that specific files changed or were deleted, and reindex just those files. Pass full_reindex=true to ignore the path list and run a full reindex instead."
    )]
    pub async fn notify_file_changes(&self, params: Parameters<NotifyFileChangesParams>) -> Result<CallToolResult, McpError> {
        let NotifyFileChangesParams { paths, full_reindex } = params.0;
        let mut engine = self.engine.lock().await;
        let started = Instant::now();

        let result = if full_reindex.unwrap_or(false) {
            engine.run_index(true).await.map_err(|e| McpError::internal_error(format!("indexing failed: {e}"), None))?
        } else {
            let project_path = engine.project_path().to_path_buf();
            let (tx, rx) = mpsc::channel::<PipelineEvent>(paths.len().max(1));
            for path in &paths {
                let absolute = project_path.join(path);
                let event = if absolute.exists() { PipelineEvent::FileChanged { path: absolute } } else { PipelineEvent::FileDeleted { path: absolute } };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
            drop(tx);
            engine.run_incremental(rx).await.map_err(|e| McpError::internal_error(format!("indexing failed: {e}"), None))?
        };

        json_result(&IndexSummary::from_result(&result, started.elapsed()))
    }

    #[tool(
        name = "manage_index",
        description = "Manage user-defined index exclusions: exclude glob patterns from indexing, include (remove) previously excluded ones, or list the patterns currently in effect."
    )]
    pub async fn manage_index(&self, params: Parameters<ManageIndexParams>) -> Result<CallToolResult, McpError> {
        let ManageIndexParams { action, paths, reason } = params.0;

        let mut engine = self.engine.lock().await;
        match action.as_str() {
            "list" => {}
            "exclude" => {
                let patterns = paths.ok_or_else(|| McpError::invalid_params("exclude requires paths", None))?;
                let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                let exclusions = engine.exclusions();
                for pattern in patterns {
                    exclusions.add_pattern(pattern, reason.clone());
                }
                engine.save_exclusions().map_err(|e| McpError::internal_error(format!("failed to save exclusions: {e}"), None))?;
            }
            "include" => {
                let patterns = paths.ok_or_else(|| McpError::invalid_params("include requires paths", None))?;
                let exclusions = engine.exclusions();
                for pattern in &patterns {
                    exclusions.remove_pattern(pattern);
                }
                engine.save_exclusions().map_err(|e| McpError::internal_error(format!("failed to save exclusions: {e}"), None))?;
            }
            other => return Err(McpError::invalid_params(format!("unknown action '{other}', expected exclude, include, or list"), None)),
        }

        let current = engine.exclusions().rules.clone();
        json_result(&ExclusionsResult { action: &action, rules: current })
    }
}

fn ensure_same_project(engine: &Engine, requested: Option<&str>) -> Result<(), McpError> {
    let Some(requested) = requested else { return Ok(()) };
    let requested_path = Path::new(requested);
    let canonical_requested = requested_path.canonicalize().unwrap_or_else(|_| requested_path.to_path_buf());
    let canonical_current = engine.project_path().canonicalize().unwrap_or_else(|_| engine.project_path().to_path_buf());
    if canonical_requested != canonical_current {
        return Err(McpError::invalid_params(
            format!("this server only serves '{}', not '{requested}'", engine.project_path().display()),
            None,
        ));
    }
    Ok(())
}

#[tool_handler]
impl ServerHandler for CodeSeekerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "CodeSeeker provides deep code intelligence for AI coding agents. \
                 It indexes source code into searchable chunks with hybrid full-text, semantic, \
                 and path search, a symbol relationship graph, and mined coding standards. \
                 Use search_code for general queries, find_and_read when you need full source, \
                 get_file_context to see what a file touches, get_code_relationships to traverse \
                 dependencies, get_coding_standards to match existing conventions, and \
                 index_project / notify_file_changes / manage_index to keep the index current."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
