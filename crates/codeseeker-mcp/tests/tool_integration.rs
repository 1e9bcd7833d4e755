//! Integration tests for the MCP tool server.
//!
//! These build a real `Engine` backed by a tempdir, index sample files, then
//! drive the MCP server's tool-call entry point end to end and parse the
//! JSON each tool returns.
//!
//! Uses multi_thread flavor because `Engine` internally uses blocking I/O
//! (SQLite, file I/O) that must not run on the current-thread executor.

use std::io::Write;
use std::path::Path;

use codeseeker_core::{Config, Engine};
use codeseeker_mcp::tools::*;
use rmcp::handler::server::wrapper::Parameters;
use serde_json::Value;
use tempfile::TempDir;

/// Create an engine with sample Python and Rust files in a fresh tempdir.
async fn create_test_engine() -> (Engine, TempDir) {
    let dir = TempDir::new().expect("create temp dir");
    let dir_path = dir.path().to_path_buf();

    let mut auth = std::fs::File::create(dir_path.join("auth.py")).unwrap();
    writeln!(
        auth,
        r#""""Authentication module."""


class AuthService:
    """Handles user authentication and authorization."""

    def __init__(self, db):
        self.db = db

    def validate_token(self, token):
        """Validate a JWT token."""
        if not token:
            return False
        return self.db.check_token(token)

    def login(self, username, password):
        """Authenticate a user and return a session token."""
        return self.validate_token(username)


def create_auth_middleware(config):
    """Factory function for auth middleware."""
    return AuthService(config.db)
"#
    )
    .unwrap();

    let mut config = std::fs::File::create(dir_path.join("config.rs")).unwrap();
    writeln!(
        config,
        r#"//! Configuration loading.

/// Application configuration.
pub struct Config {{
    pub port: u16,
}}

impl Config {{
    pub fn default() -> Self {{
        Self {{ port: 8080 }}
    }}
}}
"#
    )
    .unwrap();

    let dir_path_for_engine = dir_path.clone();
    let engine = tokio::task::spawn_blocking(move || {
        let config = Config::defaults(&dir_path_for_engine);
        Engine::with_config(config).expect("create engine")
    })
    .await
    .expect("spawn_blocking join");

    (engine, dir)
}

/// Create an engine and run a full index over the sample files.
async fn create_indexed_server() -> (CodeSeekerServer, TempDir) {
    let (mut engine, dir) = create_test_engine().await;
    engine.run_index(true).await.expect("index test files");
    (CodeSeekerServer::new(engine), dir)
}

fn parse_json(result: &rmcp::model::CallToolResult) -> Value {
    use rmcp::model::RawContent;
    let text = result
        .content
        .iter()
        .find_map(|c| match &c.raw {
            RawContent::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
        .expect("tool result should contain text content");
    serde_json::from_str(text).expect("tool result should be valid JSON")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_code_finds_relevant_file() {
    let (server, _dir) = create_indexed_server().await;

    let result = server
        .search_code(Parameters(SearchCodeParams { query: "authentication".into(), k: Some(5), intent: None, language: None, path_prefix: None }))
        .await
        .expect("search_code should succeed");

    let json = parse_json(&result);
    let results = json["results"].as_array().expect("results array");
    assert!(!results.is_empty(), "should find results for 'authentication'");
    let has_auth_file = results.iter().any(|r| r["file_path"].as_str().unwrap_or_default().contains("auth"));
    assert!(has_auth_file, "should find auth.py among results");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_code_reports_not_indexed_before_indexing() {
    let (engine, _dir) = create_test_engine().await;
    let server = CodeSeekerServer::new(engine);

    let result = server
        .search_code(Parameters(SearchCodeParams { query: "authentication".into(), k: None, intent: None, language: None, path_prefix: None }))
        .await
        .expect("search_code should succeed even when nothing is indexed");

    let json = parse_json(&result);
    assert_eq!(json["empty_reason"], "not_indexed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_code_reports_no_matches_for_gibberish() {
    let (server, _dir) = create_indexed_server().await;

    let result = server
        .search_code(Parameters(SearchCodeParams {
            query: "xyzzy_nonexistent_symbol_12345".into(),
            k: None,
            intent: None,
            language: None,
            path_prefix: None,
        }))
        .await
        .expect("search_code should succeed");

    let json = parse_json(&result);
    assert_eq!(json["results"].as_array().unwrap().len(), 0);
    assert_eq!(json["empty_reason"], "no_matches");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn search_code_respects_language_filter() {
    let (server, _dir) = create_indexed_server().await;

    let result = server
        .search_code(Parameters(SearchCodeParams {
            query: "config".into(),
            k: Some(10),
            intent: None,
            language: Some("python".into()),
            path_prefix: None,
        }))
        .await
        .expect("search_code should succeed");

    let json = parse_json(&result);
    for hit in json["results"].as_array().unwrap() {
        assert!(hit["file_path"].as_str().unwrap().ends_with(".py"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn find_and_read_returns_file_content() {
    let (server, dir) = create_indexed_server().await;

    let result = server
        .find_and_read(Parameters(FindAndReadParams { query: "validate_token".into(), k: Some(3) }))
        .await
        .expect("find_and_read should succeed");

    let json = parse_json(&result);
    let hits = json.as_array().expect("array of hits");
    assert!(!hits.is_empty(), "should find at least one hit for validate_token");
    let first_content = hits[0]["content"].as_str().expect("content string");
    assert!(!first_content.is_empty());
    let _ = dir;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_file_context_returns_content_for_indexed_file() {
    let (server, _dir) = create_indexed_server().await;

    let result = server
        .get_file_context(Parameters(GetFileContextParams { file_path: "auth.py".into(), neighborhood_depth: Some(1) }))
        .await
        .expect("get_file_context should succeed");

    let json = parse_json(&result);
    assert_eq!(json["file_path"], "auth.py");
    assert!(json["content"].as_str().unwrap().contains("AuthService"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_file_context_rejects_unindexed_file() {
    let (server, _dir) = create_indexed_server().await;

    let err = server
        .get_file_context(Parameters(GetFileContextParams { file_path: "does_not_exist.py".into(), neighborhood_depth: None }))
        .await
        .expect_err("should reject an unindexed file");
    assert!(err.message.contains("not indexed"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_code_relationships_traverses_from_file() {
    let (server, _dir) = create_indexed_server().await;

    let result = server
        .get_code_relationships(Parameters(GetCodeRelationshipsParams {
            filepath_or_symbol: "auth.py".into(),
            depth: Some(2),
            direction: Some("outgoing".into()),
            kind: None,
        }))
        .await
        .expect("get_code_relationships should succeed");

    let json = parse_json(&result);
    assert!(json["nodes"].as_array().unwrap().len() >= 1, "should reach at least the start node");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_code_relationships_rejects_unknown_target() {
    let (server, _dir) = create_indexed_server().await;

    let err = server
        .get_code_relationships(Parameters(GetCodeRelationshipsParams {
            filepath_or_symbol: "no_such_symbol_anywhere".into(),
            depth: None,
            direction: None,
            kind: None,
        }))
        .await
        .expect_err("should reject an unresolvable target");
    assert!(err.message.contains("no file or symbol found"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_coding_standards_returns_all_categories_by_default() {
    let (server, _dir) = create_indexed_server().await;

    let result = server.get_coding_standards(Parameters(GetCodingStandardsParams { category: None })).await.expect("get_coding_standards should succeed");

    let json = parse_json(&result);
    assert!(json["categories"].is_object());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn get_coding_standards_rejects_unknown_category() {
    let (server, _dir) = create_indexed_server().await;

    let err = server
        .get_coding_standards(Parameters(GetCodingStandardsParams { category: Some("not_a_real_category".into()) }))
        .await
        .expect_err("should reject an unknown category");
    assert!(err.message.contains("unknown category"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn index_project_reports_indexed_count() {
    let (engine, _dir) = create_test_engine().await;
    let server = CodeSeekerServer::new(engine);

    let result = server.index_project(Parameters(IndexProjectParams { path: None, full: Some(true) })).await.expect("index_project should succeed");

    let json = parse_json(&result);
    assert_eq!(json["indexed"].as_u64().unwrap(), 2);
    assert_eq!(json["deleted"].as_u64().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn index_project_rejects_mismatched_path() {
    let (engine, _dir) = create_test_engine().await;
    let server = CodeSeekerServer::new(engine);

    let err = server
        .index_project(Parameters(IndexProjectParams { path: Some("/some/other/project".into()), full: None }))
        .await
        .expect_err("should reject a path that doesn't match the bound project");
    assert!(err.message.contains("only serves"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn notify_file_changes_reindexes_modified_file() {
    let (engine, dir) = create_test_engine().await;
    let mut server = CodeSeekerServer::new(engine);
    server.index_project(Parameters(IndexProjectParams { path: None, full: Some(true) })).await.expect("initial index");

    std::fs::write(dir.path().join("auth.py"), "def greet():\n    pass\n").expect("overwrite file");

    let result = server
        .notify_file_changes(Parameters(NotifyFileChangesParams { paths: vec!["auth.py".into()], full_reindex: Some(false) }))
        .await
        .expect("notify_file_changes should succeed");

    let json = parse_json(&result);
    assert_eq!(json["updated"].as_u64().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manage_index_excludes_and_lists_patterns() {
    let (engine, _dir) = create_test_engine().await;
    let server = CodeSeekerServer::new(engine);

    let result = server
        .manage_index(Parameters(ManageIndexParams { action: "exclude".into(), paths: Some(vec!["*.generated.py".into()]), reason: Some("vendored code".into()) }))
        .await
        .expect("manage_index exclude should succeed");
    let json = parse_json(&result);
    assert_eq!(json["patterns"].as_array().unwrap(), &[Value::String("*.generated.py".into())]);

    let listed = server.manage_index(Parameters(ManageIndexParams { action: "list".into(), paths: None, reason: None })).await.expect("manage_index list should succeed");
    let listed_json = parse_json(&listed);
    assert_eq!(listed_json["patterns"].as_array().unwrap().len(), 1);

    let included = server
        .manage_index(Parameters(ManageIndexParams { action: "include".into(), paths: Some(vec!["*.generated.py".into()]), reason: None }))
        .await
        .expect("manage_index include should succeed");
    let included_json = parse_json(&included);
    assert!(included_json["patterns"].as_array().unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn manage_index_rejects_unknown_action() {
    let (engine, _dir) = create_test_engine().await;
    let server = CodeSeekerServer::new(engine);

    let err = server
        .manage_index(Parameters(ManageIndexParams { action: "frobnicate".into(), paths: None, reason: None }))
        .await
        .expect_err("should reject an unknown action");
    assert!(err.message.contains("unknown action"));
}

#[allow(dead_code)]
fn assert_path_exists(p: &Path) {
    assert!(p.exists());
}
