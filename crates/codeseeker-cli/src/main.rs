//! CodeSeeker CLI.
//!
//! One-shot command-line interface and interactive REPL for indexing,
//! searching, and serving a CodeSeeker project.

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_repl::{ClapEditor, ReadCommandOutput};

use codeseeker_core::search::{QueryIntent, SearchFilters};
use codeseeker_core::{Config, Engine};
use codeseeker_mcp::tools::CodeSeekerServer;
use rmcp::{transport::stdio, ServiceExt};

/// CodeSeeker - code context engine for AI coding agents.
#[derive(Parser, Debug)]
#[command(name = "codeseeker", version, about = "Code context engine for AI coding agents")]
struct Cli {
    /// Subcommand to execute. Omit to start an interactive REPL.
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Run an index pass over a repository.
    Index {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: String,

        /// Force a full reindex, re-embedding every file.
        #[arg(long)]
        full: bool,
    },

    /// Equivalent to `index --full`.
    Reindex {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: String,
    },

    /// Print index status: file/chunk/symbol counts and last index time.
    Status {
        /// Path to the repository root.
        #[arg(default_value = ".")]
        path: String,
    },

    /// Search the indexed codebase. Convenience over `search_code`, CLI-only.
    Search {
        /// Search query (natural language or keywords).
        query: String,

        /// Path to the repository root.
        #[arg(long, default_value = ".")]
        path: String,

        /// Maximum number of results.
        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        /// Filter by programming language.
        #[arg(long)]
        language: Option<String>,
    },

    /// Start the MCP server for AI agent integration.
    Serve {
        /// Expose the MCP tool surface. Currently the only supported mode.
        #[arg(long, default_value_t = true)]
        mcp: bool,

        /// Path to the repository root.
        #[arg(long, default_value = ".")]
        repo: String,
    },
}

/// Exit code for a partially-successful index pass: some files failed but
/// the run otherwise completed.
const EXIT_PARTIAL: i32 = 2;
/// Exit code for a fatal error that aborted before completion.
const EXIT_FATAL: i32 = 1;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_env_filter(&cli.log_level).with_writer(std::io::stderr).init();

    let Some(command) = cli.command else {
        return run_repl().await;
    };

    let code = run_command(command).await;
    std::process::exit(code);
}

async fn run_command(command: Commands) -> i32 {
    match command {
        Commands::Index { path, full } => run_index(Path::new(&path), full).await,
        Commands::Reindex { path } => run_index(Path::new(&path), true).await,
        Commands::Status { path } => run_status(Path::new(&path)).await,
        Commands::Search { query, path, limit, language } => run_search(Path::new(&path), &query, limit, language.as_deref()).await,
        Commands::Serve { mcp, repo } => {
            if !mcp {
                eprintln!("only --mcp serving is supported");
                return EXIT_FATAL;
            }
            run_serve(Path::new(&repo)).await
        }
    }
}

async fn open_engine(path: &Path) -> Result<Engine, i32> {
    let config = match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: invalid configuration: {e}");
            return Err(EXIT_FATAL);
        }
    };
    Engine::with_config(config).map_err(|e| {
        eprintln!("error: failed to open project at {}: {e}", path.display());
        EXIT_FATAL
    })
}

async fn run_index(path: &Path, full: bool) -> i32 {
    let mut engine = match open_engine(path).await {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    match engine.run_index(full).await {
        Ok(result) => {
            println!(
                "indexed={} updated={} deleted={} chunks={} embeddings={} failed={}",
                result.files_indexed, result.files_updated, result.files_deleted, result.chunks_created, result.embeddings_generated, result.files_failed
            );
            if result.files_failed > 0 {
                EXIT_PARTIAL
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("error: indexing failed: {e}");
            EXIT_FATAL
        }
    }
}

async fn run_status(path: &Path) -> i32 {
    let engine = match open_engine(path).await {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    match engine.status() {
        Ok(status) => {
            match serde_json::to_string_pretty(&status) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("error: failed to serialize status: {e}");
                    return EXIT_FATAL;
                }
            }
            0
        }
        Err(e) => {
            eprintln!("error: failed to read status: {e}");
            EXIT_FATAL
        }
    }
}

async fn run_search(path: &Path, query: &str, limit: usize, language: Option<&str>) -> i32 {
    let engine = match open_engine(path).await {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    let filters = SearchFilters { language: language.and_then(parse_language), path_prefix: None };
    let intent = QueryIntent::classify(query);
    match engine.search(query, limit, &filters, intent) {
        Ok(outcome) => {
            if outcome.results.is_empty() {
                match outcome.empty_reason {
                    Some(reason) => println!("no results ({reason:?})"),
                    None => println!("no results"),
                }
                return 0;
            }
            for (i, result) in outcome.results.iter().enumerate() {
                println!(
                    "{}. {} ({}:{}-{}) score={:.4}",
                    i + 1,
                    result.chunk.symbol_path,
                    result.file_path.display(),
                    result.chunk.line_start,
                    result.chunk.line_end,
                    result.score
                );
                if let Some(snippet) = &result.snippet {
                    println!("{snippet}\n");
                }
            }
            0
        }
        Err(e) => {
            eprintln!("error: search failed: {e}");
            EXIT_FATAL
        }
    }
}

async fn run_serve(repo: &Path) -> i32 {
    let repo_path = match repo.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: repository path does not exist: {e}");
            return EXIT_FATAL;
        }
    };

    let engine = match open_engine(&repo_path).await {
        Ok(engine) => engine,
        Err(code) => return code,
    };

    let server = CodeSeekerServer::new(engine);
    let service = match server.serve(stdio()).await {
        Ok(service) => service,
        Err(e) => {
            eprintln!("error: MCP serve error: {e}");
            return EXIT_FATAL;
        }
    };
    match service.waiting().await {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("error: MCP runtime error: {e}");
            EXIT_FATAL
        }
    }
}

fn parse_language(name: &str) -> Option<codeseeker_core::types::Language> {
    use codeseeker_core::types::Language;
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
        "ruby" => Some(Language::Ruby),
        "php" => Some(Language::Php),
        "swift" => Some(Language::Swift),
        "kotlin" => Some(Language::Kotlin),
        _ => None,
    }
}

/// Interactive REPL over the same subcommand grammar as one-shot invocation,
/// plus `exit`/`quit` to leave.
async fn run_repl() -> Result<()> {
    println!("codeseeker REPL -- type `help` for commands, `exit` to quit.");
    let mut rl = ClapEditor::<ReplCommand>::builder().build();
    loop {
        match rl.read_command() {
            ReadCommandOutput::Command(ReplCommand::Exit) => break,
            ReadCommandOutput::Command(repl_command) => {
                let code = run_command(repl_command.into_command()).await;
                if code != 0 {
                    println!("(exit code {code})");
                }
            }
            ReadCommandOutput::EmptyLine | ReadCommandOutput::CtrlC => continue,
            ReadCommandOutput::CtrlD => break,
            ReadCommandOutput::ClapError(e) => {
                e.print().ok();
            }
            ReadCommandOutput::ShlexError => {
                eprintln!("error: invalid input (check quotes)");
            }
            ReadCommandOutput::ReedlineError(e) => {
                eprintln!("error: {e}");
            }
        }
    }
    Ok(())
}

/// REPL-only mirror of [`Commands`], adding an `exit` command that has no
/// one-shot equivalent.
#[derive(Debug, Clone, Parser)]
#[command(name = "")]
enum ReplCommand {
    Index {
        #[arg(default_value = ".")]
        path: String,
        #[arg(long)]
        full: bool,
    },
    Reindex {
        #[arg(default_value = ".")]
        path: String,
    },
    Status {
        #[arg(default_value = ".")]
        path: String,
    },
    Search {
        query: String,
        #[arg(long, default_value = ".")]
        path: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        language: Option<String>,
    },
    Serve {
        #[arg(long, default_value_t = true)]
        mcp: bool,
        #[arg(long, default_value = ".")]
        repo: String,
    },
    /// Leave the REPL.
    #[command(alias = "quit")]
    Exit,
}

impl ReplCommand {
    fn into_command(self) -> Commands {
        match self {
            ReplCommand::Index { path, full } => Commands::Index { path, full },
            ReplCommand::Reindex { path } => Commands::Reindex { path },
            ReplCommand::Status { path } => Commands::Status { path },
            ReplCommand::Search { query, path, limit, language } => Commands::Search { query, path, limit, language },
            ReplCommand::Serve { mcp, repo } => Commands::Serve { mcp, repo },
            ReplCommand::Exit => unreachable!("Exit is handled before conversion"),
        }
    }
}
