use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::Value;

use crate::document::Metadata;

#[derive(Debug, Parser)]
#[command(
    name = "docsearch",
    about = "Document ingestion and LLM-reranked retrieval over a local vector index"
)]
pub struct Cli {
    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start MCP server for AI agent integration
    Mcp,
    /// Extract, chunk and index files under an identifier
    Upload(UploadArgs),
    /// Retrieve, filter and rerank chunks for a query
    Query(QueryArgs),
    /// Show index statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Upload --

#[derive(Debug, Parser)]
pub struct UploadArgs {
    /// Files to upload (PDF, TXT or DOCX)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Identifier grouping the uploaded chunks; replaces earlier uploads
    #[arg(short, long)]
    pub identifier: String,

    /// Extra chunk metadata as key=value (repeatable)
    #[arg(long = "meta", value_parser = parse_key_value)]
    pub meta: Vec<(String, Value)>,
}

impl UploadArgs {
    pub fn meta_data(&self) -> Metadata {
        let mut meta: Metadata = self.meta.iter().cloned().collect();
        meta.insert(
            crate::document::IDENTIFIER.to_string(),
            Value::String(self.identifier.clone()),
        );
        meta
    }
}

// -- Query --

#[derive(Debug, Parser)]
pub struct QueryArgs {
    /// The query text
    pub query: String,

    /// Number of results to return (default: TOP_K)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Only consider chunks with this metadata, as key=value (repeatable)
    #[arg(long = "filter", value_parser = parse_key_value)]
    pub filter: Vec<(String, Value)>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryArgs {
    pub fn metadata_filter(&self) -> Option<Metadata> {
        (!self.filter.is_empty()).then(|| self.filter.iter().cloned().collect())
    }
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "docsearch",
            &mut std::io::stdout(),
        );
    }
}

/// Parse `key=value`. Integers and booleans keep their type so filters
/// match values like `page=3`; everything else is a string.
fn parse_key_value(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }

    let value = if let Ok(n) = value.parse::<i64>() {
        Value::from(n)
    } else if let Ok(b) = value.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::String(value.to_string())
    };
    Ok((key.to_string(), value))
}
