use std::{path::PathBuf, sync::Arc};

use rmcp::{
    ServerHandler,
    ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{
        CallToolResult,
        Content,
        Implementation,
        ServerCapabilities,
        ServerInfo,
    },
    tool,
    tool_handler,
    tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    document::{Document, Metadata},
    error,
    extract::SUPPORTED_EXTENSIONS,
    query::QueryRequest,
    service::Services,
};

/// Longest content excerpt shown per result in the text summary.
const SUMMARY_EXCERPT_CHARS: usize = 160;

#[derive(Clone)]
pub struct DocsearchMcpServer {
    state: Arc<Services>,
    tool_router: ToolRouter<Self>,
}

impl DocsearchMcpServer {
    pub fn new(services: Services) -> Self {
        Self {
            state: Arc::new(services),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router(router = tool_router)]
impl DocsearchMcpServer {
    /// Upload and index files under an identifier.
    #[tool(
        name = "upload",
        description = "Upload and index PDF, TXT, or DOCX files for retrieval. meta_data must contain an \"identifier\"; re-uploading an identifier replaces its documents."
    )]
    pub async fn upload(
        &self,
        params: Parameters<UploadParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let filepaths: Vec<PathBuf> =
            params.filepaths.into_iter().map(PathBuf::from).collect();
        let meta_data = params.meta_data.unwrap_or_default();

        let message = self.state.ingestor.upload(&filepaths, &meta_data).await;
        Ok(CallToolResult::success(vec![Content::text(message)]))
    }

    /// Retrieve, filter and rerank chunks for a query.
    #[tool(
        name = "query",
        description = "Search uploaded documents. Optionally restrict to chunks whose metadata matches every key in metadata_filter (e.g. {\"identifier\": \"...\"})."
    )]
    pub async fn query(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, rmcp::ErrorData> {
        let params = params.0;
        let request = QueryRequest {
            query: params.query,
            metadata_filter: params.metadata_filter,
            top_k: params.top_k,
        };

        let documents = self
            .state
            .pipeline
            .run(&request)
            .await
            .map_err(|e| mcp_error("query failed", e))?;

        let items: Vec<QueryResultItem> = documents
            .into_iter()
            .enumerate()
            .map(|(i, doc)| QueryResultItem::new(i + 1, doc))
            .collect();

        let summary = format_query_summary(&items, &request.query);
        let structured = serde_json::to_value(QueryResponse {
            query: request.query,
            result_count: items.len(),
            results: items,
        })
        .map_err(|e| mcp_error("failed to serialize query results", e))?;

        let mut result = CallToolResult::success(vec![Content::text(summary)]);
        result.structured_content = Some(structured);
        Ok(result)
    }

    /// Report index size and configuration.
    #[tool(
        name = "status",
        description = "Show how many chunks are indexed, per identifier, and which models are in use."
    )]
    pub async fn status(&self) -> Result<CallToolResult, rmcp::ErrorData> {
        let report = self
            .state
            .status()
            .map_err(|e| mcp_error("failed to read index status", e))?;

        let mut lines = vec![
            format!("Vector store: {}", report.vectorstore_dir.display()),
            format!("LLM model: {}", report.llm_model),
            format!("Embedding model: {}", report.embedding_model),
            format!("Chunks: {}", report.chunk_count),
        ];
        for entry in &report.identifiers {
            lines.push(format!("  {}: {}", entry.identifier, entry.chunks));
        }

        let structured = serde_json::to_value(&report)
            .map_err(|e| mcp_error("failed to serialize status", e))?;

        let mut result = CallToolResult::success(vec![Content::text(lines.join("\n"))]);
        result.structured_content = Some(structured);
        Ok(result)
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for DocsearchMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(ServerCapabilities::builder().enable_tools().build())
            .with_server_info(
                Implementation::new("docsearch", env!("CARGO_PKG_VERSION"))
                    .with_title("docsearch MCP"),
            )
            .with_instructions(format!(
                "Use upload to index files ({}) under an identifier, then query to search them. Filter by identifier to scope a query.",
                SUPPORTED_EXTENSIONS.join(", ")
            ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadParams {
    /// Paths of the files to upload.
    #[serde(default)]
    pub filepaths: Vec<String>,
    /// Metadata for every chunk; must include "identifier".
    pub meta_data: Option<Metadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// Natural-language query.
    pub query: String,
    /// Exact-match metadata constraints, all of which must hold.
    pub metadata_filter: Option<Metadata>,
    /// Number of results to return (default: TOP_K).
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    query: String,
    result_count: usize,
    results: Vec<QueryResultItem>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryResultItem {
    rank: usize,
    content: String,
    metadata: Metadata,
}

impl QueryResultItem {
    fn new(rank: usize, doc: Document) -> Self {
        Self {
            rank,
            content: doc.content,
            metadata: doc.metadata,
        }
    }
}

fn format_query_summary(results: &[QueryResultItem], query: &str) -> String {
    if results.is_empty() {
        return format!("No relevant documents found for \"{query}\"");
    }

    let mut lines = Vec::with_capacity(results.len() + 1);
    let suffix = if results.len() == 1 { "" } else { "s" };
    lines.push(format!(
        "Found {} result{} for \"{query}\":",
        results.len(),
        suffix
    ));

    for item in results {
        let source = item
            .metadata
            .get(crate::document::FILE_NAME)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        lines.push(format!(
            "{}. [{}] {}",
            item.rank,
            source,
            excerpt(&item.content, SUMMARY_EXCERPT_CHARS)
        ));
    }

    lines.join("\n")
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut out: String = flat.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

fn mcp_error(message: &str, error: impl std::fmt::Display) -> rmcp::ErrorData {
    rmcp::ErrorData::internal_error(
        message.to_string(),
        Some(json!({ "error": error.to_string() })),
    )
}

pub fn run_mcp(services: Services) -> error::Result<()> {
    let server = DocsearchMcpServer::new(services);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error::Error::Config(format!("failed to start tokio runtime: {e}"))
        })?;

    runtime.block_on(async move {
        tracing::info!("starting docsearch MCP server on stdio");
        let transport = rmcp::transport::stdio();
        let running = server.serve(transport).await.map_err(|e| {
            error::Error::Config(format!(
                "MCP server initialization failed: {e}"
            ))
        })?;
        running.waiting().await.map_err(|e| {
            error::Error::Config(format!("MCP server error: {e}"))
        })?;
        Ok(())
    })
}
