//! Query-time pipeline: retrieve, filter for relevance, rerank.

use std::sync::Arc;

use crate::{
    document::{Document, Metadata},
    error::Result,
    llm::LanguageModel,
    llm_filter::filter_relevant,
    reranker::rerank,
    retrieval::Retriever,
    timing::timed,
};

/// A single search request.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub query: String,
    pub metadata_filter: Option<Metadata>,
    /// Overrides the configured result count.
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

pub struct QueryPipeline {
    retriever: Retriever,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
    fetch_k: usize,
}

impl QueryPipeline {
    pub fn new(
        retriever: Retriever,
        llm: Arc<dyn LanguageModel>,
        top_k: usize,
        fetch_k: usize,
    ) -> Self {
        Self {
            retriever,
            llm,
            top_k,
            fetch_k: fetch_k.max(top_k),
        }
    }

    /// Run the full pipeline and return at most `top_k` documents, best
    /// first.
    ///
    /// Retrieval fetches more candidates than requested so the relevance
    /// filter has room to prune.
    #[tracing::instrument(level = "debug", skip_all, fields(query = %request.query))]
    pub async fn run(&self, request: &QueryRequest) -> Result<Vec<Document>> {
        let top_k = request.top_k.unwrap_or(self.top_k);
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let fetch_k = self.fetch_k.max(top_k);
        let query = request.query.as_str();

        let candidates = timed(
            "retrieve",
            self.retriever
                .retrieve(query, fetch_k, request.metadata_filter.as_ref()),
        )
        .await?;

        let relevant = timed(
            "llm_filter",
            filter_relevant(candidates, query, self.llm.as_ref()),
        )
        .await?;

        let ranked = timed(
            "rerank",
            rerank(relevant, query, self.llm.as_ref(), top_k),
        )
        .await;

        tracing::info!(results = ranked.len(), top_k, fetch_k, "query finished");
        Ok(ranked)
    }
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("llm_model", &self.llm.model_id())
            .field("top_k", &self.top_k)
            .field("fetch_k", &self.fetch_k)
            .finish_non_exhaustive()
    }
}
