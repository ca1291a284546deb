use std::sync::Arc;

use crate::{
    document::{Document, Metadata},
    embedding::Embedder,
    error::Result,
    vector_store::{ScoredChunk, VectorStore},
};

/// Nearest-neighbour retrieval over the vector store.
///
/// Read-only: runs against whatever batches have been committed, so a
/// query during a multi-batch upsert may see part of the new chunks.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Embed `query` and return the `top_k` closest chunks with scores.
    ///
    /// An empty filter behaves like no filter.
    #[tracing::instrument(level = "debug", skip(self, filter))]
    pub async fn retrieve_scored(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<ScoredChunk>> {
        let filter = filter.filter(|f| !f.is_empty());
        tracing::info!(top_k, ?filter, "retrieving chunks");

        let vector = self.embedder.embed_query(query).await?;
        let hits = self.store.search(&vector, top_k, filter)?;

        tracing::debug!(hits = hits.len(), "retrieved chunks");
        Ok(hits)
    }

    /// Like [`retrieve_scored`](Self::retrieve_scored), keeping only the
    /// documents in rank order.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<Document>> {
        Ok(self
            .retrieve_scored(query, top_k, filter)
            .await?
            .into_iter()
            .map(|hit| hit.document)
            .collect())
    }
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedding_model", &self.embedder.model_id())
            .finish_non_exhaustive()
    }
}
