use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use crate::{
    config::Config,
    embedding::Embedder,
    error::Result,
    index_writer::IndexWriter,
    ingest::Ingestor,
    llm::LanguageModel,
    ollama::OllamaClient,
    query::QueryPipeline,
    retrieval::Retriever,
    store_dir::StoreDir,
    vector_store::VectorStore,
};

/// The wired-up ingestion and query components sharing one store.
#[derive(Debug)]
pub struct Services {
    pub store: Arc<VectorStore>,
    pub ingestor: Ingestor,
    pub pipeline: QueryPipeline,
    llm_model: String,
    embedding_model: String,
    store_dir: StoreDir,
}

/// Index summary reported by the `status` command and tool.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub vectorstore_dir: PathBuf,
    pub llm_model: String,
    pub embedding_model: String,
    pub chunk_count: usize,
    pub identifiers: Vec<IdentifierStatus>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierStatus {
    pub identifier: String,
    pub chunks: usize,
}

impl Services {
    /// Open the store under `VECTORSTORE_DIR` and connect to Ollama.
    pub fn open(config: &Config) -> Result<Self> {
        let embedder = Arc::new(OllamaClient::new(
            &config.ollama_base_url,
            &config.embedding_model,
        ));
        let llm = Arc::new(OllamaClient::new(
            &config.ollama_base_url,
            &config.llm_model,
        ));
        Self::with_models(config, embedder, llm)
    }

    /// Like [`open`](Self::open) with caller-provided model backends.
    pub fn with_models(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        let store_dir = StoreDir::create(&config.vectorstore_dir)?;
        let store = Arc::new(VectorStore::open(&store_dir.index_db())?);
        tracing::debug!(path = %store_dir.index_db().display(), "opened vector store");

        let writer = Arc::new(IndexWriter::new(
            Arc::clone(&store),
            Arc::clone(&embedder),
            config.embed_batch_size,
        ));
        let retriever = Retriever::new(Arc::clone(&store), Arc::clone(&embedder));

        Ok(Self {
            ingestor: Ingestor::new(writer, config.chunking),
            pipeline: QueryPipeline::new(
                retriever,
                Arc::clone(&llm),
                config.top_k,
                config.fetch_k,
            ),
            store,
            llm_model: llm.model_id().to_string(),
            embedding_model: embedder.model_id().to_string(),
            store_dir,
        })
    }

    pub fn status(&self) -> Result<StatusReport> {
        let identifiers = self
            .store
            .list_identifiers()?
            .into_iter()
            .map(|(identifier, chunks)| IdentifierStatus { identifier, chunks })
            .collect();

        Ok(StatusReport {
            vectorstore_dir: self.store_dir.root().to_path_buf(),
            llm_model: self.llm_model.clone(),
            embedding_model: self.embedding_model.clone(),
            chunk_count: self.store.count()?,
            identifiers,
        })
    }
}
