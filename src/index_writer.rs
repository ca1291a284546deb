use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    document::{Document, IDENTIFIER},
    embedding::Embedder,
    error::{Error, Result},
    vector_store::VectorStore,
};

/// Chunks embedded and committed per transaction.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Outcome of a successful [`IndexWriter::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertReport {
    pub deleted: usize,
    pub inserted: usize,
    pub batches: usize,
}

/// Embeds chunks and writes them to the store, replacing by identifier.
///
/// All upserts through one writer are serialized: the delete and every
/// batch of one call finish before the next call starts.
pub struct IndexWriter {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    lock: Mutex<()>,
}

impl IndexWriter {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            embedder,
            batch_size: batch_size.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Delete every chunk stored under `identifier`, then embed and insert
    /// `chunks` in batches.
    ///
    /// Each chunk is stamped with `identifier`, overriding any value its
    /// metadata already carries, so the next upsert can replace it.
    ///
    /// The delete is committed before the first batch is embedded. A failing
    /// batch aborts the upsert; batches committed before it stay visible.
    #[tracing::instrument(level = "debug", skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn upsert(
        &self,
        chunks: Vec<Document>,
        identifier: &str,
    ) -> Result<UpsertReport> {
        let chunks: Vec<Document> = chunks
            .into_iter()
            .map(|chunk| chunk.with_meta(IDENTIFIER, identifier))
            .collect();

        let _guard = self.lock.lock().await;

        let deleted = self.store.delete_identifier(identifier)?;
        if deleted > 0 {
            info!(identifier, deleted, "replaced existing chunks");
        }

        let total_batches = chunks.len().div_ceil(self.batch_size);
        let mut inserted = 0;

        for (index, batch) in chunks.chunks(self.batch_size).enumerate() {
            let number = index + 1;
            self.write_batch(batch)
                .await
                .map_err(|e| Error::IndexWrite {
                    batch: number,
                    total_batches,
                    source: Box::new(e),
                })?;
            inserted += batch.len();
            debug!(
                batch = number,
                total_batches,
                size = batch.len(),
                "committed batch"
            );
        }

        info!(
            identifier,
            inserted,
            batches = total_batches,
            embedding_model = self.embedder.model_id(),
            "indexed chunks"
        );

        Ok(UpsertReport {
            deleted,
            inserted,
            batches: total_batches,
        })
    }

    async fn write_batch(&self, batch: &[Document]) -> Result<()> {
        let texts: Vec<String> =
            batch.iter().map(|doc| doc.content.clone()).collect();
        let vectors = self.embedder.embed_documents(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        let entries: Vec<(Document, Vec<f32>)> =
            batch.iter().cloned().zip(vectors).collect();
        self.store.insert_batch(&entries)?;
        Ok(())
    }
}

impl std::fmt::Debug for IndexWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexWriter")
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}
