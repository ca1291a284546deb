use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    chunking::{ChunkingConfig, split_documents},
    document::{
        Document,
        FILE_NAME,
        FILE_PATH,
        IDENTIFIER,
        Metadata,
        UPLOAD_TIME,
        is_scalar,
    },
    error::Error,
    extract::{FileKind, extract_file, file_name},
    index_writer::{IndexWriter, UpsertReport},
};

/// Why an upload did not complete. The display text is the status message
/// returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Filepaths and meta_data with identifier are required.")]
    MissingInput,

    #[error("Only PDF, TXT, and DOCX files are supported.")]
    UnsupportedFileType(#[source] Error),

    #[error("Failed to upload documents: {0}")]
    Failed(#[from] Error),
}

/// Turns files into indexed chunks under one identifier.
pub struct Ingestor {
    writer: Arc<IndexWriter>,
    chunking: ChunkingConfig,
}

impl Ingestor {
    pub fn new(writer: Arc<IndexWriter>, chunking: ChunkingConfig) -> Self {
        Self { writer, chunking }
    }

    /// Upload `filepaths` under `meta_data["identifier"]` and return a
    /// status message. Never fails; problems are reported in the message.
    pub async fn upload(&self, filepaths: &[PathBuf], meta_data: &Metadata) -> String {
        match self.ingest(filepaths, meta_data).await {
            Ok((identifier, _)) => {
                format!(
                    "Documents uploaded and indexed successfully with identifier: {identifier}"
                )
            }
            Err(e) => e.to_string(),
        }
    }

    /// Extract, chunk and index every file, replacing whatever was stored
    /// under the same identifier.
    ///
    /// Every path is checked and every file extracted before the index is
    /// touched, so a bad file anywhere leaves existing chunks in place.
    #[tracing::instrument(level = "debug", skip_all, fields(files = filepaths.len()))]
    pub async fn ingest(
        &self,
        filepaths: &[PathBuf],
        meta_data: &Metadata,
    ) -> Result<(String, UpsertReport), UploadError> {
        info!(files = ?filepaths, ?meta_data, "upload requested");

        let identifier = meta_data
            .get(IDENTIFIER)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty());
        let Some(identifier) = identifier.filter(|_| !filepaths.is_empty()) else {
            error!("no filepaths provided or identifier missing in meta_data");
            return Err(UploadError::MissingInput);
        };
        let identifier = identifier.to_string();

        for path in filepaths {
            if let Err(e) = FileKind::from_path(path) {
                error!(error = %e, "rejecting upload");
                return Err(UploadError::UnsupportedFileType(e));
            }
        }

        let paths = filepaths.to_vec();
        let extra = meta_data.clone();
        let chunking = self.chunking;
        let stamp = chrono::Utc::now().to_rfc3339();
        let tag = identifier.clone();

        let chunks = tokio::task::spawn_blocking(move || {
            prepare_chunks(&paths, &extra, &tag, &stamp, &chunking)
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
        .inspect_err(|e| error!(error = %e, "extraction failed, nothing indexed"))?;

        let report = self
            .writer
            .upsert(chunks, &identifier)
            .await
            .inspect_err(|e| error!(error = %e, "indexing failed"))?;

        info!(
            identifier,
            deleted = report.deleted,
            inserted = report.inserted,
            "documents uploaded and indexed"
        );
        Ok((identifier, report))
    }
}

impl std::fmt::Debug for Ingestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ingestor")
            .field("chunking", &self.chunking)
            .finish_non_exhaustive()
    }
}

/// Extract and chunk every file in order, stamping each chunk with upload
/// provenance.
fn prepare_chunks(
    paths: &[PathBuf],
    meta_data: &Metadata,
    identifier: &str,
    upload_time: &str,
    chunking: &ChunkingConfig,
) -> crate::error::Result<Vec<Document>> {
    let mut all_chunks = Vec::new();

    for path in paths {
        let docs = extract_file(path)?;
        let mut chunks = split_documents(&docs, chunking);
        let provenance = provenance(path, meta_data, identifier, upload_time);

        for chunk in &mut chunks {
            chunk
                .metadata
                .extend(provenance.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        info!(file = %file_name(path), chunks = chunks.len(), "split file");
        all_chunks.extend(chunks);
    }

    Ok(all_chunks)
}

/// Caller-supplied scalar keys, then the fixed provenance keys on top.
fn provenance(
    path: &Path,
    meta_data: &Metadata,
    identifier: &str,
    upload_time: &str,
) -> Metadata {
    let mut out = Metadata::new();
    for (key, value) in meta_data {
        if is_scalar(value) {
            out.insert(key.clone(), value.clone());
        } else {
            warn!(key, "ignoring non-scalar metadata value");
        }
    }
    out.insert(FILE_NAME.to_string(), file_name(path).into());
    out.insert(FILE_PATH.to_string(), path.to_string_lossy().into_owned().into());
    out.insert(IDENTIFIER.to_string(), identifier.into());
    out.insert(UPLOAD_TIME.to_string(), upload_time.into());
    out
}
