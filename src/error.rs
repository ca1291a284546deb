use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried by extraction failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported file type '{extension}' for file: {file_name}")]
    UnsupportedFileType {
        extension: String,
        file_name: String,
    },

    #[error("failed to extract text from {}: {source}", path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("index write failed at batch {batch}/{total_batches}: {source}")]
    IndexWrite {
        batch: usize,
        total_batches: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("language model error: {0}")]
    LanguageModel(String),

    #[error("vector store directory could not be created: {0}")]
    StoreDir(PathBuf),

    #[error("log file {} could not be opened: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

impl Error {
    pub(crate) fn extraction(
        path: impl Into<PathBuf>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Extraction {
            path: path.into(),
            source: source.into(),
        }
    }
}
