//! docsearch - document ingestion and LLM-reranked retrieval.
//!
//! Files (PDF, plain text, DOCX) are extracted, split into overlapping
//! chunks, embedded through [Ollama](https://ollama.com) and stored in a
//! local [redb](https://www.redb.org) vector index. Queries retrieve the
//! nearest chunks, drop the ones an LLM judges irrelevant, and rerank the
//! rest by an LLM relevance score.
//!
//! # Quick start
//!
//! ```no_run
//! # async fn demo() -> docsearch::Result<()> {
//! use std::path::PathBuf;
//!
//! use docsearch::{Config, QueryRequest, Services};
//! use serde_json::json;
//!
//! let config = Config::from_env()?;
//! let services = Services::open(&config)?;
//!
//! let mut meta = docsearch::document::Metadata::new();
//! meta.insert("identifier".to_string(), json!("manuals"));
//! let status = services
//!     .ingestor
//!     .upload(&[PathBuf::from("manual.pdf")], &meta)
//!     .await;
//! println!("{status}");
//!
//! for doc in services.pipeline.run(&QueryRequest::new("reset procedure")).await? {
//!     println!("{}", doc.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index_writer;
pub mod ingest;
pub mod llm;
pub mod llm_filter;
pub mod logging;
pub mod mcp;
pub mod ollama;
pub mod query;
pub mod reranker;
pub mod retrieval;
pub mod service;
pub mod store_dir;
pub mod timing;
pub mod vector_store;

pub use config::Config;
pub use document::Document;
pub use error::{Error, Result};
pub use ingest::Ingestor;
pub use query::{QueryPipeline, QueryRequest};
pub use service::Services;
pub use vector_store::VectorStore;
