//! Process-wide configuration, read once from the environment at startup.
//!
//! Every component receives the values it needs through its constructor;
//! nothing re-reads the environment after [`Config::from_env`] returns.

use std::path::PathBuf;

use crate::{
    chunking::ChunkingConfig,
    error::{Error, Result},
};

pub const DEFAULT_LLM_MODEL: &str = "llama3.2";
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_VECTORSTORE_DIR: &str = "./vectorstore";
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 20;

/// How many retrieval candidates are fetched per final result when
/// `FETCH_K` is unset.
const FETCH_K_FACTOR: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub llm_model: String,
    pub embedding_model: String,
    pub vectorstore_dir: PathBuf,
    pub ollama_base_url: String,
    pub top_k: usize,
    pub fetch_k: usize,
    pub chunking: ChunkingConfig,
    pub embed_batch_size: usize,
    /// Held for the web-search collaborator; required at startup.
    pub serper_api_key: String,
}

impl Config {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Missing values fall back to defaults, except `SERPER_API_KEY` which
    /// must be present. Numeric values must parse as integers.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        let serper_api_key = lookup("SERPER_API_KEY").ok_or_else(|| {
            Error::Config(
                "missing required environment variables: SERPER_API_KEY"
                    .to_string(),
            )
        })?;

        let top_k = parse_usize(&lookup, "TOP_K", DEFAULT_TOP_K)?;
        if top_k == 0 {
            return Err(Error::Config("TOP_K must be greater than 0".into()));
        }

        let fetch_k = parse_usize(
            &lookup,
            "FETCH_K",
            top_k.saturating_mul(FETCH_K_FACTOR),
        )?;
        if fetch_k < top_k {
            return Err(Error::Config(format!(
                "FETCH_K ({fetch_k}) must be at least TOP_K ({top_k})"
            )));
        }

        let chunking = ChunkingConfig::new(
            parse_usize(&lookup, "CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            parse_usize(&lookup, "CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
        )?;

        let embed_batch_size = parse_usize(
            &lookup,
            "EMBED_BATCH_SIZE",
            DEFAULT_EMBED_BATCH_SIZE,
        )?;
        if embed_batch_size == 0 {
            return Err(Error::Config(
                "EMBED_BATCH_SIZE must be greater than 0".into(),
            ));
        }

        Ok(Self {
            llm_model: string_or("LLM_MODEL", DEFAULT_LLM_MODEL),
            embedding_model: string_or(
                "EMBEDDING_MODEL",
                DEFAULT_EMBEDDING_MODEL,
            ),
            vectorstore_dir: PathBuf::from(string_or(
                "VECTORSTORE_DIR",
                DEFAULT_VECTORSTORE_DIR,
            )),
            ollama_base_url: string_or(
                "OLLAMA_BASE_URL",
                DEFAULT_OLLAMA_BASE_URL,
            )
            .trim_end_matches('/')
            .to_string(),
            top_k,
            fetch_k,
            chunking,
            embed_batch_size,
            serper_api_key,
        })
    }
}

fn parse_usize<F>(lookup: &F, key: &str, default: usize) -> Result<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            Error::Config(format!("{key} must be an integer, got '{raw}'"))
        }),
    }
}
