//! Ollama HTTP backend for both embeddings and completions.
//!
//! Uses the batch `/api/embed` endpoint for embeddings and non-streaming
//! `/api/generate` for completions.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::{
    embedding::Embedder,
    error::{Error, Result},
    llm::LanguageModel,
};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let model = model.into();
        debug!(base_url, model, "Ollama client initialized");
        Self {
            client: reqwest::Client::new(),
            base_url,
            model,
        }
    }

    fn embed_url(&self) -> String {
        format!("{}/api/embed", self.base_url)
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    async fn post_json<Req, Resp>(&self, url: String, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: for<'de> Deserialize<'de>,
    {
        let start = Instant::now();
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();

        trace!(
            %url,
            %status,
            elapsed_ms = start.elapsed().as_millis(),
            "Ollama responded"
        );

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%url, %status, model = %self.model, "Ollama request failed");
            return Err(Error::Embedding(format!(
                "Ollama returned {status}: {text}"
            )));
        }

        Ok(response.json().await?)
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl Embedder for OllamaClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let result: EmbedResponse =
            self.post_json(self.embed_url(), &request).await?;

        if result.embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "batch size mismatch: got {} embeddings for {} inputs",
                result.embeddings.len(),
                texts.len()
            )));
        }

        Ok(result.embeddings)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let input = [text.to_string()];
        let mut embeddings = self.embed_documents(&input).await?;
        embeddings
            .pop()
            .ok_or_else(|| Error::Embedding("empty embedding response".into()))
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let result: GenerateResponse = self
            .post_json(self.generate_url(), &request)
            .await
            .map_err(|e| match e {
                Error::Embedding(msg) => Error::LanguageModel(msg),
                other => other,
            })?;
        Ok(result.response)
    }
}
