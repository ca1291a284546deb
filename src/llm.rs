use async_trait::async_trait;

use crate::error::Result;

/// A text-completion model used by the relevance filter and the reranker.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_id(&self) -> &str;

    /// Complete a single prompt and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
