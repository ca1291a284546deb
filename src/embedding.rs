use async_trait::async_trait;

use crate::error::Result;

/// Computes dense embeddings for chunk and query text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, for logging.
    fn model_id(&self) -> &str;

    /// Embed a batch of chunk texts. Returns one vector per input, in order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0.0 when either vector has zero norm.
///
/// # Examples
///
/// ```
/// use docsearch::embedding::cosine_similarity;
///
/// assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
/// assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let (mut dot, mut norm_a, mut norm_b) = (0.0f32, 0.0f32, 0.0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
