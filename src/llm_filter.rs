//! Binary LLM relevance check applied to retrieved candidates.

use crate::{document::Document, error::Result, llm::LanguageModel};

fn relevance_prompt(query: &str, content: &str) -> String {
    format!(
        "Given the user query: '{query}', is the following context relevant? \
         Context: {content}\n\nResponse with 'yes' or 'no'."
    )
}

/// True when the model's answer means "relevant".
pub fn is_affirmative(response: &str) -> bool {
    response.trim().to_lowercase().starts_with("yes")
}

/// Keep the documents the model judges relevant to `query`, in input order.
///
/// One model call per document. A failed call drops that document with a
/// warning; if every call fails the last error is returned.
#[tracing::instrument(level = "debug", skip_all, fields(candidates = docs.len()))]
pub async fn filter_relevant(
    docs: Vec<Document>,
    query: &str,
    llm: &dyn LanguageModel,
) -> Result<Vec<Document>> {
    tracing::info!(candidates = docs.len(), query, "filtering documents");
    if docs.is_empty() {
        return Ok(docs);
    }

    let total = docs.len();
    let mut kept = Vec::with_capacity(total);
    let mut failures = 0;
    let mut last_error = None;

    for doc in docs {
        match llm.complete(&relevance_prompt(query, &doc.content)).await {
            Ok(answer) if is_affirmative(&answer) => kept.push(doc),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, model = llm.model_id(), "relevance check failed, dropping candidate");
                failures += 1;
                last_error = Some(e);
            }
        }
    }

    if failures == total {
        if let Some(e) = last_error {
            return Err(e);
        }
    }

    tracing::info!(kept = kept.len(), total, "filtered documents");
    Ok(kept)
}
