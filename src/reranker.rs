use crate::{document::Document, llm::LanguageModel};

/// A candidate with its LLM relevance score and original position.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub document: Document,
    pub score: u64,
    pub position: usize,
}

fn rating_prompt(query: &str, content: &str) -> String {
    format!(
        "Given the query: '{query}', rate the relevance of the following context: \n\n {content}\n\n Score (0-10):"
    )
}

/// Parse a model's rating into an integer score.
///
/// All ASCII digits in the response are concatenated and read as one
/// number, so `"8/10"` scores 810 and outranks `"7/10"`. Values too large
/// for a `u64` saturate. Returns `None` when there are no digits.
///
/// # Examples
///
/// ```
/// use docsearch::reranker::parse_score;
///
/// assert_eq!(parse_score(" 8 "), Some(8));
/// assert_eq!(parse_score("Score: 7/10"), Some(710));
/// assert_eq!(parse_score("not sure"), None);
/// ```
pub fn parse_score(response: &str) -> Option<u64> {
    response
        .trim()
        .chars()
        .filter_map(|c| c.to_digit(10))
        .fold(None, |acc: Option<u64>, digit| {
            Some(
                acc.unwrap_or(0)
                    .saturating_mul(10)
                    .saturating_add(u64::from(digit)),
            )
        })
}

/// Score every document against `query` and return the `top_k` best.
///
/// Candidates whose rating cannot be obtained or parsed score 0 and stay
/// in the list. Equal scores keep their input order.
#[tracing::instrument(level = "debug", skip(docs, llm), fields(candidates = docs.len()))]
pub async fn rerank(
    docs: Vec<Document>,
    query: &str,
    llm: &dyn LanguageModel,
    top_k: usize,
) -> Vec<Document> {
    tracing::info!(candidates = docs.len(), query, "reranking documents");
    if docs.is_empty() {
        return docs;
    }

    let mut scored = Vec::with_capacity(docs.len());
    for (position, document) in docs.into_iter().enumerate() {
        let score = match llm.complete(&rating_prompt(query, &document.content)).await {
            Ok(answer) => parse_score(&answer).unwrap_or_else(|| {
                tracing::warn!(position, answer = %answer.trim(), "unparseable score, using 0");
                0
            }),
            Err(e) => {
                tracing::warn!(position, error = %e, model = llm.model_id(), "scoring failed, using 0");
                0
            }
        };
        scored.push(ScoredCandidate {
            document,
            score,
            position,
        });
    }

    let ranked = select_top(scored, top_k);
    tracing::info!(selected = ranked.len(), "reranked documents");
    ranked
}

/// Stable sort by score descending, then truncate.
fn select_top(mut scored: Vec<ScoredCandidate>, top_k: usize) -> Vec<Document> {
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored
        .into_iter()
        .take(top_k)
        .map(|candidate| candidate.document)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::{Error, Result};

    struct Scripted {
        answers: Mutex<Vec<Option<&'static str>>>,
        calls: Mutex<usize>,
    }

    impl Scripted {
        fn new(answers: Vec<Option<&'static str>>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().rev().collect()),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _prompt: &str) -> Result<String> {
            *self.calls.lock().unwrap() += 1;
            match self.answers.lock().unwrap().pop().flatten() {
                Some(answer) => Ok(answer.to_string()),
                None => Err(Error::LanguageModel("timeout".into())),
            }
        }
    }

    fn docs(names: &[&str]) -> Vec<Document> {
        names.iter().map(|n| Document::new(*n)).collect()
    }

    fn contents(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.content.as_str()).collect()
    }

    #[test]
    fn parse_score_variants() {
        assert_eq!(parse_score("7"), Some(7));
        assert_eq!(parse_score("  0\n"), Some(0));
        assert_eq!(parse_score("10"), Some(10));
        assert_eq!(parse_score("42"), Some(42));
        assert_eq!(parse_score("Score: 9"), Some(9));
        assert_eq!(parse_score("8/10"), Some(810));
        assert_eq!(parse_score("not sure"), None);
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score(&"9".repeat(40)), Some(u64::MAX));
    }

    #[test]
    fn prompt_format() {
        assert_eq!(
            rating_prompt("q", "ctx"),
            "Given the query: 'q', rate the relevance of the following context: \n\n ctx\n\n Score (0-10):"
        );
    }

    #[tokio::test]
    async fn sorts_descending_with_stable_ties() {
        let llm = Scripted::new(vec![Some("7"), Some("7"), Some("9")]);
        let ranked = rerank(docs(&["A", "B", "C"]), "q", &llm, 5).await;
        assert_eq!(contents(&ranked), vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn fraction_replies_rank_by_their_digits() {
        let llm = Scripted::new(vec![Some("7/10"), Some("8/10")]);
        let ranked = rerank(docs(&["A", "B"]), "q", &llm, 5).await;
        assert_eq!(contents(&ranked), vec!["B", "A"]);
    }

    #[tokio::test]
    async fn truncates_to_top_k() {
        let llm = Scripted::new(vec![Some("1"), Some("5"), Some("3"), Some("8")]);
        let ranked = rerank(docs(&["a", "b", "c", "d"]), "q", &llm, 2).await;
        assert_eq!(contents(&ranked), vec!["d", "b"]);
    }

    #[tokio::test]
    async fn unparseable_and_failed_scores_are_zero_but_kept() {
        let llm = Scripted::new(vec![Some("not sure"), None, Some("2")]);
        let ranked = rerank(docs(&["a", "b", "c"]), "q", &llm, 10).await;
        assert_eq!(contents(&ranked), vec!["c", "a", "b"]);
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let llm = Scripted::new(vec![]);
        assert!(rerank(Vec::new(), "q", &llm, 3).await.is_empty());
        assert_eq!(*llm.calls.lock().unwrap(), 0);
    }

    #[test]
    fn select_top_keeps_position_order_for_ties() {
        let scored = (0..4)
            .map(|i| ScoredCandidate {
                document: Document::new(format!("d{i}")),
                score: if i == 2 { 6 } else { 3 },
                position: i,
            })
            .collect();
        let top = select_top(scored, 3);
        assert_eq!(contents(&top), vec!["d2", "d0", "d1"]);
    }
}
