use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use docsearch::{
    Config,
    QueryRequest,
    Result,
    Services,
    document::{FILE_NAME, IDENTIFIER, Metadata},
    embedding::Embedder,
    llm::LanguageModel,
};
use serde_json::json;

/// Hashed bag-of-words embedding; stable across runs.
struct BagOfWords;

const DIM: usize = 64;

fn bag_of_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let hash = word
            .to_lowercase()
            .bytes()
            .fold(5381u32, |h, b| h.wrapping_mul(33) ^ u32::from(b));
        v[hash as usize % DIM] += 1.0;
    }
    v
}

#[async_trait]
impl Embedder for BagOfWords {
    fn model_id(&self) -> &str {
        "bag-of-words"
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| bag_of_words(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(bag_of_words(text))
    }
}

/// Relevant iff the context mentions "volcano"; score is the number of
/// times it does.
struct VolcanoJudge {
    calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for VolcanoJudge {
    fn model_id(&self) -> &str {
        "volcano-judge"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let lower = prompt.to_lowercase();
        let context = lower
            .split_once("context")
            .map(|(_, rest)| rest)
            .unwrap_or_default();
        let mentions = context.matches("volcano").count();
        if prompt.ends_with("Response with 'yes' or 'no'.") {
            return Ok(if mentions > 0 { "Yes." } else { "no" }.to_string());
        }
        Ok(format!(" {mentions}\n"))
    }
}

struct Fixture {
    _tmp: tempfile::TempDir,
    dir: PathBuf,
    services: Services,
    judge: Arc<VolcanoJudge>,
}

fn fixture(chunk_size: usize) -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let dir = tmp.path().to_path_buf();
    let store = dir.join("vectorstore");
    let config = Config::from_lookup(|key| match key {
        "SERPER_API_KEY" => Some("test".to_string()),
        "VECTORSTORE_DIR" => Some(store.to_string_lossy().into_owned()),
        "CHUNK_SIZE" => Some(chunk_size.to_string()),
        "CHUNK_OVERLAP" => Some("10".to_string()),
        "EMBED_BATCH_SIZE" => Some("3".to_string()),
        "TOP_K" => Some("2".to_string()),
        _ => None,
    })
    .unwrap();

    let judge = Arc::new(VolcanoJudge {
        calls: AtomicUsize::new(0),
    });
    let services = Services::with_models(
        &config,
        Arc::new(BagOfWords),
        Arc::clone(&judge) as Arc<dyn LanguageModel>,
    )
    .unwrap();

    Fixture {
        _tmp: tmp,
        dir,
        services,
        judge,
    }
}

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn meta(identifier: &str) -> Metadata {
    let mut m = Metadata::new();
    m.insert(IDENTIFIER.to_string(), json!(identifier));
    m
}

const GEOLOGY: &str = "Volcanoes form where magma reaches the surface. \
A volcano can be active, dormant or extinct.\n\n\
Tectonic plates move slowly. Earthquakes happen along faults.\n\n\
The volcano erupted and the volcano ash covered the volcano town.\n\n\
Rivers carve valleys over millions of years.";

#[tokio::test]
async fn reupload_with_same_identifier_is_idempotent() {
    let f = fixture(80);
    let file = write(&f.dir, "geology.txt", GEOLOGY);

    f.services.ingestor.upload(&[file.clone()], &meta("geo")).await;
    let first = f.services.store.count().unwrap();
    assert!(first > 3, "expected several chunks, got {first}");

    let message = f.services.ingestor.upload(&[file], &meta("geo")).await;
    assert_eq!(
        message,
        "Documents uploaded and indexed successfully with identifier: geo"
    );
    assert_eq!(f.services.store.count().unwrap(), first);
}

#[tokio::test]
async fn unsupported_file_in_batch_indexes_nothing_and_keeps_prior_chunks() {
    let f = fixture(80);
    let good = write(&f.dir, "geology.txt", GEOLOGY);
    f.services.ingestor.upload(&[good.clone()], &meta("geo")).await;
    let before = f.services.store.count().unwrap();

    let other = write(&f.dir, "other.txt", "fresh content about volcano ash");
    let bad = write(&f.dir, "sheet.xlsx", "binary");
    let message = f
        .services
        .ingestor
        .upload(&[other, bad, good], &meta("geo"))
        .await;

    assert_eq!(message, "Only PDF, TXT, and DOCX files are supported.");
    assert_eq!(f.services.store.count().unwrap(), before);
}

#[tokio::test]
async fn identifiers_are_independent() {
    let f = fixture(80);
    let a = write(&f.dir, "a.txt", GEOLOGY);
    let b = write(&f.dir, "b.txt", "A short note about a volcano.");

    f.services.ingestor.upload(&[a], &meta("alpha")).await;
    f.services.ingestor.upload(&[b.clone()], &meta("beta")).await;
    let total = f.services.store.count().unwrap();

    f.services.ingestor.upload(&[b], &meta("beta")).await;
    assert_eq!(f.services.store.count().unwrap(), total);

    let status = f.services.status().unwrap();
    let names: Vec<&str> = status
        .identifiers
        .iter()
        .map(|e| e.identifier.as_str())
        .collect();
    assert_eq!(names, vec!["alpha", "beta"]);
    assert_eq!(status.identifiers[1].chunks, 1);
}

#[tokio::test]
async fn query_filters_reranks_and_truncates() {
    let f = fixture(80);
    let file = write(&f.dir, "geology.txt", GEOLOGY);
    f.services.ingestor.upload(&[file], &meta("geo")).await;

    let results = f
        .services
        .pipeline
        .run(&QueryRequest::new("tell me about the volcano"))
        .await
        .unwrap();

    assert!(!results.is_empty() && results.len() <= 2);
    assert!(
        results
            .iter()
            .all(|d| d.content.to_lowercase().contains("volcano"))
    );
    // The chunk with the most mentions ranks first.
    assert!(results[0].content.contains("volcano ash"));
    assert!(f.judge.calls.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn metadata_filter_returns_only_exact_matches() {
    let f = fixture(200);
    let a = write(&f.dir, "a.txt", "The volcano in file a.");
    let b = write(&f.dir, "b.txt", "The volcano in file b.");
    f.services.ingestor.upload(&[a, b], &meta("both")).await;

    let mut filter = Metadata::new();
    filter.insert(FILE_NAME.to_string(), json!("b.txt"));
    let request = QueryRequest {
        metadata_filter: Some(filter),
        top_k: Some(5),
        ..QueryRequest::new("volcano")
    };
    let results = f.services.pipeline.run(&request).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].metadata[FILE_NAME], json!("b.txt"));
    assert_eq!(results[0].metadata[IDENTIFIER], json!("both"));
}

#[tokio::test]
async fn empty_index_makes_no_model_calls() {
    let f = fixture(80);
    let results = f
        .services
        .pipeline
        .run(&QueryRequest::new("anything"))
        .await
        .unwrap();
    assert!(results.is_empty());
    assert_eq!(f.judge.calls.load(Ordering::SeqCst), 0);
}
