use std::path::Path;

use rayon::prelude::*;
use redb::{
    Database,
    MultimapTableDefinition,
    ReadableDatabase,
    ReadableMultimapTable,
    ReadableTable,
    TableDefinition,
};

use crate::{
    document::{Document, Metadata},
    embedding::cosine_similarity,
    error::{Error, Result},
};

const CHUNKS: TableDefinition<u64, &[u8]> = TableDefinition::new("chunks");
const VECTORS: TableDefinition<u64, &[u8]> = TableDefinition::new("vectors");
const IDENTIFIERS: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("identifiers");
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const NEXT_ID: &str = "next_id";

/// Header size: 4 bytes dimension.
const HEADER_SIZE: usize = 4;

/// Persistent chunk store with brute-force cosine search.
///
/// Every chunk gets an internal `u64` id from a monotonic counter, so
/// iteration order over a table is insertion order.
///
/// Binary format per vector entry:
/// - 4 bytes: embedding dimension D (u32 LE)
/// - D * 4 bytes: f32 values
pub struct VectorStore {
    db: Database,
}

/// A chunk returned by [`VectorStore::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub id: u64,
    pub score: f32,
    pub document: Document,
}

impl VectorStore {
    /// Open or create a store at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use docsearch::VectorStore;
    ///
    /// let store = VectorStore::open(&tmp.path().join("index.redb")).unwrap();
    /// assert_eq!(store.count().unwrap(), 0);
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(CHUNKS)?;
        txn.open_table(VECTORS)?;
        txn.open_multimap_table(IDENTIFIERS)?;
        txn.open_table(COUNTERS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Remove every chunk uploaded under `identifier` in one transaction.
    ///
    /// Returns the number of chunks removed.
    pub fn delete_identifier(&self, identifier: &str) -> Result<usize> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut identifiers = txn.open_multimap_table(IDENTIFIERS)?;
            let ids = identifiers
                .remove_all(identifier)?
                .map(|guard| guard.map(|g| g.value()))
                .collect::<std::result::Result<Vec<u64>, _>>()?;

            let mut chunks = txn.open_table(CHUNKS)?;
            let mut vectors = txn.open_table(VECTORS)?;
            for &id in &ids {
                chunks.remove(id)?;
                vectors.remove(id)?;
            }
            ids.len()
        };
        txn.commit()?;

        tracing::debug!(identifier, removed, "deleted chunks by identifier");
        Ok(removed)
    }

    /// Store chunks and their vectors in a single transaction.
    ///
    /// Returns the ids assigned to the entries, in input order.
    pub fn insert_batch(
        &self,
        entries: &[(Document, Vec<f32>)],
    ) -> Result<Vec<u64>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_write()?;
        let ids = {
            let mut counters = txn.open_table(COUNTERS)?;
            let mut chunks = txn.open_table(CHUNKS)?;
            let mut vectors = txn.open_table(VECTORS)?;
            let mut identifiers = txn.open_multimap_table(IDENTIFIERS)?;

            let mut next = counters.get(NEXT_ID)?.map(|g| g.value()).unwrap_or(0);
            let mut ids = Vec::with_capacity(entries.len());

            for (document, vector) in entries {
                let id = next;
                next += 1;

                let encoded = serde_json::to_vec(document)?;
                chunks.insert(id, encoded.as_slice())?;

                let dimension = u32::try_from(vector.len()).map_err(|_| {
                    Error::Embedding(format!(
                        "embedding dimension {} is too large",
                        vector.len()
                    ))
                })?;
                let byte_len = HEADER_SIZE + std::mem::size_of_val(vector.as_slice());
                let mut guard = vectors.insert_reserve(id, byte_len)?;
                let dest = guard.as_mut();
                dest[0..HEADER_SIZE].copy_from_slice(&dimension.to_le_bytes());
                dest[HEADER_SIZE..].copy_from_slice(bytemuck::cast_slice(vector));
                drop(guard);

                if let Some(identifier) = document.identifier() {
                    identifiers.insert(identifier, id)?;
                }
                ids.push(id);
            }

            counters.insert(NEXT_ID, next)?;
            ids
        };
        txn.commit()?;

        Ok(ids)
    }

    /// Return up to `top_k` chunks ranked by cosine similarity to `query`.
    ///
    /// When `filter` is given, only chunks whose metadata contains every
    /// filter pair are scored. Ties keep insertion order.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&Metadata>,
    ) -> Result<Vec<ScoredChunk>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let txn = self.db.begin_read()?;
        let chunks = txn.open_table(CHUNKS)?;
        let vectors = txn.open_table(VECTORS)?;

        let mut candidates: Vec<(u64, Document, Vec<f32>)> = Vec::new();
        let mut skipped = 0usize;

        for entry in chunks.iter()? {
            let (key, value) = entry?;
            let id = key.value();
            let document: Document = serde_json::from_slice(value.value())?;

            if filter.is_some_and(|f| !document.matches(f)) {
                continue;
            }

            let Some(guard) = vectors.get(id)? else {
                skipped += 1;
                continue;
            };
            match decode_vector(guard.value()) {
                Some(vector) if vector.len() == query.len() => {
                    candidates.push((id, document, vector));
                }
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!(
                skipped,
                dimension = query.len(),
                "skipped chunks with missing or mismatched vectors"
            );
        }

        let mut scored: Vec<ScoredChunk> = candidates
            .into_par_iter()
            .map(|(id, document, vector)| ScoredChunk {
                id,
                score: cosine_similarity(query, &vector),
                document,
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);

        Ok(scored)
    }

    /// Number of stored chunks.
    pub fn count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CHUNKS)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    /// Every identifier with its chunk count, sorted by identifier.
    pub fn list_identifiers(&self) -> Result<Vec<(String, usize)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_multimap_table(IDENTIFIERS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (key, values) = entry?;
            let mut count = 0;
            for value in values {
                value?;
                count += 1;
            }
            result.push((key.value().to_string(), count));
        }
        Ok(result)
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore").finish_non_exhaustive()
    }
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    let header: [u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
    let dimension = u32::from_le_bytes(header) as usize;
    let payload = &bytes[HEADER_SIZE..];
    if payload.len() != dimension * 4 {
        return None;
    }

    // redb gives no alignment guarantee for stored values.
    match bytemuck::try_cast_slice::<u8, f32>(payload) {
        Ok(values) => Some(values.to_vec()),
        Err(_) => Some(
            payload
                .chunks_exact(4)
                .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::document::{FILE_NAME, IDENTIFIER};

    fn test_store() -> (tempfile::TempDir, VectorStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::open(&tmp.path().join("index.redb")).unwrap();
        (tmp, store)
    }

    fn chunk(text: &str, identifier: &str) -> Document {
        Document::new(text).with_meta(IDENTIFIER, identifier)
    }

    #[test]
    fn insert_and_search_ranks_by_similarity() {
        let (_tmp, store) = test_store();
        store
            .insert_batch(&[
                (chunk("east", "a"), vec![1.0, 0.0]),
                (chunk("north", "a"), vec![0.0, 1.0]),
                (chunk("north-east", "a"), vec![1.0, 1.0]),
            ])
            .unwrap();

        let hits = store.search(&[0.0, 1.0], 2, None).unwrap();
        let contents: Vec<&str> =
            hits.iter().map(|h| h.document.content.as_str()).collect();
        assert_eq!(contents, vec!["north", "north-east"]);
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let (_tmp, store) = test_store();
        store
            .insert_batch(&[
                (chunk("first", "a"), vec![1.0, 0.0]),
                (chunk("second", "a"), vec![2.0, 0.0]),
                (chunk("third", "a"), vec![3.0, 0.0]),
            ])
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 3, None).unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn filter_restricts_candidates() {
        let (_tmp, store) = test_store();
        store
            .insert_batch(&[
                (chunk("a1", "alpha").with_meta(FILE_NAME, "x.txt"), vec![1.0, 0.0]),
                (chunk("b1", "beta"), vec![1.0, 0.0]),
                (chunk("a2", "alpha").with_meta(FILE_NAME, "y.txt"), vec![0.5, 0.5]),
            ])
            .unwrap();

        let mut filter = Metadata::new();
        filter.insert(IDENTIFIER.to_string(), json!("alpha"));
        let hits = store.search(&[1.0, 0.0], 10, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.document.identifier() == Some("alpha")));

        filter.insert(FILE_NAME.to_string(), json!("y.txt"));
        let hits = store.search(&[1.0, 0.0], 10, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.content, "a2");

        let hits = store.search(&[1.0, 0.0], 10, Some(&Metadata::new())).unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn delete_identifier_removes_only_that_identifier() {
        let (_tmp, store) = test_store();
        store
            .insert_batch(&[
                (chunk("a1", "alpha"), vec![1.0]),
                (chunk("a2", "alpha"), vec![1.0]),
                (chunk("b1", "beta"), vec![1.0]),
            ])
            .unwrap();

        assert_eq!(store.delete_identifier("alpha").unwrap(), 2);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.delete_identifier("alpha").unwrap(), 0);
        assert_eq!(store.delete_identifier("missing").unwrap(), 0);

        let hits = store.search(&[1.0], 10, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.content, "b1");
    }

    #[test]
    fn ids_continue_after_delete() {
        let (_tmp, store) = test_store();
        let first = store.insert_batch(&[(chunk("a", "x"), vec![1.0])]).unwrap();
        store.delete_identifier("x").unwrap();
        let second = store.insert_batch(&[(chunk("b", "x"), vec![1.0])]).unwrap();
        assert!(second[0] > first[0]);
    }

    #[test]
    fn mismatched_dimensions_are_skipped() {
        let (_tmp, store) = test_store();
        store
            .insert_batch(&[
                (chunk("two", "a"), vec![1.0, 0.0]),
                (chunk("three", "a"), vec![1.0, 0.0, 0.0]),
            ])
            .unwrap();

        let hits = store.search(&[1.0, 0.0], 10, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.content, "two");
    }

    #[test]
    fn list_identifiers_counts_chunks() {
        let (_tmp, store) = test_store();
        store
            .insert_batch(&[
                (chunk("a1", "alpha"), vec![1.0]),
                (chunk("b1", "beta"), vec![1.0]),
                (chunk("a2", "alpha"), vec![1.0]),
                (Document::new("untagged"), vec![1.0]),
            ])
            .unwrap();

        assert_eq!(
            store.list_identifiers().unwrap(),
            vec![("alpha".to_string(), 2), ("beta".to_string(), 1)]
        );
        assert_eq!(store.count().unwrap(), 4);
    }

    #[test]
    fn empty_store_and_zero_top_k() {
        let (_tmp, store) = test_store();
        assert!(store.search(&[1.0], 5, None).unwrap().is_empty());
        store.insert_batch(&[(chunk("a", "x"), vec![1.0])]).unwrap();
        assert!(store.search(&[1.0], 0, None).unwrap().is_empty());
        assert!(store.insert_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");

        {
            let store = VectorStore::open(&path).unwrap();
            store
                .insert_batch(&[(chunk("durable", "keep"), vec![0.25, 0.75])])
                .unwrap();
        }

        {
            let store = VectorStore::open(&path).unwrap();
            assert_eq!(store.count().unwrap(), 1);
            let hits = store.search(&[0.25, 0.75], 1, None).unwrap();
            assert_eq!(hits[0].document.content, "durable");
            assert!((hits[0].score - 1.0).abs() < 1e-6);

            let ids = store.insert_batch(&[(chunk("more", "keep"), vec![1.0, 0.0])]).unwrap();
            assert_eq!(ids, vec![1]);
        }
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        assert!(decode_vector(&[]).is_none());
        let mut bytes = 2u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&1.0f32.to_ne_bytes());
        assert!(decode_vector(&bytes).is_none());
        bytes.extend_from_slice(&2.0f32.to_ne_bytes());
        assert_eq!(decode_vector(&bytes), Some(vec![1.0, 2.0]));
    }
}
