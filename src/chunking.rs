//! Chunking utilities for splitting extracted documents into overlapping
//! windows.
//!
//! Splitting is hierarchical: paragraph breaks are preferred, then line
//! breaks, then spaces, and finally arbitrary character boundaries. Small
//! pieces are merged greedily up to the chunk size, carrying the tail of the
//! previous window forward as overlap. All lengths are counted in `char`s.

use crate::{
    document::Document,
    error::{Error, Result},
};

/// Separators tried in order, coarsest first. The empty separator splits
/// into single characters and always succeeds.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Validated chunking parameters.
///
/// # Examples
///
/// ```
/// use docsearch::chunking::ChunkingConfig;
///
/// assert!(ChunkingConfig::new(500, 50).is_ok());
/// assert!(ChunkingConfig::new(0, 0).is_err());
/// assert!(ChunkingConfig::new(100, 100).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of the same source.
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config(
                "CHUNK_SIZE must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::Config(format!(
                "CHUNK_OVERLAP ({chunk_overlap}) must be smaller than CHUNK_SIZE ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }
}

/// Split documents into chunks, preserving input order.
///
/// Every chunk receives a copy of its parent's metadata. Documents with no
/// text produce no chunks.
pub fn split_documents(
    documents: &[Document],
    config: &ChunkingConfig,
) -> Vec<Document> {
    let mut chunks = Vec::new();
    for doc in documents {
        let text = normalize(&doc.content);
        for piece in split_text(&text, config) {
            chunks.push(Document {
                content: piece,
                metadata: doc.metadata.clone(),
            });
        }
    }
    tracing::debug!(
        documents = documents.len(),
        chunks = chunks.len(),
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        "split documents"
    );
    chunks
}

/// Normalize line endings and strip control characters left behind by
/// extractors (form feeds between PDF pages, stray NULs).
pub fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .chars()
        .filter(|&c| c != '\u{c}' && c != '\0')
        .collect()
}

/// Split a single text into windows of at most `chunk_size` characters.
///
/// # Examples
///
/// ```
/// use docsearch::chunking::{split_text, ChunkingConfig};
///
/// let config = ChunkingConfig::new(1000, 0).unwrap();
/// assert_eq!(split_text("Hello, world!", &config), vec!["Hello, world!"]);
///
/// let config = ChunkingConfig::new(100, 20).unwrap();
/// let chunks = split_text(&"word ".repeat(100), &config);
/// assert!(chunks.len() > 1);
/// assert!(chunks.iter().all(|c| c.chars().count() <= 100));
/// ```
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    recursive_split(text, SEPARATORS, config)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn recursive_split(
    text: &str,
    separators: &[&str],
    config: &ChunkingConfig,
) -> Vec<String> {
    // Pick the coarsest separator present in the text.
    let (separator, remaining) = separators
        .iter()
        .enumerate()
        .find(|(_, sep)| sep.is_empty() || text.contains(**sep))
        .map(|(i, sep)| (*sep, &separators[i + 1..]))
        .unwrap_or(("", &[][..]));

    let pieces = split_keeping_separator(text, separator);

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) < config.chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, config));
            pending.clear();
        }

        if remaining.is_empty() {
            // Nothing finer to split on; only reachable with the empty
            // separator, where every piece is a single char.
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        } else {
            chunks.extend(recursive_split(piece, remaining, config));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, config));
    }

    chunks
}

/// Split `text` on `separator`, attaching each separator to the start of
/// the piece that follows it. Empty pieces are dropped.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces.retain(|p| !p.is_empty());
    pieces
}

/// Greedily merge small pieces into windows of at most `chunk_size`,
/// keeping up to `chunk_overlap` trailing characters from the previous
/// window at the start of the next one.
fn merge_pieces(pieces: &[&str], config: &ChunkingConfig) -> Vec<String> {
    let mut windows = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size && !current.is_empty() {
            push_window(&mut windows, &current);

            while total > config.chunk_overlap
                || (total + len > config.chunk_size && total > 0)
            {
                total -= char_len(current[0]);
                current.remove(0);
            }
        }

        current.push(piece);
        total += len;
    }

    push_window(&mut windows, &current);
    windows
}

fn push_window(windows: &mut Vec<String>, pieces: &[&str]) {
    let joined = pieces.concat();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        windows.push(trimmed.to_string());
    }
}
