use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scalar metadata attached to a document or chunk.
///
/// Values are expected to be JSON scalars (string, number, bool).
pub type Metadata = BTreeMap<String, Value>;

/// Metadata key holding the file a document was extracted from.
pub const SOURCE_PATH: &str = "source_path";
pub const PAGE: &str = "page";
pub const TOTAL_PAGES: &str = "total_pages";
pub const FILE_NAME: &str = "file_name";
pub const FILE_PATH: &str = "file_path";
pub const IDENTIFIER: &str = "identifier";
pub const UPLOAD_TIME: &str = "upload_time";

/// A span of text with provenance metadata.
///
/// Extracted documents and the chunks split from them share this type; a
/// chunk is a document whose content is a bounded window of its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    /// Builder-style metadata insertion.
    pub fn with_meta(
        mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `identifier` this chunk was uploaded under, if any.
    pub fn identifier(&self) -> Option<&str> {
        self.metadata.get(IDENTIFIER).and_then(Value::as_str)
    }

    /// True when every `(key, value)` in `filter` is present with an equal
    /// value. An empty filter matches everything.
    pub fn matches(&self, filter: &Metadata) -> bool {
        filter
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }
}

/// True for values allowed in chunk metadata.
pub fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Number(_) | Value::Bool(_)
    )
}
