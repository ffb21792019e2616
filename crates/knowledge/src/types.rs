//! Chunk record types shared by the store, builder and retriever.

use docqa_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Persisted value of `page` when the page number is unknown.
pub const UNKNOWN_PAGE: i64 = -1;

/// A unit of retrievable text, positioned in a chunk store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Chunk {
    /// Zero-based position in the store; also the vector position in the index
    pub id: usize,

    /// Text content, never blank
    pub text: String,

    /// Originating document (e.g., a file name)
    #[serde(default)]
    pub source: Option<String>,

    /// Page number within the source
    #[serde(default, with = "page_sentinel")]
    pub page: Option<u32>,

    /// Extraction order within the source document
    pub order: u32,
}

impl Chunk {
    /// Create a chunk, rejecting text that is empty after trimming.
    pub fn new(
        id: usize,
        text: impl Into<String>,
        source: Option<String>,
        page: Option<u32>,
        order: u32,
    ) -> AppResult<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AppError::InvalidChunk(format!(
                "chunk {} has blank text",
                id
            )));
        }

        Ok(Self {
            id,
            text,
            source,
            page,
            order,
        })
    }
}

/// Raw chunk as handed over by the extraction step, before numbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkCandidate {
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, with = "page_sentinel")]
    pub page: Option<u32>,
    pub order: u32,
}

impl ChunkCandidate {
    pub fn new(text: impl Into<String>, source: Option<String>, page: Option<u32>, order: u32) -> Self {
        Self {
            text: text.into(),
            source,
            page,
            order,
        }
    }

    /// Whether this candidate can enter a chunk store.
    pub fn is_indexable(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// A candidate dropped before indexing because its text was blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    /// Position of the candidate in the input sequence
    pub input_position: usize,
    pub source: Option<String>,
    pub order: u32,
}

/// Serde adapter mapping `None` to the `-1` sentinel.
///
/// Loading also accepts `null`. Any other negative value is rejected.
pub(crate) mod page_sentinel {
    use super::UNKNOWN_PAGE;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(page: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match page {
            Some(p) => serializer.serialize_i64(i64::from(*p)),
            None => serializer.serialize_i64(UNKNOWN_PAGE),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        match Option::<i64>::deserialize(deserializer)? {
            None | Some(UNKNOWN_PAGE) => Ok(None),
            Some(p) => u32::try_from(p)
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid page number {}", p))),
        }
    }
}
