use ragdb_core::error::{Error, Result};
use ragdb_core::types::ChunkId;

/// Append-only list of chunk texts; a chunk's id is its position.
///
/// Serialized as a JSON array in id order, so ids survive a persist/load
/// cycle unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentStore {
    texts: Vec<String>,
}

impl DocumentStore {
    pub fn new() -> Self { Self::default() }

    /// Append `text` and return its id (the length before the append).
    pub fn append(&mut self, text: impl Into<String>) -> ChunkId {
        self.texts.push(text.into());
        self.texts.len() - 1
    }

    pub fn get(&self, id: ChunkId) -> Option<&str> { self.texts.get(id).map(String::as_str) }

    pub fn len(&self) -> usize { self.texts.len() }

    pub fn is_empty(&self) -> bool { self.texts.is_empty() }

    pub fn texts(&self) -> &[String] { &self.texts }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.texts).map_err(|e| Error::Corrupt(format!("cannot encode documents: {e}")))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let texts: Vec<String> = serde_json::from_slice(bytes)
            .map_err(|e| Error::Corrupt(format!("cannot decode documents: {e}")))?;
        Ok(Self { texts })
    }
}
