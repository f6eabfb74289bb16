use ragdb_core::error::Error;
use ragdb_core::traits::Embedder;

use crate::hash::HashEmbedder;

/// Wraps a provider so that embedding never hard-fails.
///
/// When the primary errors, returns a vector of the wrong length, or returns
/// NaN/infinite components, the failure is logged as
/// [`Error::EmbeddingUnavailable`] and the [`HashEmbedder`] vector of the same
/// dimension is used instead. Identity and dimension are the primary's, so
/// the persisted fingerprint does not change when the fallback kicks in.
pub struct FallbackEmbedder<E> {
    primary: E,
    fallback: HashEmbedder,
}

impl<E: Embedder> FallbackEmbedder<E> {
    pub fn new(primary: E) -> Self {
        let fallback = HashEmbedder::new("fallback", primary.dim());
        Self { primary, fallback }
    }

    pub fn primary(&self) -> &E { &self.primary }

    /// Embedding of `text`, falling back to the hash vector on any failure.
    pub fn embed_or_fallback(&self, text: &str) -> Vec<f32> {
        match self.primary.embed(text) {
            Ok(v) if v.len() != self.dim() => self.degrade(format!(
                "{} returned {} dimensions, expected {}",
                self.primary.embedder_id(),
                v.len(),
                self.dim()
            ), text),
            Ok(v) if v.iter().any(|x| !x.is_finite()) => {
                self.degrade(format!("{} returned non-finite values", self.primary.embedder_id()), text)
            }
            Ok(v) => v,
            Err(e) => self.degrade(format!("{}: {e:#}", self.primary.embedder_id()), text),
        }
    }

    /// Hash vector used when the primary is unusable.
    pub fn fallback_vector(&self, text: &str) -> Vec<f32> { self.fallback.vector(text) }

    fn degrade(&self, reason: String, text: &str) -> Vec<f32> {
        let err = Error::EmbeddingUnavailable(reason);
        tracing::warn!(error = %err, "falling back to hash embedding");
        self.fallback.vector(text)
    }
}

impl<E: Embedder> Embedder for FallbackEmbedder<E> {
    fn embedder_id(&self) -> &str { self.primary.embedder_id() }

    fn dim(&self) -> usize { self.primary.dim() }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { Ok(self.embed_or_fallback(text)) }
}
