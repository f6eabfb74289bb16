/// The embedding collaborator consumed by the engine.
///
/// Implementations may call a local model or a remote API. Calls are
/// blocking; the hybrid engine drives them from a blocking task pool.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model, e.g. `hash:xxh64-bow:d384`.
    /// Persisted as the schema fingerprint of the vector space.
    fn embedder_id(&self) -> &str;
    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;
    /// Compute the embedding of one text.
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { (**self).embed(text) }
}

impl<E: Embedder + ?Sized> Embedder for std::sync::Arc<E> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }
    fn dim(&self) -> usize { (**self).dim() }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { (**self).embed(text) }
}
