use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use ragdb_core::traits::Embedder;

/// Deterministic bag-of-words embedder.
///
/// Every lowercased whitespace token is hashed with xxHash64 into one of
/// `dim` buckets with a hash-derived weight; the sum is L2-normalised.
/// Texts sharing tokens land close together, which is all a local fallback
/// needs. Empty text maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    id: String,
    dim: usize,
}

impl HashEmbedder {
    pub fn new(model: &str, dim: usize) -> Self {
        Self { id: format!("hash:{model}:d{dim}"), dim }
    }

    /// Infallible form of [`Embedder::embed`].
    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        if self.dim == 0 {
            return v;
        }
        for token in text.split_whitespace() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            v[idx] += 0.5 + ((h >> 32) as u32) as f32 / u32::MAX as f32;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v { *x /= norm; }
        }
        v
    }
}

impl Embedder for HashEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { Ok(self.vector(text)) }
}
