//! ragdb-embed
//!
//! Embedding providers for ragdb. The engine only knows the
//! [`Embedder`] trait; this crate supplies the deterministic
//! [`HashEmbedder`], the [`FallbackEmbedder`] that keeps indexing alive when
//! a provider fails, and [`get_default_embedder`] to build whatever the
//! configuration names.

use ragdb_core::config::EmbeddingSettings;
use ragdb_core::error::{Error, Result};

mod fallback;
mod hash;

pub use fallback::FallbackEmbedder;
pub use hash::HashEmbedder;
pub use ragdb_core::traits::Embedder;

pub const HASH_PROVIDER: &str = "hash";

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if settings.dim == 0 {
        return Err(Error::InvalidConfig("embedding.dim must be greater than 0".to_string()));
    }
    match settings.provider.as_str() {
        HASH_PROVIDER => {
            let embedder = HashEmbedder::new(&settings.model, settings.dim);
            tracing::info!(id = embedder.embedder_id(), "using hash embedder");
            Ok(Box::new(embedder))
        }
        other => Err(Error::InvalidConfig(format!("unknown embedding provider '{other}'"))),
    }
}
