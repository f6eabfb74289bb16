//! ragdb-hybrid
//!
//! The composition root of ragdb. [`HybridEngine`] owns the vector index,
//! the document store and the lexical scorer, and answers queries by fusing
//! both rankings with [`FusionEngine`].
//!
//! ```no_run
//! # async fn demo() -> ragdb_core::Result<()> {
//! use ragdb_embed::HashEmbedder;
//! use ragdb_hybrid::{EngineOptions, HybridEngine};
//!
//! let engine = HybridEngine::new(HashEmbedder::new("xxh64-bow", 384), EngineOptions::new("data/store"))?;
//! engine.load().await?;
//! engine.index_document("Rotate the compost pile every two weeks in summer.").await?;
//! let hits = engine.search("compost", 5).await?;
//! engine.persist().await?;
//! # let _ = hits;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod fusion;

pub use engine::{BatchReport, EngineOptions, FileOutcome, HybridEngine, LoadOutcome};
pub use fusion::{FusionEngine, RRF_K};
