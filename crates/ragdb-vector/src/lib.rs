//! ragdb-vector
//!
//! Dense retrieval and persistence for ragdb: the HNSW-backed
//! [`VectorIndex`], the positional [`DocumentStore`], the embedding-space
//! [`SchemaGuard`] and the on-disk layout tying them together.

pub mod document_store;
pub mod index;
pub mod persist;
pub mod schema;

pub use document_store::DocumentStore;
pub use index::{cosine_distance, Neighbor, VectorIndex};
pub use persist::{load_state, prune_artifacts, save_state, LoadedState, PersistedState, StorePaths};
pub use schema::{Manifest, SchemaFingerprint, SchemaGuard, SchemaState};
