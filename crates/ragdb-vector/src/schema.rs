//! Embedding-space compatibility of persisted state.
//!
//! Two embedding methods place vectors in different, non-comparable spaces,
//! so a persisted index is only trusted when the fingerprint recorded next to
//! it equals the one of the configured embedder. `SchemaGuard::check` is a
//! pure read; wiping stale state is the separate, explicit `discard`.

use std::fmt;
use std::fs;

use serde::{Deserialize, Serialize};

use ragdb_core::error::{Error, Result};

use crate::persist::{prune_artifacts, write_atomic, StorePaths};

/// Opaque identifier of the embedding method that produced a vector space.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaFingerprint(String);

impl SchemaFingerprint {
    pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// The fingerprint record and file registry written next to the index.
///
/// Written last on persist; it is the commit record for the other two
/// artifacts, whose file names and blake3 digests it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub fingerprint: SchemaFingerprint,
    pub dim: usize,
    pub chunks: usize,
    pub files: Vec<String>,
    pub index_file: Option<String>,
    pub index_checksum: Option<String>,
    pub docs_file: Option<String>,
    pub docs_checksum: Option<String>,
}

impl Manifest {
    /// Manifest of a store holding nothing, as left behind by `discard`.
    pub fn empty(fingerprint: SchemaFingerprint) -> Self {
        Self {
            fingerprint,
            dim: 0,
            chunks: 0,
            files: vec![],
            index_file: None,
            index_checksum: None,
            docs_file: None,
            docs_checksum: None,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| Error::Corrupt(format!("cannot encode manifest: {e}")))
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Corrupt(format!("cannot decode manifest: {e}")))
    }
}

/// Outcome of checking persisted state against the configured embedder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaState {
    /// Persisted state exists and was built with the configured embedder.
    Valid(Manifest),
    /// Persisted state was built with another embedder and must be discarded.
    Stale(Manifest),
    /// Nothing loadable on disk.
    Absent,
}

pub struct SchemaGuard {
    paths: StorePaths,
}

impl SchemaGuard {
    pub fn new(paths: StorePaths) -> Self { Self { paths } }

    pub fn paths(&self) -> &StorePaths { &self.paths }

    pub fn read_manifest(&self) -> Result<Option<Manifest>> {
        match fs::read(self.paths.manifest()) {
            Ok(bytes) => Manifest::from_json(&bytes).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn check(&self, configured: &SchemaFingerprint) -> Result<SchemaState> {
        let Some(manifest) = self.read_manifest()? else {
            return Ok(SchemaState::Absent);
        };
        if &manifest.fingerprint != configured {
            return Ok(SchemaState::Stale(manifest));
        }
        let committed = match (&manifest.index_file, &manifest.docs_file) {
            (Some(index), Some(docs)) => self.paths.artifact(index).exists() && self.paths.artifact(docs).exists(),
            _ => false,
        };
        if !committed {
            return Ok(SchemaState::Absent);
        }
        Ok(SchemaState::Valid(manifest))
    }

    /// Invalidate persisted state built for another embedding space.
    ///
    /// Every index and document generation is removed before the manifest is
    /// rewritten empty, so an interrupted discard leaves either a stale
    /// manifest (discarded again on next boot) or nothing loadable.
    pub fn discard(&self, configured: &SchemaFingerprint) -> Result<()> {
        prune_artifacts(&self.paths, &[])?;
        fs::create_dir_all(self.paths.dir())?;
        write_atomic(&self.paths.manifest(), &Manifest::empty(configured.clone()).to_json()?)?;
        tracing::warn!(dir = %self.paths.dir().display(), fingerprint = %configured, "discarded persisted index built for another embedding space");
        Ok(())
    }
}
