//! On-disk layout of a persisted corpus.
//!
//! Three co-located artifacts form one unit:
//! - `vector.<digest>.index`: bincode blob of the [`VectorIndex`]
//! - `docs.<digest>.json`: chunk texts in id order
//! - `manifest.json`: fingerprint record, file registry, and the names and
//!   digests of the two artifacts above
//!
//! Artifacts are named after their content, so a save never overwrites the
//! generation the current manifest points at. Renaming the manifest into
//! place commits the new generation; older generations are pruned after.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ragdb_core::error::{Error, Result};

use crate::document_store::DocumentStore;
use crate::index::VectorIndex;
use crate::schema::{Manifest, SchemaFingerprint, SchemaGuard, SchemaState};

const MANIFEST_FILE: &str = "manifest.json";
const INDEX_PREFIX: &str = "vector.";
const INDEX_SUFFIX: &str = ".index";
const DOCS_PREFIX: &str = "docs.";
const DOCS_SUFFIX: &str = ".json";
const TMP_SUFFIX: &str = ".tmp";

/// Hex digits of the blake3 digest used in artifact names.
const GENERATION_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ArtifactKind {
    Index,
    Docs,
}

fn artifact_kind(name: &str) -> Option<ArtifactKind> {
    let name = name.strip_suffix(TMP_SUFFIX).unwrap_or(name);
    if name.starts_with(INDEX_PREFIX) && name.ends_with(INDEX_SUFFIX) {
        Some(ArtifactKind::Index)
    } else if name.starts_with(DOCS_PREFIX) && name.ends_with(DOCS_SUFFIX) {
        Some(ArtifactKind::Docs)
    } else {
        None
    }
}

fn generation_name(prefix: &str, digest: &str, suffix: &str) -> String {
    format!("{prefix}{}{suffix}", &digest[..GENERATION_LEN.min(digest.len())])
}

impl StorePaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn manifest(&self) -> PathBuf { self.dir.join(MANIFEST_FILE) }

    /// Path of an artifact named in a manifest.
    pub fn artifact(&self, name: &str) -> PathBuf { self.dir.join(name) }

    /// Index and document artifacts present on disk (committed, superseded or
    /// half-written), index files first.
    pub fn artifacts(&self) -> Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(kind) = artifact_kind(&name) {
                found.push((kind, name));
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, name)| self.dir.join(name)).collect())
    }
}

/// Everything `load_state` reconstructs from a valid store.
pub struct PersistedState {
    pub vectors: VectorIndex,
    pub documents: DocumentStore,
    pub files: Vec<String>,
}

pub enum LoadedState {
    Valid(PersistedState),
    Stale { persisted: SchemaFingerprint },
    Absent,
}

/// Write `bytes` to a temporary sibling, fsync, and rename it over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(TMP_SUFFIX);
    let tmp = path.with_file_name(tmp_name);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Remove every artifact not named in `keep`, index files before documents.
pub fn prune_artifacts(paths: &StorePaths, keep: &[&str]) -> Result<usize> {
    let mut removed = 0;
    for path in paths.artifacts()? {
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if keep.contains(&name.as_str()) {
            continue;
        }
        remove_if_exists(&path)?;
        removed += 1;
    }
    Ok(removed)
}

fn checksum(bytes: &[u8]) -> String { blake3::hash(bytes).to_hex().to_string() }

/// Persist a new generation and commit it by writing the manifest last.
pub fn save_state(
    paths: &StorePaths,
    fingerprint: &SchemaFingerprint,
    vectors: &VectorIndex,
    documents: &DocumentStore,
    files: &[String],
) -> Result<()> {
    if vectors.len() != documents.len() {
        return Err(Error::Corrupt(format!(
            "refusing to persist {} vectors with {} documents",
            vectors.len(),
            documents.len()
        )));
    }
    fs::create_dir_all(paths.dir())?;
    let index_bytes = vectors.serialize()?;
    let docs_bytes = documents.to_json()?;
    let index_checksum = checksum(&index_bytes);
    let docs_checksum = checksum(&docs_bytes);
    let index_file = generation_name(INDEX_PREFIX, &index_checksum, INDEX_SUFFIX);
    let docs_file = generation_name(DOCS_PREFIX, &docs_checksum, DOCS_SUFFIX);

    write_atomic(&paths.artifact(&index_file), &index_bytes)?;
    write_atomic(&paths.artifact(&docs_file), &docs_bytes)?;
    let manifest = Manifest {
        fingerprint: fingerprint.clone(),
        dim: vectors.dim(),
        chunks: documents.len(),
        files: files.to_vec(),
        index_file: Some(index_file.clone()),
        index_checksum: Some(index_checksum),
        docs_file: Some(docs_file.clone()),
        docs_checksum: Some(docs_checksum),
    };
    write_atomic(&paths.manifest(), &manifest.to_json()?)?;

    // committed; superseded generations are garbage from here on
    match prune_artifacts(paths, &[&index_file, &docs_file]) {
        Ok(removed) => tracing::debug!(dir = %paths.dir().display(), chunks = documents.len(), pruned = removed, "persisted corpus"),
        Err(e) => tracing::warn!(dir = %paths.dir().display(), error = %e, "persisted corpus, old generation left behind"),
    }
    Ok(())
}

/// Read the store, trusting it only if it matches `configured` and `dim`.
///
/// Never mutates disk; discarding stale state is up to the caller.
pub fn load_state(guard: &SchemaGuard, configured: &SchemaFingerprint, dim: usize) -> Result<LoadedState> {
    let manifest = match guard.check(configured)? {
        SchemaState::Absent => return Ok(LoadedState::Absent),
        SchemaState::Stale(m) => return Ok(LoadedState::Stale { persisted: m.fingerprint }),
        SchemaState::Valid(m) if m.dim != dim => return Ok(LoadedState::Stale { persisted: m.fingerprint }),
        SchemaState::Valid(m) => m,
    };
    let (Some(index_file), Some(docs_file)) = (manifest.index_file.as_deref(), manifest.docs_file.as_deref()) else {
        return Ok(LoadedState::Absent);
    };
    let paths = guard.paths();
    let index_path = paths.artifact(index_file);
    let docs_path = paths.artifact(docs_file);
    let index_bytes = fs::read(&index_path)?;
    let docs_bytes = fs::read(&docs_path)?;
    verify(&index_path, manifest.index_checksum.as_deref(), &index_bytes)?;
    verify(&docs_path, manifest.docs_checksum.as_deref(), &docs_bytes)?;

    let vectors = VectorIndex::deserialize(&index_bytes)?;
    let documents = DocumentStore::from_json(&docs_bytes)?;
    if vectors.len() != documents.len() || documents.len() != manifest.chunks || vectors.dim() != dim {
        return Err(Error::Corrupt(format!(
            "manifest records {} chunks of dim {}, found {} vectors of dim {} and {} documents",
            manifest.chunks,
            manifest.dim,
            vectors.len(),
            vectors.dim(),
            documents.len()
        )));
    }
    Ok(LoadedState::Valid(PersistedState { vectors, documents, files: manifest.files }))
}

fn verify(path: &Path, expected: Option<&str>, bytes: &[u8]) -> Result<()> {
    match expected {
        Some(digest) if digest == checksum(bytes) => Ok(()),
        Some(_) => Err(Error::Corrupt(format!("{} does not match its recorded checksum", path.display()))),
        None => Err(Error::Corrupt(format!("manifest has no checksum for {}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_are_recognised() {
        assert_eq!(artifact_kind("vector.0123456789abcdef.index"), Some(ArtifactKind::Index));
        assert_eq!(artifact_kind("docs.0123456789abcdef.json.tmp"), Some(ArtifactKind::Docs));
        assert_eq!(artifact_kind("manifest.json"), None);
        assert_eq!(artifact_kind("manifest.json.tmp"), None);
        assert_eq!(generation_name(DOCS_PREFIX, "abcdef0123456789ffff", DOCS_SUFFIX), "docs.abcdef0123456789.json");
    }
}
