use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use ragdb_core::config::Settings;
use ragdb_core::error::{Error, Result};
use ragdb_core::traits::Embedder;
use ragdb_core::types::{ChunkId, SearchHit};
use ragdb_embed::{get_default_embedder, FallbackEmbedder};
use ragdb_text::{LexicalHit, LexicalScorer};
use ragdb_vector::{
    load_state, save_state, DocumentStore, LoadedState, SchemaFingerprint, SchemaGuard, SchemaState, StorePaths,
    VectorIndex,
};

use crate::fusion::{FusionEngine, DEFAULT_ALPHA};

pub const DEFAULT_INITIAL_CAPACITY: usize = 20_000;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    pub store_dir: PathBuf,
    pub initial_capacity: usize,
    pub alpha: f64,
}

impl EngineOptions {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self { store_dir: store_dir.into(), initial_capacity: DEFAULT_INITIAL_CAPACITY, alpha: DEFAULT_ALPHA }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            store_dir: settings.store_dir(),
            initial_capacity: settings.index.initial_capacity,
            alpha: settings.search.alpha,
        }
    }
}

/// Result of indexing a batch of chunks.
///
/// `indexed` holds the ids assigned, in input order. `failed` holds the
/// input position and error of every document rejected on its own.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub indexed: Vec<ChunkId>,
    pub failed: Vec<(usize, Error)>,
}

#[derive(Debug)]
pub enum FileOutcome {
    AlreadyIndexed,
    Indexed(BatchReport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { chunks: usize },
    /// Persisted state belonged to another embedding space and was discarded.
    Stale,
    Absent,
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool { matches!(self, LoadOutcome::Loaded { .. }) }
}

/// Everything mutated by indexing. Guarded as one unit so a reader never sees
/// a document id without its vector.
struct Corpus {
    vectors: VectorIndex,
    documents: DocumentStore,
    lexical: LexicalScorer,
    files: Vec<String>,
}

impl Corpus {
    fn empty(dim: usize, initial_capacity: usize) -> Result<Self> {
        Ok(Self {
            vectors: VectorIndex::new(dim, initial_capacity)?,
            documents: DocumentStore::new(),
            lexical: LexicalScorer::new()?,
            files: Vec::new(),
        })
    }

    /// Every fallible step runs before the chunk becomes visible anywhere, so
    /// a rejected chunk leaves no trace in any of the three structures.
    fn insert(&mut self, text: &str, vector: &[f32]) -> Result<ChunkId> {
        let id = self.documents.len();
        self.vectors.prepare_insert(vector)?;
        self.lexical.add(text)?;
        self.vectors.insert(vector, id)?;
        self.documents.append(text);
        Ok(id)
    }

    /// Insert pre-embedded items, training the lexical model once at the end.
    ///
    /// Returns `None` without inserting when `register` names a file that is
    /// already in the registry. The file is registered only when the whole
    /// batch went through.
    fn commit(&mut self, items: Vec<(String, Vec<f32>)>, register: Option<&str>) -> Result<Option<BatchReport>> {
        if let Some(name) = register {
            if self.files.iter().any(|f| f == name) {
                return Ok(None);
            }
        }
        // a batch that cannot fit is refused before any of it lands
        self.vectors.reserve(items.len())?;

        let mut report = BatchReport::default();
        let mut aborted = None;
        for (pos, (text, vector)) in items.iter().enumerate() {
            match self.insert(text, vector) {
                Ok(id) => report.indexed.push(id),
                Err(err) if !err.is_fatal() => {
                    tracing::warn!(position = pos, error = %err, "document rejected");
                    report.failed.push((pos, err));
                }
                Err(err) => {
                    aborted = Some(err);
                    break;
                }
            }
        }
        // train even after an abort so the inserted prefix is searchable lexically
        self.lexical.train()?;
        if let Some(err) = aborted {
            tracing::warn!(indexed = report.indexed.len(), error = %err, "batch aborted");
            return Err(err);
        }
        if let Some(name) = register {
            self.files.push(name.to_string());
        }
        tracing::info!(indexed = report.indexed.len(), failed = report.failed.len(), total = self.documents.len(), file = register.unwrap_or("-"), "batch indexed");
        Ok(Some(report))
    }

    /// Replace the contents with the persisted corpus, if compatible.
    fn reload(&mut self, guard: &SchemaGuard, fingerprint: &SchemaFingerprint, initial_capacity: usize) -> Result<LoadOutcome> {
        let dim = self.vectors.dim();
        match load_state(guard, fingerprint, dim)? {
            LoadedState::Absent => {
                tracing::info!(dir = %guard.paths().dir().display(), "no persisted index");
                Ok(LoadOutcome::Absent)
            }
            LoadedState::Stale { persisted } => {
                let err = Error::SchemaStale { persisted: persisted.to_string(), configured: fingerprint.to_string() };
                tracing::warn!(error = %err, "starting from an empty index");
                guard.discard(fingerprint)?;
                *self = Corpus::empty(dim, initial_capacity)?;
                Ok(LoadOutcome::Stale)
            }
            LoadedState::Valid(state) => {
                let mut lexical = LexicalScorer::new()?;
                for text in state.documents.texts() {
                    lexical.add(text)?;
                }
                lexical.train()?;
                let chunks = state.documents.len();
                tracing::info!(chunks, files = state.files.len(), fingerprint = %fingerprint, "loaded persisted index");
                *self = Corpus { vectors: state.vectors, documents: state.documents, lexical, files: state.files };
                Ok(LoadOutcome::Loaded { chunks })
            }
        }
    }
}

/// Run `f` on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| Error::Background(e.to_string()))?
}

/// Hybrid retrieval engine: dense vectors and BM25 fused by weighted
/// reciprocal rank.
///
/// One writer at a time (`index_*`, `load`), any number of concurrent
/// `search` calls. The embedder is always wrapped in a [`FallbackEmbedder`],
/// so neither indexing nor search fails because a provider did.
pub struct HybridEngine {
    embedder: Arc<FallbackEmbedder<Box<dyn Embedder>>>,
    fingerprint: SchemaFingerprint,
    fusion: FusionEngine,
    paths: StorePaths,
    initial_capacity: usize,
    corpus: Arc<RwLock<Corpus>>,
    persisting: Mutex<()>,
}

impl HybridEngine {
    pub fn new<E: Embedder + 'static>(embedder: E, options: EngineOptions) -> Result<Self> {
        let embedder = FallbackEmbedder::new(Box::new(embedder) as Box<dyn Embedder>);
        let fingerprint = SchemaFingerprint::new(embedder.embedder_id());
        let corpus = Corpus::empty(embedder.dim(), options.initial_capacity)?;
        tracing::debug!(fingerprint = %fingerprint, dim = embedder.dim(), store = %options.store_dir.display(), "hybrid engine created");
        Ok(Self {
            embedder: Arc::new(embedder),
            fingerprint,
            fusion: FusionEngine::new(options.alpha)?,
            paths: StorePaths::new(options.store_dir),
            initial_capacity: options.initial_capacity,
            corpus: Arc::new(RwLock::new(corpus)),
            persisting: Mutex::new(()),
        })
    }

    /// Engine with the configured embedder and options.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        settings.validate()?;
        let embedder = get_default_embedder(&settings.embedding)?;
        Self::new(embedder, EngineOptions::from_settings(settings))
    }

    pub fn fingerprint(&self) -> &SchemaFingerprint { &self.fingerprint }

    pub fn store_paths(&self) -> &StorePaths { &self.paths }

    pub fn dim(&self) -> usize { self.embedder.dim() }

    pub async fn len(&self) -> usize { self.corpus.read().await.documents.len() }

    /// Vectors the index holds room for without growing.
    pub async fn capacity(&self) -> usize { self.corpus.read().await.vectors.capacity() }

    pub async fn is_empty(&self) -> bool { self.corpus.read().await.documents.is_empty() }

    /// Source files indexed so far, in registration order.
    pub async fn indexed_files(&self) -> Vec<String> { self.corpus.read().await.files.clone() }

    pub async fn is_file_indexed(&self, name: &str) -> bool {
        self.corpus.read().await.files.iter().any(|f| f == name)
    }

    /// Schema state of the store directory, without touching it.
    pub fn check_schema(&self) -> Result<SchemaState> {
        SchemaGuard::new(self.paths.clone()).check(&self.fingerprint)
    }

    pub async fn index_document(&self, text: &str) -> Result<ChunkId> {
        let mut report = self.index_batch(&[text.to_string()]).await?;
        match report.failed.pop() {
            Some((_, err)) => Err(err),
            None => report.indexed.pop().ok_or_else(|| Error::NotFound("no id assigned to indexed document".to_string())),
        }
    }

    /// Embed and index `texts`, training the lexical model once at the end.
    pub async fn index_batch(&self, texts: &[String]) -> Result<BatchReport> {
        let vectors = self.embed_many(texts).await;
        let items: Vec<(String, Vec<f32>)> = texts.iter().cloned().zip(vectors).collect();
        self.commit(items, None).await.map(|report| report.unwrap_or_default())
    }

    /// Index chunks whose embeddings were computed elsewhere.
    ///
    /// A vector of the wrong dimension fails that document only.
    pub async fn index_embedded(&self, items: Vec<(String, Vec<f32>)>) -> Result<BatchReport> {
        self.commit(items, None).await.map(|report| report.unwrap_or_default())
    }

    /// Index the chunks of source file `name` unless it is already registered.
    pub async fn index_file(&self, name: &str, chunks: &[String]) -> Result<FileOutcome> {
        if self.is_file_indexed(name).await {
            tracing::debug!(file = name, "already indexed, skipping");
            return Ok(FileOutcome::AlreadyIndexed);
        }
        let vectors = self.embed_many(chunks).await;
        let items: Vec<(String, Vec<f32>)> = chunks.iter().cloned().zip(vectors).collect();
        Ok(match self.commit(items, Some(name)).await? {
            Some(report) => FileOutcome::Indexed(report),
            None => FileOutcome::AlreadyIndexed,
        })
    }

    /// Insert pre-embedded items under the write guard, on the blocking pool.
    async fn commit(&self, items: Vec<(String, Vec<f32>)>, register: Option<&str>) -> Result<Option<BatchReport>> {
        let mut corpus = Arc::clone(&self.corpus).write_owned().await;
        let register = register.map(str::to_string);
        blocking(move || corpus.commit(items, register.as_deref())).await
    }

    /// Up to `k` chunk texts most relevant to `query`.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self.search_scored(query, k).await?.into_iter().map(|hit| hit.text).collect())
    }

    /// Like [`HybridEngine::search`], with fused scores and per-ranking ranks.
    ///
    /// Both rankings come from the same snapshot of the corpus. An empty index
    /// yields an empty list.
    pub async fn search_scored(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 || self.is_empty().await {
            return Ok(vec![]);
        }
        let query_vector = self.embed_one(query.to_string()).await;

        let corpus = Arc::clone(&self.corpus).read_owned().await;
        let query = query.to_string();
        let (vector_ranking, lexical) = blocking(move || {
            let neighbours = corpus.vectors.search_knn(&query_vector, k)?;
            let vector_ranking: Vec<String> =
                neighbours.iter().filter_map(|n| corpus.documents.get(n.id)).map(str::to_string).collect();
            let lexical: Vec<LexicalHit> = corpus.lexical.rank(&query)?;
            Ok((vector_ranking, lexical))
        })
        .await?;

        let lexical_ranking: Vec<&str> = lexical.iter().map(|hit| hit.text.as_str()).collect();
        let hits = self.fusion.fuse(&vector_ranking, &lexical_ranking, k);
        tracing::debug!(vector = vector_ranking.len(), lexical = lexical_ranking.len(), fused = hits.len(), "search");
        Ok(hits)
    }

    /// Write a new generation of the store and commit it.
    ///
    /// Holds the read guard for the whole write, so no batch can land
    /// between the index and the document list.
    pub async fn persist(&self) -> Result<()> {
        let _persisting = self.persisting.lock().await;
        let corpus = Arc::clone(&self.corpus).read_owned().await;
        let paths = self.paths.clone();
        let fingerprint = self.fingerprint.clone();
        blocking(move || save_state(&paths, &fingerprint, &corpus.vectors, &corpus.documents, &corpus.files)).await
    }

    /// Replace the in-memory corpus with the persisted one, if compatible.
    ///
    /// Stale state is discarded on disk and leaves the engine empty. An
    /// absent store leaves the engine untouched.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let guard = SchemaGuard::new(self.paths.clone());
        let mut corpus = Arc::clone(&self.corpus).write_owned().await;
        let fingerprint = self.fingerprint.clone();
        let initial_capacity = self.initial_capacity;
        blocking(move || corpus.reload(&guard, &fingerprint, initial_capacity)).await
    }

    async fn embed_many(&self, texts: &[String]) -> Vec<Vec<f32>> {
        futures::future::join_all(texts.iter().map(|text| self.embed_one(text.clone()))).await
    }

    /// Embedding computed on the blocking pool; never fails.
    async fn embed_one(&self, text: String) -> Vec<f32> {
        let embedder = Arc::clone(&self.embedder);
        let task = {
            let text = text.clone();
            tokio::task::spawn_blocking(move || embedder.embed_or_fallback(&text))
        };
        match task.await {
            Ok(vector) => vector,
            Err(err) => {
                tracing::warn!(error = %err, "embedding task failed, using hash embedding");
                self.embedder.fallback_vector(&text)
            }
        }
    }
}
