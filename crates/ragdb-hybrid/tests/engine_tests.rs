use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use tempfile::TempDir;

use ragdb_core::traits::Embedder;
use ragdb_core::Error;
use ragdb_hybrid::{EngineOptions, FileOutcome, HybridEngine, LoadOutcome};
use ragdb_vector::{load_state, DocumentStore, LoadedState, SchemaGuard, StorePaths};

const VOCAB: &[&str] = &[
    "apple", "pie", "recipe", "banana", "smoothie", "guide", "cider", "vinegar", "goat", "milk", "fence", "seed",
];

/// Bag of words over a fixed vocabulary, one dimension per word plus an
/// overflow bucket.
struct VocabEmbedder {
    id: String,
}

impl VocabEmbedder {
    fn new(id: &str) -> Self { Self { id: id.to_string() } }
}

impl Embedder for VocabEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { VOCAB.len() + 1 }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dim()];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let slot = VOCAB.iter().position(|w| *w == word).unwrap_or(VOCAB.len());
            v[slot] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

struct Unreachable;

impl Embedder for Unreachable {
    fn embedder_id(&self) -> &str { "remote:unreachable:d16" }
    fn dim(&self) -> usize { 16 }
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> { Err(anyhow!("connection refused")) }
}

fn open_engine(dir: &TempDir, id: &str) -> HybridEngine {
    HybridEngine::new(VocabEmbedder::new(id), EngineOptions::new(dir.path())).expect("engine")
}

/// Committed artifacts plus manifest, with their bytes.
fn snapshot(paths: &StorePaths) -> anyhow::Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut files = paths.artifacts()?;
    files.push(paths.manifest());
    files.into_iter().map(|p| Ok((p.clone(), fs::read(&p)?))).collect()
}

fn fruit() -> Vec<String> {
    ["apple pie recipe", "banana smoothie guide", "apple cider vinegar"].iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn apple_query_ranks_apple_chunks_first() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let engine = open_engine(&dir, "vocab:v1");
    let report = engine.index_batch(&fruit()).await?;
    assert_eq!(report.indexed, vec![0, 1, 2]);
    assert!(report.failed.is_empty());

    let results = engine.search("apple", 2).await?;
    assert_eq!(results.len(), 2);
    assert!(results.contains(&"apple pie recipe".to_string()));
    assert!(results.contains(&"apple cider vinegar".to_string()));
    Ok(())
}

#[tokio::test]
async fn results_never_exceed_k_or_corpus_size() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let engine = open_engine(&dir, "vocab:v1");
    assert!(engine.search("apple", 5).await?.is_empty(), "empty index answers with nothing");

    engine.index_batch(&fruit()).await?;
    assert!(engine.search("apple", 10).await?.len() <= 3);
    assert_eq!(engine.search("apple", 1).await?.len(), 1);
    assert!(engine.search("apple", 0).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn capacity_grows_past_initial_size() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let options = EngineOptions { initial_capacity: 1, ..EngineOptions::new(dir.path()) };
    let engine = HybridEngine::new(VocabEmbedder::new("vocab:v1"), options)?;
    for text in ["goat milk", "fence seed", "apple seed", "banana milk", "cider pie"] {
        engine.index_document(text).await?;
    }
    assert_eq!(engine.len().await, 5);
    assert_eq!(engine.search("fence", 1).await?, vec!["fence seed".to_string()]);
    Ok(())
}

#[tokio::test]
async fn batch_capacity_is_reserved_before_inserting() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let options = EngineOptions { initial_capacity: 1, ..EngineOptions::new(dir.path()) };
    let engine = HybridEngine::new(VocabEmbedder::new("vocab:v1"), options)?;
    let texts: Vec<String> = ["goat milk", "fence seed", "apple seed", "banana milk", "cider pie"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    engine.index_batch(&texts).await?;
    // one growth to fit the batch, not 1 -> 2 -> 4 -> 8 while inserting
    assert_eq!(engine.capacity().await, 5);
    assert_eq!(engine.len().await, 5);
    Ok(())
}

#[tokio::test]
async fn persist_then_load_reproduces_results() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let before = {
        let engine = open_engine(&dir, "vocab:v1");
        engine.index_batch(&fruit()).await?;
        engine.index_document("goat milk guide").await?;
        engine.persist().await?;
        engine.search_scored("apple guide", 3).await?
    };

    let reloaded = open_engine(&dir, "vocab:v1");
    let outcome = reloaded.load().await?;
    assert_eq!(outcome, LoadOutcome::Loaded { chunks: 4 });
    assert!(outcome.is_loaded());
    assert_eq!(reloaded.search_scored("apple guide", 3).await?, before);
    Ok(())
}

#[tokio::test]
async fn changed_fingerprint_discards_persisted_state() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let first = open_engine(&dir, "vocab:a");
    first.index_file("fruit.txt", &fruit()).await?;
    first.persist().await?;

    let second = open_engine(&dir, "vocab:b");
    assert_eq!(second.load().await?, LoadOutcome::Stale);
    assert!(second.is_empty().await);
    assert!(second.indexed_files().await.is_empty());
    assert!(second.search("apple", 3).await?.is_empty());
    assert!(second.store_paths().artifacts()?.is_empty());

    let again = open_engine(&dir, "vocab:a");
    assert!(!again.load().await?.is_loaded(), "discarded files are not reusable");
    assert!(again.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn load_without_store_is_absent() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let engine = open_engine(&dir, "vocab:v1");
    assert_eq!(engine.load().await?, LoadOutcome::Absent);
    assert!(engine.search("apple", 3).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn persisting_twice_is_byte_identical() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let engine = open_engine(&dir, "vocab:v1");
    engine.index_file("fruit.txt", &fruit()).await?;
    let paths = engine.store_paths().clone();

    engine.persist().await?;
    let first = snapshot(&paths)?;
    engine.persist().await?;
    let second = snapshot(&paths)?;
    assert_eq!(first.len(), 3);
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn file_registry_skips_known_files_and_survives_reload() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let engine = open_engine(&dir, "vocab:v1");
    assert!(matches!(engine.index_file("fruit.txt", &fruit()).await?, FileOutcome::Indexed(r) if r.indexed.len() == 3));
    assert!(matches!(engine.index_file("fruit.txt", &fruit()).await?, FileOutcome::AlreadyIndexed));
    assert_eq!(engine.len().await, 3);
    engine.persist().await?;

    let reloaded = open_engine(&dir, "vocab:v1");
    reloaded.load().await?;
    assert_eq!(reloaded.indexed_files().await, vec!["fruit.txt".to_string()]);
    assert!(matches!(reloaded.index_file("fruit.txt", &fruit()).await?, FileOutcome::AlreadyIndexed));
    Ok(())
}

#[tokio::test]
async fn wrong_dimension_fails_only_that_document() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let engine = open_engine(&dir, "vocab:v1");
    let good = VocabEmbedder::new("vocab:v1");
    let items = vec![
        ("apple pie recipe".to_string(), good.embed("apple pie recipe")?),
        ("bad vector".to_string(), vec![1.0, 0.0]),
        ("goat milk".to_string(), good.embed("goat milk")?),
    ];
    let report = engine.index_embedded(items).await?;
    assert_eq!(report.indexed, vec![0, 1]);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0], (1, Error::DimensionMismatch { actual: 2, .. })));
    assert_eq!(engine.len().await, 2);
    assert_eq!(engine.search("goat", 1).await?, vec!["goat milk".to_string()]);
    // the rejected chunk reached neither ranking
    assert!(!engine.search("bad vector", 3).await?.contains(&"bad vector".to_string()));
    Ok(())
}

#[tokio::test]
async fn failing_provider_degrades_to_hash_vectors() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let engine = HybridEngine::new(Unreachable, EngineOptions::new(dir.path()))?;
    assert_eq!(engine.fingerprint().as_str(), "remote:unreachable:d16");
    let report = engine.index_batch(&fruit()).await?;
    assert_eq!(report.indexed.len(), 3);

    let results = engine.search("banana", 3).await?;
    assert!(results.len() <= 3);
    assert!(results.contains(&"banana smoothie guide".to_string()));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_searches_agree() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let engine = Arc::new(open_engine(&dir, "vocab:v1"));
    engine.index_batch(&fruit()).await?;
    let expected = engine.search("apple vinegar", 2).await?;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.search("apple vinegar", 2).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await??, expected);
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn indexing_races_with_search_and_persist() -> anyhow::Result<()> {
    const BATCHES: usize = 6;
    const BATCH: usize = 5;
    let dir = TempDir::new()?;
    let engine = Arc::new(open_engine(&dir, "vocab:v1"));
    engine.index_batch(&fruit()).await?;

    let batches: Vec<Vec<String>> = (0..BATCHES)
        .map(|b| (0..BATCH).map(|i| format!("goat milk fence batch{b} item{i}")).collect())
        .collect();
    let known: Arc<HashSet<String>> = Arc::new(fruit().into_iter().chain(batches.iter().flatten().cloned()).collect());

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for batch in batches {
                let report = engine.index_batch(&batch).await?;
                assert_eq!(report.indexed.len(), BATCH);
                tokio::task::yield_now().await;
            }
            Ok::<_, Error>(())
        })
    };
    let searchers: Vec<_> = (0..3)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let known = Arc::clone(&known);
            tokio::spawn(async move {
                for _ in 0..20 {
                    for hit in engine.search_scored("goat milk apple", 8).await? {
                        assert!(known.contains(&hit.text), "unknown hit {:?}", hit.text);
                    }
                    tokio::task::yield_now().await;
                }
                Ok::<_, Error>(())
            })
        })
        .collect();
    let persister = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let guard = SchemaGuard::new(engine.store_paths().clone());
            for _ in 0..10 {
                engine.persist().await?;
                let manifest = guard.read_manifest()?.ok_or_else(|| anyhow!("manifest missing after persist"))?;
                let docs_file = manifest.docs_file.clone().ok_or_else(|| anyhow!("manifest names no documents"))?;
                let documents = DocumentStore::from_json(&fs::read(guard.paths().artifact(&docs_file))?)?;
                assert_eq!(manifest.chunks, documents.len());
                // whole batches only
                assert_eq!((documents.len() - fruit().len()) % BATCH, 0);
                assert!(matches!(load_state(&guard, engine.fingerprint(), engine.dim())?, LoadedState::Valid(_)));
                tokio::task::yield_now().await;
            }
            Ok::<_, anyhow::Error>(())
        })
    };

    writer.await??;
    for searcher in searchers {
        searcher.await??;
    }
    persister.await??;

    engine.persist().await?;
    let reloaded = open_engine(&dir, "vocab:v1");
    assert_eq!(reloaded.load().await?, LoadOutcome::Loaded { chunks: known.len() });
    Ok(())
}
