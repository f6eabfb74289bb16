use std::env;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use ragdb_core::config::{Config, Settings};
use ragdb_core::data_processor::{list_txt_files, ChunkingConfig, DataProcessor};
use ragdb_hybrid::{FileOutcome, HybridEngine, LoadOutcome};
use ragdb_vector::SchemaState;

const USAGE: &str = "Usage: ragdb <ingest [dir] | query \"<text>\" [-k N] | files | status>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings()?;
    let (cmd, args) = parse_args();
    let runtime = tokio::runtime::Runtime::new()?;
    match cmd.as_str() {
        "ingest" => {
            let txt_dir = args.first().map(PathBuf::from).unwrap_or_else(|| settings.txt_dir());
            runtime.block_on(ingest(&settings, &txt_dir))?;
        }
        "query" => {
            let (query, k) = parse_query_args(&args, settings.search.default_k);
            runtime.block_on(query_cmd(&settings, &query, k))?;
        }
        "files" => runtime.block_on(files(&settings))?,
        "status" => runtime.block_on(status(&settings))?,
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}

fn parse_query_args(args: &[String], default_k: usize) -> (String, usize) {
    let mut query = None;
    let mut k = default_k;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-k" | "--top-k" => {
                match args.get(i + 1).and_then(|v| v.parse::<usize>().ok()) {
                    Some(n) => { k = n; i += 1; }
                    None => { eprintln!("Error: -k requires a number"); std::process::exit(1); }
                }
            }
            other if query.is_none() => query = Some(other.to_string()),
            _ => {}
        }
        i += 1;
    }
    let query = query.unwrap_or_else(|| { eprintln!("Usage: ragdb query \"<text>\" [-k N]"); std::process::exit(1) });
    (query, k)
}

async fn open(settings: &Settings) -> anyhow::Result<(HybridEngine, LoadOutcome)> {
    let engine = HybridEngine::from_settings(settings)?;
    let outcome = engine.load().await?;
    if outcome == LoadOutcome::Stale {
        println!("⚠️  Persisted index was built with another embedder and has been discarded");
    }
    Ok((engine, outcome))
}

async fn ingest(settings: &Settings, txt_dir: &Path) -> anyhow::Result<()> {
    println!("Ingesting from {}", txt_dir.display());
    let (engine, _) = open(settings).await?;
    let processor = DataProcessor::with_config(ChunkingConfig { min_chars: settings.index.min_chunk_chars });
    let paths = list_txt_files(txt_dir);
    tracing::debug!(files = paths.len(), dir = %txt_dir.display(), "ingest started");

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("#>-"),
    );
    let (mut indexed, mut skipped, mut chunks, mut rejected) = (0usize, 0usize, 0usize, 0usize);
    for path in &paths {
        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        pb.set_message(name.clone());
        if engine.is_file_indexed(&name).await {
            skipped += 1;
            pb.inc(1);
            continue;
        }
        let processed = processor.process_file(path)?;
        match engine.index_file(&processed.name, &processed.chunks).await? {
            FileOutcome::Indexed(report) => {
                indexed += 1;
                chunks += report.indexed.len();
                rejected += report.failed.len();
            }
            FileOutcome::AlreadyIndexed => skipped += 1,
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    engine.persist().await?;
    println!("✅ Ingest complete: {} files indexed ({} chunks), {} already indexed", indexed, chunks, skipped);
    if rejected > 0 { println!("⚠️  {} chunks rejected, see log", rejected); }
    println!("📊 Index now holds {} chunks from {} files", engine.len().await, engine.indexed_files().await.len());
    Ok(())
}

async fn query_cmd(settings: &Settings, query: &str, k: usize) -> anyhow::Result<()> {
    let (engine, _) = open(settings).await?;
    let hits = engine.search_scored(query, k).await?;
    if hits.is_empty() { println!("No results."); return Ok(()); }
    for (i, hit) in hits.iter().enumerate() {
        let rank = |r: Option<usize>| r.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string());
        println!("{}. [{:.5}] (vector {}, keyword {})", i + 1, hit.score, rank(hit.vector_rank), rank(hit.text_rank));
        println!("   {}", hit.text);
    }
    Ok(())
}

async fn files(settings: &Settings) -> anyhow::Result<()> {
    let (engine, _) = open(settings).await?;
    let files = engine.indexed_files().await;
    if files.is_empty() { println!("No files indexed."); }
    for name in files { println!("{}", name); }
    Ok(())
}

async fn status(settings: &Settings) -> anyhow::Result<()> {
    let engine = HybridEngine::from_settings(settings)?;
    println!("Store:       {}", engine.store_paths().dir().display());
    println!("Embedder:    {} (dim {})", engine.fingerprint(), engine.dim());
    match engine.check_schema()? {
        SchemaState::Valid(manifest) => {
            println!("Schema:      ✅ valid");
            println!("Chunks:      {}", manifest.chunks);
            println!("Files:       {}", manifest.files.len());
            if let (Some(index), Some(docs)) = (&manifest.index_file, &manifest.docs_file) {
                println!("Generation:  {} + {}", index, docs);
            }
        }
        SchemaState::Stale(manifest) => {
            println!("Schema:      ⚠️  stale (built with {}), will be discarded on next ingest or query", manifest.fingerprint);
        }
        SchemaState::Absent => println!("Schema:      no persisted index"),
    }
    Ok(())
}
