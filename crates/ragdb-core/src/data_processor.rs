use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Paragraphs whose trimmed length is at or below this are dropped.
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { min_chars: 50 }
    }
}

/// A source file turned into indexable paragraph chunks.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub name: String,
    pub path: PathBuf,
    pub chunks: Vec<String>,
}

#[derive(Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    pub fn process_file(&self, file_path: &Path) -> Result<ProcessedFile> {
        let content = read_file_content(file_path)?;
        let chunks = chunk_by_paragraph(&clean_text(&content), self.chunking_config.min_chars);
        let name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.display().to_string());
        tracing::debug!(file = %file_path.display(), chunks = chunks.len(), "processed file");
        Ok(ProcessedFile { name, path: file_path.to_path_buf(), chunks })
    }

    pub fn process_directory(&self, data_dir: &Path) -> Result<Vec<ProcessedFile>> {
        let files = list_txt_files(data_dir);
        if files.is_empty() {
            tracing::info!(dir = %data_dir.display(), "no .txt files found");
            return Ok(vec![]);
        }
        files.iter().map(|f| self.process_file(f)).collect()
    }
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

/// Normalise extracted text before chunking.
///
/// Words hyphenated across a line break are joined, single line breaks
/// become spaces (paragraph breaks survive), runs of spaces collapse to one
/// and the result is trimmed.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace("-\n", "");
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        let c = if c == '\n' {
            let prev_nl = i > 0 && chars[i - 1] == '\n';
            let next_nl = chars.get(i + 1) == Some(&'\n');
            if prev_nl || next_nl { '\n' } else { ' ' }
        } else {
            c
        };
        if c == ' ' && out.ends_with(' ') { continue; }
        out.push(c);
    }
    out.trim().to_string()
}

/// Split on blank lines and keep paragraphs longer than `min_chars`.
pub fn chunk_by_paragraph(text: &str, min_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut newlines = 0usize;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            continue;
        }
        if newlines >= 2 {
            push_paragraph(&mut chunks, &current, min_chars);
            current.clear();
        } else if newlines == 1 {
            current.push('\n');
        }
        newlines = 0;
        current.push(c);
    }
    push_paragraph(&mut chunks, &current, min_chars);
    chunks
}

fn push_paragraph(chunks: &mut Vec<String>, paragraph: &str, min_chars: usize) {
    let paragraph = paragraph.trim();
    if paragraph.chars().count() > min_chars { chunks.push(paragraph.to_string()); }
}

/// Recursive, sorted list of `.txt` files under `root`.
pub fn list_txt_files(root: &Path) -> Vec<PathBuf> {
    let mut txt_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
    }
    txt_files.sort();
    txt_files
}
