//! Domain types shared by the lexical, vector and hybrid engines.

use serde::{Deserialize, Serialize};

/// Dense, 0-based position of a chunk in the document store. Assigned at
/// append time and never reused.
pub type ChunkId = usize;

/// Indicates which engine produced a ranking.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Vector,
    Text,
}

/// A fused result returned by hybrid search.
///
/// `score` is the weighted reciprocal-rank score; higher is better. The
/// 1-based rank the document held in each input ranking is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub score: f64,
    pub vector_rank: Option<usize>,
    pub text_rank: Option<usize>,
}

impl SearchHit {
    pub fn sources(&self) -> Vec<SourceKind> {
        let mut out = Vec::with_capacity(2);
        if self.vector_rank.is_some() { out.push(SourceKind::Vector); }
        if self.text_rank.is_some() { out.push(SourceKind::Text); }
        out
    }
}
