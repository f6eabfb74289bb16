use std::collections::HashMap;

use ragdb_core::error::{Error, Result};
use ragdb_core::types::SearchHit;

/// Rank damping constant of reciprocal-rank fusion.
pub const RRF_K: f64 = 60.0;

pub const DEFAULT_ALPHA: f64 = 0.6;

/// Weighted reciprocal-rank fusion of a vector and a lexical ranking.
///
/// Rank `r` (1-based) in the vector ranking contributes `alpha / (r + 60)`,
/// in the lexical ranking `(1 - alpha) / (r + 60)`. Documents are keyed by
/// their text: identical chunks collapse into one fused entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionEngine {
    alpha: f64,
}

impl Default for FusionEngine {
    fn default() -> Self { Self { alpha: DEFAULT_ALPHA } }
}

impl FusionEngine {
    pub fn new(alpha: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&alpha) {
            return Err(Error::InvalidConfig(format!("fusion alpha must lie in [0, 1], got {alpha}")));
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 { self.alpha }

    /// Fuse both rankings and keep the best `k`.
    ///
    /// Sorted by descending fused score. Exact ties keep first-encounter
    /// order, vector ranking first.
    pub fn fuse<V, L>(&self, vector_ranking: &[V], lexical_ranking: &[L], k: usize) -> Vec<SearchHit>
    where
        V: AsRef<str>,
        L: AsRef<str>,
    {
        let mut fused: Vec<SearchHit> = Vec::with_capacity(vector_ranking.len() + lexical_ranking.len());
        let mut slot: HashMap<&str, usize> = HashMap::new();

        for (i, doc) in vector_ranking.iter().enumerate() {
            let hit = entry(&mut fused, &mut slot, doc.as_ref());
            hit.score += self.alpha * reciprocal_rank(i + 1);
            hit.vector_rank.get_or_insert(i + 1);
        }
        for (i, doc) in lexical_ranking.iter().enumerate() {
            let hit = entry(&mut fused, &mut slot, doc.as_ref());
            hit.score += (1.0 - self.alpha) * reciprocal_rank(i + 1);
            hit.text_rank.get_or_insert(i + 1);
        }

        // stable: equal scores stay in first-encounter order
        fused.sort_by(|a, b| b.score.total_cmp(&a.score));
        fused.truncate(k);
        fused
    }
}

fn reciprocal_rank(rank: usize) -> f64 { 1.0 / (rank as f64 + RRF_K) }

fn entry<'a, 'd>(fused: &'a mut Vec<SearchHit>, slot: &mut HashMap<&'d str, usize>, doc: &'d str) -> &'a mut SearchHit {
    let pos = *slot.entry(doc).or_insert_with(|| {
        fused.push(SearchHit { text: doc.to_string(), score: 0.0, vector_rank: None, text_rank: None });
        fused.len() - 1
    });
    &mut fused[pos]
}
