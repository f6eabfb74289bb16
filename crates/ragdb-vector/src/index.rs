// rust-cv/hnsw approximate nearest-neighbour index over fixed-dimension vectors

use std::borrow::Cow;
use std::cmp::Ordering;

use hnsw::{Hnsw, Searcher};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use space::Metric;
use tracing::instrument;

use ragdb_core::error::{Error, Result};
use ragdb_core::types::ChunkId;

/// Minimum ef_search parameter for HNSW queries.
///
/// Queries use max(k * 2, MIN_EF_SEARCH) so small k still explores enough
/// of the graph for good recall.
const MIN_EF_SEARCH: usize = 50;

const FORMAT_VERSION: u32 = 1;

/// Cosine distance (1 - cosine similarity) scaled from [0, 2] to u32.
struct CosineDistance;

impl Metric<Box<[f32]>> for CosineDistance {
    type Unit = u32;

    fn distance(&self, a: &Box<[f32]>, b: &Box<[f32]>) -> u32 {
        let distance = cosine_distance(a, b);
        (distance * (u32::MAX as f32 / 2.0)) as u32
    }
}

/// 1 - cosine similarity, in [0, 2]. A zero-magnitude vector is at distance 1
/// from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 1.0;
    }
    (1.0 - dot / (mag_a * mag_b)).clamp(0.0, 2.0)
}

/// One search result: the chunk id and its cosine distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub id: ChunkId,
    pub distance: f32,
}

/// M = 16 links per node above layer 0, M0 = 32 at layer 0.
type Graph = Hnsw<CosineDistance, Box<[f32]>, StdRng, 16, 32>;

/// Approximate nearest-neighbour index with an explicit capacity.
///
/// Vectors live in a flat arena pre-allocated for `capacity` entries; the
/// arena is what gets persisted. The HNSW graph is derived from it and is
/// rebuilt on load by reinserting in insertion order. The graph seeds its
/// RNG with a fixed default, so the rebuilt graph answers queries exactly
/// like the one that was saved.
pub struct VectorIndex {
    dim: usize,
    capacity: usize,
    vectors: Vec<f32>,
    labels: Vec<ChunkId>,
    graph: Graph,
    searcher: Searcher<u32>,
}

#[derive(Serialize, Deserialize)]
struct VectorIndexFile<'a> {
    format: u32,
    dim: usize,
    capacity: usize,
    labels: Cow<'a, [ChunkId]>,
    vectors: Cow<'a, [f32]>,
}

impl VectorIndex {
    /// Create an empty index with room for `initial_capacity` vectors.
    pub fn new(dim: usize, initial_capacity: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("vector dimension must be greater than 0".to_string()));
        }
        let mut index = Self {
            dim,
            capacity: 0,
            vectors: Vec::new(),
            labels: Vec::new(),
            graph: Hnsw::new(CosineDistance),
            searcher: Searcher::default(),
        };
        index.ensure_capacity(initial_capacity)?;
        Ok(index)
    }

    pub fn dim(&self) -> usize { self.dim }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn len(&self) -> usize { self.labels.len() }

    pub fn is_empty(&self) -> bool { self.labels.is_empty() }

    /// Grow so that at least `min_count` vectors fit.
    ///
    /// Capacity doubles, or grows to exactly `min_count` when that is larger.
    /// On allocation failure the index keeps its previous capacity and
    /// contents and `CapacityExhausted` is returned.
    pub fn ensure_capacity(&mut self, min_count: usize) -> Result<()> {
        if min_count <= self.capacity {
            return Ok(());
        }
        let target = self.capacity.saturating_mul(2).max(min_count);
        let exhausted = || Error::CapacityExhausted { requested: target };
        let floats = target.checked_mul(self.dim).ok_or_else(exhausted)?;
        self.vectors
            .try_reserve_exact(floats - self.vectors.len())
            .map_err(|_| exhausted())?;
        self.labels
            .try_reserve_exact(target - self.labels.len())
            .map_err(|_| exhausted())?;
        tracing::debug!(from = self.capacity, to = target, "vector index capacity grown");
        self.capacity = target;
        Ok(())
    }

    /// Make room for `additional` more vectors.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        let wanted = self
            .len()
            .checked_add(additional)
            .ok_or(Error::CapacityExhausted { requested: usize::MAX })?;
        self.ensure_capacity(wanted)
    }

    /// Check that `vector` can be inserted next.
    ///
    /// Once this returns `Ok`, the following `insert` of the same vector
    /// cannot fail.
    pub fn prepare_insert(&mut self, vector: &[f32]) -> Result<()> {
        self.check_dim(vector.len())?;
        self.reserve(1)
    }

    /// Insert `vector` under `id`.
    ///
    /// # Errors
    ///
    /// `DimensionMismatch` if `vector.len() != dim`, `CapacityExhausted` if the
    /// arena cannot grow. Neither leaves a partial entry behind.
    #[instrument(level = "trace", skip(self, vector), fields(index_size = self.labels.len()))]
    pub fn insert(&mut self, vector: &[f32], id: ChunkId) -> Result<()> {
        self.prepare_insert(vector)?;
        self.vectors.extend_from_slice(vector);
        self.labels.push(id);
        self.graph.insert(vector.to_vec().into_boxed_slice(), &mut self.searcher);
        Ok(())
    }

    /// The `k` nearest neighbours of `query`, ascending by cosine distance
    /// (ties by id). Returns `min(k, len)` entries; asking for more than exist
    /// is not an error.
    pub fn search_knn(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        self.check_dim(query.len())?;
        let want = k.min(self.len());
        if want == 0 {
            return Ok(vec![]);
        }

        let mut searcher = Searcher::default();
        let mut dest = vec![space::Neighbor { index: !0, distance: !0 }; want];
        let ef = std::cmp::max(want * 2, MIN_EF_SEARCH);
        let query_box = query.to_vec().into_boxed_slice();
        let found = self.graph.nearest(&query_box, ef, &mut searcher, &mut dest);

        let mut hits: Vec<Neighbor> = found
            .iter()
            .filter(|n| n.index != !0)
            .map(|n| self.neighbor_at(n.index, query))
            .collect();
        if hits.len() < want {
            tracing::debug!(found = hits.len(), want, "graph search came up short, scanning exhaustively");
            return Ok(self.exact_knn(query, want));
        }
        hits.sort_by(compare_neighbors);
        Ok(hits)
    }

    /// Exhaustive k-nearest search over every stored vector.
    pub fn exact_knn(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut all: Vec<Neighbor> = (0..self.len()).map(|pos| self.neighbor_at(pos, query)).collect();
        all.sort_by(compare_neighbors);
        all.truncate(k);
        all
    }

    /// Stored vector at insertion position `pos`.
    pub fn vector(&self, pos: usize) -> Option<&[f32]> {
        (pos < self.len()).then(|| &self.vectors[pos * self.dim..(pos + 1) * self.dim])
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let file = VectorIndexFile {
            format: FORMAT_VERSION,
            dim: self.dim,
            capacity: self.capacity,
            labels: Cow::Borrowed(&self.labels),
            vectors: Cow::Borrowed(&self.vectors),
        };
        bincode::serialize(&file).map_err(|e| Error::Corrupt(format!("cannot encode vector index: {e}")))
    }

    /// Rebuild an index from [`VectorIndex::serialize`] output.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let file: VectorIndexFile = bincode::deserialize(bytes)
            .map_err(|e| Error::Corrupt(format!("cannot decode vector index: {e}")))?;
        if file.format != FORMAT_VERSION {
            return Err(Error::Corrupt(format!("unsupported vector index format {}", file.format)));
        }
        if file.dim == 0 || file.vectors.len() != file.labels.len() * file.dim || file.capacity < file.labels.len() {
            return Err(Error::Corrupt(format!(
                "vector index header (dim {}, capacity {}) does not match {} labels / {} floats",
                file.dim, file.capacity, file.labels.len(), file.vectors.len()
            )));
        }
        let mut index = Self::new(file.dim, file.capacity)?;
        for (vector, &id) in file.vectors.chunks_exact(file.dim).zip(file.labels.iter()) {
            index.insert(vector, id)?;
        }
        Ok(index)
    }

    fn neighbor_at(&self, pos: usize, query: &[f32]) -> Neighbor {
        let stored = &self.vectors[pos * self.dim..(pos + 1) * self.dim];
        Neighbor { id: self.labels[pos], distance: cosine_distance(stored, query) }
    }

    fn check_dim(&self, actual: usize) -> Result<()> {
        if actual != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual });
        }
        Ok(())
    }
}

fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance.partial_cmp(&b.distance).unwrap_or(Ordering::Equal).then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_distance_bounds() {
        assert!((cosine_distance(&[1.0, 0.0], &[1.0, 0.0])).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn capacity_doubles_or_fits() {
        let mut index = VectorIndex::new(2, 2).unwrap();
        index.ensure_capacity(3).unwrap();
        assert_eq!(index.capacity(), 4, "doubling beats the minimum");
        index.ensure_capacity(20).unwrap();
        assert_eq!(index.capacity(), 20, "minimum beats doubling");
        index.ensure_capacity(5).unwrap();
        assert_eq!(index.capacity(), 20, "never shrinks");
    }

    #[test]
    fn failed_growth_keeps_previous_state() {
        let mut index = VectorIndex::new(4, 1).unwrap();
        index.insert(&[1.0, 0.0, 0.0, 0.0], 0).unwrap();
        let err = index.ensure_capacity(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, Error::CapacityExhausted { .. }));
        assert_eq!(index.capacity(), 1);
        assert_eq!(index.len(), 1);
        assert_eq!(index.search_knn(&[1.0, 0.0, 0.0, 0.0], 1).unwrap()[0].id, 0);
    }

    #[test]
    fn prepared_insert_leaves_index_untouched_on_rejection() {
        let mut index = VectorIndex::new(3, 1).unwrap();
        index.insert(&[1.0, 0.0, 0.0], 0).unwrap();
        assert!(matches!(index.prepare_insert(&[1.0, 0.0]), Err(Error::DimensionMismatch { expected: 3, actual: 2 })));
        assert!(matches!(index.reserve(usize::MAX), Err(Error::CapacityExhausted { .. })));
        assert_eq!((index.len(), index.capacity()), (1, 1));

        index.prepare_insert(&[0.0, 1.0, 0.0]).unwrap();
        assert_eq!(index.capacity(), 2);
        assert_eq!(index.len(), 1, "preparing does not insert");
        index.reserve(5).unwrap();
        assert_eq!(index.capacity(), 6);
    }
}
