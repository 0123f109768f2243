//! Index façade.
//!
//! [`VectorIndex`] is the capability surface the engine talks to;
//! [`Index`] is the tagged concrete carrier. HNSW is the only algorithm
//! today, so the enum has one variant and delegates by match; no trait
//! objects for a single implementor.

use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::hnsw::{knn_search, HnswGraph};
use std::io::{Read, Write};

/// Algorithm tag persisted in the `.zvdb` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexType {
    /// Hierarchical Navigable Small World graph.
    Hnsw,
}

impl IndexType {
    /// Header byte for this algorithm.
    pub fn as_u8(self) -> u8 {
        match self {
            IndexType::Hnsw => 0,
        }
    }

    /// Parse a header byte back into an algorithm tag.
    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(IndexType::Hnsw),
            other => Err(Error::InvalidFormat(format!("unknown index type tag {other}"))),
        }
    }
}

/// Operations every index algorithm provides.
pub trait VectorIndex {
    /// Insert a vector with its metadata payload; returns the assigned id.
    fn insert(&mut self, vector: Vec<f32>, metadata: Vec<u8>) -> Result<u64>;

    /// Up to `k` nearest `(id, distance)` pairs, ascending by distance.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>>;

    /// Remove a node.
    fn delete(&mut self, id: u64) -> Result<()>;

    /// Replace a node's vector and re-link it; the id is preserved.
    fn update(&mut self, id: u64, vector: Vec<f32>) -> Result<()>;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured vector dimension.
    fn dimension(&self) -> usize;

    /// Write the index blob in its on-disk encoding.
    fn serialize<W: Write>(&self, w: &mut W) -> Result<()>;
}

impl VectorIndex for HnswGraph {
    fn insert(&mut self, vector: Vec<f32>, metadata: Vec<u8>) -> Result<u64> {
        HnswGraph::insert(self, vector, metadata)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        if query.len() != self.dimension() {
            return Err(Error::DimensionMismatch {
                expected: self.dimension(),
                actual: query.len(),
            });
        }
        Ok(knn_search(self, query, k))
    }

    fn delete(&mut self, id: u64) -> Result<()> {
        HnswGraph::delete(self, id)
    }

    fn update(&mut self, id: u64, vector: Vec<f32>) -> Result<()> {
        HnswGraph::update(self, id, vector)
    }

    fn len(&self) -> usize {
        HnswGraph::len(self)
    }

    fn dimension(&self) -> usize {
        HnswGraph::dimension(self)
    }

    fn serialize<W: Write>(&self, w: &mut W) -> Result<()> {
        HnswGraph::serialize(self, w)
    }
}

/// Tagged index carrier. Holds enough configuration context to rebuild the
/// concrete variant when a file is loaded.
#[derive(Debug)]
pub enum Index {
    Hnsw(HnswGraph),
}

impl Index {
    /// Fresh empty index for a validated configuration.
    pub fn new(config: &DbConfig) -> Self {
        Index::Hnsw(HnswGraph::new(
            config.dimension,
            config.distance_metric,
            config.hnsw.clone(),
            config.rng_seed,
        ))
    }

    /// Algorithm tag for the header.
    pub fn index_type(&self) -> IndexType {
        match self {
            Index::Hnsw(_) => IndexType::Hnsw,
        }
    }

    /// Decode an index blob of the given algorithm.
    pub fn deserialize<R: Read>(
        index_type: IndexType,
        r: &mut R,
        config: &DbConfig,
    ) -> Result<Self> {
        match index_type {
            IndexType::Hnsw => Ok(Index::Hnsw(HnswGraph::deserialize(
                r,
                config.dimension,
                config.distance_metric,
                config.hnsw.clone(),
                config.rng_seed,
            )?)),
        }
    }

    /// The underlying graph.
    pub fn as_hnsw(&self) -> &HnswGraph {
        match self {
            Index::Hnsw(g) => g,
        }
    }

    pub fn insert(&mut self, vector: Vec<f32>, metadata: Vec<u8>) -> Result<u64> {
        match self {
            Index::Hnsw(g) => VectorIndex::insert(g, vector, metadata),
        }
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        match self {
            Index::Hnsw(g) => VectorIndex::search(g, query, k),
        }
    }

    pub fn delete(&mut self, id: u64) -> Result<()> {
        match self {
            Index::Hnsw(g) => VectorIndex::delete(g, id),
        }
    }

    pub fn update(&mut self, id: u64, vector: Vec<f32>) -> Result<()> {
        match self {
            Index::Hnsw(g) => VectorIndex::update(g, id, vector),
        }
    }

    pub(crate) fn set_metadata(&mut self, id: u64, metadata: Vec<u8>) -> Result<()> {
        match self {
            Index::Hnsw(g) => g.set_metadata(id, metadata),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Index::Hnsw(g) => VectorIndex::len(g),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Index::Hnsw(g) => VectorIndex::serialize(g, w),
        }
    }
}
