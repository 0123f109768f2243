//! HNSW graph structure and configuration.
//!
//! [`HnswConfig`] defines tuning parameters (M, ef_construction, ef_search).
//! [`HnswGraph`] stores nodes in an id-keyed map: ids are assigned
//! monotonically and never reused, so after deletions the id space is sparse
//! and a map (rather than a dense arena) keeps delete from leaking
//! tombstones. Each node owns its vector, its metadata payload, and one
//! neighbor list per layer `0..=level`.

use crate::config::{
    HNSW_DEFAULT_EF_CONSTRUCTION, HNSW_DEFAULT_EF_SEARCH, HNSW_DEFAULT_M, HNSW_MAX_LEVEL,
};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Configuration parameters for an HNSW graph.
///
/// Controls the trade-off between build speed, search speed, recall, and
/// memory usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Number of bidirectional links per node (except layer 0, which uses
    /// `m_max0`).
    pub m: usize,
    /// Maximum links per node at layer 0 (typically `2 * m`).
    pub m_max0: usize,
    /// Candidate list size during index construction.
    pub ef_construction: usize,
    /// Candidate list size during search (higher = better recall, slower).
    pub ef_search: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            m: HNSW_DEFAULT_M,
            m_max0: HNSW_DEFAULT_M * 2,
            ef_construction: HNSW_DEFAULT_EF_CONSTRUCTION,
            ef_search: HNSW_DEFAULT_EF_SEARCH,
        }
    }
}

/// One node of the graph: owned vector, opaque metadata, and per-layer
/// neighbor lists indexed `0..=level`.
#[derive(Debug, Clone, PartialEq)]
pub struct HnswNode {
    pub vector: Vec<f32>,
    pub metadata: Vec<u8>,
    /// `neighbors[layer]` is the ordered neighbor set at that layer. The
    /// node's level is `neighbors.len() - 1`.
    pub neighbors: Vec<Vec<u64>>,
}

impl HnswNode {
    pub(crate) fn new(vector: Vec<f32>, metadata: Vec<u8>, level: usize) -> Self {
        Self {
            vector,
            metadata,
            neighbors: vec![Vec::new(); level + 1],
        }
    }

    /// Highest layer this node participates in.
    pub fn level(&self) -> usize {
        self.neighbors.len() - 1
    }
}

/// The multi-layer proximity graph.
#[derive(Debug)]
pub struct HnswGraph {
    pub(crate) config: HnswConfig,
    pub(crate) dimension: usize,
    pub(crate) metric: DistanceMetric,
    pub(crate) nodes: HashMap<u64, HnswNode>,
    pub(crate) entry_point: Option<u64>,
    pub(crate) max_level: usize,
    /// Next id to assign; monotonically increasing, never reused.
    pub(crate) next_id: u64,
    rng: StdRng,
}

impl HnswGraph {
    /// Empty graph. A seed makes level draws (and thus the whole graph
    /// shape) reproducible.
    pub fn new(
        dimension: usize,
        metric: DistanceMetric,
        config: HnswConfig,
        rng_seed: Option<u64>,
    ) -> Self {
        let rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            dimension,
            metric,
            nodes: HashMap::new(),
            entry_point: None,
            max_level: 0,
            next_id: 0,
            rng,
        }
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Distance metric the graph was built with.
    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Current top-layer entry node, if any.
    pub fn entry_point(&self) -> Option<u64> {
        self.entry_point
    }

    /// Highest layer currently present (0 when empty).
    pub fn max_level(&self) -> usize {
        self.max_level
    }

    /// `true` when the id is present.
    pub fn contains(&self, id: u64) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Node ids in ascending order.
    pub fn sorted_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Borrowed view of a node's vector and metadata.
    pub fn get(&self, id: u64) -> Result<(&[f32], &[u8])> {
        self.nodes
            .get(&id)
            .map(|n| (n.vector.as_slice(), n.metadata.as_slice()))
            .ok_or(Error::NodeNotFound(id))
    }

    /// Draw a level from the exponential distribution
    /// `floor(-ln(uniform) / ln(M))`, capped at `HNSW_MAX_LEVEL`.
    pub(crate) fn random_level(&mut self) -> usize {
        if self.config.m <= 1 {
            return 0;
        }
        let ml = 1.0 / (self.config.m as f64).ln();
        let r: f64 = self.rng.gen_range(f64::MIN_POSITIVE..1.0);
        let level = (-r.ln() * ml).floor() as usize;
        level.min(HNSW_MAX_LEVEL)
    }

    /// Link capacity at a layer: `m_max0` at layer 0, `m` above.
    pub(crate) fn layer_capacity(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.m_max0
        } else {
            self.config.m
        }
    }

    /// Distance from `query` to a stored node. The node must exist.
    #[inline]
    pub(crate) fn distance_to(&self, query: &[f32], id: u64) -> f32 {
        self.metric.distance(query, &self.nodes[&id].vector)
    }

    /// Check the structural invariants, as done after deserialization.
    ///
    /// Verifies: neighbor ids resolve and respect layer bounds, lists hold
    /// no duplicates or self-loops, vector lengths match the dimension,
    /// the entry point exists exactly when the graph is non-empty and sits
    /// at `max_level`, `max_level` equals the highest node level, and
    /// `next_id` is past every assigned id.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            if self.entry_point.is_some() {
                return Err(Error::Corrupted("entry point set on empty graph".into()));
            }
            if self.max_level != 0 {
                return Err(Error::Corrupted("non-zero max_level on empty graph".into()));
            }
            return Ok(());
        }

        let ep = self
            .entry_point
            .ok_or_else(|| Error::Corrupted("entry point missing on non-empty graph".into()))?;
        let ep_node = self
            .nodes
            .get(&ep)
            .ok_or_else(|| Error::Corrupted(format!("entry point {ep} is not a node")))?;
        if ep_node.level() != self.max_level {
            return Err(Error::Corrupted(format!(
                "entry point {ep} at level {} but max_level is {}",
                ep_node.level(),
                self.max_level
            )));
        }

        let mut highest = 0usize;
        for (&id, node) in &self.nodes {
            if node.vector.len() != self.dimension {
                return Err(Error::Corrupted(format!(
                    "node {id} vector has {} dims, index configured for {}",
                    node.vector.len(),
                    self.dimension
                )));
            }
            highest = highest.max(node.level());
            if id >= self.next_id {
                return Err(Error::Corrupted(format!(
                    "node id {id} not below next_id {}",
                    self.next_id
                )));
            }

            for (layer, list) in node.neighbors.iter().enumerate() {
                let mut seen = HashSet::with_capacity(list.len());
                for &nid in list {
                    if nid == id {
                        return Err(Error::Corrupted(format!(
                            "node {id} links to itself at layer {layer}"
                        )));
                    }
                    if !seen.insert(nid) {
                        return Err(Error::Corrupted(format!(
                            "node {id} lists neighbor {nid} twice at layer {layer}"
                        )));
                    }
                    match self.nodes.get(&nid) {
                        None => {
                            return Err(Error::Corrupted(format!(
                                "node {id} links to missing node {nid} at layer {layer}"
                            )))
                        }
                        Some(n) if n.level() < layer => {
                            return Err(Error::Corrupted(format!(
                                "node {id} links to {nid} at layer {layer}, above its level {}",
                                n.level()
                            )))
                        }
                        Some(_) => {}
                    }
                }
            }
        }

        if highest != self.max_level {
            return Err(Error::Corrupted(format!(
                "max_level {} but highest node level is {highest}",
                self.max_level
            )));
        }

        Ok(())
    }
}
