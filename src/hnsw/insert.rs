//! HNSW insertion.
//!
//! New nodes enter the graph in three phases: greedy descent from the entry
//! point down to the node's level, a beam search per layer to gather
//! `ef_construction` candidates, and bidirectional linking with
//! over-capacity pruning. Neighbor selection uses the shrink heuristic
//! (Algorithm 4 from the HNSW paper): a candidate is taken only if it is
//! closer to the base node than to every already-selected neighbor, which
//! spreads links across directions instead of clustering them.

use crate::error::{Error, Result};
use crate::hnsw::graph::{HnswGraph, HnswNode};
use crate::hnsw::search::search_layer;
use crate::hnsw::visited::VisitedSet;

impl HnswGraph {
    /// Insert a vector with its metadata payload, assigning a fresh id.
    ///
    /// The id counter only advances on success, so a failed insert leaves no
    /// trace: the node is never published and no links are touched before
    /// validation passes.
    pub fn insert(&mut self, vector: Vec<f32>, metadata: Vec<u8>) -> Result<u64> {
        let id = self.next_id;
        self.insert_with_id(id, vector, metadata)?;
        self.next_id = id + 1;
        Ok(id)
    }

    /// Place a node under a caller-chosen id. Used by `insert` with the next
    /// fresh id and by `update` to re-link an existing id; the id must not be
    /// present in the graph.
    pub(crate) fn insert_with_id(&mut self, id: u64, vector: Vec<f32>, metadata: Vec<u8>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        debug_assert!(!self.nodes.contains_key(&id), "id {id} already present");

        let level = self.random_level();

        // First node becomes the sole entry point
        if self.entry_point.is_none() {
            self.nodes.insert(id, HnswNode::new(vector, metadata, level));
            self.entry_point = Some(id);
            self.max_level = level;
            return Ok(());
        }

        let entry_point = self
            .entry_point
            .expect("entry_point is Some after is_none() guard");

        let capacity = (self.next_id as usize).max(id as usize + 1);
        let mut visited = VisitedSet::new(capacity);

        // Phase 1: greedy descent through layers above the node's level
        let mut current = entry_point;
        for layer in (level + 1..=self.max_level).rev() {
            let found = search_layer(self, &vector, std::slice::from_ref(&current), 1, layer, &mut visited);
            if let Some(&(_, nearest)) = found.first() {
                current = nearest;
            }
        }

        // Phase 2: per-layer candidate search and neighbor selection
        let top = level.min(self.max_level);
        let mut node_neighbors: Vec<Vec<u64>> = vec![Vec::new(); level + 1];
        let mut layer_eps: Vec<u64> = vec![current];
        for layer in (0..=top).rev() {
            let candidates = search_layer(
                self,
                &vector,
                &layer_eps,
                self.config.ef_construction,
                layer,
                &mut visited,
            );
            let selected = select_neighbors(self, &candidates, self.config.m);
            node_neighbors[layer] = selected.iter().map(|&(_, nid)| nid).collect();

            // Found candidates seed the next (lower) layer
            layer_eps.clear();
            layer_eps.extend(candidates.iter().map(|&(_, nid)| nid));
        }

        // Publish the node, then add bidirectional connections
        let mut node = HnswNode::new(vector, metadata, level);
        node.neighbors = node_neighbors;
        self.nodes.insert(id, node);

        // Phase 3: back-links with over-capacity pruning
        for layer in 0..=top {
            let cap = self.layer_capacity(layer);
            let my_neighbors = self.nodes[&id].neighbors[layer].clone();
            for &nid in &my_neighbors {
                {
                    let neighbor = self
                        .nodes
                        .get_mut(&nid)
                        .expect("selected neighbor exists in graph");
                    neighbor.neighbors[layer].push(id);
                    if neighbor.neighbors[layer].len() <= cap {
                        continue;
                    }
                }
                // Over capacity: re-select among all of nid's links at this
                // layer with the same heuristic used for the new node
                let base = self.nodes[&nid].vector.clone();
                let list = self.nodes[&nid].neighbors[layer].clone();
                let candidates: Vec<(f32, u64)> = list
                    .iter()
                    .map(|&cid| (self.metric.distance(&base, &self.nodes[&cid].vector), cid))
                    .collect();
                let pruned = select_neighbors(self, &candidates, cap);
                self.nodes.get_mut(&nid).expect("neighbor still present").neighbors[layer] =
                    pruned.into_iter().map(|(_, cid)| cid).collect();
            }
        }

        // New top-level node takes over as entry point
        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(id);
        }

        Ok(())
    }
}

/// Shrink-heuristic neighbor selection.
///
/// Candidates are considered closest-first; one is selected only if it is
/// closer to the base vector than to any already-selected neighbor. If the
/// heuristic leaves slots unfilled, the remaining closest candidates fill
/// them, keeping the out-degree near `m` in clustered data.
fn select_neighbors(graph: &HnswGraph, candidates: &[(f32, u64)], m: usize) -> Vec<(f32, u64)> {
    let mut sorted = candidates.to_vec();
    sorted.sort_unstable_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    let mut selected: Vec<(f32, u64)> = Vec::with_capacity(m);
    for &(dist_to_base, cid) in &sorted {
        if selected.len() >= m {
            break;
        }
        let cand_vector = &graph.nodes[&cid].vector;
        let is_diverse = selected.iter().all(|&(_, sid)| {
            let dist_to_selected = graph.metric.distance(cand_vector, &graph.nodes[&sid].vector);
            dist_to_base <= dist_to_selected
        });
        if is_diverse {
            selected.push((dist_to_base, cid));
        }
    }

    // Backfill with the closest skipped candidates
    if selected.len() < m {
        for &(dist, cid) in &sorted {
            if selected.len() >= m {
                break;
            }
            if !selected.iter().any(|&(_, sid)| sid == cid) {
                selected.push((dist, cid));
            }
        }
    }

    selected
}
