//! Node removal and in-place update.
//!
//! Deletion unlinks a node from every neighbor list and re-elects the entry
//! point when needed. The graph is not re-stitched afterwards: recall
//! degrades gracefully as fragments appear, and a rebuild is the caller's
//! tool of last resort. Update is unlink + re-insert at a freshly drawn
//! level with the id preserved.

use crate::error::{Error, Result};
use crate::hnsw::graph::{HnswGraph, HnswNode};

impl HnswGraph {
    /// Remove a node from the graph, releasing its vector, metadata, and
    /// neighbor lists.
    pub fn delete(&mut self, id: u64) -> Result<()> {
        if !self.nodes.contains_key(&id) {
            return Err(Error::NodeNotFound(id));
        }
        self.unlink(id);
        Ok(())
    }

    /// Replace a node's vector and re-link it at a freshly drawn level.
    /// The id and the metadata payload are preserved.
    pub fn update(&mut self, id: u64, vector: Vec<f32>) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if !self.nodes.contains_key(&id) {
            return Err(Error::NodeNotFound(id));
        }
        // Both failure modes are checked above, so unlink + re-insert cannot
        // stop halfway and lose the node.
        let old = self.unlink(id);
        self.insert_with_id(id, vector, old.metadata)
    }

    /// Replace a node's metadata payload without touching the graph.
    pub(crate) fn set_metadata(&mut self, id: u64, metadata: Vec<u8>) -> Result<()> {
        let node = self.nodes.get_mut(&id).ok_or(Error::NodeNotFound(id))?;
        node.metadata = metadata;
        Ok(())
    }

    /// Detach and return a node. Sweeps every remaining node's lists:
    /// pruning makes links asymmetric, so walking only the removed node's
    /// own targets would leave dangling back-references.
    fn unlink(&mut self, id: u64) -> HnswNode {
        let node = self
            .nodes
            .remove(&id)
            .expect("caller verified the id is present");

        for other in self.nodes.values_mut() {
            for list in other.neighbors.iter_mut() {
                list.retain(|&n| n != id);
            }
        }

        if self.entry_point == Some(id) {
            self.reelect_entry_point();
        }

        node
    }

    /// Pick the remaining node with the highest level (lowest id on ties) as
    /// the new entry point, or clear it when the graph emptied.
    fn reelect_entry_point(&mut self) {
        let mut best: Option<(usize, u64)> = None;
        for (&nid, node) in &self.nodes {
            let level = node.level();
            best = match best {
                None => Some((level, nid)),
                Some((bl, bid)) if level > bl || (level == bl && nid < bid) => Some((level, nid)),
                keep => keep,
            };
        }
        match best {
            Some((level, nid)) => {
                tracing::debug!(new_entry = nid, level, "re-elected entry point");
                self.entry_point = Some(nid);
                self.max_level = level;
            }
            None => {
                self.entry_point = None;
                self.max_level = 0;
            }
        }
    }
}
