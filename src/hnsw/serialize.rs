//! Binary graph blob encoding.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! u32 node_count
//! u32 max_level
//! u8  has_entry_point            (0 or 1)
//! u64 entry_point                present iff has_entry_point == 1
//! for each node, ascending id:
//!     u64 id
//!     u32 vector_len             must equal the index dimension
//!     vector_len × u32           f32 scalars as raw bit patterns
//!     u32 connection_count       total across all layers
//!     u32 layer_count            level + 1 (trailing layers may be empty,
//!                                  so the total alone cannot recover it)
//!     layer_count × u32          connections per layer, layer 0 first
//!     connection_count × u64     neighbor ids in that layer order
//!     u32 metadata_len
//!     metadata_len bytes         opaque payload
//! ```
//!
//! Validation limits on read catch corrupt blobs before allocation:
//! `node_count ≤ 10^6`, `max_level ≤ 100`, `connection_count ≤ 10^6`,
//! `metadata_len ≤ 10^6`. A repeated node id is `DuplicateId`. The decoded
//! graph must also pass [`HnswGraph::validate`].

use crate::config::{MAX_CONNECTION_COUNT, MAX_FILE_LEVEL, MAX_METADATA_LEN, MAX_NODE_COUNT};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::hnsw::graph::{HnswConfig, HnswGraph, HnswNode};
use crate::persistence::{read_u32_le, read_u64_le, read_u8, write_u32_le, write_u64_le, write_u8};
use std::io::{Read, Write};

impl HnswGraph {
    /// Write the graph blob. Nodes go out in ascending id order so the byte
    /// stream is deterministic.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<()> {
        write_u32_le(w, self.nodes.len() as u32)?;
        write_u32_le(w, self.max_level as u32)?;
        match self.entry_point {
            Some(ep) => {
                write_u8(w, 1)?;
                write_u64_le(w, ep)?;
            }
            None => write_u8(w, 0)?,
        }

        for id in self.sorted_ids() {
            let node = &self.nodes[&id];
            write_u64_le(w, id)?;
            write_u32_le(w, node.vector.len() as u32)?;
            for &v in &node.vector {
                write_u32_le(w, v.to_bits())?;
            }

            let connection_count: usize = node.neighbors.iter().map(|l| l.len()).sum();
            write_u32_le(w, connection_count as u32)?;
            write_u32_le(w, node.neighbors.len() as u32)?;
            for list in &node.neighbors {
                write_u32_le(w, list.len() as u32)?;
            }
            for list in &node.neighbors {
                for &nid in list {
                    write_u64_le(w, nid)?;
                }
            }

            write_u32_le(w, node.metadata.len() as u32)?;
            w.write_all(&node.metadata)?;
        }
        Ok(())
    }

    /// Read a graph blob into a fresh graph with the given parameters.
    /// The decoded graph is invariant-checked before being returned.
    pub fn deserialize<R: Read>(
        r: &mut R,
        dimension: usize,
        metric: DistanceMetric,
        config: HnswConfig,
        rng_seed: Option<u64>,
    ) -> Result<HnswGraph> {
        let node_count = read_u32_le(r)? as usize;
        if node_count > MAX_NODE_COUNT {
            return Err(Error::InvalidFormat(format!(
                "node count {node_count} exceeds limit {MAX_NODE_COUNT}"
            )));
        }
        let max_level = read_u32_le(r)? as usize;
        if max_level > MAX_FILE_LEVEL {
            return Err(Error::InvalidFormat(format!(
                "max level {max_level} exceeds limit {MAX_FILE_LEVEL}"
            )));
        }
        let entry_point = match read_u8(r)? {
            0 => None,
            1 => Some(read_u64_le(r)?),
            other => {
                return Err(Error::InvalidFormat(format!(
                    "entry point flag must be 0 or 1, got {other}"
                )))
            }
        };

        let mut graph = HnswGraph::new(dimension, metric, config, rng_seed);
        let mut highest_id = 0u64;

        for _ in 0..node_count {
            let id = read_u64_le(r)?;
            let vector_len = read_u32_le(r)? as usize;
            if vector_len != dimension {
                return Err(Error::InvalidFormat(format!(
                    "node {id} vector has {vector_len} dims, header says {dimension}"
                )));
            }
            let mut vector = Vec::with_capacity(vector_len);
            for _ in 0..vector_len {
                vector.push(f32::from_bits(read_u32_le(r)?));
            }

            let connection_count = read_u32_le(r)? as usize;
            if connection_count > MAX_CONNECTION_COUNT {
                return Err(Error::InvalidFormat(format!(
                    "node {id} connection count {connection_count} exceeds limit {MAX_CONNECTION_COUNT}"
                )));
            }
            let layer_count = read_u32_le(r)? as usize;
            if layer_count == 0 || layer_count > max_level + 1 {
                return Err(Error::InvalidFormat(format!(
                    "node {id} layer count {layer_count} outside 1..={}",
                    max_level + 1
                )));
            }
            let mut per_layer = Vec::with_capacity(layer_count);
            for _ in 0..layer_count {
                per_layer.push(read_u32_le(r)? as usize);
            }
            if per_layer.iter().sum::<usize>() != connection_count {
                return Err(Error::InvalidFormat(format!(
                    "node {id} per-layer counts do not sum to connection count {connection_count}"
                )));
            }

            let mut neighbors = Vec::with_capacity(layer_count);
            for &count in &per_layer {
                let mut list = Vec::with_capacity(count);
                for _ in 0..count {
                    list.push(read_u64_le(r)?);
                }
                neighbors.push(list);
            }

            let metadata_len = read_u32_le(r)? as usize;
            if metadata_len > MAX_METADATA_LEN {
                return Err(Error::InvalidFormat(format!(
                    "node {id} metadata length {metadata_len} exceeds limit {MAX_METADATA_LEN}"
                )));
            }
            let mut metadata = vec![0u8; metadata_len];
            r.read_exact(&mut metadata).map_err(Error::from_read)?;

            let node = HnswNode {
                vector,
                metadata,
                neighbors,
            };
            if graph.nodes.insert(id, node).is_some() {
                return Err(Error::DuplicateId(id));
            }
            highest_id = highest_id.max(id);
        }

        graph.entry_point = entry_point;
        graph.max_level = max_level;
        graph.next_id = if node_count == 0 { 0 } else { highest_id + 1 };
        graph.validate()?;
        Ok(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hnsw::search::knn_search;

    fn build_graph(n: usize, seed: u64) -> HnswGraph {
        let mut g = HnswGraph::new(3, DistanceMetric::Euclidean, HnswConfig::default(), Some(seed));
        for i in 0..n {
            let v = vec![i as f32, (i * 2 % 7) as f32, (i * 3 % 11) as f32];
            let meta = if i % 3 == 0 {
                format!("item-{i}").into_bytes()
            } else {
                Vec::new()
            };
            g.insert(v, meta).unwrap();
        }
        g
    }

    fn round_trip(g: &HnswGraph) -> HnswGraph {
        let mut buf = Vec::new();
        g.serialize(&mut buf).unwrap();
        HnswGraph::deserialize(
            &mut buf.as_slice(),
            g.dimension(),
            g.metric(),
            g.config.clone(),
            Some(0),
        )
        .unwrap()
    }

    #[test]
    fn test_round_trip_empty() {
        let g = build_graph(0, 1);
        let r = round_trip(&g);
        assert!(r.is_empty());
        assert_eq!(r.entry_point(), None);
        assert_eq!(r.max_level(), 0);
        assert_eq!(r.next_id, 0);
    }

    #[test]
    fn test_round_trip_preserves_everything() {
        let g = build_graph(60, 2);
        let r = round_trip(&g);
        assert_eq!(r.len(), g.len());
        assert_eq!(r.entry_point(), g.entry_point());
        assert_eq!(r.max_level(), g.max_level());
        assert_eq!(r.next_id, g.next_id);
        for id in g.sorted_ids() {
            assert_eq!(g.nodes[&id], r.nodes[&id], "node {id} differs");
        }
    }

    #[test]
    fn test_round_trip_search_identical() {
        let g = build_graph(60, 3);
        let r = round_trip(&g);
        for i in 0..20 {
            let q = [i as f32, (i % 5) as f32, (i % 3) as f32];
            assert_eq!(knn_search(&g, &q, 5), knn_search(&r, &q, 5));
        }
    }

    #[test]
    fn test_truncated_blob() {
        let g = build_graph(10, 4);
        let mut buf = Vec::new();
        g.serialize(&mut buf).unwrap();
        let cut = &buf[..buf.len() / 2];
        let err = HnswGraph::deserialize(
            &mut &cut[..],
            3,
            DistanceMetric::Euclidean,
            HnswConfig::default(),
            None,
        );
        assert!(matches!(err, Err(Error::Truncated)));
    }

    #[test]
    fn test_bad_entry_flag() {
        let g = build_graph(3, 5);
        let mut buf = Vec::new();
        g.serialize(&mut buf).unwrap();
        buf[8] = 7; // has_entry_point byte
        let err = HnswGraph::deserialize(
            &mut buf.as_slice(),
            3,
            DistanceMetric::Euclidean,
            HnswConfig::default(),
            None,
        );
        assert!(matches!(err, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_oversized_node_count() {
        let mut buf = Vec::new();
        write_u32_le(&mut buf, (MAX_NODE_COUNT + 1) as u32).unwrap();
        write_u32_le(&mut buf, 0).unwrap();
        write_u8(&mut buf, 0).unwrap();
        let err = HnswGraph::deserialize(
            &mut buf.as_slice(),
            3,
            DistanceMetric::Euclidean,
            HnswConfig::default(),
            None,
        );
        assert!(matches!(err, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_wrong_vector_len_rejected() {
        let g = build_graph(3, 6);
        let mut buf = Vec::new();
        g.serialize(&mut buf).unwrap();
        // claim dimension 4 at load time; every node says 3
        let err = HnswGraph::deserialize(
            &mut buf.as_slice(),
            4,
            DistanceMetric::Euclidean,
            HnswConfig::default(),
            None,
        );
        assert!(matches!(err, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_dangling_neighbor_is_corrupted() {
        let mut g = build_graph(5, 7);
        // point a neighbor list at a node that will not be serialized
        g.nodes.get_mut(&0).unwrap().neighbors[0] = vec![99];
        let mut buf = Vec::new();
        g.serialize(&mut buf).unwrap();
        let err = HnswGraph::deserialize(
            &mut buf.as_slice(),
            3,
            DistanceMetric::Euclidean,
            HnswConfig::default(),
            None,
        );
        assert!(matches!(err, Err(Error::Corrupted(_))));
    }
}
