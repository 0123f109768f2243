//! HNSW search: single-layer beam search and multi-layer KNN.
//!
//! `search_layer` keeps two heaps keyed by distance to the query: a min-heap
//! frontier of nodes still to expand and a bounded max-heap of the best `ef`
//! results found so far. Equal distances break on ascending id everywhere,
//! which keeps result ordering stable across SIMD lane widths.

use crate::hnsw::graph::HnswGraph;
use crate::hnsw::visited::VisitedSet;
use ordered_float::OrderedFloat;
use std::collections::BinaryHeap;

/// Frontier entry. The heap is a max-heap, so `Ord` is reversed on
/// (distance, id) to pop the closest candidate (lowest id on ties) first.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    distance: OrderedFloat<f32>,
    id: u64,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .distance
            .cmp(&self.distance)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Result entry. Natural (distance, id) order, so the max-heap's peek is the
/// worst kept result and eviction drops the farthest (highest id on ties).
#[derive(Debug, Clone, PartialEq, Eq)]
struct ResultEntry {
    distance: OrderedFloat<f32>,
    id: u64,
}

impl Ord for ResultEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance
            .cmp(&other.distance)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ResultEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Search a single layer of the graph.
///
/// Returns up to `ef` nodes closest to `query` at `layer`, ascending by
/// (distance, id). `visited` is reset at the start of each call and must
/// cover every assigned id.
pub(crate) fn search_layer(
    graph: &HnswGraph,
    query: &[f32],
    entry_points: &[u64],
    ef: usize,
    layer: usize,
    visited: &mut VisitedSet,
) -> Vec<(f32, u64)> {
    visited.reset();
    let mut candidates: BinaryHeap<Candidate> = BinaryHeap::with_capacity(ef * 2);
    let mut results: BinaryHeap<ResultEntry> = BinaryHeap::with_capacity(ef + 1);
    // Cached worst kept distance; avoids heap peeks in the hot loop
    let mut worst = f32::MAX;

    for &ep in entry_points {
        if visited.insert(ep) {
            let dist = graph.distance_to(query, ep);
            candidates.push(Candidate {
                distance: OrderedFloat(dist),
                id: ep,
            });
            results.push(ResultEntry {
                distance: OrderedFloat(dist),
                id: ep,
            });
            if results.len() > ef {
                results.pop();
            }
            if results.len() >= ef {
                worst = results.peek().map_or(f32::MAX, |r| r.distance.0);
            }
        }
    }

    while let Some(candidate) = candidates.pop() {
        let c_dist = candidate.distance.0;

        // Closest frontier node is farther than the worst kept result: done
        if results.len() >= ef && c_dist > worst {
            break;
        }

        let node = &graph.nodes[&candidate.id];
        let Some(neighbor_list) = node.neighbors.get(layer) else {
            continue;
        };

        for &neighbor_id in neighbor_list {
            if !visited.insert(neighbor_id) {
                continue;
            }

            let dist = graph.distance_to(query, neighbor_id);
            if results.len() < ef || dist < worst {
                candidates.push(Candidate {
                    distance: OrderedFloat(dist),
                    id: neighbor_id,
                });
                results.push(ResultEntry {
                    distance: OrderedFloat(dist),
                    id: neighbor_id,
                });
                if results.len() > ef {
                    results.pop();
                }
                if results.len() >= ef {
                    worst = results.peek().map_or(f32::MAX, |r| r.distance.0);
                }
            }
        }
    }

    results
        .into_sorted_vec()
        .into_iter()
        .map(|r| (r.distance.0, r.id))
        .collect()
}

/// Multi-layer KNN search.
///
/// Greedy descent from the entry point through the upper layers, then a
/// beam search at layer 0 with `max(ef_search, k)`. Returns up to `k`
/// `(id, distance)` pairs ascending by (distance, id); empty when the graph
/// is empty.
pub fn knn_search(graph: &HnswGraph, query: &[f32], k: usize) -> Vec<(u64, f32)> {
    let Some(entry_point) = graph.entry_point else {
        return Vec::new();
    };
    if k == 0 {
        return Vec::new();
    }

    let mut visited = VisitedSet::new(graph.next_id as usize);
    let mut current = entry_point;

    for layer in (1..=graph.max_level).rev() {
        let found = search_layer(graph, query, std::slice::from_ref(&current), 1, layer, &mut visited);
        if let Some(&(_, nearest)) = found.first() {
            current = nearest;
        }
    }

    let ef = graph.config.ef_search.max(k);
    let mut found = search_layer(graph, query, std::slice::from_ref(&current), ef, 0, &mut visited);
    found.truncate(k);
    found.into_iter().map(|(dist, id)| (id, dist)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::DistanceMetric;
    use crate::hnsw::graph::{HnswConfig, HnswNode};

    /// Hand-built single-layer ring: 0 - 1 - 2 - 3 - 0 on a line of x values.
    fn line_graph() -> HnswGraph {
        let mut g = HnswGraph::new(1, DistanceMetric::Euclidean, HnswConfig::default(), Some(7));
        let coords = [0.0f32, 1.0, 2.0, 3.0];
        for (i, &x) in coords.iter().enumerate() {
            g.nodes
                .insert(i as u64, HnswNode::new(vec![x], Vec::new(), 0));
        }
        let links: [(u64, Vec<u64>); 4] =
            [(0, vec![1, 3]), (1, vec![0, 2]), (2, vec![1, 3]), (3, vec![2, 0])];
        for (id, ns) in links {
            g.nodes.get_mut(&id).unwrap().neighbors[0] = ns;
        }
        g.entry_point = Some(0);
        g.max_level = 0;
        g.next_id = 4;
        g
    }

    #[test]
    fn test_search_layer_finds_all_in_order() {
        let g = line_graph();
        let mut visited = VisitedSet::new(4);
        let found = search_layer(&g, &[1.2], &[0], 4, 0, &mut visited);
        let ids: Vec<u64> = found.iter().map(|&(_, id)| id).collect();
        assert_eq!(ids, vec![1, 2, 0, 3]);
        // ascending distances
        for w in found.windows(2) {
            assert!(w[0].0 <= w[1].0);
        }
    }

    #[test]
    fn test_search_layer_respects_ef() {
        let g = line_graph();
        let mut visited = VisitedSet::new(4);
        let found = search_layer(&g, &[0.0], &[0], 2, 0, &mut visited);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].1, 0);
        assert_eq!(found[1].1, 1);
    }

    #[test]
    fn test_search_layer_tie_breaks_on_id() {
        // Nodes 1 and 2 are equidistant from the query
        let mut g = HnswGraph::new(1, DistanceMetric::Euclidean, HnswConfig::default(), Some(7));
        g.nodes.insert(0, HnswNode::new(vec![0.0], Vec::new(), 0));
        g.nodes.insert(1, HnswNode::new(vec![2.0], Vec::new(), 0));
        g.nodes.insert(2, HnswNode::new(vec![-2.0], Vec::new(), 0));
        g.nodes.get_mut(&0).unwrap().neighbors[0] = vec![1, 2];
        g.nodes.get_mut(&1).unwrap().neighbors[0] = vec![0];
        g.nodes.get_mut(&2).unwrap().neighbors[0] = vec![0];
        g.entry_point = Some(0);
        g.next_id = 3;

        let mut visited = VisitedSet::new(3);
        let found = search_layer(&g, &[0.0], &[0], 3, 0, &mut visited);
        let ids: Vec<u64> = found.iter().map(|&(_, id)| id).collect();
        assert_eq!(ids, vec![0, 1, 2], "equal distances order by ascending id");
    }

    #[test]
    fn test_knn_search_empty_graph() {
        let g = HnswGraph::new(3, DistanceMetric::Euclidean, HnswConfig::default(), None);
        assert!(knn_search(&g, &[1.0, 2.0, 3.0], 5).is_empty());
    }

    #[test]
    fn test_knn_search_k_zero() {
        let g = line_graph();
        assert!(knn_search(&g, &[0.0], 0).is_empty());
    }

    #[test]
    fn test_knn_search_caps_at_population() {
        let g = line_graph();
        let found = knn_search(&g, &[1.5], 10);
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_knn_search_nearest_first() {
        let g = line_graph();
        let found = knn_search(&g, &[2.9], 2);
        assert_eq!(found[0].0, 3);
        assert_eq!(found[1].0, 2);
        assert!(found[0].1 <= found[1].1);
    }
}
