//! Hierarchical Navigable Small World (HNSW) approximate nearest neighbor index.
//!
//! A multi-layer proximity graph: every node lives on layer 0, each higher
//! layer keeps an exponentially thinning subset that acts as a highway for
//! greedy descent. Insert, search, delete, and update all run against the
//! id-keyed node map; the graph (de)serializes to the binary blob embedded
//! in `.zvdb` files.

/// Node removal, in-place update, and entry-point re-election.
pub mod delete;
/// Graph structure, configuration, and invariant validation.
pub mod graph;
/// Insertion with shrink-heuristic neighbor selection.
pub mod insert;
/// Single-layer beam search and multi-layer KNN.
pub mod search;
/// Binary graph blob encoding.
pub mod serialize;
/// Generation-stamped visited set for traversal.
pub mod visited;

pub use graph::{HnswConfig, HnswGraph, HnswNode};
pub use search::knn_search;
