//! # zvdb
//!
//! Embeddable approximate-nearest-neighbor index for dense f32 vectors:
//! a concurrent HNSW graph with SIMD-accelerated distance kernels, an
//! in-memory vector/metadata store, and single-file `.zvdb` persistence.
//!
//! ```no_run
//! use zvdb::{DbConfig, DistanceMetric, VectorDb};
//!
//! let db = VectorDb::open(DbConfig::new(3, DistanceMetric::Euclidean))?;
//! let id = db.insert(&[1.0, 2.0, 3.0], b"payload")?;
//! let nearest = db.search(&[1.0, 2.0, 3.1], 5)?;
//! assert_eq!(nearest[0].0, id);
//! # Ok::<(), zvdb::Error>(())
//! ```

/// Tuning constants, validation limits, and the validated `DbConfig` record.
pub mod config;
/// The `VectorDb` handle: open/close plus insert, search, delete, update,
/// save, and load.
pub mod db;
/// Distance metrics: euclidean, manhattan, and angular cosine, with SIMD
/// f32 kernels and generic scalar kernels.
pub mod distance;
/// Error taxonomy and crate-wide `Result`.
pub mod error;
/// HNSW graph: structure, insertion, search, deletion, and blob encoding.
pub mod hnsw;
/// Index façade: the `VectorIndex` capability and the tagged `Index` carrier.
pub mod index;
/// Single-file `.zvdb` snapshot format.
pub mod persistence;
/// In-memory vector and metadata store.
pub mod store;

pub use config::DbConfig;
pub use db::VectorDb;
pub use distance::{DistanceMetric, ScalarKind};
pub use error::{Error, Result};
pub use hnsw::{HnswConfig, HnswGraph};
pub use index::{Index, IndexType, VectorIndex};
pub use store::VectorStore;
