//! Database handle: the embeddable surface of zvdb.
//!
//! A [`VectorDb`] couples the HNSW index with the vector store behind one
//! engine-wide `parking_lot::RwLock`. Locking discipline: `insert`,
//! `delete`, and `update` take the write lock for their full duration;
//! `search`, `get`, and `save` take the read lock; there is exactly one lock
//! and it is never acquired reentrantly, so no ordering issues arise.
//! Operations are linearizable: a node is published with all of its links
//! under the write lock, so a search never observes a half-inserted node.
//!
//! Cloning a `VectorDb` produces another handle to the same shared engine.

use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::persistence;
use crate::store::VectorStore;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

struct DbState {
    config: DbConfig,
    store: VectorStore,
    index: Index,
}

/// Thread-safe handle to one vector index instance.
#[derive(Clone)]
pub struct VectorDb {
    state: Arc<RwLock<DbState>>,
}

impl VectorDb {
    /// Open a fresh, empty database for a validated configuration.
    pub fn open(config: DbConfig) -> Result<Self> {
        config.validate()?;
        let store = VectorStore::new(config.dimension);
        let index = Index::new(&config);
        Ok(Self {
            state: Arc::new(RwLock::new(DbState {
                config,
                store,
                index,
            })),
        })
    }

    /// Open a database from the snapshot at `config.storage_path`.
    pub fn load(config: DbConfig) -> Result<Self> {
        let path = config.storage_path.clone().ok_or_else(|| {
            Error::InvalidConfiguration("load requires a storage_path".into())
        })?;
        Self::load_from(config, path)
    }

    /// Open a database from the snapshot at an explicit path.
    pub fn load_from(config: DbConfig, path: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        let (store, index) = persistence::load(path.as_ref(), &config)?;
        Ok(Self {
            state: Arc::new(RwLock::new(DbState {
                config,
                store,
                index,
            })),
        })
    }

    /// Release this handle. The engine itself is freed when the last clone
    /// drops; an explicit close reads better at call sites that pair it
    /// with `open`.
    pub fn close(self) {}

    /// Insert a vector with an optional metadata payload (empty slice for
    /// none). Returns the assigned id.
    ///
    /// The index and the store stay keyset-equal: if the store cannot take
    /// the entry, the freshly linked node is removed again before the error
    /// surfaces.
    pub fn insert(&self, vector: &[f32], metadata: &[u8]) -> Result<u64> {
        let mut state = self.state.write();
        let id = state.index.insert(vector.to_vec(), metadata.to_vec())?;
        if let Err(e) = state.store.add(id, vector, metadata) {
            state
                .index
                .delete(id)
                .expect("rollback of a just-inserted node cannot fail");
            return Err(e);
        }
        Ok(id)
    }

    /// Up to `k` nearest `(id, distance)` pairs, ascending by distance.
    /// An empty database yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(u64, f32)>> {
        self.state.read().index.search(query, k)
    }

    /// Owned copies of the vector and metadata stored under `id`.
    pub fn get(&self, id: u64) -> Result<(Vec<f32>, Vec<u8>)> {
        let state = self.state.read();
        let (v, m) = state.store.get(id)?;
        Ok((v.to_vec(), m.to_vec()))
    }

    /// Remove `id` from the index and the store.
    pub fn delete(&self, id: u64) -> Result<()> {
        let mut state = self.state.write();
        state.index.delete(id)?;
        state.store.delete(id)
    }

    /// Replace the vector and metadata under `id` as a unit. The node is
    /// re-linked in the graph at a freshly drawn level; the id is preserved.
    pub fn update(&self, id: u64, vector: &[f32], metadata: &[u8]) -> Result<()> {
        let mut state = self.state.write();
        state.index.update(id, vector.to_vec())?;
        state.index.set_metadata(id, metadata.to_vec())?;
        state.store.update(id, vector, metadata)
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        self.state.read().store.count()
    }

    /// `true` when no vectors are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured vector dimension.
    pub fn dimension(&self) -> usize {
        self.state.read().config.dimension
    }

    /// Write a snapshot to `config.storage_path`.
    ///
    /// Writers are blocked for the duration (the snapshot holds the read
    /// lock), so the file is a consistent point-in-time image.
    pub fn save(&self) -> Result<()> {
        let path = {
            let state = self.state.read();
            state.config.storage_path.clone()
        }
        .ok_or_else(|| Error::InvalidConfiguration("save requires a storage_path".into()))?;
        self.save_to(path)
    }

    /// Write a snapshot to an explicit path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = self.state.read();
        persistence::save(
            path.as_ref(),
            state.config.distance_metric,
            &state.store,
            &state.index,
        )
    }

    /// The configured default snapshot location, if any.
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.state.read().config.storage_path.clone()
    }
}
