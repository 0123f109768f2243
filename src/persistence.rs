//! Single-file `.zvdb` persistence.
//!
//! File layout (all integers little-endian):
//!
//! ```text
//! offset  size  field
//! 0       4     magic            = "ZVDB"
//! 4       4     version          = u32, currently 1
//! 8       4     dimension        = u32, > 0
//! 12      1     distance_metric  = u8 (0 euclidean, 1 manhattan, 2 cosine)
//! 13      1     index_type       = u8 (0 HNSW)
//! 14      8     vector_count     = u64
//!         V     vector_data      = count × dimension × 4 bytes, raw f32
//!         4     metadata_size    = u32
//!         M     metadata_bytes   = store metadata section
//!         4     index_blob_size  = u32
//!         I     index_blob       = graph encoding (see hnsw::serialize)
//! ```
//!
//! Saving goes through a temp file in the same directory followed by a
//! rename, so a crash mid-write never clobbers the previous snapshot. Save
//! is not atomic against concurrent mutation; the engine holds its read
//! lock across the write. Loading validates the header, both sections, and
//! the cross-section invariants (matching keysets, matching vectors) before
//! handing the state back.

use crate::config::{DbConfig, MAX_DIMENSION, MAX_NODE_COUNT};
use crate::distance::DistanceMetric;
use crate::error::{Error, Result};
use crate::index::{Index, IndexType};
use crate::store::VectorStore;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Magic bytes at the start of every `.zvdb` file.
pub const MAGIC: &[u8; 4] = b"ZVDB";

/// Current file format version.
pub const FORMAT_VERSION: u32 = 1;

// ── wire helpers ────────────────────────────────────────────────────────

pub(crate) fn write_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

pub(crate) fn write_u32_le<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn write_u64_le<W: Write>(w: &mut W, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn read_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf).map_err(Error::from_read)?;
    Ok(buf[0])
}

pub(crate) fn read_u32_le<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(Error::from_read)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64_le<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(Error::from_read)?;
    Ok(u64::from_le_bytes(buf))
}

// ── save / load ─────────────────────────────────────────────────────────

/// Write the full engine state to `path` using a temp file + rename.
pub fn save(path: &Path, metric: DistanceMetric, store: &VectorStore, index: &Index) -> Result<()> {
    let tmp_path = path.with_extension("zvdb.tmp");
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(&tmp_path)?;
    let mut w = BufWriter::new(file);

    w.write_all(MAGIC)?;
    write_u32_le(&mut w, FORMAT_VERSION)?;
    write_u32_le(&mut w, store.dimension() as u32)?;
    write_u8(&mut w, metric.as_u8())?;
    write_u8(&mut w, index.index_type().as_u8())?;

    write_u64_le(&mut w, store.count() as u64)?;
    store.serialize_vectors(&mut w)?;

    let metadata = store.serialize_metadata()?;
    write_u32_le(&mut w, metadata.len() as u32)?;
    w.write_all(&metadata)?;

    let mut blob = Vec::new();
    index.serialize(&mut blob)?;
    write_u32_le(&mut w, blob.len() as u32)?;
    w.write_all(&blob)?;

    w.flush()?;
    w.get_mut().sync_all()?;
    drop(w);
    fs::rename(&tmp_path, path)?;

    tracing::info!(
        path = %path.display(),
        vectors = store.count(),
        "saved index snapshot"
    );
    Ok(())
}

/// Read an engine state back from `path`.
///
/// The header's dimension and metric must agree with `config`; the HNSW
/// tuning parameters are not part of the file format and come from `config`.
pub fn load(path: &Path, config: &DbConfig) -> Result<(VectorStore, Index)> {
    let meta = fs::metadata(path)?;
    if meta.len() == 0 {
        return Err(Error::EmptyFile);
    }

    let mut r = std::io::BufReader::new(File::open(path)?);

    let mut magic = [0u8; 4];
    r.read_exact(&mut magic).map_err(Error::from_read)?;
    if &magic != MAGIC {
        return Err(Error::InvalidMagicNumber);
    }
    let version = read_u32_le(&mut r)?;
    if version != FORMAT_VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let dimension = read_u32_le(&mut r)? as usize;
    if dimension == 0 || dimension > MAX_DIMENSION {
        return Err(Error::InvalidFormat(format!(
            "implausible dimension {dimension}"
        )));
    }
    if dimension != config.dimension {
        return Err(Error::InvalidConfiguration(format!(
            "file holds {dimension}-dimensional vectors, configuration says {}",
            config.dimension
        )));
    }
    let metric = DistanceMetric::from_u8(read_u8(&mut r)?)?;
    if metric != config.distance_metric {
        return Err(Error::InvalidConfiguration(format!(
            "file was built with the {} metric, configuration says {}",
            metric.name(),
            config.distance_metric.name()
        )));
    }
    let index_type = IndexType::from_u8(read_u8(&mut r)?)?;

    let vector_count = read_u64_le(&mut r)? as usize;
    if vector_count > MAX_NODE_COUNT {
        return Err(Error::InvalidFormat(format!(
            "vector count {vector_count} exceeds limit {MAX_NODE_COUNT}"
        )));
    }
    let vector_bytes = vector_count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| Error::InvalidFormat("vector section size overflows".into()))?;
    let mut vector_data = alloc_buf(vector_bytes)?;
    r.read_exact(&mut vector_data).map_err(Error::from_read)?;

    let metadata_size = read_u32_le(&mut r)? as usize;
    let mut metadata = alloc_buf(metadata_size)?;
    r.read_exact(&mut metadata).map_err(Error::from_read)?;

    let store = VectorStore::deserialize(dimension, vector_count, &vector_data, &metadata)?;

    let blob_size = read_u32_le(&mut r)? as usize;
    let mut blob = alloc_buf(blob_size)?;
    r.read_exact(&mut blob).map_err(Error::from_read)?;
    let mut blob_slice = blob.as_slice();
    let index = Index::deserialize(index_type, &mut blob_slice, config)?;
    if !blob_slice.is_empty() {
        return Err(Error::InvalidFormat(format!(
            "{} trailing bytes in index blob",
            blob_slice.len()
        )));
    }

    let mut trailer = [0u8; 1];
    if r.read(&mut trailer)? != 0 {
        return Err(Error::InvalidFormat("trailing bytes after index blob".into()));
    }

    check_consistency(&store, &index)?;

    tracing::info!(
        path = %path.display(),
        vectors = store.count(),
        "loaded index snapshot"
    );
    Ok((store, index))
}

/// Zero-filled buffer of `len` bytes, surfacing allocation failure instead
/// of aborting.
fn alloc_buf(len: usize) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|_| Error::OutOfMemory)?;
    buf.resize(len, 0);
    Ok(buf)
}

/// Cross-section invariants: the store and the graph describe the same set
/// of ids with the same vectors and payloads.
fn check_consistency(store: &VectorStore, index: &Index) -> Result<()> {
    let graph = index.as_hnsw();
    if store.count() != graph.len() {
        return Err(Error::Corrupted(format!(
            "store has {} entries, graph has {} nodes",
            store.count(),
            graph.len()
        )));
    }
    for id in graph.sorted_ids() {
        let (stored_vec, stored_meta) = store
            .get(id)
            .map_err(|_| Error::Corrupted(format!("graph node {id} missing from store")))?;
        let (node_vec, node_meta) = graph.get(id)?;
        if stored_vec != node_vec {
            return Err(Error::Corrupted(format!(
                "vector for id {id} differs between store and graph"
            )));
        }
        if stored_meta != node_meta {
            return Err(Error::Corrupted(format!(
                "metadata for id {id} differs between store and graph"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> DbConfig {
        let mut cfg = DbConfig::new(3, DistanceMetric::Euclidean);
        cfg.rng_seed = Some(33);
        cfg
    }

    fn sample_state(n: usize) -> (VectorStore, Index) {
        let cfg = sample_config();
        let mut store = VectorStore::new(3);
        let mut index = Index::new(&cfg);
        for i in 0..n {
            let v = vec![i as f32, (i % 4) as f32, (i % 7) as f32];
            let meta = format!("m{i}").into_bytes();
            let id = index.insert(v.clone(), meta.clone()).unwrap();
            store.add(id, &v, &meta).unwrap();
        }
        (store, index)
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.zvdb");
        let (store, index) = sample_state(40);
        save(&path, DistanceMetric::Euclidean, &store, &index).unwrap();

        let (rstore, rindex) = load(&path, &sample_config()).unwrap();
        assert_eq!(rstore.count(), 40);
        assert_eq!(rindex.len(), 40);
        for id in index.as_hnsw().sorted_ids() {
            assert_eq!(store.get(id).unwrap(), rstore.get(id).unwrap());
        }
        let q = [3.0f32, 1.0, 2.0];
        assert_eq!(
            index.search(&q, 5).unwrap(),
            rindex.search(&q, 5).unwrap()
        );
    }

    #[test]
    fn test_save_load_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.zvdb");
        let (store, index) = sample_state(0);
        save(&path, DistanceMetric::Euclidean, &store, &index).unwrap();
        let (rstore, rindex) = load(&path, &sample_config()).unwrap();
        assert_eq!(rstore.count(), 0);
        assert!(rindex.is_empty());
    }

    #[test]
    fn test_load_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zero.zvdb");
        std::fs::write(&path, b"").unwrap();
        assert!(matches!(load(&path, &sample_config()), Err(Error::EmptyFile)));
    }

    #[test]
    fn test_load_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.zvdb");
        std::fs::write(&path, b"NOPE............").unwrap();
        assert!(matches!(
            load(&path, &sample_config()),
            Err(Error::InvalidMagicNumber)
        ));
    }

    #[test]
    fn test_load_unsupported_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vers.zvdb");
        let (store, index) = sample_state(2);
        save(&path, DistanceMetric::Euclidean, &store, &index).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[4] = 9; // version field
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            load(&path, &sample_config()),
            Err(Error::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn test_load_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.zvdb");
        let (store, index) = sample_state(10);
        save(&path, DistanceMetric::Euclidean, &store, &index).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() * 2 / 3]).unwrap();
        assert!(matches!(
            load(&path, &sample_config()),
            Err(Error::Truncated)
        ));
    }

    #[test]
    fn test_load_dimension_mismatch_with_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dims.zvdb");
        let (store, index) = sample_state(2);
        save(&path, DistanceMetric::Euclidean, &store, &index).unwrap();
        let mut cfg = sample_config();
        cfg.dimension = 8;
        assert!(matches!(
            load(&path, &cfg),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_load_metric_mismatch_with_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metric.zvdb");
        let (store, index) = sample_state(2);
        save(&path, DistanceMetric::Euclidean, &store, &index).unwrap();
        let mut cfg = sample_config();
        cfg.distance_metric = DistanceMetric::Cosine;
        assert!(matches!(
            load(&path, &cfg),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_load_detects_keyset_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skew.zvdb");
        let (mut store, index) = sample_state(5);
        // store loses an id the graph still carries
        store.delete(2).unwrap();
        store.add(99, &[0.0, 0.0, 0.0], b"stray").unwrap();
        save(&path, DistanceMetric::Euclidean, &store, &index).unwrap();
        assert!(matches!(
            load(&path, &sample_config()),
            Err(Error::Corrupted(_))
        ));
    }

    #[test]
    fn test_save_overwrites_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.zvdb");
        let (store, index) = sample_state(3);
        save(&path, DistanceMetric::Euclidean, &store, &index).unwrap();
        let (store2, index2) = sample_state(7);
        save(&path, DistanceMetric::Euclidean, &store2, &index2).unwrap();
        let (rstore, _) = load(&path, &sample_config()).unwrap();
        assert_eq!(rstore.count(), 7);
    }
}
