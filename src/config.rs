//! Configuration for zvdb.
//!
//! Compile-time tuning constants and validation limits live here, along with
//! [`DbConfig`], the validated runtime record a [`crate::db::VectorDb`] is
//! opened with.

use crate::distance::{DistanceMetric, ScalarKind};
use crate::error::{Error, Result};
use crate::hnsw::graph::HnswConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of bidirectional links per HNSW node.
///
/// Higher values improve recall but increase memory and build time.
/// Typical range: 8–64. Default: 16.
pub const HNSW_DEFAULT_M: usize = 16;

/// Default ef parameter during HNSW index construction.
///
/// Controls the size of the dynamic candidate list during insertion.
/// Higher values produce a better graph but slow down build time.
pub const HNSW_DEFAULT_EF_CONSTRUCTION: usize = 200;

/// Default ef parameter during HNSW search.
///
/// Controls the size of the dynamic candidate list during query.
/// Higher values improve recall at the cost of latency.
pub const HNSW_DEFAULT_EF_SEARCH: usize = 50;

/// Hard cap on the layer a node can be assigned to.
///
/// Level draws follow `floor(-ln(uniform) / ln(M))`; the cap bounds graph
/// height independently of pathological draws.
pub const HNSW_MAX_LEVEL: usize = 16;

/// Maximum allowed vector dimension, both at configuration time and when
/// judging the plausibility of a file header on load.
pub const MAX_DIMENSION: usize = 1_000_000;

/// Maximum node count accepted when deserializing an index blob.
pub const MAX_NODE_COUNT: usize = 1_000_000;

/// Maximum `max_level` accepted when deserializing an index blob.
pub const MAX_FILE_LEVEL: usize = 100;

/// Maximum total connection count per node accepted when deserializing.
pub const MAX_CONNECTION_COUNT: usize = 1_000_000;

/// Maximum metadata payload length per node accepted when deserializing.
pub const MAX_METADATA_LEN: usize = 1_000_000;

/// Validated configuration for opening a [`crate::db::VectorDb`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Vector length; every vector in the index has exactly this many
    /// components.
    pub dimension: usize,
    /// Distance function for similarity computation.
    pub distance_metric: DistanceMetric,
    /// Scalar element type the metric is validated against. The in-memory
    /// index and the on-disk format store f32; the standalone kernels in
    /// [`crate::distance::kernels`] cover the other kinds.
    #[serde(default)]
    pub scalar: ScalarKind,
    /// HNSW tuning parameters.
    #[serde(default)]
    pub hnsw: HnswConfig,
    /// Default location for `save`/`load` when no explicit path is given.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
    /// When set, level draws come from a seeded generator and index
    /// construction is reproducible.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl DbConfig {
    /// Configuration with default HNSW parameters, no storage path, and an
    /// OS-seeded generator.
    pub fn new(dimension: usize, distance_metric: DistanceMetric) -> Self {
        Self {
            dimension,
            distance_metric,
            scalar: ScalarKind::F32,
            hnsw: HnswConfig::default(),
            storage_path: None,
            rng_seed: None,
        }
    }

    /// Check the configuration before any state is built from it.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::InvalidConfiguration(
                "dimension must be at least 1".into(),
            ));
        }
        if self.dimension > MAX_DIMENSION {
            return Err(Error::InvalidConfiguration(format!(
                "dimension {} exceeds maximum {}",
                self.dimension, MAX_DIMENSION
            )));
        }
        if self.hnsw.m == 0 {
            return Err(Error::InvalidConfiguration("M must be at least 1".into()));
        }
        if self.hnsw.m_max0 < self.hnsw.m {
            return Err(Error::InvalidConfiguration(format!(
                "m_max0 ({}) must be at least M ({})",
                self.hnsw.m_max0, self.hnsw.m
            )));
        }
        if self.hnsw.ef_construction == 0 {
            return Err(Error::InvalidConfiguration(
                "ef_construction must be at least 1".into(),
            ));
        }
        if self.hnsw.ef_search == 0 {
            return Err(Error::InvalidConfiguration(
                "ef_search must be at least 1".into(),
            ));
        }
        if !self.distance_metric.supports(self.scalar) {
            return Err(Error::UnsupportedMetricForType {
                metric: self.distance_metric.name(),
                scalar: self.scalar.name(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = DbConfig::new(128, DistanceMetric::Cosine);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.hnsw.m, HNSW_DEFAULT_M);
        assert_eq!(cfg.hnsw.m_max0, HNSW_DEFAULT_M * 2);
        assert_eq!(cfg.hnsw.ef_construction, HNSW_DEFAULT_EF_CONSTRUCTION);
        assert_eq!(cfg.hnsw.ef_search, HNSW_DEFAULT_EF_SEARCH);
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let cfg = DbConfig::new(0, DistanceMetric::Euclidean);
        assert!(matches!(
            cfg.validate(),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_oversized_dimension_rejected() {
        let cfg = DbConfig::new(MAX_DIMENSION + 1, DistanceMetric::Euclidean);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_m_rejected() {
        let mut cfg = DbConfig::new(8, DistanceMetric::Euclidean);
        cfg.hnsw.m = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_m_max0_below_m_rejected() {
        let mut cfg = DbConfig::new(8, DistanceMetric::Euclidean);
        cfg.hnsw.m_max0 = cfg.hnsw.m - 1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_zero_ef_rejected() {
        let mut cfg = DbConfig::new(8, DistanceMetric::Euclidean);
        cfg.hnsw.ef_construction = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = DbConfig::new(8, DistanceMetric::Euclidean);
        cfg.hnsw.ef_search = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_cosine_over_integers_rejected() {
        let mut cfg = DbConfig::new(8, DistanceMetric::Cosine);
        cfg.scalar = ScalarKind::I32;
        assert!(matches!(
            cfg.validate(),
            Err(Error::UnsupportedMetricForType { .. })
        ));
    }

    #[test]
    fn test_euclidean_over_integers_accepted() {
        let mut cfg = DbConfig::new(8, DistanceMetric::Euclidean);
        cfg.scalar = ScalarKind::I16;
        assert!(cfg.validate().is_ok());
    }
}
