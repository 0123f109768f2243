//! Distance metrics for vector similarity.
//!
//! Three metrics are supported: euclidean (true L2), manhattan (L1), and
//! cosine. All return a distance where **lower is better**. Cosine uses the
//! angular form `acos(clamp(dot/(|a|·|b|), -1, 1)) / π`, which is a proper
//! metric in \[0, 1\] (unlike `1 - similarity`); zero-magnitude operands
//! yield 0 when both are zero and 1 otherwise.
//!
//! The f32 path dispatches into SIMD kernels ([`simd`]); [`kernels`] holds
//! the scalar implementations for wider floats and signed integers.

/// Generic scalar kernels for f64 and signed integer vectors.
pub mod kernels;
/// SIMD-accelerated f32 kernels (AVX2+FMA / NEON / scalar fallback).
pub mod simd;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Scalar element type of the vectors an index is configured for.
///
/// `F32` is the primary type; the index and the on-disk format store f32.
/// The remaining kinds are accepted by the standalone kernels in [`kernels`]
/// and drive metric/type validation ([`DistanceMetric::supports`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalarKind {
    /// 32-bit IEEE-754 float (primary).
    #[default]
    F32,
    /// 64-bit IEEE-754 float.
    F64,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
}

impl ScalarKind {
    /// True for floating-point kinds.
    pub fn is_float(self) -> bool {
        matches!(self, ScalarKind::F32 | ScalarKind::F64)
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
        }
    }
}

/// Distance function used for similarity computation.
///
/// The discriminants match the `distance_metric` byte of the `.zvdb` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// True L2 distance: `sqrt(Σ (a_i - b_i)²)`. Range: \[0, ∞).
    Euclidean,
    /// L1 distance: `Σ |a_i - b_i|`. Range: \[0, ∞).
    Manhattan,
    /// Angular distance: `acos(cos_sim) / π`. Range: \[0, 1\].
    Cosine,
}

impl DistanceMetric {
    /// Header byte for this metric.
    pub fn as_u8(self) -> u8 {
        match self {
            DistanceMetric::Euclidean => 0,
            DistanceMetric::Manhattan => 1,
            DistanceMetric::Cosine => 2,
        }
    }

    /// Parse a header byte back into a metric.
    pub fn from_u8(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(DistanceMetric::Euclidean),
            1 => Ok(DistanceMetric::Manhattan),
            2 => Ok(DistanceMetric::Cosine),
            other => Err(Error::InvalidFormat(format!(
                "unknown distance metric tag {other}"
            ))),
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Manhattan => "manhattan",
            DistanceMetric::Cosine => "cosine",
        }
    }

    /// Whether this metric is defined for the given scalar type.
    ///
    /// Cosine requires floating point; euclidean and manhattan are defined
    /// for every supported kind.
    pub fn supports(self, scalar: ScalarKind) -> bool {
        match self {
            DistanceMetric::Cosine => scalar.is_float(),
            DistanceMetric::Euclidean | DistanceMetric::Manhattan => true,
        }
    }

    /// Compute the distance between two equal-length f32 vectors.
    ///
    /// Hot-path entry: lengths are checked with `debug_assert!` only. Callers
    /// inside the index validate dimensions once at the API boundary; external
    /// callers should use [`try_distance`](Self::try_distance).
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len(), "distance operands must have equal length");
        match self {
            DistanceMetric::Euclidean => simd::euclidean_sq_f32(a, b).sqrt(),
            DistanceMetric::Manhattan => simd::manhattan_f32(a, b),
            DistanceMetric::Cosine => {
                let (dot, norm_a_sq, norm_b_sq) = simd::cosine_parts_f32(a, b);
                angular_distance(dot, norm_a_sq, norm_b_sq)
            }
        }
    }

    /// Checked variant of [`distance`](Self::distance): fails with
    /// `DimensionMismatch` on unequal or empty operands.
    pub fn try_distance(self, a: &[f32], b: &[f32]) -> Result<f32> {
        if a.len() != b.len() || a.is_empty() {
            return Err(Error::DimensionMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }
        Ok(self.distance(a, b))
    }
}

/// Fold dot product and squared norms into the angular cosine distance.
///
/// The clamp guards against `|dot| / (|a|·|b|)` drifting past 1 from
/// floating-point rounding, which would make `acos` return NaN.
#[inline]
fn angular_distance(dot: f32, norm_a_sq: f32, norm_b_sq: f32) -> f32 {
    let a_zero = norm_a_sq <= f32::EPSILON;
    let b_zero = norm_b_sq <= f32::EPSILON;
    if a_zero || b_zero {
        return if a_zero && b_zero { 0.0 } else { 1.0 };
    }
    let cos = dot / (norm_a_sq.sqrt() * norm_b_sq.sqrt());
    cos.clamp(-1.0, 1.0).acos() / std::f32::consts::PI
}
