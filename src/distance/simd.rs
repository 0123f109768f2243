//! SIMD-accelerated f32 distance kernels.
//!
//! Provides NEON (aarch64) and AVX2+FMA (x86_64) implementations of the
//! squared-euclidean, manhattan, and cosine-parts computations. Falls back to
//! chunked scalar loops on unsupported platforms or when AVX2 is unavailable
//! at runtime. Results match the scalar versions modulo floating-point
//! associativity; result *ordering* is stabilized by the id tie-break in the
//! search layer.

// ============================================================================
// Public dispatch functions
// ============================================================================

/// Squared euclidean distance between two f32 slices.
#[inline]
#[allow(unreachable_code)]
pub fn euclidean_sq_f32(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { neon_euclidean_sq_f32(a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            return unsafe { avx2_euclidean_sq_f32(a, b) };
        }
    }
    scalar_euclidean_sq_f32(a, b)
}

/// Manhattan (L1) distance between two f32 slices.
#[inline]
#[allow(unreachable_code)]
pub fn manhattan_f32(a: &[f32], b: &[f32]) -> f32 {
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { neon_manhattan_f32(a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            return unsafe { avx2_manhattan_f32(a, b) };
        }
    }
    scalar_manhattan_f32(a, b)
}

/// Cosine building blocks in a single pass: `(dot, |a|², |b|²)`.
/// The caller folds these into the angular distance, including the
/// zero-magnitude rules.
#[inline]
#[allow(unreachable_code)]
pub fn cosine_parts_f32(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    #[cfg(target_arch = "aarch64")]
    {
        return unsafe { neon_cosine_parts_f32(a, b) };
    }
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("avx2") && std::arch::is_x86_feature_detected!("fma")
        {
            return unsafe { avx2_cosine_parts_f32(a, b) };
        }
    }
    scalar_cosine_parts_f32(a, b)
}

// ============================================================================
// Scalar fallbacks
// ============================================================================

fn scalar_euclidean_sq_f32(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn scalar_manhattan_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;
    for i in 0..a.len() {
        sum += (a[i] - b[i]).abs();
    }
    sum
}

fn scalar_cosine_parts_f32(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    (dot, norm_a, norm_b)
}

// ============================================================================
// NEON implementations (aarch64)
// ============================================================================

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

#[cfg(target_arch = "aarch64")]
unsafe fn neon_euclidean_sq_f32(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let pa = a.as_ptr();
    let pb = b.as_ptr();

    // Two independent accumulators over an 8-float stride hide FMA latency
    let mut sq_lo = vdupq_n_f32(0.0);
    let mut sq_hi = vdupq_n_f32(0.0);

    let mut i = 0;
    while i + 8 <= n {
        let d_lo = vsubq_f32(vld1q_f32(pa.add(i)), vld1q_f32(pb.add(i)));
        let d_hi = vsubq_f32(vld1q_f32(pa.add(i + 4)), vld1q_f32(pb.add(i + 4)));
        sq_lo = vfmaq_f32(sq_lo, d_lo, d_lo);
        sq_hi = vfmaq_f32(sq_hi, d_hi, d_hi);
        i += 8;
    }

    let mut sum = vaddvq_f32(vaddq_f32(sq_lo, sq_hi));
    while i < n {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }
    sum
}

#[cfg(target_arch = "aarch64")]
unsafe fn neon_manhattan_f32(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len();
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut s0 = vdupq_n_f32(0.0);
    let mut s1 = vdupq_n_f32(0.0);
    let mut s2 = vdupq_n_f32(0.0);
    let mut s3 = vdupq_n_f32(0.0);

    let chunks = len / 16;
    for i in 0..chunks {
        let base = i * 16;
        // vabdq computes |a - b| in one instruction
        s0 = vaddq_f32(
            s0,
            vabdq_f32(vld1q_f32(a_ptr.add(base)), vld1q_f32(b_ptr.add(base))),
        );
        s1 = vaddq_f32(
            s1,
            vabdq_f32(
                vld1q_f32(a_ptr.add(base + 4)),
                vld1q_f32(b_ptr.add(base + 4)),
            ),
        );
        s2 = vaddq_f32(
            s2,
            vabdq_f32(
                vld1q_f32(a_ptr.add(base + 8)),
                vld1q_f32(b_ptr.add(base + 8)),
            ),
        );
        s3 = vaddq_f32(
            s3,
            vabdq_f32(
                vld1q_f32(a_ptr.add(base + 12)),
                vld1q_f32(b_ptr.add(base + 12)),
            ),
        );
    }

    let mut sum = vaddvq_f32(vaddq_f32(vaddq_f32(s0, s1), vaddq_f32(s2, s3)));

    for i in (chunks * 16)..len {
        sum += (*a_ptr.add(i) - *b_ptr.add(i)).abs();
    }
    sum
}

#[cfg(target_arch = "aarch64")]
unsafe fn neon_cosine_parts_f32(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    let len = a.len();
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut dot0 = vdupq_n_f32(0.0);
    let mut dot1 = vdupq_n_f32(0.0);
    let mut na0 = vdupq_n_f32(0.0);
    let mut na1 = vdupq_n_f32(0.0);
    let mut nb0 = vdupq_n_f32(0.0);
    let mut nb1 = vdupq_n_f32(0.0);

    let chunks = len / 8;
    for i in 0..chunks {
        let base = i * 8;
        let a0 = vld1q_f32(a_ptr.add(base));
        let a1 = vld1q_f32(a_ptr.add(base + 4));
        let b0 = vld1q_f32(b_ptr.add(base));
        let b1 = vld1q_f32(b_ptr.add(base + 4));
        dot0 = vfmaq_f32(dot0, a0, b0);
        dot1 = vfmaq_f32(dot1, a1, b1);
        na0 = vfmaq_f32(na0, a0, a0);
        na1 = vfmaq_f32(na1, a1, a1);
        nb0 = vfmaq_f32(nb0, b0, b0);
        nb1 = vfmaq_f32(nb1, b1, b1);
    }

    let mut dot = vaddvq_f32(vaddq_f32(dot0, dot1));
    let mut norm_a = vaddvq_f32(vaddq_f32(na0, na1));
    let mut norm_b = vaddvq_f32(vaddq_f32(nb0, nb1));

    for i in (chunks * 8)..len {
        let ai = *a_ptr.add(i);
        let bi = *b_ptr.add(i);
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    (dot, norm_a, norm_b)
}

// ============================================================================
// AVX2+FMA implementations (x86_64)
// ============================================================================

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

/// Fold the 8 lanes of an AVX register into one f32: collapse the two
/// 128-bit halves, then horizontal-add twice.
#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn sum_lanes(v: __m256) -> f32 {
    let quad = _mm_add_ps(_mm256_castps256_ps128(v), _mm256_extractf128_ps(v, 1));
    let pair = _mm_hadd_ps(quad, quad);
    _mm_cvtss_f32(_mm_hadd_ps(pair, pair))
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn avx2_euclidean_sq_f32(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let pa = a.as_ptr();
    let pb = b.as_ptr();

    let mut acc = _mm256_setzero_ps();
    let mut i = 0;
    while i + 8 <= n {
        let diff = _mm256_sub_ps(_mm256_loadu_ps(pa.add(i)), _mm256_loadu_ps(pb.add(i)));
        acc = _mm256_fmadd_ps(diff, diff, acc);
        i += 8;
    }

    let mut sum = sum_lanes(acc);
    while i < n {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }
    sum
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn avx2_manhattan_f32(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len();
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    // Clearing the sign bit is |x| for IEEE-754
    let abs_mask = _mm256_castsi256_ps(_mm256_set1_epi32(0x7fff_ffff));
    let mut s0 = _mm256_setzero_ps();
    let mut s1 = _mm256_setzero_ps();

    let chunks = len / 16;
    for i in 0..chunks {
        let base = i * 16;
        let d0 = _mm256_sub_ps(
            _mm256_loadu_ps(a_ptr.add(base)),
            _mm256_loadu_ps(b_ptr.add(base)),
        );
        let d1 = _mm256_sub_ps(
            _mm256_loadu_ps(a_ptr.add(base + 8)),
            _mm256_loadu_ps(b_ptr.add(base + 8)),
        );
        s0 = _mm256_add_ps(s0, _mm256_and_ps(d0, abs_mask));
        s1 = _mm256_add_ps(s1, _mm256_and_ps(d1, abs_mask));
    }

    let mut sum = sum_lanes(_mm256_add_ps(s0, s1));

    for i in (chunks * 16)..len {
        sum += (*a_ptr.add(i) - *b_ptr.add(i)).abs();
    }
    sum
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2,fma")]
unsafe fn avx2_cosine_parts_f32(a: &[f32], b: &[f32]) -> (f32, f32, f32) {
    let len = a.len();
    let a_ptr = a.as_ptr();
    let b_ptr = b.as_ptr();

    let mut dot0 = _mm256_setzero_ps();
    let mut dot1 = _mm256_setzero_ps();
    let mut na0 = _mm256_setzero_ps();
    let mut na1 = _mm256_setzero_ps();
    let mut nb0 = _mm256_setzero_ps();
    let mut nb1 = _mm256_setzero_ps();

    let chunks = len / 16;
    for i in 0..chunks {
        let base = i * 16;
        let a0 = _mm256_loadu_ps(a_ptr.add(base));
        let a1 = _mm256_loadu_ps(a_ptr.add(base + 8));
        let b0 = _mm256_loadu_ps(b_ptr.add(base));
        let b1 = _mm256_loadu_ps(b_ptr.add(base + 8));
        dot0 = _mm256_fmadd_ps(a0, b0, dot0);
        dot1 = _mm256_fmadd_ps(a1, b1, dot1);
        na0 = _mm256_fmadd_ps(a0, a0, na0);
        na1 = _mm256_fmadd_ps(a1, a1, na1);
        nb0 = _mm256_fmadd_ps(b0, b0, nb0);
        nb1 = _mm256_fmadd_ps(b1, b1, nb1);
    }

    let mut dot = sum_lanes(_mm256_add_ps(dot0, dot1));
    let mut norm_a = sum_lanes(_mm256_add_ps(na0, na1));
    let mut norm_b = sum_lanes(_mm256_add_ps(nb0, nb1));

    for i in (chunks * 16)..len {
        let ai = *a_ptr.add(i);
        let bi = *b_ptr.add(i);
        dot += ai * bi;
        norm_a += ai * ai;
        norm_b += bi * bi;
    }

    (dot, norm_a, norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pair(len: usize) -> (Vec<f32>, Vec<f32>) {
        // Deterministic, sign-varied values exercising chunk and tail paths
        let a: Vec<f32> = (0..len)
            .map(|i| ((i * 37 + 11) % 97) as f32 / 97.0 - 0.5)
            .collect();
        let b: Vec<f32> = (0..len)
            .map(|i| ((i * 53 + 29) % 89) as f32 / 89.0 - 0.5)
            .collect();
        (a, b)
    }

    #[test]
    fn test_euclidean_matches_scalar() {
        for len in [1, 3, 15, 16, 17, 64, 100, 128, 257] {
            let (a, b) = sample_pair(len);
            let simd = euclidean_sq_f32(&a, &b);
            let scalar = scalar_euclidean_sq_f32(&a, &b);
            assert!(
                (simd - scalar).abs() < 1e-3,
                "len={len}: simd={simd} scalar={scalar}"
            );
        }
    }

    #[test]
    fn test_manhattan_matches_scalar() {
        for len in [1, 3, 15, 16, 17, 64, 100, 128, 257] {
            let (a, b) = sample_pair(len);
            let simd = manhattan_f32(&a, &b);
            let scalar = scalar_manhattan_f32(&a, &b);
            assert!(
                (simd - scalar).abs() < 1e-3,
                "len={len}: simd={simd} scalar={scalar}"
            );
        }
    }

    #[test]
    fn test_cosine_parts_match_scalar() {
        for len in [1, 7, 8, 9, 64, 100, 128, 257] {
            let (a, b) = sample_pair(len);
            let (d, na, nb) = cosine_parts_f32(&a, &b);
            let (sd, sna, snb) = scalar_cosine_parts_f32(&a, &b);
            assert!((d - sd).abs() < 1e-3, "len={len}: dot {d} vs {sd}");
            assert!((na - sna).abs() < 1e-3, "len={len}: |a|² {na} vs {sna}");
            assert!((nb - snb).abs() < 1e-3, "len={len}: |b|² {nb} vs {snb}");
        }
    }

    #[test]
    fn test_euclidean_identical_is_zero() {
        let (a, _) = sample_pair(128);
        assert_eq!(euclidean_sq_f32(&a, &a), 0.0);
        assert_eq!(manhattan_f32(&a, &a), 0.0);
    }
}
