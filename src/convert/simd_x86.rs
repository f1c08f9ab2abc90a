use super::lane::HIDDEN_BIT;
use super::scalar::{
    HALF_EXPONENT, HALF_MAGNITUDE, HALF_MANTISSA, HALF_NORMAL_FLOOR, HALF_QUIET_NAN, HALF_SIGN,
    NARROW_CLAMP, ROUNDING_LIFT, SINGLE_EXPONENT, SINGLE_MAGNITUDE, SINGLE_QUIET_BIT,
    SINGLE_REBIAS, SINGLE_SIGN, half_to_single_scalar_unchecked, single_to_half_scalar_unchecked,
};

/// Elements converted per loop iteration: two 256-bit registers of binary32.
pub(crate) const AVX2_BATCH: usize = 16;

// ---------------------------------------------------------------------------
// binary16 -> binary32
// ---------------------------------------------------------------------------
//
// Same steps as `lane::half_to_single_lane`, eight lanes at a time. Halves
// are zero-extended to 32 bits on load, so every comparison below works on
// small non-negative integers and the signed compares are safe.

#[target_feature(enable = "avx2")]
pub(crate) unsafe fn half_to_single_avx2_unchecked(src: *const u16, dst: *mut u32, count: usize) {
    use std::arch::x86_64::*;

    unsafe {
        let sign_mask = _mm256_set1_epi32(HALF_SIGN as i32);
        let magnitude_mask = _mm256_set1_epi32(HALF_MAGNITUDE as i32);
        let exponent_mask = _mm256_set1_epi32(HALF_EXPONENT as i32);
        let rebias = _mm256_set1_epi32(SINGLE_REBIAS as i32);
        let hidden_bit = _mm256_set1_epi32(HIDDEN_BIT as i32);
        let normal_floor = _mm256_set1_epi32(HALF_NORMAL_FLOOR as i32);
        let single_exponent = _mm256_set1_epi32(SINGLE_EXPONENT as i32);
        let quiet_bit = _mm256_set1_epi32(SINGLE_QUIET_BIT as i32);
        let zero = _mm256_setzero_si256();

        macro_rules! widen8 {
            ($h:expr) => {{
                let h = $h;
                let sign = _mm256_slli_epi32(_mm256_and_si256(h, sign_mask), 16);
                let magnitude = _mm256_and_si256(h, magnitude_mask);
                let exponent = _mm256_and_si256(h, exponent_mask);

                let zero_exponent = _mm256_cmpeq_epi32(exponent, zero);
                let inf_or_nan = _mm256_cmpeq_epi32(exponent, exponent_mask);
                let nan = _mm256_cmpgt_epi32(magnitude, exponent_mask);

                // Zero and subnormal lanes get the implicit bit of 2^-14 added
                // and 2^-14 subtracted back in f32, which normalizes them.
                let shifted = _mm256_slli_epi32(magnitude, 13);
                let rebiased = _mm256_add_epi32(
                    _mm256_add_epi32(shifted, rebias),
                    _mm256_and_si256(zero_exponent, hidden_bit),
                );
                let correction = _mm256_and_si256(zero_exponent, normal_floor);
                let finite = _mm256_castps_si256(_mm256_sub_ps(
                    _mm256_castsi256_ps(rebiased),
                    _mm256_castsi256_ps(correction),
                ));

                let special = _mm256_or_si256(
                    _mm256_or_si256(single_exponent, shifted),
                    _mm256_and_si256(nan, quiet_bit),
                );
                let merged = _mm256_or_si256(
                    _mm256_andnot_si256(inf_or_nan, finite),
                    _mm256_and_si256(inf_or_nan, special),
                );
                _mm256_or_si256(merged, sign)
            }};
        }

        let mut src_ptr = src;
        let mut dst_ptr = dst;
        let mut remaining = count;

        while remaining >= AVX2_BATCH {
            let h0 = _mm256_cvtepu16_epi32(_mm_loadu_si128(src_ptr as *const __m128i));
            let h1 = _mm256_cvtepu16_epi32(_mm_loadu_si128(src_ptr.add(8) as *const __m128i));

            let s0 = widen8!(h0);
            let s1 = widen8!(h1);

            _mm256_storeu_si256(dst_ptr as *mut __m256i, s0);
            _mm256_storeu_si256(dst_ptr.add(8) as *mut __m256i, s1);

            src_ptr = src_ptr.add(AVX2_BATCH);
            dst_ptr = dst_ptr.add(AVX2_BATCH);
            remaining -= AVX2_BATCH;
        }

        // Scalar tail
        if remaining > 0 {
            half_to_single_scalar_unchecked(src_ptr, dst_ptr, remaining);
        }
    } // unsafe
}

// ---------------------------------------------------------------------------
// binary32 -> binary16
// ---------------------------------------------------------------------------
//
// Same steps as `lane::single_to_half_lane`. The two result registers hold
// values no wider than 16 bits, so `packus_epi32` narrows them without
// saturating; it packs within 128-bit halves, and the final
// `permute4x64(0b11_01_10_00)` restores source order.

#[target_feature(enable = "avx2")]
pub(crate) unsafe fn single_to_half_avx2_unchecked(src: *const u32, dst: *mut u16, count: usize) {
    use std::arch::x86_64::*;

    unsafe {
        let sign_mask = _mm256_set1_epi32(SINGLE_SIGN as i32);
        let magnitude_mask = _mm256_set1_epi32(SINGLE_MAGNITUDE as i32);
        let clamp = _mm256_castsi256_ps(_mm256_set1_epi32(NARROW_CLAMP as i32));
        let normal_floor = _mm256_set1_epi32(HALF_NORMAL_FLOOR as i32);
        let exponent_mask = _mm256_set1_epi32(SINGLE_EXPONENT as i32);
        let rounding_lift = _mm256_set1_epi32(ROUNDING_LIFT as i32);
        let rebias = _mm256_set1_epi32(SINGLE_REBIAS as i32);
        let quiet_nan = _mm256_set1_epi32(HALF_QUIET_NAN as i32);
        let mantissa_mask = _mm256_set1_epi32(HALF_MANTISSA as i32);

        macro_rules! narrow8 {
            ($x:expr) => {{
                let x = $x;
                let sign = _mm256_srli_epi32(_mm256_and_si256(x, sign_mask), 16);
                let magnitude = _mm256_and_si256(x, magnitude_mask);
                let value = _mm256_castsi256_ps(magnitude);
                let not_nan = _mm256_castps_si256(_mm256_cmp_ps(value, value, _CMP_ORD_Q));

                // vminps keeps the second operand for NaN lanes.
                let clamped = _mm256_castps_si256(_mm256_min_ps(clamp, value));
                let lift = _mm256_add_epi32(
                    _mm256_and_si256(_mm256_max_epu32(clamped, normal_floor), exponent_mask),
                    rounding_lift,
                );

                let rounded = _mm256_add_ps(_mm256_castsi256_ps(clamped), _mm256_castsi256_ps(lift));
                let rebased = _mm256_sub_epi32(_mm256_castps_si256(rounded), rebias);
                let unlift = _mm256_sub_epi32(lift, rebias);
                let narrowed = _mm256_srli_epi32(
                    _mm256_castps_si256(_mm256_sub_ps(
                        _mm256_castsi256_ps(rebased),
                        _mm256_castsi256_ps(unlift),
                    )),
                    13,
                );

                let nan_bits = _mm256_or_si256(
                    quiet_nan,
                    _mm256_and_si256(_mm256_srli_epi32(magnitude, 13), mantissa_mask),
                );
                let merged = _mm256_or_si256(
                    _mm256_and_si256(not_nan, narrowed),
                    _mm256_andnot_si256(not_nan, nan_bits),
                );
                _mm256_or_si256(merged, sign)
            }};
        }

        let mut src_ptr = src;
        let mut dst_ptr = dst;
        let mut remaining = count;

        while remaining >= AVX2_BATCH {
            let x0 = _mm256_loadu_si256(src_ptr as *const __m256i);
            let x1 = _mm256_loadu_si256(src_ptr.add(8) as *const __m256i);

            let h0 = narrow8!(x0);
            let h1 = narrow8!(x1);

            let packed = _mm256_permute4x64_epi64(_mm256_packus_epi32(h0, h1), 0b11_01_10_00);
            _mm256_storeu_si256(dst_ptr as *mut __m256i, packed);

            src_ptr = src_ptr.add(AVX2_BATCH);
            dst_ptr = dst_ptr.add(AVX2_BATCH);
            remaining -= AVX2_BATCH;
        }

        // Scalar tail
        if remaining > 0 {
            single_to_half_scalar_unchecked(src_ptr, dst_ptr, remaining);
        }
    } // unsafe
}
