//! Single-lane SSE2 formulations of the scalar conversions.
//!
//! Every step here is a 128-bit register operation with a direct 256-bit
//! AVX2 counterpart in `simd_x86.rs`, so these functions are the one-lane
//! proof that the bulk kernels compute the same thing as the scalar engine.
//! SSE2 is part of the x86_64 baseline and needs no runtime detection.

use super::scalar::{
    HALF_EXPONENT, HALF_MAGNITUDE, HALF_MANTISSA, HALF_NORMAL_FLOOR, HALF_QUIET_NAN, HALF_SIGN,
    NARROW_CLAMP, ROUNDING_LIFT, SINGLE_EXPONENT, SINGLE_MAGNITUDE, SINGLE_QUIET_BIT,
    SINGLE_REBIAS, SINGLE_SIGN,
};
use std::arch::x86_64::*;

/// `0x0080_0000`: the implicit leading bit that turns a zero-exponent half
/// into `2^-14 + m * 2^-24` once rebiased.
pub(crate) const HIDDEN_BIT: u32 = 0x0080_0000;

/// Lane-form of [`half_to_single`](super::half_to_single).
///
/// Instead of widening through f64, zero/subnormal inputs borrow the
/// implicit bit of the smallest normal and subtract `2^-14` back out in f32.
pub fn half_to_single_lane(bits: u16) -> u32 {
    unsafe {
        let h = _mm_cvtsi32_si128(i32::from(bits));
        let sign = _mm_slli_epi32(_mm_and_si128(h, splat(HALF_SIGN)), 16);
        let magnitude = _mm_and_si128(h, splat(HALF_MAGNITUDE));
        let exponent = _mm_and_si128(h, splat(HALF_EXPONENT));

        let zero_exponent = _mm_cmpeq_epi32(exponent, _mm_setzero_si128());
        let inf_or_nan = _mm_cmpeq_epi32(exponent, splat(HALF_EXPONENT));
        let nan = _mm_cmpgt_epi32(magnitude, splat(HALF_EXPONENT));

        let shifted = _mm_slli_epi32(magnitude, 13);
        let rebiased = _mm_add_epi32(
            _mm_add_epi32(shifted, splat(SINGLE_REBIAS)),
            _mm_and_si128(zero_exponent, splat(HIDDEN_BIT)),
        );
        let correction = _mm_and_si128(zero_exponent, splat(HALF_NORMAL_FLOOR));
        let finite = _mm_castps_si128(_mm_sub_ps(
            _mm_castsi128_ps(rebiased),
            _mm_castsi128_ps(correction),
        ));

        let special = _mm_or_si128(
            _mm_or_si128(splat(SINGLE_EXPONENT), shifted),
            _mm_and_si128(nan, splat(SINGLE_QUIET_BIT)),
        );
        let merged = _mm_or_si128(
            _mm_andnot_si128(inf_or_nan, finite),
            _mm_and_si128(inf_or_nan, special),
        );
        _mm_cvtsi128_si32(_mm_or_si128(merged, sign)) as u32
    }
}

/// Lane-form of [`single_to_half`](super::single_to_half).
pub fn single_to_half_lane(bits: u32) -> u16 {
    unsafe {
        let x = _mm_cvtsi32_si128(bits as i32);
        let sign = _mm_srli_epi32(_mm_and_si128(x, splat(SINGLE_SIGN)), 16);
        let magnitude = _mm_and_si128(x, splat(SINGLE_MAGNITUDE));
        let value = _mm_castsi128_ps(magnitude);
        let not_nan = _mm_castps_si128(_mm_cmpord_ps(value, value));

        // minps returns its second operand when either is NaN, so NaN lanes
        // pass through unclamped.
        let clamped = _mm_castps_si128(_mm_min_ps(_mm_castsi128_ps(splat(NARROW_CLAMP)), value));
        // Both operands are below 2^31, so a signed compare orders them.
        let below_floor = _mm_cmpgt_epi32(splat(HALF_NORMAL_FLOOR), clamped);
        let floored = _mm_or_si128(
            _mm_and_si128(below_floor, splat(HALF_NORMAL_FLOOR)),
            _mm_andnot_si128(below_floor, clamped),
        );
        let lift = _mm_add_epi32(
            _mm_and_si128(floored, splat(SINGLE_EXPONENT)),
            splat(ROUNDING_LIFT),
        );

        let rounded = _mm_add_ps(_mm_castsi128_ps(clamped), _mm_castsi128_ps(lift));
        let rebased = _mm_sub_epi32(_mm_castps_si128(rounded), splat(SINGLE_REBIAS));
        let unlift = _mm_sub_epi32(lift, splat(SINGLE_REBIAS));
        let narrowed = _mm_srli_epi32(
            _mm_castps_si128(_mm_sub_ps(
                _mm_castsi128_ps(rebased),
                _mm_castsi128_ps(unlift),
            )),
            13,
        );

        let quiet_nan = _mm_or_si128(
            splat(HALF_QUIET_NAN),
            _mm_and_si128(_mm_srli_epi32(magnitude, 13), splat(HALF_MANTISSA)),
        );
        let merged = _mm_or_si128(
            _mm_and_si128(not_nan, narrowed),
            _mm_andnot_si128(not_nan, quiet_nan),
        );
        _mm_cvtsi128_si32(_mm_or_si128(merged, sign)) as u16
    }
}

#[inline(always)]
fn splat(value: u32) -> __m128i {
    unsafe { _mm_set1_epi32(value as i32) }
}
