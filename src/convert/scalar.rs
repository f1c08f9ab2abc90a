//! Branchless scalar conversion between binary16 and binary32 bit patterns.
//!
//! Both directions lean on the same observation: a half value `h` and the
//! binary32 whose bits are `h.to_bits() << 13` differ by exactly `2^112`
//! (the gap between the two exponent biases, 127 - 15). Rebiasing is then a
//! single add on an exponent field, and floating-point hardware does the
//! normalization and rounding work that would otherwise need branches.

use half::f16;

pub(crate) const SINGLE_SIGN: u32 = 0x8000_0000;
pub(crate) const SINGLE_MAGNITUDE: u32 = 0x7FFF_FFFF;
pub(crate) const SINGLE_EXPONENT: u32 = 0x7F80_0000;
pub(crate) const SINGLE_QUIET_BIT: u32 = 0x0040_0000;

pub(crate) const HALF_SIGN: u32 = 0x8000;
pub(crate) const HALF_MAGNITUDE: u32 = 0x7FFF;
pub(crate) const HALF_EXPONENT: u32 = 0x7C00;
pub(crate) const HALF_MANTISSA: u32 = 0x03FF;
pub(crate) const HALF_QUIET_NAN: u32 = 0x7E00;

/// Distance between the binary16 and binary32 mantissa fields.
pub(crate) const MANTISSA_SHIFT: u32 = 13;
/// `(127 - 15) << 23`: exponent rebias applied to binary32 bits.
pub(crate) const SINGLE_REBIAS: u32 = 0x3800_0000;
/// `(127 - 15) << 52`: exponent rebias applied to binary64 bits.
const DOUBLE_REBIAS: u64 = 0x0700_0000_0000_0000;
/// 65520.0, the smallest binary32 magnitude that rounds to half Infinity.
pub(crate) const NARROW_CLAMP: u32 = 0x477F_F000;
/// 2^-14, the smallest normal half. Rounding below it uses the subnormal quantum.
pub(crate) const HALF_NORMAL_FLOOR: u32 = 0x3880_0000;
/// `13 << 23`: lifts `2^E` to `2^(E + 13)`, whose ulp is half's quantum at `2^E`.
pub(crate) const ROUNDING_LIFT: u32 = 0x0680_0000;

/// All-ones when `predicate` holds, zero otherwise.
#[inline(always)]
pub(crate) const fn mask(predicate: bool) -> u32 {
    (predicate as u32).wrapping_neg()
}

/// Widen a binary16 bit pattern to the binary32 bit pattern of the same value.
///
/// Exact for every non-NaN input. NaN inputs produce a quiet NaN with the same
/// sign and the payload shifted into the high mantissa bits.
#[inline]
pub fn half_to_single(bits: u16) -> u32 {
    let h = u32::from(bits);
    let sign = (h & HALF_SIGN) << 16;
    let magnitude = h & HALF_MAGNITUDE;
    let inf_or_nan = mask(magnitude >= HALF_EXPONENT);
    let nan = mask(magnitude > HALF_EXPONENT);

    // `scaled` is h * 2^-112 (a binary32 subnormal when h is). Widening it to
    // f64 normalizes it, and the rebias add lands on the double's exponent
    // field regardless of which kind of value it came from. Zero becomes
    // 2^-911, which narrows back to zero.
    let scaled = f32::from_bits(magnitude << MANTISSA_SHIFT);
    let rebiased = f64::from_bits(f64::from(scaled).to_bits() + DOUBLE_REBIAS);
    let finite = (rebiased as f32).to_bits();

    let special = SINGLE_EXPONENT | (magnitude << MANTISSA_SHIFT) | (nan & SINGLE_QUIET_BIT);
    sign | (finite & !inf_or_nan) | (special & inf_or_nan)
}

/// Narrow a binary32 bit pattern to binary16 with round-to-nearest-even.
///
/// Magnitudes at or above 65520 become Infinity, values below the half
/// subnormal range become zero, and NaN stays NaN (quiet, sign preserved).
#[inline]
pub fn single_to_half(bits: u32) -> u16 {
    let sign = (bits >> 16) & HALF_SIGN;
    let magnitude = bits & SINGLE_MAGNITUDE;
    let not_nan = !mask(f32::from_bits(magnitude).is_nan());

    // NaN magnitudes clamp too; their lane is replaced below.
    let clamped = magnitude.min(NARROW_CLAMP);
    let lift = (clamped.max(HALF_NORMAL_FLOOR) & SINGLE_EXPONENT) + ROUNDING_LIFT;

    // Adding 2^(E+13) leaves exactly ten mantissa bits below 2^E in the sum,
    // so the addition itself performs the round-to-nearest-even step.
    let rounded = f32::from_bits(clamped) + f32::from_bits(lift);
    let rebased = f32::from_bits(rounded.to_bits().wrapping_sub(SINGLE_REBIAS));
    let narrowed = (rebased - f32::from_bits(lift - SINGLE_REBIAS)).to_bits() >> MANTISSA_SHIFT;

    let quiet_nan = HALF_QUIET_NAN | ((magnitude >> MANTISSA_SHIFT) & HALF_MANTISSA);
    ((narrowed & not_nan) | (quiet_nan & !not_nan) | sign) as u16
}

#[inline]
pub fn f16_to_f32(value: f16) -> f32 {
    f32::from_bits(half_to_single(value.to_bits()))
}

#[inline]
pub fn f32_to_f16(value: f32) -> f16 {
    f16::from_bits(single_to_half(value.to_bits()))
}

/// # Safety
///
/// `src` must be valid for `count` reads and `dst` for `count` writes.
pub(crate) unsafe fn half_to_single_scalar_unchecked(src: *const u16, dst: *mut u32, count: usize) {
    for i in 0..count {
        unsafe {
            let bits = std::ptr::read_unaligned(src.add(i));
            std::ptr::write_unaligned(dst.add(i), half_to_single(bits));
        }
    }
}

/// # Safety
///
/// `src` must be valid for `count` reads and `dst` for `count` writes.
pub(crate) unsafe fn single_to_half_scalar_unchecked(src: *const u32, dst: *mut u16, count: usize) {
    for i in 0..count {
        unsafe {
            let bits = std::ptr::read_unaligned(src.add(i));
            std::ptr::write_unaligned(dst.add(i), single_to_half(bits));
        }
    }
}
