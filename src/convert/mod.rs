#[cfg(target_arch = "x86_64")]
mod lane;
mod parallel;
pub(crate) mod scalar;
#[cfg(target_arch = "x86_64")]
mod simd_x86;

use crate::capability::Capabilities;
use crate::env_config;
use crate::error::{ConvertError, ConvertResult};
use half::f16;
use parallel::ParallelConfig;
use std::sync::OnceLock;

#[cfg(target_arch = "x86_64")]
pub use lane::{half_to_single_lane, single_to_half_lane};
pub use scalar::{f16_to_f32, f32_to_f16, half_to_single, single_to_half};

/// Pre-initialize one-time resources (capability detection, kernel
/// selection, the conversion thread pool) so the first bulk call doesn't pay
/// for them. Safe to call multiple times.
pub fn warmup() {
    let _ = Capabilities::detect();
    let _ = widen_kernel();
    let _ = narrow_kernel();
    parallel::warmup_pool(parallel_config());
}

const PARALLEL_MIN_ELEMENTS: usize = 1 << 20;
const PARALLEL_MIN_CHUNK_ELEMENTS: usize = 1 << 16;
const PARALLEL_MAX_WORKERS: usize = 8;

const AVX2: &str = "avx2";

type WidenKernel = unsafe fn(*const u16, *mut u32, usize);
type NarrowKernel = unsafe fn(*const u32, *mut u16, usize);

// ---------------------------------------------------------------------------
// binary16 -> binary32
// ---------------------------------------------------------------------------

/// Widens `min(dst.len(), src.len())` halves into `dst`, using AVX2 when the
/// CPU has it and the scalar engine otherwise. Returns the element count.
pub fn half_to_single_many(dst: &mut [f32], src: &[f16]) -> usize {
    run_widen(widen_kernel(), dst, src)
}

/// [`half_to_single_many`] with an explicit capability set.
pub fn half_to_single_many_with(caps: Capabilities, dst: &mut [f32], src: &[f16]) -> usize {
    let kernel = avx2_widen_kernel(caps).unwrap_or(scalar::half_to_single_scalar_unchecked);
    run_widen(kernel, dst, src)
}

/// AVX2-only widening. Fails with [`ConvertError::UnsupportedHardware`],
/// leaving `dst` untouched, when the CPU lacks AVX2.
pub fn half_to_single_many_avx2(dst: &mut [f32], src: &[f16]) -> ConvertResult<usize> {
    half_to_single_many_avx2_with(Capabilities::detect(), dst, src)
}

/// [`half_to_single_many_avx2`] with an explicit capability set.
pub fn half_to_single_many_avx2_with(
    caps: Capabilities,
    dst: &mut [f32],
    src: &[f16],
) -> ConvertResult<usize> {
    let kernel = avx2_widen_kernel(caps).ok_or_else(|| refuse("half_to_single_many_avx2"))?;
    Ok(run_widen(kernel, dst, src))
}

/// Scalar widening loop; available everywhere.
pub fn half_to_single_many_scalar(dst: &mut [f32], src: &[f16]) -> usize {
    run_widen(scalar::half_to_single_scalar_unchecked, dst, src)
}

/// [`half_to_single_many`] split across the conversion thread pool for
/// large buffers. Produces exactly the same output.
pub fn half_to_single_many_parallel(dst: &mut [f32], src: &[f16]) -> usize {
    let kernel = widen_kernel();
    parallel::convert_chunked(dst, src, parallel_config(), move |dst, src| {
        run_widen(kernel, dst, src);
    })
}

// ---------------------------------------------------------------------------
// binary32 -> binary16
// ---------------------------------------------------------------------------

/// Narrows `min(dst.len(), src.len())` singles into `dst` with the AVX2
/// kernel. Fails with [`ConvertError::UnsupportedHardware`], leaving `dst`
/// untouched, when the CPU lacks AVX2.
pub fn single_to_half_many(dst: &mut [f16], src: &[f32]) -> ConvertResult<usize> {
    single_to_half_many_with(Capabilities::detect(), dst, src)
}

/// [`single_to_half_many`] with an explicit capability set.
pub fn single_to_half_many_with(
    caps: Capabilities,
    dst: &mut [f16],
    src: &[f32],
) -> ConvertResult<usize> {
    let kernel = avx2_narrow_kernel(caps).ok_or_else(|| refuse("single_to_half_many"))?;
    Ok(run_narrow(kernel, dst, src))
}

/// Narrowing that never fails: AVX2 when available, scalar otherwise.
pub fn single_to_half_many_portable(dst: &mut [f16], src: &[f32]) -> usize {
    run_narrow(narrow_kernel(), dst, src)
}

/// Scalar narrowing loop; available everywhere.
pub fn single_to_half_many_scalar(dst: &mut [f16], src: &[f32]) -> usize {
    run_narrow(scalar::single_to_half_scalar_unchecked, dst, src)
}

/// [`single_to_half_many`] split across the conversion thread pool for
/// large buffers. Gated on AVX2 the same way; the capability check happens
/// before any chunk is dispatched.
pub fn single_to_half_many_parallel(dst: &mut [f16], src: &[f32]) -> ConvertResult<usize> {
    single_to_half_many_parallel_with(Capabilities::detect(), dst, src)
}

/// [`single_to_half_many_parallel`] with an explicit capability set.
pub fn single_to_half_many_parallel_with(
    caps: Capabilities,
    dst: &mut [f16],
    src: &[f32],
) -> ConvertResult<usize> {
    let kernel =
        avx2_narrow_kernel(caps).ok_or_else(|| refuse("single_to_half_many_parallel"))?;
    Ok(parallel::convert_chunked(
        dst,
        src,
        parallel_config(),
        move |dst, src| {
            run_narrow(kernel, dst, src);
        },
    ))
}

// ---------------------------------------------------------------------------
// Kernel plumbing
// ---------------------------------------------------------------------------

fn run_widen(kernel: WidenKernel, dst: &mut [f32], src: &[f16]) -> usize {
    let count = dst.len().min(src.len());
    if count > 0 {
        // f16 is a transparent wrapper over u16, and f32 has the size and
        // alignment of u32.
        unsafe {
            kernel(src.as_ptr().cast::<u16>(), dst.as_mut_ptr().cast::<u32>(), count);
        }
    }
    count
}

fn run_narrow(kernel: NarrowKernel, dst: &mut [f16], src: &[f32]) -> usize {
    let count = dst.len().min(src.len());
    if count > 0 {
        unsafe {
            kernel(src.as_ptr().cast::<u32>(), dst.as_mut_ptr().cast::<u16>(), count);
        }
    }
    count
}

fn refuse(operation: &'static str) -> ConvertError {
    log::debug!("{operation} refused: {AVX2} not available");
    ConvertError::unsupported(operation, AVX2)
}

fn avx2_widen_kernel(caps: Capabilities) -> Option<WidenKernel> {
    #[cfg(target_arch = "x86_64")]
    {
        if caps.has_avx2() {
            return Some(simd_x86::half_to_single_avx2_unchecked);
        }
    }
    let _ = caps;
    None
}

fn avx2_narrow_kernel(caps: Capabilities) -> Option<NarrowKernel> {
    #[cfg(target_arch = "x86_64")]
    {
        if caps.has_avx2() {
            return Some(simd_x86::single_to_half_avx2_unchecked);
        }
    }
    let _ = caps;
    None
}

/// Best-available widening kernel (AVX2 when possible, scalar fallback).
#[inline(always)]
fn widen_kernel() -> WidenKernel {
    static KERNEL: OnceLock<WidenKernel> = OnceLock::new();
    *KERNEL.get_or_init(select_widen_kernel)
}

/// Best-available narrowing kernel (AVX2 when possible, scalar fallback).
#[inline(always)]
fn narrow_kernel() -> NarrowKernel {
    static KERNEL: OnceLock<NarrowKernel> = OnceLock::new();
    *KERNEL.get_or_init(select_narrow_kernel)
}

fn select_widen_kernel() -> WidenKernel {
    match avx2_widen_kernel(Capabilities::detect()) {
        Some(kernel) => {
            log::debug!("half->single kernel: {AVX2}");
            kernel
        }
        None => {
            log::debug!("half->single kernel: scalar");
            scalar::half_to_single_scalar_unchecked
        }
    }
}

fn select_narrow_kernel() -> NarrowKernel {
    match avx2_narrow_kernel(Capabilities::detect()) {
        Some(kernel) => {
            log::debug!("single->half kernel: {AVX2}");
            kernel
        }
        None => {
            log::debug!("single->half kernel: scalar");
            scalar::single_to_half_scalar_unchecked
        }
    }
}

fn parallel_config() -> ParallelConfig {
    parallel_config_from(
        env_config::parallel_min_elements_override(),
        env_config::parallel_max_workers_override(),
    )
}

fn parallel_config_from(
    min_elements_override: Option<usize>,
    max_workers_override: Option<usize>,
) -> ParallelConfig {
    ParallelConfig {
        min_elements: min_elements_override.unwrap_or(PARALLEL_MIN_ELEMENTS),
        min_chunk_elements: PARALLEL_MIN_CHUNK_ELEMENTS,
        max_workers: max_workers_override.unwrap_or(PARALLEL_MAX_WORKERS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn halves(bits: impl IntoIterator<Item = u16>) -> Vec<f16> {
        bits.into_iter().map(f16::from_bits).collect()
    }

    fn singles(bits: impl IntoIterator<Item = u32>) -> Vec<f32> {
        bits.into_iter().map(f32::from_bits).collect()
    }

    fn widened_bits(dst: &[f32]) -> Vec<u32> {
        dst.iter().map(|v| v.to_bits()).collect()
    }

    fn narrowed_bits(dst: &[f16]) -> Vec<u16> {
        dst.iter().map(|v| v.to_bits()).collect()
    }

    #[test]
    fn widening_every_half_matches_scalar() {
        let src = halves(0..=u16::MAX);
        let mut dst = vec![0f32; src.len()];
        assert_eq!(half_to_single_many(&mut dst, &src), src.len());
        for (h, out) in src.iter().zip(&dst) {
            assert_eq!(out.to_bits(), half_to_single(h.to_bits()), "{:#06x}", h.to_bits());
        }
    }

    #[test]
    fn boundary_lengths_match_scalar_in_both_directions() {
        for len in [0usize, 1, 15, 16, 17, 31, 32, 33] {
            let src_h = halves((0..len as u16).map(|i| i.wrapping_mul(0x1F3D)));
            let mut fast = vec![0f32; len];
            let mut slow = vec![0f32; len];
            assert_eq!(half_to_single_many(&mut fast, &src_h), len);
            assert_eq!(half_to_single_many_scalar(&mut slow, &src_h), len);
            assert_eq!(widened_bits(&fast), widened_bits(&slow), "len {len}");

            let src_s = singles((0..len as u32).map(|i| i.wrapping_mul(0x9E37_79B9)));
            let mut fast = vec![f16::ZERO; len];
            let mut slow = vec![f16::ZERO; len];
            assert_eq!(single_to_half_many_portable(&mut fast, &src_s), len);
            assert_eq!(single_to_half_many_scalar(&mut slow, &src_s), len);
            assert_eq!(narrowed_bits(&fast), narrowed_bits(&slow), "len {len}");
        }
    }

    #[test]
    fn mismatched_lengths_convert_the_shorter_prefix() {
        let src = singles([0x3F80_0000, 0x4000_0000, 0x4040_0000, 0x4080_0000]);
        let mut dst = vec![f16::from_bits(0xAAAA); 2];
        assert_eq!(single_to_half_many_portable(&mut dst, &src), 2);
        assert_eq!(narrowed_bits(&dst), [0x3C00, 0x4000]);

        let src = halves([0x3C00, 0x4000]);
        let mut dst = vec![-1.0f32; 5];
        assert_eq!(half_to_single_many(&mut dst, &src), 2);
        assert_eq!(dst, [1.0, 2.0, -1.0, -1.0, -1.0]);
    }

    #[test]
    fn gated_calls_without_avx2_leave_destination_untouched() {
        let caps = Capabilities::scalar_only();
        let src = singles([0x3F80_0000; 20]);
        let mut dst = vec![f16::from_bits(0x1234); 20];
        let err = single_to_half_many_with(caps, &mut dst, &src).unwrap_err();
        assert_eq!(
            err,
            ConvertError::UnsupportedHardware {
                operation: "single_to_half_many",
                required: "avx2",
            }
        );
        assert!(dst.iter().all(|h| h.to_bits() == 0x1234));

        let src = halves([0x3C00; 20]);
        let mut dst = vec![7.0f32; 20];
        assert!(half_to_single_many_avx2_with(caps, &mut dst, &src).is_err());
        assert!(dst.iter().all(|&v| v == 7.0));
    }

    #[test]
    fn parallel_narrowing_without_avx2_leaves_destination_untouched() {
        let len = 3_000_000;
        let src = singles((0..len as u32).map(|i| i ^ 0x3F80_0000));
        let mut dst = vec![f16::from_bits(0x1234); len];
        let err =
            single_to_half_many_parallel_with(Capabilities::scalar_only(), &mut dst, &src)
                .unwrap_err();
        assert_eq!(err.operation(), "single_to_half_many_parallel");
        assert_eq!(
            err.to_string(),
            "single_to_half_many_parallel requires avx2, which is not supported on this machine"
        );
        assert!(dst.iter().all(|h| h.to_bits() == 0x1234));
    }

    #[test]
    fn disabled_simd_gates_every_avx2_entry_point() {
        let caps = Capabilities::detect_with(false);
        let src_s = singles([0x3F80_0000; 4]);
        let mut dst_h = vec![f16::from_bits(0x1234); 4];
        assert!(single_to_half_many_with(caps, &mut dst_h, &src_s).is_err());
        assert!(single_to_half_many_parallel_with(caps, &mut dst_h, &src_s).is_err());
        assert!(dst_h.iter().all(|h| h.to_bits() == 0x1234));

        let src_h = halves([0x3C00; 4]);
        let mut dst_s = vec![7.0f32; 4];
        assert!(half_to_single_many_avx2_with(caps, &mut dst_s, &src_h).is_err());
        assert!(dst_s.iter().all(|&v| v == 7.0));
        // The auto-selecting path falls back to scalar instead.
        assert_eq!(half_to_single_many_with(caps, &mut dst_s, &src_h), 4);
        assert!(dst_s.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn parallel_overrides_replace_defaults() {
        let defaults = parallel_config_from(None, None);
        assert_eq!(defaults.min_elements, PARALLEL_MIN_ELEMENTS);
        assert_eq!(defaults.max_workers, PARALLEL_MAX_WORKERS);
        assert_eq!(defaults.min_chunk_elements, PARALLEL_MIN_CHUNK_ELEMENTS);

        let tuned = parallel_config_from(Some(4096), Some(2));
        assert_eq!(tuned.min_elements, 4096);
        assert_eq!(tuned.max_workers, 2);
        assert_eq!(tuned.min_chunk_elements, PARALLEL_MIN_CHUNK_ELEMENTS);

        let serial = parallel_config_from(None, Some(1));
        assert_eq!(serial.chunk_len(usize::MAX / 2), None);
    }

    #[test]
    fn scalar_only_caps_still_widen() {
        let src = halves([0x0001, 0x7BFF, 0xFC00, 0x7E00]);
        let mut dst = vec![0f32; 4];
        assert_eq!(
            half_to_single_many_with(Capabilities::scalar_only(), &mut dst, &src),
            4
        );
        assert_eq!(
            widened_bits(&dst),
            [0x3380_0000, 0x477F_E000, 0xFF80_0000, 0x7FC0_0000]
        );
    }

    #[test]
    fn gated_entry_points_agree_with_detection() {
        let src = singles([0x3300_0001, 0x477F_F000, 0xFFC0_0001]);
        let mut dst = vec![f16::ZERO; 3];
        match single_to_half_many(&mut dst, &src) {
            Ok(written) => {
                assert!(Capabilities::detect().has_avx2());
                assert_eq!(written, 3);
                assert_eq!(narrowed_bits(&dst), [0x0001, 0x7C00, 0xFE00]);
            }
            Err(err) => {
                assert!(!Capabilities::detect().has_avx2());
                assert_eq!(err.required_feature(), "avx2");
                assert!(dst.iter().all(|h| h.to_bits() == 0));
            }
        }
    }

    #[test]
    fn parallel_entry_points_match_serial() {
        let len = (1 << 21) + 37;
        let src_s = singles((0..len as u32).map(|i| i.wrapping_mul(0x0001_0DCD) ^ 0x3A00_0000));
        let mut serial = vec![f16::ZERO; len];
        let mut sharded = vec![f16::ZERO; len];
        single_to_half_many_scalar(&mut serial, &src_s);
        match single_to_half_many_parallel(&mut sharded, &src_s) {
            Ok(written) => {
                assert_eq!(written, len);
                assert_eq!(narrowed_bits(&serial), narrowed_bits(&sharded));
            }
            Err(_) => assert!(!Capabilities::detect().has_avx2()),
        }

        let src_h = halves((0..len).map(|i| i as u16));
        let mut serial = vec![0f32; len];
        let mut sharded = vec![0f32; len];
        half_to_single_many_scalar(&mut serial, &src_h);
        assert_eq!(half_to_single_many_parallel(&mut sharded, &src_h), len);
        assert_eq!(widened_bits(&serial), widened_bits(&sharded));
    }

    #[test]
    fn warmup_is_idempotent() {
        warmup();
        warmup();
        let mut dst = [0f32; 1];
        assert_eq!(half_to_single_many(&mut dst, &[f16::ONE]), 1);
        assert_eq!(dst[0], 1.0);
    }

    proptest! {
        #[test]
        fn bulk_narrowing_matches_scalar(bits in prop::collection::vec(any::<u32>(), 0..300)) {
            let src = singles(bits.iter().copied());
            let mut fast = vec![f16::ZERO; src.len()];
            single_to_half_many_portable(&mut fast, &src);
            let expected: Vec<u16> = bits.iter().map(|&b| single_to_half(b)).collect();
            prop_assert_eq!(narrowed_bits(&fast), expected);
        }

        #[test]
        fn bulk_widening_matches_scalar(bits in prop::collection::vec(any::<u16>(), 0..300)) {
            let src = halves(bits.iter().copied());
            let mut fast = vec![0f32; src.len()];
            half_to_single_many(&mut fast, &src);
            let expected: Vec<u32> = bits.iter().map(|&b| half_to_single(b)).collect();
            prop_assert_eq!(widened_bits(&fast), expected);
        }

        #[test]
        fn mismatched_lengths_write_only_the_prefix(
            bits in prop::collection::vec(any::<u32>(), 0..64),
            dst_len in 0usize..64,
        ) {
            let src = singles(bits.iter().copied());
            let mut dst = vec![f16::from_bits(0x5555); dst_len];
            let written = single_to_half_many_portable(&mut dst, &src);
            prop_assert_eq!(written, bits.len().min(dst_len));
            for (i, h) in dst.iter().enumerate() {
                let expected = if i < written { single_to_half(bits[i]) } else { 0x5555 };
                prop_assert_eq!(h.to_bits(), expected);
            }
        }

        #[test]
        fn finite_halves_round_trip_through_bulk(bits in prop::collection::vec(any::<u16>(), 0..200)) {
            let finite: Vec<u16> = bits.into_iter().filter(|b| b & 0x7C00 != 0x7C00).collect();
            let src = halves(finite.iter().copied());
            let mut wide = vec![0f32; src.len()];
            let mut back = vec![f16::ZERO; src.len()];
            half_to_single_many(&mut wide, &src);
            single_to_half_many_portable(&mut back, &wide);
            prop_assert_eq!(narrowed_bits(&back), finite);
        }
    }
}
