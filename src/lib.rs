//! Branchless conversion between IEEE 754 binary16 and binary32.
//!
//! Scalar conversions on bit patterns ([`half_to_single`],
//! [`single_to_half`]) are total and never branch on the input. Bulk entry
//! points convert slices of [`half::f16`] and `f32`, using AVX2 kernels that
//! are bit-exact with the scalar engine.

pub mod capability;
pub mod convert;
pub(crate) mod env_config;
pub mod error;

pub use capability::Capabilities;
pub use convert::{
    f16_to_f32, f32_to_f16, half_to_single, half_to_single_many, half_to_single_many_avx2,
    half_to_single_many_avx2_with, half_to_single_many_parallel, half_to_single_many_scalar,
    half_to_single_many_with, single_to_half, single_to_half_many, single_to_half_many_parallel,
    single_to_half_many_parallel_with, single_to_half_many_portable, single_to_half_many_scalar,
    single_to_half_many_with, warmup,
};
#[cfg(target_arch = "x86_64")]
pub use convert::{half_to_single_lane, single_to_half_lane};
pub use error::{ConvertError, ConvertResult};
pub use half::f16;
