use crate::env_config;
use std::sync::OnceLock;

/// Instruction-set capabilities relevant to the bulk kernels.
///
/// A value can only be obtained from [`Capabilities::detect`] (what the
/// executing CPU reports, subject to `HALFCAST_DISABLE_SIMD`) or
/// [`Capabilities::scalar_only`] (nothing advertised). There is no way to
/// claim a feature the CPU lacks, so passing a `Capabilities` to a `*_with`
/// entry point never leads to executing an unsupported instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    avx2: bool,
}

impl Capabilities {
    /// Capabilities of the executing CPU. Detection runs once per process.
    pub fn detect() -> Self {
        static DETECTED: OnceLock<Capabilities> = OnceLock::new();
        *DETECTED.get_or_init(|| Self::detect_with(env_config::simd_enabled()))
    }

    /// Detection with the `HALFCAST_DISABLE_SIMD` switch already resolved.
    pub(crate) fn detect_with(simd_enabled: bool) -> Self {
        let detected = if simd_enabled {
            Self {
                avx2: detect_avx2(),
            }
        } else {
            log::debug!(
                "{} is set; reporting no SIMD capabilities",
                env_config::DISABLE_SIMD_VAR
            );
            Self::scalar_only()
        };
        log::debug!("detected conversion capabilities: {detected:?}");
        detected
    }

    /// No SIMD capabilities. Gated entry points refuse to run with this value
    /// and auto-dispatching ones take the scalar path.
    pub const fn scalar_only() -> Self {
        Self { avx2: false }
    }

    /// Whether the AVX2 bulk kernels may run.
    pub const fn has_avx2(self) -> bool {
        self.avx2
    }
}

fn detect_avx2() -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        std::arch::is_x86_feature_detected!("avx2")
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        false
    }
}
