//! Centralized environment-variable parsing helpers.
//!
//! Every tuning knob read from the environment goes through these helpers so
//! the truthy/falsey parsing logic lives in exactly one place.

/// Returns `true` when the environment variable is set to a truthy value
/// (`1`, `true`, `yes`, or `on`, case-insensitive, trimmed).
#[inline]
pub(crate) fn env_var_truthy(var_name: &str) -> bool {
    std::env::var(var_name)
        .map(|raw| is_truthy(&raw))
        .unwrap_or(false)
}

fn is_truthy(raw: &str) -> bool {
    let normalized = raw.trim().to_ascii_lowercase();
    normalized == "1" || normalized == "true" || normalized == "yes" || normalized == "on"
}

/// Parses the environment variable as a `u64`, returning `Some` only when
/// the value is a valid positive (> 0) integer.
#[inline]
pub(crate) fn env_var_positive_u64(var_name: &str) -> Option<u64> {
    std::env::var(var_name)
        .ok()
        .and_then(|raw| parse_positive_u64(&raw))
}

fn parse_positive_u64(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().filter(|value| *value > 0)
}

/// Same as [`env_var_positive_u64`], converted to `usize` and cached for the
/// lifetime of the process.
macro_rules! define_env_usize {
    ($fn_name:ident, $var:expr) => {
        #[inline]
        pub(crate) fn $fn_name() -> Option<usize> {
            static VALUE: ::std::sync::OnceLock<Option<usize>> = ::std::sync::OnceLock::new();
            *VALUE.get_or_init(|| {
                $crate::env_config::env_var_positive_u64($var)
                    .and_then(|value| usize::try_from(value).ok())
            })
        }
    };
}

/// Declares a cached boolean feature flag that is on by default and turned
/// off when the env var is truthy.
macro_rules! define_env_flag {
    (enabled_unless($fn_name:ident, $var:expr)) => {
        #[inline]
        pub(crate) fn $fn_name() -> bool {
            static VALUE: ::std::sync::OnceLock<bool> = ::std::sync::OnceLock::new();
            *VALUE.get_or_init(|| !$crate::env_config::env_var_truthy($var))
        }
    };
}

pub(crate) const DISABLE_SIMD_VAR: &str = "HALFCAST_DISABLE_SIMD";
pub(crate) const PARALLEL_MIN_ELEMENTS_VAR: &str = "HALFCAST_PARALLEL_MIN_ELEMENTS";
pub(crate) const PARALLEL_MAX_WORKERS_VAR: &str = "HALFCAST_PARALLEL_MAX_WORKERS";

define_env_flag!(enabled_unless(simd_enabled, DISABLE_SIMD_VAR));
define_env_usize!(parallel_min_elements_override, PARALLEL_MIN_ELEMENTS_VAR);
define_env_usize!(parallel_max_workers_override, PARALLEL_MAX_WORKERS_VAR);
