use std::time::Duration;

use crate::host::HostEnv;

/// Latest GCC major release known when this crate was last updated; bump by hand.
pub const LATEST_GCC_MAJOR: u32 = 15;
/// Latest LLVM/clang major release known when this crate was last updated; bump by hand.
pub const LATEST_CLANG_MAJOR: u32 = 21;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const MIN_TIMEOUT_MS: u64 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Upper bound for each external command.
    pub command_timeout: Duration,
    /// Attach degraded-probe diagnostics to the report.
    pub debug: bool,
    pub disable_cuda: bool,
    pub disable_metal: bool,
    pub disable_compilers: bool,
    /// Highest N probed for `gcc-N` / `g++-N`.
    pub gcc_max_major: u32,
    /// Highest N probed for `clang-N` / `clang++-N`.
    pub clang_max_major: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            debug: false,
            disable_cuda: false,
            disable_metal: false,
            disable_compilers: false,
            gcc_max_major: LATEST_GCC_MAJOR,
            clang_max_major: LATEST_CLANG_MAJOR,
        }
    }
}

impl ProbeConfig {
    /// Read `HOSTPROF_*` overrides from the host environment.
    pub fn from_host(host: &dyn HostEnv) -> Self {
        let defaults = Self::default();
        let timeout_ms = host
            .get_env("HOSTPROF_TIMEOUT_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|&v| v >= MIN_TIMEOUT_MS)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        Self {
            command_timeout: Duration::from_millis(timeout_ms),
            debug: flag(host, "HOSTPROF_DEBUG"),
            disable_cuda: disabled(host, "cuda"),
            disable_metal: disabled(host, "metal"),
            disable_compilers: disabled(host, "compilers"),
            gcc_max_major: major(host, "HOSTPROF_GCC_MAX_MAJOR").unwrap_or(defaults.gcc_max_major),
            clang_max_major: major(host, "HOSTPROF_CLANG_MAX_MAJOR")
                .unwrap_or(defaults.clang_max_major),
        }
    }

    /// Same as [`ProbeConfig::from_host`] against the real process environment.
    pub fn from_env() -> Self {
        Self::from_host(&crate::host::SystemHost::default())
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

fn flag(host: &dyn HostEnv, key: &str) -> bool {
    host.get_env(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn disabled(host: &dyn HostEnv, name: &str) -> bool {
    flag(
        host,
        &format!("HOSTPROF_DISABLE_{}", name.to_ascii_uppercase()),
    )
}

fn major(host: &dyn HostEnv, key: &str) -> Option<u32> {
    host.get_env(key)
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&v| v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    #[test]
    fn test_defaults_without_env() {
        let cfg = ProbeConfig::from_host(&FakeHost::linux());
        assert_eq!(cfg, ProbeConfig::default());
        assert_eq!(cfg.gcc_max_major, LATEST_GCC_MAJOR);
    }

    #[test]
    fn test_env_overrides() {
        let host = FakeHost::linux()
            .with_env("HOSTPROF_TIMEOUT_MS", "1500")
            .with_env("HOSTPROF_DEBUG", "true")
            .with_env("HOSTPROF_DISABLE_CUDA", "1")
            .with_env("HOSTPROF_GCC_MAX_MAJOR", "20");
        let cfg = ProbeConfig::from_host(&host);
        assert_eq!(cfg.command_timeout, Duration::from_millis(1500));
        assert!(cfg.debug);
        assert!(cfg.disable_cuda);
        assert!(!cfg.disable_metal);
        assert_eq!(cfg.gcc_max_major, 20);
        assert_eq!(cfg.clang_max_major, LATEST_CLANG_MAJOR);
    }

    #[test]
    fn test_tiny_or_garbage_timeout_ignored() {
        let host = FakeHost::linux().with_env("HOSTPROF_TIMEOUT_MS", "50");
        assert_eq!(
            ProbeConfig::from_host(&host).command_timeout,
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        );
        let host = FakeHost::linux().with_env("HOSTPROF_TIMEOUT_MS", "soon");
        assert_eq!(
            ProbeConfig::from_host(&host).command_timeout,
            Duration::from_millis(DEFAULT_TIMEOUT_MS)
        );
    }
}
