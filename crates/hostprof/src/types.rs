use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::platform::Platform;

// `None` in any `Option` field below means "unknown": the data source was
// missing, failed, or the platform does not report it.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileReport {
    pub schema: u32,

    pub cpu: CpuTopology,
    pub kernel: KernelIdentity,

    /// Toolchain name ("gcc", "clang++", "CC", ...) -> every binary found for it.
    pub compilers: BTreeMap<String, Vec<CompilerRecord>>,
    pub build_flags: BuildFlags,

    pub accelerators: AcceleratorInfo,
    pub runtime: RuntimeInfo,

    pub fingerprint: String,
    pub created_at: String,

    #[serde(default)]
    pub probe_ms_total: Option<u64>,
    #[serde(default)]
    pub probe_times: Option<ProbeTimes>,
    #[serde(default)]
    pub diagnostics: Option<Vec<String>>, // debug only
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTopology {
    pub cpu_type: Option<String>,
    pub cpu_model: Option<String>,
    pub cpu_models: Option<Vec<String>>,
    pub num_processors: Option<u32>,
    pub cores_per_processor: Option<u32>,
    pub total_cores: Option<u32>,
    pub threads_per_processor: Option<u32>,
    /// Always known; falls back to the runtime's logical CPU count.
    pub total_threads: u32,
    pub hyper_threading: HyperThreading,
}

impl CpuTopology {
    /// Every field unknown except the thread count the runtime can see.
    pub fn unknown(total_threads: u32) -> Self {
        Self {
            cpu_type: None,
            cpu_model: None,
            cpu_models: None,
            num_processors: None,
            cores_per_processor: None,
            total_cores: None,
            threads_per_processor: None,
            total_threads,
            hyper_threading: HyperThreading::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyperThreading {
    Enabled,
    Disabled,
    Unknown,
}

impl HyperThreading {
    /// SMT is on exactly when there are more logical threads than cores.
    pub fn from_counts(total_cores: Option<u32>, total_threads: Option<u32>) -> Self {
        match (total_cores, total_threads) {
            (Some(cores), Some(threads)) if threads > cores => HyperThreading::Enabled,
            (Some(_), Some(_)) => HyperThreading::Disabled,
            _ => HyperThreading::Unknown,
        }
    }

    pub fn is_enabled(self) -> bool {
        self == HyperThreading::Enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelIdentity {
    pub os_type: Platform,
    pub kernel_release: Option<String>,
    pub kernel_version: Option<String>,
    pub system_version: Option<String>,
}

impl KernelIdentity {
    pub fn unknown(os_type: Platform) -> Self {
        Self {
            os_type,
            kernel_release: None,
            kernel_version: None,
            system_version: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilerKind {
    Gcc,
    Gxx,
    Clang,
    Clangxx,
    AppleClang,
    AppleClangxx,
    /// Ran, but the banner matched no known toolchain.
    Unknown,
    /// Named by `CC`/`CXX` but not resolvable to an executable.
    Undefined,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerRecord {
    pub bin: PathBuf,
    pub kind: CompilerKind,
    /// First line of the `--version` output.
    pub version_banner: Option<String>,
    pub version_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFlags {
    pub cflags: Option<String>,
    pub cxxflags: Option<String>,
    pub ldflags: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorInfo {
    pub cuda_present: bool,
    /// Only set when `cuda_present`.
    #[serde(default)]
    pub cuda: Option<CudaToolkit>,
    pub metal_present: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CudaToolkit {
    pub version: Option<String>,
    pub bin_path: Option<PathBuf>,
    pub include_path: Option<PathBuf>,
    pub lib_path: Option<PathBuf>,
    pub nvcc_path: Option<PathBuf>,
    #[serde(default)]
    pub driver_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub hostprof_version: String,
    pub rustc_version: String,
    pub target: String,
}

impl RuntimeInfo {
    pub fn current() -> Self {
        Self {
            hostprof_version: env!("CARGO_PKG_VERSION").to_string(),
            rustc_version: env!("HOSTPROF_RUSTC_VERSION").to_string(),
            target: env!("HOSTPROF_TARGET").to_string(),
        }
    }
}

// lightweight per-probe timings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTimes {
    #[serde(default)]
    pub cpu_ms: Option<u64>,
    #[serde(default)]
    pub kernel_ms: Option<u64>,
    #[serde(default)]
    pub compilers_ms: Option<u64>,
    #[serde(default)]
    pub accelerators_ms: Option<u64>,
}

impl ProbeTimes {
    pub fn total_ms(&self) -> u64 {
        self.cpu_ms.unwrap_or(0)
            + self.kernel_ms.unwrap_or(0)
            + self.compilers_ms.unwrap_or(0)
            + self.accelerators_ms.unwrap_or(0)
    }
}
