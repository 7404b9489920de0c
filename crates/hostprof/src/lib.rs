//! Host profiling crate.
//! Normalizes CPU topology, kernel identity, C/C++ compilers and CUDA/Metal
//! availability from per-platform sources into one [`ProfileReport`].
//!
//! ```no_run
//! let report = hostprof::profile()?;
//! println!("{}", report.to_json_pretty()?);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod compilers;
pub mod config;
pub mod detect;
pub mod error;
pub mod host;
pub mod platform;
pub mod report;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
pub mod text;
pub mod types;

pub use config::{ProbeConfig, LATEST_CLANG_MAJOR, LATEST_GCC_MAJOR};
pub use detect::detect_now;
pub use error::ProbeError;
pub use host::{CommandOutput, HostEnv, SystemHost};
pub use platform::Platform;
pub use report::{compute_fingerprint, profile, profile_with};
pub use types::{
    AcceleratorInfo, BuildFlags, CompilerKind, CompilerRecord, CpuTopology, CudaToolkit,
    HyperThreading, KernelIdentity, ProbeTimes, ProfileReport, RuntimeInfo,
};
