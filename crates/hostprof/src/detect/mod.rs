use std::time::Instant;

use tracing::{debug, warn};

use crate::compilers;
use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};
use crate::host::HostEnv;
use crate::platform::Platform;
use crate::types::{
    AcceleratorInfo, CpuTopology, KernelIdentity, ProbeTimes, ProfileReport, RuntimeInfo,
};

mod fallback;
pub mod freebsd;
pub mod linux;
pub mod macos;

/// Platform classification as the host reports it.
pub fn platform_of(host: &dyn HostEnv) -> Platform {
    Platform::classify(&host.os_family(), &host.os_name())
}

/// Run every probe and assemble the report. Never fails: a probe that
/// cannot run leaves its fields unknown. Fingerprint and timestamps are
/// filled in by [`crate::report::profile_with`].
pub fn detect_now(host: &dyn HostEnv, config: &ProbeConfig) -> ProfileReport {
    let platform = platform_of(host);
    debug!(%platform, "profiling host");

    let mut diags: Vec<String> = Vec::new();
    let mut times = ProbeTimes::default();

    let start = Instant::now();
    let cpu = cpu_topology(host, platform, &mut diags);
    times.cpu_ms = Some(elapsed_ms(start));

    let start = Instant::now();
    let kernel = kernel_identity(host, platform);
    times.kernel_ms = Some(elapsed_ms(start));

    let start = Instant::now();
    let compilers = if config.disable_compilers {
        diags.push("[compilers] disabled by env".into());
        Default::default()
    } else {
        compilers::discover(host, platform, config)
    };
    let build_flags = compilers::build_flags(host);
    times.compilers_ms = Some(elapsed_ms(start));

    let start = Instant::now();
    let accelerators = accelerators(host, platform, config, &mut diags);
    times.accelerators_ms = Some(elapsed_ms(start));

    ProfileReport {
        schema: 0, // set in report layer
        cpu,
        kernel,
        compilers,
        build_flags,
        accelerators,
        runtime: RuntimeInfo::current(),
        fingerprint: String::new(),
        created_at: String::new(),
        probe_ms_total: Some(times.total_ms()),
        probe_times: Some(times),
        diagnostics: if config.debug { Some(diags) } else { None },
    }
}

/// The platform's topology probe, errors and all.
pub fn probe_cpu_topology(host: &dyn HostEnv, platform: Platform) -> Result<CpuTopology> {
    match platform {
        Platform::Linux => linux::probe_cpu(host),
        Platform::Macos => macos::probe_cpu(host),
        Platform::Freebsd => freebsd::probe_cpu(host),
        Platform::Windows | Platform::Other => Ok(fallback::probe_cpu(host)),
    }
}

/// Topology with failures degraded to the unknown shape.
pub fn cpu_topology(
    host: &dyn HostEnv,
    platform: Platform,
    diags: &mut Vec<String>,
) -> CpuTopology {
    match probe_cpu_topology(host, platform) {
        Ok(t) => t,
        Err(e) => {
            warn!(%platform, "cpu topology probe failed: {e}");
            diags.push(format!("[cpu] {e}"));
            fallback::probe_cpu(host)
        }
    }
}

/// Kernel probes degrade per field internally, so this cannot fail.
pub fn kernel_identity(host: &dyn HostEnv, platform: Platform) -> KernelIdentity {
    match platform {
        Platform::Linux => linux::probe_kernel(host),
        Platform::Macos => macos::probe_kernel(host),
        Platform::Freebsd => freebsd::probe_kernel(host),
        Platform::Windows | Platform::Other => fallback::probe_kernel(platform),
    }
}

/// CUDA is only looked for on Linux, Metal only on macOS.
pub fn accelerators(
    host: &dyn HostEnv,
    platform: Platform,
    config: &ProbeConfig,
    diags: &mut Vec<String>,
) -> AcceleratorInfo {
    let cuda = if platform != Platform::Linux {
        None
    } else if config.disable_cuda {
        diags.push("[cuda] disabled by env".into());
        None
    } else {
        linux::probe_cuda(host)
    };

    let metal_present = if platform != Platform::Macos {
        false
    } else if config.disable_metal {
        diags.push("[metal] disabled by env".into());
        false
    } else {
        macos::probe_metal(host)
    };

    AcceleratorInfo {
        cuda_present: cuda.is_some(),
        cuda,
        metal_present,
    }
}

/// `x86_64-unknown-linux-gnu` -> `x86_64`.
pub(crate) fn arch_prefix(raw: &str) -> Option<String> {
    raw.split('-')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub(crate) fn per_processor(total: u32, num_processors: u32, what: &str) -> Result<u32> {
    total
        .checked_div(num_processors)
        .ok_or_else(|| ProbeError::DivisionByZero {
            numerator: what.to_string(),
        })
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
