use tracing::debug;

use crate::error::{ProbeError, Result};
use crate::host::{command_stdout, require_tool, HostEnv};
use crate::platform::Platform;
use crate::text;
use crate::types::{CpuTopology, HyperThreading, KernelIdentity};

fn sysctl(host: &dyn HostEnv, key: &str) -> Result<String> {
    let bin = require_tool(host, "sysctl")?;
    let out = command_stdout(host, &bin.to_string_lossy(), &["-n", key])?;
    Ok(out.trim().to_string())
}

fn sysctl_count(host: &dyn HostEnv, key: &str) -> Result<u32> {
    let raw = sysctl(host, key)?;
    text::first_integer(&raw)
        .filter(|&n| n > 0)
        .ok_or_else(|| ProbeError::parse_failure(key, raw))
}

pub fn parse_hyperthreading_allowed(value: &str) -> Result<HyperThreading> {
    match value.trim() {
        "1" => Ok(HyperThreading::Enabled),
        "0" => Ok(HyperThreading::Disabled),
        other => Err(ProbeError::parse_failure(
            "machdep.hyperthreading_allowed",
            other,
        )),
    }
}

/// The whole chain depends on `sysctl`; any failing key fails the probe.
/// Multi-socket layout is not queried, so per-processor fields stay unknown.
pub fn probe_cpu(host: &dyn HostEnv) -> Result<CpuTopology> {
    let model = sysctl(host, "hw.model")?;
    let total_cores = sysctl_count(host, "kern.smp.cores")?;
    let total_threads = sysctl_count(host, "kern.smp.cpus")?;
    let hyper_threading =
        parse_hyperthreading_allowed(&sysctl(host, "machdep.hyperthreading_allowed")?)?;

    let cpu_type = match command_stdout(host, "uname", &["-m"]) {
        Ok(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Err(e) => {
            debug!("[freebsd] {e}");
            None
        }
    };

    Ok(CpuTopology {
        cpu_type,
        cpu_model: Some(model),
        cpu_models: None,
        num_processors: None,
        cores_per_processor: None,
        total_cores: Some(total_cores),
        threads_per_processor: None,
        total_threads,
        hyper_threading,
    })
}

/// Only what `uname` can tell.
pub fn probe_kernel(host: &dyn HostEnv) -> KernelIdentity {
    let uname = |flag: &str| match command_stdout(host, "uname", &[flag]) {
        Ok(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Err(e) => {
            debug!("[kernel] {e}");
            None
        }
    };
    KernelIdentity {
        os_type: Platform::Freebsd,
        kernel_release: uname("-r"),
        kernel_version: uname("-v"),
        system_version: None,
    }
}
