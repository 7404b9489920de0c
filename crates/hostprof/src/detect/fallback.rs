//! Windows and unrecognized platforms: nothing is parsed.

use crate::host::HostEnv;
use crate::platform::Platform;
use crate::types::{CpuTopology, KernelIdentity};

pub fn probe_cpu(host: &dyn HostEnv) -> CpuTopology {
    CpuTopology::unknown(host.logical_cpus().max(1) as u32)
}

pub fn probe_kernel(platform: Platform) -> KernelIdentity {
    KernelIdentity::unknown(platform)
}
