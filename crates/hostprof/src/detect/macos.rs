use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{arch_prefix, per_processor};
use crate::error::{ProbeError, Result};
use crate::host::{command_stdout, require_tool, HostEnv};
use crate::platform::Platform;
use crate::text;
use crate::types::{CpuTopology, HyperThreading, KernelIdentity};

const SYSTEM_PROFILER: &str = "system_profiler";

/// What `system_profiler SPHardwareDataType` tells us about the CPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacHardware {
    pub model: String,
    pub num_processors: u32,
    pub total_cores: u32,
    pub hyper_threading: bool,
}

fn system_profiler(host: &dyn HostEnv, data_type: &str) -> Result<String> {
    let bin = require_tool(host, SYSTEM_PROFILER)?;
    command_stdout(host, &bin.to_string_lossy(), &[data_type])
}

fn required_label<'a>(lines: &[&'a str], label: &str) -> Result<&'a str> {
    text::label_value(lines, label).ok_or_else(|| ProbeError::LabelNotFound {
        label: label.to_string(),
    })
}

fn label_integer(lines: &[&str], label: &str) -> Result<u32> {
    let value = required_label(lines, label)?;
    text::first_integer(value).ok_or_else(|| ProbeError::parse_failure(label, value))
}

/// Parse the hardware overview. Intel machines report
/// `Processor Name`/`Number of Processors`; Apple Silicon reports `Chip`
/// and is always a single package.
pub fn parse_hardware(raw: &str) -> Result<MacHardware> {
    let lines = text::trimmed_lines(raw);

    let (model, num_processors) = match text::label_value(&lines, "Processor Name") {
        Some(name) => (name, label_integer(&lines, "Number of Processors")?),
        None => match text::label_value(&lines, "Chip") {
            Some(chip) => {
                let n = match label_integer(&lines, "Number of Processors") {
                    Ok(n) => n,
                    Err(ProbeError::LabelNotFound { .. }) => 1,
                    Err(e) => return Err(e),
                };
                (chip, n)
            }
            None => {
                return Err(ProbeError::LabelNotFound {
                    label: "Processor Name".into(),
                })
            }
        },
    };
    let total_cores = label_integer(&lines, "Total Number of Cores")?;

    // A missing Hyper-Threading line means the machine has none.
    let hyper_threading = text::label_value(&lines, "Hyper-Threading Technology")
        .map(|v| v.contains("Enabled"))
        .unwrap_or(false);

    Ok(MacHardware {
        model: model.to_string(),
        num_processors,
        total_cores,
        hyper_threading,
    })
}

/// system_profiler has no thread count; assume a uniform 2-way SMT when
/// Hyper-Threading is on.
pub fn topology_from_hardware(hw: &MacHardware, cpu_type: Option<String>) -> CpuTopology {
    let smt = if hw.hyper_threading { 2 } else { 1 };
    let total_threads = hw.total_cores * smt;
    let split = |total: u32, what: &str| match per_processor(total, hw.num_processors, what) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("[system_profiler] {e}");
            None
        }
    };

    CpuTopology {
        cpu_type,
        cpu_model: Some(hw.model.clone()),
        cpu_models: None,
        num_processors: (hw.num_processors > 0).then_some(hw.num_processors),
        cores_per_processor: split(hw.total_cores, "total cores"),
        total_cores: Some(hw.total_cores),
        threads_per_processor: split(total_threads, "total threads"),
        total_threads,
        hyper_threading: if hw.hyper_threading {
            HyperThreading::Enabled
        } else {
            HyperThreading::Disabled
        },
    }
}

pub fn probe_cpu(host: &dyn HostEnv) -> Result<CpuTopology> {
    let raw = system_profiler(host, "SPHardwareDataType")?;
    let hw = parse_hardware(&raw)?;
    Ok(topology_from_hardware(&hw, machine(host)))
}

fn machine(host: &dyn HostEnv) -> Option<String> {
    command_stdout(host, "uname", &["-m"])
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| arch_prefix(&host.system_architecture()))
}

// --- kernel identity ---

pub fn probe_kernel(host: &dyn HostEnv) -> KernelIdentity {
    let kernel_release = match command_stdout(host, "uname", &["-r"]) {
        Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        other => {
            if let Err(e) = other {
                debug!("[kernel] {e}; using runtime-reported version");
            }
            host.os_version()
        }
    };

    let (kernel_version, system_version) = match system_profiler(host, "SPSoftwareDataType") {
        Ok(raw) => parse_software(&raw),
        Err(e) => {
            debug!("[kernel] {e}");
            (None, None)
        }
    };

    KernelIdentity {
        os_type: Platform::Macos,
        kernel_release,
        kernel_version,
        system_version,
    }
}

/// (`Kernel Version`, `System Version`) from `SPSoftwareDataType`.
pub fn parse_software(raw: &str) -> (Option<String>, Option<String>) {
    let lines = text::trimmed_lines(raw);
    let get = |label| text::label_value(&lines, label).map(str::to_string);
    (get("Kernel Version"), get("System Version"))
}

// --- Metal ---

static METAL_SUPPORTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*Metal(?: Family| Support)?:\s*(?:Supported|Metal\b)")
        .expect("metal support regex")
});

pub fn displays_support_metal(raw: &str) -> bool {
    METAL_SUPPORTED.is_match(raw)
}

/// Any failure to ask is treated as "no Metal".
pub fn probe_metal(host: &dyn HostEnv) -> bool {
    match system_profiler(host, "SPDisplaysDataType") {
        Ok(raw) => displays_support_metal(&raw),
        Err(e) => {
            debug!("[metal] {e}");
            false
        }
    }
}
