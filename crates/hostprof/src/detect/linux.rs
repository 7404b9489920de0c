use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{arch_prefix, per_processor};
use crate::error::{ProbeError, Result};
use crate::host::HostEnv;
use crate::platform::Platform;
use crate::text;
use crate::types::{CpuTopology, CudaToolkit, HyperThreading, KernelIdentity};

const CPUINFO: &str = "/proc/cpuinfo";
const OSRELEASE: &str = "/proc/sys/kernel/osrelease";
const KVERSION: &str = "/proc/sys/kernel/version";
const OS_RELEASE: &str = "/etc/os-release";
const ISSUE: &str = "/etc/issue";
const NVIDIA_DRIVER_VERSION: &str = "/proc/driver/nvidia/version";
const CUDA_DEFAULT_ROOT: &str = "/usr/local/cuda";

/// One logical CPU from `/proc/cpuinfo`: key -> value.
pub type CpuinfoRecord = BTreeMap<String, String>;

// --- CPU topology ---

pub fn probe_cpu(host: &dyn HostEnv) -> Result<CpuTopology> {
    let raw = host.read_file(Path::new(CPUINFO))?;
    let records = parse_cpuinfo(&raw);
    let cpu_type = arch_prefix(&host.system_architecture());
    Ok(topology_from_records(
        &records,
        cpu_type,
        host.logical_cpus().max(1) as u32,
    ))
}

/// Split `/proc/cpuinfo` into blank-line separated records of `key : value`.
pub fn parse_cpuinfo(raw: &str) -> Vec<CpuinfoRecord> {
    raw.split("\n\n")
        .map(|block| {
            block
                .lines()
                .filter_map(|line| line.split_once(':'))
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .filter(|(k, _)| !k.is_empty())
                .collect::<CpuinfoRecord>()
        })
        .filter(|rec| !rec.is_empty())
        .collect()
}

/// Every record's "model name", in order.
pub fn cpu_models(records: &[CpuinfoRecord]) -> Result<Vec<String>> {
    let models: Vec<String> = records
        .iter()
        .filter_map(|r| r.get("model name").cloned())
        .collect();
    if models.is_empty() {
        return Err(ProbeError::MissingField {
            field: "model name".into(),
        });
    }
    Ok(models)
}

/// Normalize parsed records. `fallback_threads` is used only when no record
/// carries a "processor" entry.
pub fn topology_from_records(
    records: &[CpuinfoRecord],
    cpu_type: Option<String>,
    fallback_threads: u32,
) -> CpuTopology {
    let models = match cpu_models(records) {
        Ok(m) => Some(m),
        Err(e) => {
            debug!("[cpuinfo] {e}; model left unknown");
            None
        }
    };

    let physical_ids: BTreeSet<&str> = records
        .iter()
        .filter_map(|r| r.get("physical id").map(String::as_str))
        .collect();
    let num_processors = physical_ids.len() as u32;

    let processors: Vec<&str> = records
        .iter()
        .filter_map(|r| r.get("processor").map(String::as_str))
        .collect();
    let distinct_processors = processors.iter().collect::<BTreeSet<_>>().len() as u32;

    // "cpu cores" is per package: take it once per physical id.
    let mut cores_by_package: BTreeMap<Option<&str>, u32> = BTreeMap::new();
    for r in records {
        if let Some(cores) = r.get("cpu cores").and_then(|v| v.parse::<u32>().ok()) {
            cores_by_package
                .entry(r.get("physical id").map(String::as_str))
                .or_insert(cores);
        }
    }
    let declared_cores: u32 = cores_by_package.values().sum();

    let total_cores = if declared_cores > 0 {
        Some(declared_cores)
    } else if distinct_processors > 0 {
        debug!("[cpuinfo] no usable `cpu cores`; counting processors instead");
        Some(distinct_processors)
    } else {
        None
    };
    let total_threads = match processors.len() as u32 {
        0 => None,
        n => Some(n),
    };

    let num_processors = (num_processors > 0).then_some(num_processors);
    let cores_per_processor = split_per_processor(total_cores, num_processors, "total cores");
    let threads_per_processor =
        split_per_processor(total_threads, num_processors, "total threads");

    CpuTopology {
        cpu_type,
        cpu_model: models.as_ref().and_then(|m| m.first().cloned()),
        cpu_models: models,
        num_processors,
        cores_per_processor,
        total_cores,
        threads_per_processor,
        total_threads: total_threads.unwrap_or(fallback_threads),
        hyper_threading: HyperThreading::from_counts(total_cores, total_threads),
    }
}

fn split_per_processor(total: Option<u32>, num: Option<u32>, what: &str) -> Option<u32> {
    let total = total?;
    match per_processor(total, num.unwrap_or(0), what) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!("[cpuinfo] {e}");
            None
        }
    }
}

// --- kernel identity ---

pub fn probe_kernel(host: &dyn HostEnv) -> KernelIdentity {
    KernelIdentity {
        os_type: Platform::Linux,
        kernel_release: read_trimmed(host, OSRELEASE),
        kernel_version: read_trimmed(host, KVERSION),
        system_version: system_version(host),
    }
}

fn read_trimmed(host: &dyn HostEnv, path: &str) -> Option<String> {
    match host.read_file(Path::new(path)) {
        Ok(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Err(e) => {
            debug!("[kernel] {e}");
            None
        }
    }
}

fn system_version(host: &dyn HostEnv) -> Option<String> {
    if let Some(pretty) = read_trimmed(host, OS_RELEASE)
        .and_then(|t| text::key_value_lines(&t).remove("PRETTY_NAME"))
        .filter(|s| !s.is_empty())
    {
        return Some(pretty);
    }
    read_trimmed(host, ISSUE).and_then(|t| parse_issue(&t))
}

/// First line of `/etc/issue` without getty escapes (`\n`, `\l`, ...).
pub fn parse_issue(raw: &str) -> Option<String> {
    static GETTY_ESCAPE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\\[a-zA-Z]").expect("getty escape regex"));
    let line = text::first_line(raw)?;
    let cleaned = GETTY_ESCAPE.replace_all(line, "");
    let cleaned = cleaned.trim();
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

// --- CUDA ---

static CUDA_JSON_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""cuda"\s*:\s*\{[^}]*?"version"\s*:\s*"([\d.]+)""#).expect("cuda json regex")
});
static CUDA_TXT_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CUDA Version\s+([\d.]+)").expect("cuda txt regex"));
static SMI_CUDA_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"CUDA Version:\s*([\d.]+)").expect("nvidia-smi regex"));
static NVRM_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Kernel Module(?: for \S+)?\s+([\d.]+)").expect("nvrm version regex")
});

fn cuda_root(host: &dyn HostEnv) -> PathBuf {
    let set = |key: &str| host.get_env(key).filter(|s| !s.trim().is_empty());
    set("CUDA_HOME")
        .or_else(|| set("CUDA_PATH"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CUDA_DEFAULT_ROOT))
}

/// `None` when no CUDA marker exists at all.
pub fn probe_cuda(host: &dyn HostEnv) -> Option<CudaToolkit> {
    let root = cuda_root(host);
    let version = match cuda_version_marker(host, &root) {
        Some(v) => v,
        None => {
            debug!(root = %root.display(), "[cuda] no version marker and no nvidia-smi");
            return None;
        }
    };

    let existing = |p: PathBuf| host.path_exists(&p).then_some(p);
    let lib_path = existing(root.join("lib64")).or_else(|| existing(root.join("lib")));
    let nvcc_path =
        existing(root.join("bin").join("nvcc")).or_else(|| host.find_executable("nvcc"));
    let driver_version = host
        .read_file(Path::new(NVIDIA_DRIVER_VERSION))
        .ok()
        .and_then(|t| text::first_capture(&NVRM_VERSION, &t).map(str::to_string));

    Some(CudaToolkit {
        version,
        bin_path: existing(root.join("bin")),
        include_path: existing(root.join("include")),
        lib_path,
        nvcc_path,
        driver_version,
    })
}

/// Outer `Option`: was any marker found. Inner: could a version be parsed from it.
fn cuda_version_marker(host: &dyn HostEnv, root: &Path) -> Option<Option<String>> {
    if let Ok(json) = host.read_file(&root.join("version.json")) {
        return Some(text::first_capture(&CUDA_JSON_VERSION, &json).map(str::to_string));
    }
    if let Ok(txt) = host.read_file(&root.join("version.txt")) {
        return Some(text::first_capture(&CUDA_TXT_VERSION, &txt).map(str::to_string));
    }
    let smi = host.find_executable("nvidia-smi")?;
    match host.run_command(&smi.to_string_lossy(), &[]) {
        Ok(out) if out.success() => {
            Some(text::first_capture(&SMI_CUDA_VERSION, &out.stdout).map(str::to_string))
        }
        Ok(out) => {
            debug!(code = ?out.exit_code, "[cuda] nvidia-smi exited nonzero");
            None
        }
        Err(e) => {
            debug!("[cuda] {e}");
            None
        }
    }
}
