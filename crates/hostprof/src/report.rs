use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json as json;
use sha2::{Digest, Sha256};

use crate::config::ProbeConfig;
use crate::detect::detect_now;
use crate::host::{HostEnv, SystemHost};
use crate::types::{CompilerRecord, ProfileReport};

pub const SCHEMA: u32 = 1;

/// Profile the live machine, configured from `HOSTPROF_*` variables.
pub fn profile() -> Result<ProfileReport> {
    let config = ProbeConfig::from_env();
    let host = SystemHost::from_config(&config);
    profile_with(&host, &config)
}

/// Profile through any host (live or scripted) with an explicit config.
pub fn profile_with(host: &dyn HostEnv, config: &ProbeConfig) -> Result<ProfileReport> {
    let mut p = detect_now(host, config);
    p.schema = SCHEMA;
    p.fingerprint = compute_fingerprint(&p)?;
    p.created_at = Utc::now().to_rfc3339();
    Ok(p)
}

// Stable identity bits only: no timings, timestamps or diagnostics.
#[derive(Serialize)]
struct Identity<'a> {
    os_type: &'a str,
    kernel_release: Option<&'a str>,
    cpu_type: Option<&'a str>,
    cpu_model: Option<&'a str>,
    num_processors: Option<u32>,
    total_cores: Option<u32>,
    total_threads: u32,
    compilers: Vec<(&'a str, &'a str, Option<&'a str>)>,
    cuda_version: Option<&'a str>,
    metal: bool,
}

pub fn compute_fingerprint(p: &ProfileReport) -> Result<String> {
    let compilers: Vec<_> = p
        .compilers
        .iter()
        .flat_map(|(family, records)| {
            records.iter().map(move |r: &CompilerRecord| {
                (
                    family.as_str(),
                    r.bin.to_str().unwrap_or_default(),
                    r.version_number.as_deref(),
                )
            })
        })
        .collect();

    let identity = Identity {
        os_type: p.kernel.os_type.as_str(),
        kernel_release: p.kernel.kernel_release.as_deref(),
        cpu_type: p.cpu.cpu_type.as_deref(),
        cpu_model: p.cpu.cpu_model.as_deref(),
        num_processors: p.cpu.num_processors,
        total_cores: p.cpu.total_cores,
        total_threads: p.cpu.total_threads,
        compilers,
        cuda_version: p
            .accelerators
            .cuda
            .as_ref()
            .and_then(|c| c.version.as_deref()),
        metal: p.accelerators.metal_present,
    };

    let bytes = json::to_vec(&identity).context("serialize fingerprint identity")?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

impl ProfileReport {
    pub fn to_json_pretty(&self) -> Result<String> {
        json::to_string_pretty(self).context("serialize profile report")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    #[test]
    fn test_profile_with_stamps_metadata() {
        let host = FakeHost::linux().with_logical_cpus(4);
        let p = profile_with(&host, &ProbeConfig::default()).unwrap();
        assert_eq!(p.schema, SCHEMA);
        assert_eq!(p.fingerprint.len(), 64);
        assert!(chrono::DateTime::parse_from_rfc3339(&p.created_at).is_ok());
    }

    #[test]
    fn test_fingerprint_ignores_timings() {
        let host = FakeHost::linux().with_logical_cpus(4);
        let mut p = profile_with(&host, &ProbeConfig::default()).unwrap();
        let before = compute_fingerprint(&p).unwrap();
        p.probe_ms_total = Some(123_456);
        p.created_at = "1970-01-01T00:00:00+00:00".into();
        assert_eq!(compute_fingerprint(&p).unwrap(), before);

        p.cpu.total_threads = 5;
        assert_ne!(compute_fingerprint(&p).unwrap(), before);
    }

    #[test]
    fn test_json_round_trip_keeps_shape() {
        let host = FakeHost::linux().with_logical_cpus(4);
        let p = profile_with(&host, &ProbeConfig::default()).unwrap();
        let text = p.to_json_pretty().unwrap();
        let value: json::Value = json::from_str(&text).unwrap();
        assert_eq!(value["kernel"]["os_type"], "linux");
        assert_eq!(value["cpu"]["hyper_threading"], "unknown");
        assert!(value["cpu"]["cpu_model"].is_null());
        assert_eq!(value["accelerators"]["cuda_present"], false);
    }
}
