//! C/C++ compiler discovery.
//!
//! For each toolchain family the candidates are the unsuffixed program plus
//! every `program-N` for N up to the configured latest major version. Each
//! candidate is run with `--version`, and the banner (not the file name)
//! decides what it really is: `gcc` on macOS is usually Apple clang, and a
//! `clang` that prints a Free Software Foundation copyright is GCC.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::ProbeConfig;
use crate::host::HostEnv;
use crate::platform::Platform;
use crate::text;
use crate::types::{BuildFlags, CompilerKind, CompilerRecord};

const GCC_COPYRIGHT: &str = "Free Software Foundation";
const APPLE_CLANG: &[&str] = &["Apple clang version", "Apple LLVM version"];
const CLANG: &str = "clang version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cxx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilerFamily {
    Gcc,
    Gxx,
    Clang,
    Clangxx,
    AppleClang,
    AppleClangxx,
}

impl CompilerFamily {
    pub const PORTABLE: [CompilerFamily; 4] = [
        CompilerFamily::Gcc,
        CompilerFamily::Gxx,
        CompilerFamily::Clang,
        CompilerFamily::Clangxx,
    ];

    /// Key in the report's compiler mapping.
    pub fn name(self) -> &'static str {
        match self {
            CompilerFamily::Gcc => "gcc",
            CompilerFamily::Gxx => "g++",
            CompilerFamily::Clang => "clang",
            CompilerFamily::Clangxx => "clang++",
            CompilerFamily::AppleClang => "apple_clang",
            CompilerFamily::AppleClangxx => "apple_clang++",
        }
    }

    pub fn language(self) -> Language {
        match self {
            CompilerFamily::Gcc | CompilerFamily::Clang | CompilerFamily::AppleClang => {
                Language::C
            }
            _ => Language::Cxx,
        }
    }

    /// Families probed on `platform`; the Apple ones only exist on macOS.
    pub fn for_platform(platform: Platform) -> Vec<CompilerFamily> {
        let mut families = Self::PORTABLE.to_vec();
        if platform == Platform::Macos {
            families.push(CompilerFamily::AppleClang);
            families.push(CompilerFamily::AppleClangxx);
        }
        families
    }

    /// Search-path program name, or `None` for the fixed-path Apple families.
    fn program(self) -> Option<&'static str> {
        match self {
            CompilerFamily::AppleClang | CompilerFamily::AppleClangxx => None,
            other => Some(other.name()),
        }
    }

    fn fixed_path(self) -> Option<&'static str> {
        match self {
            CompilerFamily::AppleClang => Some("/usr/bin/clang"),
            CompilerFamily::AppleClangxx => Some("/usr/bin/clang++"),
            _ => None,
        }
    }

    fn max_major(self, config: &ProbeConfig) -> u32 {
        match self {
            CompilerFamily::Gcc | CompilerFamily::Gxx => config.gcc_max_major,
            CompilerFamily::Clang | CompilerFamily::Clangxx => config.clang_max_major,
            CompilerFamily::AppleClang | CompilerFamily::AppleClangxx => 0,
        }
    }
}

/// Decide the toolchain from `--version` output. Pure: the same text always
/// gives the same kind.
pub fn classify_banner(output: &str, language: Language) -> CompilerKind {
    let cxx = language == Language::Cxx;
    if output.contains(GCC_COPYRIGHT) {
        if cxx {
            CompilerKind::Gxx
        } else {
            CompilerKind::Gcc
        }
    } else if APPLE_CLANG.iter().any(|p| output.contains(p)) {
        if cxx {
            CompilerKind::AppleClangxx
        } else {
            CompilerKind::AppleClang
        }
    } else if output.contains(CLANG) {
        if cxx {
            CompilerKind::Clangxx
        } else {
            CompilerKind::Clang
        }
    } else {
        CompilerKind::Unknown
    }
}

/// Banner line and version number, both best-effort.
pub fn parse_banner(output: &str) -> (Option<String>, Option<String>) {
    let banner = text::first_line(output).map(str::to_string);
    let version = banner
        .as_deref()
        .and_then(text::first_version)
        .or_else(|| text::first_version(output))
        .map(str::to_string);
    (banner, version)
}

/// Run `bin --version` and build its record.
pub fn inspect(host: &dyn HostEnv, bin: &Path, language: Language) -> CompilerRecord {
    let output = match host.run_command(&bin.to_string_lossy(), &["--version"]) {
        Ok(out) => out.combined(),
        Err(e) => {
            debug!("[compilers] {e}");
            String::new()
        }
    };
    if output.trim().is_empty() {
        return CompilerRecord {
            bin: bin.to_path_buf(),
            kind: CompilerKind::Unknown,
            version_banner: None,
            version_number: None,
        };
    }

    let (version_banner, version_number) = parse_banner(&output);
    CompilerRecord {
        bin: bin.to_path_buf(),
        kind: classify_banner(&output, language),
        version_banner,
        version_number,
    }
}

/// Executables to try for `family`, without duplicates, in probe order.
pub fn candidates(
    host: &dyn HostEnv,
    family: CompilerFamily,
    config: &ProbeConfig,
) -> Vec<PathBuf> {
    if let Some(fixed) = family.fixed_path() {
        let p = PathBuf::from(fixed);
        return if host.path_exists(&p) { vec![p] } else { Vec::new() };
    }
    let Some(program) = family.program() else {
        return Vec::new();
    };

    let names = std::iter::once(program.to_string())
        .chain((1..=family.max_major(config)).map(|v| format!("{program}-{v}")));

    let mut found: Vec<PathBuf> = Vec::new();
    for name in names {
        if let Some(p) = host.find_executable(&name) {
            if !found.contains(&p) {
                found.push(p);
            }
        }
    }
    found
}

/// Resolve and classify the compiler named by `CC`/`CXX`.
/// A name that resolves to nothing yields an `Undefined` record.
pub fn env_compiler(host: &dyn HostEnv, value: &str, language: Language) -> CompilerRecord {
    let value = value.trim();
    let resolved = if value.contains('/') {
        let p = PathBuf::from(value);
        host.path_exists(&p).then_some(p)
    } else {
        host.find_executable(value)
    };

    match resolved {
        Some(bin) => inspect(host, &bin, language),
        None => {
            debug!("[compilers] `{value}` does not resolve to an executable");
            CompilerRecord {
                bin: PathBuf::from(value),
                kind: CompilerKind::Undefined,
                version_banner: None,
                version_number: None,
            }
        }
    }
}

pub fn discover(
    host: &dyn HostEnv,
    platform: Platform,
    config: &ProbeConfig,
) -> BTreeMap<String, Vec<CompilerRecord>> {
    let mut out = BTreeMap::new();

    for family in CompilerFamily::for_platform(platform) {
        let records: Vec<CompilerRecord> = candidates(host, family, config)
            .iter()
            .map(|bin| inspect(host, bin, family.language()))
            .collect();
        debug!(family = family.name(), found = records.len(), "[compilers] probed family");
        out.insert(family.name().to_string(), records);
    }

    for (var, language) in [("CC", Language::C), ("CXX", Language::Cxx)] {
        if let Some(value) = host.get_env(var).filter(|v| !v.trim().is_empty()) {
            out.insert(var.to_string(), vec![env_compiler(host, &value, language)]);
        }
    }

    out
}

pub fn build_flags(host: &dyn HostEnv) -> BuildFlags {
    BuildFlags {
        cflags: host.get_env("CFLAGS"),
        cxxflags: host.get_env("CXXFLAGS"),
        ldflags: host.get_env("LDFLAGS"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    const GCC_13: &str = "gcc (Ubuntu 13.2.0-4ubuntu3) 13.2.0
Copyright (C) 2023 Free Software Foundation, Inc.
This is free software; see the source for copying conditions.  There is NO
warranty; not even for MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
";

    const GCC_9: &str = "gcc-9 (Ubuntu 9.4.0-1ubuntu1~20.04.2) 9.4.0
Copyright (C) 2019 Free Software Foundation, Inc.
";

    const APPLE_CLANG_14: &str = "Apple clang version 14.0.0 (clang-1400.0.29.202)
Target: arm64-apple-darwin22.1.0
Thread model: posix
InstalledDir: /Library/Developer/CommandLineTools/usr/bin
";

    const UBUNTU_CLANG: &str = "Ubuntu clang version 14.0.0-1ubuntu1.1
Target: x86_64-pc-linux-gnu
Thread model: posix
InstalledDir: /usr/bin
";

    #[test]
    fn test_apple_clang_is_never_plain_clang() {
        assert_eq!(
            classify_banner(APPLE_CLANG_14, Language::C),
            CompilerKind::AppleClang
        );
        assert_eq!(
            classify_banner(APPLE_CLANG_14, Language::Cxx),
            CompilerKind::AppleClangxx
        );
    }

    #[test]
    fn test_gcc_banner_wins_over_lookup_name() {
        // e.g. `clang` symlinked to gcc: classification follows the banner
        assert_eq!(classify_banner(GCC_13, Language::C), CompilerKind::Gcc);
        assert_eq!(classify_banner(GCC_13, Language::Cxx), CompilerKind::Gxx);
    }

    #[test]
    fn test_plain_clang_and_unknown() {
        assert_eq!(classify_banner(UBUNTU_CLANG, Language::C), CompilerKind::Clang);
        assert_eq!(
            classify_banner(UBUNTU_CLANG, Language::Cxx),
            CompilerKind::Clangxx
        );
        assert_eq!(
            classify_banner("Intel(R) oneAPI DPC++/C++ Compiler 2024.0.0", Language::Cxx),
            CompilerKind::Unknown
        );
    }

    #[test]
    fn test_classification_is_idempotent() {
        for banner in [GCC_13, GCC_9, APPLE_CLANG_14, UBUNTU_CLANG] {
            let first = (classify_banner(banner, Language::C), parse_banner(banner));
            let second = (classify_banner(banner, Language::C), parse_banner(banner));
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_parse_banner_versions() {
        assert_eq!(
            parse_banner(GCC_13),
            (
                Some("gcc (Ubuntu 13.2.0-4ubuntu3) 13.2.0".to_string()),
                Some("13.2.0".to_string())
            )
        );
        assert_eq!(parse_banner(GCC_9).1.as_deref(), Some("9.4.0"));
        assert_eq!(parse_banner(APPLE_CLANG_14).1.as_deref(), Some("14.0.0"));
        assert_eq!(parse_banner(UBUNTU_CLANG).1.as_deref(), Some("14.0.0"));
        assert_eq!(parse_banner("tcc version mystery").1, None);
    }

    #[test]
    fn test_candidates_include_suffixed_versions() {
        let host = FakeHost::linux()
            .with_executable("gcc", "/usr/bin/gcc")
            .with_executable("gcc-9", "/usr/bin/gcc-9")
            .with_executable("gcc-13", "/usr/bin/gcc-13")
            .with_executable("gcc-30", "/usr/bin/gcc-30");
        let found = candidates(&host, CompilerFamily::Gcc, &ProbeConfig::default());
        assert_eq!(
            found,
            vec![
                PathBuf::from("/usr/bin/gcc"),
                PathBuf::from("/usr/bin/gcc-9"),
                PathBuf::from("/usr/bin/gcc-13"),
            ]
        );
    }

    #[test]
    fn test_candidates_dedupe_same_binary() {
        let host = FakeHost::linux()
            .with_executable("clang", "/usr/bin/clang-14")
            .with_executable("clang-14", "/usr/bin/clang-14");
        let found = candidates(&host, CompilerFamily::Clang, &ProbeConfig::default());
        assert_eq!(found, vec![PathBuf::from("/usr/bin/clang-14")]);
    }

    #[test]
    fn test_apple_families_use_fixed_paths() {
        let host = FakeHost::macos().with_file("/usr/bin/clang++", "");
        let cfg = ProbeConfig::default();
        assert_eq!(
            candidates(&host, CompilerFamily::AppleClangxx, &cfg),
            vec![PathBuf::from("/usr/bin/clang++")]
        );
        assert!(candidates(&host, CompilerFamily::AppleClang, &cfg).is_empty());
    }

    #[test]
    fn test_discover_linux() {
        let host = FakeHost::linux()
            .with_executable("gcc", "/usr/bin/gcc")
            .with_executable("gcc-9", "/usr/bin/gcc-9")
            .with_command("/usr/bin/gcc", &["--version"], GCC_13)
            .with_command("/usr/bin/gcc-9", &["--version"], GCC_9)
            .with_executable("clang", "/usr/bin/clang")
            .with_command("/usr/bin/clang", &["--version"], UBUNTU_CLANG);
        let found = discover(&host, Platform::Linux, &ProbeConfig::default());

        assert_eq!(
            found.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["clang", "clang++", "g++", "gcc"]
        );
        let gcc = &found["gcc"];
        assert_eq!(gcc.len(), 2);
        assert_eq!(gcc[0].kind, CompilerKind::Gcc);
        assert_eq!(gcc[0].version_number.as_deref(), Some("13.2.0"));
        assert_eq!(gcc[1].bin, PathBuf::from("/usr/bin/gcc-9"));
        assert_eq!(gcc[1].version_number.as_deref(), Some("9.4.0"));
        assert_eq!(found["clang"][0].kind, CompilerKind::Clang);
        assert!(found["g++"].is_empty());
    }

    #[test]
    fn test_discover_classifies_gcc_behind_clang_name() {
        let host = FakeHost::linux()
            .with_executable("clang", "/usr/local/bin/clang")
            .with_command("/usr/local/bin/clang", &["--version"], GCC_13)
            .with_executable("clang++", "/usr/local/bin/clang++")
            .with_command("/usr/local/bin/clang++", &["--version"], GCC_13);
        let found = discover(&host, Platform::Linux, &ProbeConfig::default());
        assert_eq!(found["clang"][0].kind, CompilerKind::Gcc);
        assert_eq!(found["clang"][0].version_number.as_deref(), Some("13.2.0"));
        assert_eq!(found["clang++"][0].kind, CompilerKind::Gxx);
    }

    #[test]
    fn test_discover_macos_reclassifies_clang_as_apple() {
        let host = FakeHost::macos()
            .with_executable("clang", "/usr/bin/clang")
            .with_command("/usr/bin/clang", &["--version"], APPLE_CLANG_14);
        let found = discover(&host, Platform::Macos, &ProbeConfig::default());
        assert_eq!(found["clang"][0].kind, CompilerKind::AppleClang);
        assert_eq!(found["apple_clang"][0].kind, CompilerKind::AppleClang);
        assert!(found["apple_clang++"].is_empty());
    }

    #[test]
    fn test_banner_on_stderr_is_read() {
        let host = FakeHost::linux()
            .with_executable("g++", "/usr/bin/g++")
            .with_command_output(
                "/usr/bin/g++",
                &["--version"],
                crate::host::CommandOutput {
                    stdout: String::new(),
                    stderr: GCC_13.replace("gcc (", "g++ ("),
                    exit_code: Some(0),
                },
            );
        let rec = inspect(&host, Path::new("/usr/bin/g++"), Language::Cxx);
        assert_eq!(rec.kind, CompilerKind::Gxx);
        assert_eq!(
            rec.version_banner.as_deref(),
            Some("g++ (Ubuntu 13.2.0-4ubuntu3) 13.2.0")
        );
    }

    #[test]
    fn test_binary_that_will_not_run_is_unknown() {
        let host = FakeHost::linux().with_executable("gcc", "/usr/bin/gcc");
        let rec = inspect(&host, Path::new("/usr/bin/gcc"), Language::C);
        assert_eq!(rec.kind, CompilerKind::Unknown);
        assert_eq!(rec.version_banner, None);
    }

    #[test]
    fn test_env_compilers() {
        let host = FakeHost::linux()
            .with_env("CC", "gcc-9")
            .with_env("CXX", "/opt/nowhere/g++")
            .with_executable("gcc-9", "/usr/bin/gcc-9")
            .with_command("/usr/bin/gcc-9", &["--version"], GCC_9);
        let cfg = ProbeConfig {
            gcc_max_major: 0,
            clang_max_major: 0,
            ..ProbeConfig::default()
        };
        let found = discover(&host, Platform::Linux, &cfg);

        let cc = &found["CC"][0];
        assert_eq!(cc.kind, CompilerKind::Gcc);
        assert_eq!(cc.version_number.as_deref(), Some("9.4.0"));

        let cxx = &found["CXX"][0];
        assert_eq!(cxx.kind, CompilerKind::Undefined);
        assert_eq!(cxx.bin, PathBuf::from("/opt/nowhere/g++"));
        // gcc-9 is only reachable through CC when the version range is empty
        assert!(found["gcc"].is_empty());
    }

    #[test]
    fn test_build_flags() {
        let host = FakeHost::linux()
            .with_env("CFLAGS", "-O2 -pipe")
            .with_env("LDFLAGS", "-Wl,--as-needed");
        let flags = build_flags(&host);
        assert_eq!(flags.cflags.as_deref(), Some("-O2 -pipe"));
        assert_eq!(flags.cxxflags, None);
        assert_eq!(flags.ldflags.as_deref(), Some("-Wl,--as-needed"));
    }
}
