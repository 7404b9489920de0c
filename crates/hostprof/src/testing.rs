//! Scripted in-memory [`HostEnv`] for tests and fixture replay.
//!
//! Nothing is read from the real machine: every command, file, executable
//! and environment variable a probe asks for must be registered up front.
//! Unregistered commands fail to launch, unregistered files fail to read.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{ProbeError, Result};
use crate::host::{display_command, CommandOutput, HostEnv};

#[derive(Debug, Clone)]
pub struct FakeHost {
    family: String,
    os: String,
    logical_cpus: usize,
    os_version: Option<String>,
    arch: String,
    commands: HashMap<String, CommandOutput>,
    files: HashMap<PathBuf, String>,
    dirs: HashSet<PathBuf>,
    executables: HashMap<String, PathBuf>,
    env: HashMap<String, String>,
}

impl FakeHost {
    pub fn new(family: &str, os: &str) -> Self {
        Self {
            family: family.to_string(),
            os: os.to_string(),
            logical_cpus: 1,
            os_version: None,
            arch: "x86_64-unknown-linux-gnu".to_string(),
            commands: HashMap::new(),
            files: HashMap::new(),
            dirs: HashSet::new(),
            executables: HashMap::new(),
            env: HashMap::new(),
        }
    }

    pub fn linux() -> Self {
        Self::new("unix", "linux")
    }

    pub fn macos() -> Self {
        Self::new("unix", "macos").with_arch("aarch64-apple-darwin")
    }

    pub fn freebsd() -> Self {
        Self::new("unix", "freebsd").with_arch("x86_64-unknown-freebsd")
    }

    pub fn windows() -> Self {
        Self::new("windows", "windows").with_arch("x86_64-pc-windows-msvc")
    }

    #[must_use]
    pub fn with_logical_cpus(mut self, n: usize) -> Self {
        self.logical_cpus = n;
        self
    }

    #[must_use]
    pub fn with_os_version(mut self, v: &str) -> Self {
        self.os_version = Some(v.to_string());
        self
    }

    #[must_use]
    pub fn with_arch(mut self, arch: &str) -> Self {
        self.arch = arch.to_string();
        self
    }

    /// Script a command that exits 0 with `stdout`.
    #[must_use]
    pub fn with_command(self, program: &str, args: &[&str], stdout: &str) -> Self {
        self.with_command_output(
            program,
            args,
            CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: Some(0),
            },
        )
    }

    #[must_use]
    pub fn with_command_output(
        mut self,
        program: &str,
        args: &[&str],
        output: CommandOutput,
    ) -> Self {
        self.commands.insert(display_command(program, args), output);
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files.insert(path.into(), contents.to_string());
        self
    }

    #[must_use]
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirs.insert(path.into());
        self
    }

    /// Make `name` resolvable on the search path as `path`.
    #[must_use]
    pub fn with_executable(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        self.executables.insert(name.to_string(), path.into());
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }
}

impl HostEnv for FakeHost {
    fn run_command(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let key = display_command(program, args);
        self.commands
            .get(&key)
            .cloned()
            .ok_or_else(|| ProbeError::command_failed(key, "No such file or directory"))
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| ProbeError::FileRead {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        if name.contains('/') {
            let p = PathBuf::from(name);
            return self.path_exists(&p).then_some(p);
        }
        self.executables.get(name).cloned()
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.files.contains_key(path)
            || self.dirs.contains(path)
            || self.executables.values().any(|p| p == path)
    }

    fn get_env(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }

    fn os_family(&self) -> String {
        self.family.clone()
    }

    fn os_name(&self) -> String {
        self.os.clone()
    }

    fn logical_cpus(&self) -> usize {
        self.logical_cpus
    }

    fn os_version(&self) -> Option<String> {
        self.os_version.clone()
    }

    fn system_architecture(&self) -> String {
        self.arch.clone()
    }
}
