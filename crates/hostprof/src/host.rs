//! Access to the machine being profiled.
//!
//! Probes never touch `std::process`, `std::fs` or `std::env` directly; they go
//! through [`HostEnv`], so the same parsers run against the live system
//! ([`SystemHost`]) or against scripted fixtures (`testing::FakeHost`).

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sysinfo::System;
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::error::{ProbeError, Result};

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// stdout followed by stderr; compilers split their banner between both.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            return self.stdout.clone();
        }
        if self.stdout.is_empty() {
            return self.stderr.clone();
        }
        format!("{}\n{}", self.stdout.trim_end(), self.stderr)
    }
}

pub trait HostEnv: Send + Sync {
    /// Run `program` with `args`. A nonzero exit is still `Ok`; failing to
    /// launch (or timing out) is `CommandFailed`.
    fn run_command(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;

    fn read_file(&self, path: &Path) -> Result<String>;

    /// Resolve a program name on the search path.
    fn find_executable(&self, name: &str) -> Option<PathBuf>;

    fn path_exists(&self, path: &Path) -> bool;

    fn get_env(&self, name: &str) -> Option<String>;

    /// "unix", "windows", ...
    fn os_family(&self) -> String;

    /// "linux", "macos", "freebsd", "windows", ...
    fn os_name(&self) -> String;

    /// Logical CPUs visible to this process.
    fn logical_cpus(&self) -> usize;

    /// Kernel/OS version as the runtime reports it, if any.
    fn os_version(&self) -> Option<String>;

    /// Target triple style identifier, e.g. `x86_64-unknown-linux-gnu`.
    fn system_architecture(&self) -> String;
}

/// Run a command and return its stdout, treating a nonzero exit as failure.
pub fn command_stdout(host: &dyn HostEnv, program: &str, args: &[&str]) -> Result<String> {
    let out = host.run_command(program, args)?;
    if !out.success() {
        let reason = match out.exit_code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        };
        return Err(ProbeError::command_failed(display_command(program, args), reason));
    }
    Ok(out.stdout)
}

/// Resolve a tool that has no substitute.
pub fn require_tool(host: &dyn HostEnv, name: &str) -> Result<PathBuf> {
    host.find_executable(name)
        .ok_or_else(|| ProbeError::ToolNotFound {
            tool: name.to_string(),
        })
}

pub(crate) fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{program} {}", args.join(" "))
    }
}

/// The live machine.
#[derive(Debug, Clone)]
pub struct SystemHost {
    timeout: Duration,
}

impl SystemHost {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.command_timeout)
    }
}

impl Default for SystemHost {
    fn default() -> Self {
        Self::new(ProbeConfig::default().command_timeout)
    }
}

impl HostEnv for SystemHost {
    fn run_command(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let shown = display_command(program, args);
        let start = Instant::now();

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ProbeError::command_failed(&shown, e.to_string()))?;

        // Drain both pipes while waiting so a chatty child cannot block on a full pipe.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let waited = wait_with_deadline(&mut child, self.timeout);
        let ms = start.elapsed().as_millis() as u64;
        debug!(command = %shown, elapsed_ms = ms, "ran external command");

        match waited {
            Ok(Some(status)) => Ok(CommandOutput {
                stdout: collect(stdout),
                stderr: collect(stderr),
                exit_code: status.code(),
            }),
            Ok(None) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(command = %shown, timeout_ms, "killed after timeout");
                Err(ProbeError::command_failed(
                    &shown,
                    format!("timed out after {} ms", self.timeout.as_millis()),
                ))
            }
            Err(e) => Err(ProbeError::command_failed(&shown, e.to_string())),
        }
    }

    fn read_file(&self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|source| ProbeError::FileRead {
            path: path.to_path_buf(),
            source,
        })
    }

    fn find_executable(&self, name: &str) -> Option<PathBuf> {
        which::which(name).ok()
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn get_env(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }

    fn os_family(&self) -> String {
        std::env::consts::FAMILY.to_string()
    }

    fn os_name(&self) -> String {
        std::env::consts::OS.to_string()
    }

    fn logical_cpus(&self) -> usize {
        num_cpus::get()
    }

    fn os_version(&self) -> Option<String> {
        System::kernel_version()
    }

    fn system_architecture(&self) -> String {
        env!("HOSTPROF_TARGET").to_string()
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Wait for `child` until `timeout` elapses. On expiry the child is killed
/// and reaped, and `Ok(None)` is returned.
pub fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(Some(status)),
            Ok(None) if Instant::now() >= deadline => {
                // kill fails only if the child already exited; wait reaps either way
                let _ = child.kill();
                child.wait()?;
                return Ok(None);
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut r| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = r.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
