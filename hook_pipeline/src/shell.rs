//! Shell runner — executes one command string through an explicit interpreter.
//!
//! Commands are never tokenized here: the whole string is handed to the
//! interpreter (`sh -c`, `cmd /C`, ...) so quoting, pipes and redirection
//! behave exactly as written in the registry.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` exited with {}", exit_label(.code))]
    Exit {
        command: String,
        code: Option<i32>,
        output: String,
    },
    #[error("`{command}` timed out after {}s", .after.as_secs())]
    TimedOut { command: String, after: Duration },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "no status (killed by signal)".to_string(),
    }
}

impl ShellError {
    /// Output captured before the failure, when the process got that far.
    pub fn output(&self) -> Option<&str> {
        match self {
            ShellError::Exit { output, .. } => Some(output),
            _ => None,
        }
    }
}

/// Runs a command string in a directory and returns combined output.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    /// `timeout` overrides the runner's default; `None` keeps the default.
    async fn run(
        &self,
        command: &str,
        dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<String, ShellError>;
}

/// Spawns real processes through a configured interpreter.
#[derive(Debug, Clone)]
pub struct SystemShell {
    program: String,
    flag: String,
    default_timeout: Option<Duration>,
}

impl Default for SystemShell {
    fn default() -> Self {
        if cfg!(windows) {
            Self::new("cmd", "/C")
        } else {
            Self::new("/bin/sh", "-c")
        }
    }
}

impl SystemShell {
    pub fn new(program: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            flag: flag.into(),
            default_timeout: None,
        }
    }

    /// Build from an interpreter path; the flag follows the interpreter family.
    pub fn from_interpreter(program: &str) -> Self {
        let lower = program.to_ascii_lowercase();
        if lower.ends_with("cmd") || lower.ends_with("cmd.exe") {
            Self::new(program, "/C")
        } else {
            Self::new(program, "-c")
        }
    }

    /// Apply a timeout to every command that doesn't carry its own.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl ShellRunner for SystemShell {
    async fn run(
        &self,
        command: &str,
        dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<String, ShellError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.flag)
            .arg(command)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down everything the command started.
        #[cfg(unix)]
        cmd.process_group(0);

        tracing::debug!(command, dir = %dir.display(), "Spawning command");

        let spawn_error = |source| ShellError::Spawn {
            command: command.to_string(),
            source,
        };
        let child = cmd.spawn().map_err(spawn_error)?;
        let pid = child.id();
        let finished = child.wait_with_output();

        let result = match timeout.or(self.default_timeout) {
            Some(limit) => match tokio::time::timeout(limit, finished).await {
                Ok(result) => result,
                Err(_) => {
                    kill_process_group(pid);
                    return Err(ShellError::TimedOut {
                        command: command.to_string(),
                        after: limit,
                    });
                }
            },
            None => finished.await,
        };
        let output = result.map_err(spawn_error)?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            Ok(combined)
        } else {
            Err(ShellError::Exit {
                command: command.to_string(),
                code: output.status.code(),
                output: combined,
            })
        }
    }
}

/// SIGKILL the process group led by `pid`. The interpreter itself is also
/// reaped through `kill_on_drop` once its future is dropped.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    // SAFETY: killpg only sends a signal; the group was created by process_group(0).
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        tracing::warn!(
            pid,
            "Failed to kill process group: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}
