//! Runner configuration — loaded from environment variables.

use std::time::Duration;

use hook_pipeline::queue::DEFAULT_CAPACITY_FACTOR;
use hook_pipeline::SystemShell;

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Interpreter for hook commands (`HOOK_SHELL`); platform default when unset.
    pub shell: Option<String>,
    /// Default per-command timeout in seconds; 0 disables it.
    pub command_timeout_secs: u64,
    /// Queue slots per registered repository.
    pub queue_factor: usize,
    /// Timeout for notification webhook requests.
    pub notify_timeout_secs: u64,
}

impl RunnerConfig {
    pub fn from_env() -> Self {
        let shell = std::env::var("HOOK_SHELL").ok().filter(|s| !s.trim().is_empty());
        let command_timeout_secs = std::env::var("HOOK_COMMAND_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let queue_factor = std::env::var("HOOK_QUEUE_FACTOR")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CAPACITY_FACTOR);
        let notify_timeout_secs = std::env::var("NOTIFY_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        if command_timeout_secs == 0 {
            tracing::warn!(
                "HOOK_COMMAND_TIMEOUT not set -- a hung command blocks every queued job"
            );
        }

        Self {
            shell,
            command_timeout_secs,
            queue_factor,
            notify_timeout_secs,
        }
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }

    pub fn system_shell(&self) -> SystemShell {
        let shell = match &self.shell {
            Some(program) => SystemShell::from_interpreter(program),
            None => SystemShell::default(),
        };
        shell.with_timeout(self.command_timeout())
    }
}
