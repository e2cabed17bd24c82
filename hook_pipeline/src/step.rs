//! Hook step runner — one configured command plus its assertion policy.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::registry::{FailHook, Hook};
use crate::shell::{ShellError, ShellRunner};

/// Why a hook step did not pass.
#[derive(Debug, thiserror::Error)]
pub enum Violation {
    #[error("output does not contain `{0}`")]
    MissingAssert(String),
    #[error("output contains forbidden `{0}`")]
    ForbiddenOutput(String),
    #[error(transparent)]
    Execution(#[from] ShellError),
}

#[derive(Debug, thiserror::Error)]
#[error("hook `{command}` failed: {violation}")]
pub struct StepFailure {
    pub command: String,
    /// Whatever the command printed, for the report.
    pub output: String,
    pub violation: Violation,
}

/// Case-sensitive substring checks against the full output.
pub fn check_assertions(hook: &Hook, output: &str) -> Result<(), Violation> {
    if !hook.assert.is_empty() && !output.contains(&hook.assert) {
        return Err(Violation::MissingAssert(hook.assert.clone()));
    }
    if !hook.assert_no.is_empty() && output.contains(&hook.assert_no) {
        return Err(Violation::ForbiddenOutput(hook.assert_no.clone()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct HookRunner {
    shell: Arc<dyn ShellRunner>,
}

impl HookRunner {
    pub fn new(shell: Arc<dyn ShellRunner>) -> Self {
        Self { shell }
    }

    /// Run a hook; `Err` covers both execution errors and assertion violations.
    pub async fn run_hook(&self, hook: &Hook, repo_dir: &Path) -> Result<String, StepFailure> {
        let start = Instant::now();
        let result = self
            .shell
            .run(&hook.shell, hook.effective_dir(repo_dir), hook.timeout())
            .await;
        crate::metrics::step_duration("hook", start.elapsed().as_millis() as u64);

        let output = match result {
            Ok(output) => output,
            Err(err) => {
                return Err(StepFailure {
                    command: hook.shell.clone(),
                    output: err.output().map(str::to_string).unwrap_or_else(|| err.to_string()),
                    violation: Violation::Execution(err),
                })
            }
        };

        match check_assertions(hook, &output) {
            Ok(()) => Ok(output),
            Err(violation) => Err(StepFailure {
                command: hook.shell.clone(),
                output,
                violation,
            }),
        }
    }

    /// Run a fail hook. There is no assertion; only execution can fail.
    pub async fn run_fail_hook(&self, hook: &FailHook, repo_dir: &Path) -> Result<String, ShellError> {
        let start = Instant::now();
        let result = self
            .shell
            .run(&hook.shell, hook.effective_dir(repo_dir), None)
            .await;
        crate::metrics::step_duration("fail_hook", start.elapsed().as_millis() as u64);
        result
    }
}
