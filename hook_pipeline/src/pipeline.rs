//! Job pipeline — validate, snapshot, pull, run hooks, roll back on abort,
//! run fail hooks, notify.
//!
//! [`JobPipeline::execute`] covers the states that can abort and returns a
//! [`JobFailure`] carrying the baseline when one was captured. [`JobPipeline::run`]
//! then performs rollback, fail hooks and notification on every exit path,
//! so nothing a hook does can skip the cleanup.

use std::path::Path;
use std::sync::Arc;

use tracing::Instrument;

use crate::git::{self, GitAdapter, GitError, Revision, SyncOutcome};
use crate::notify::NotificationDispatcher;
use crate::registry::RepositoryConfig;
use crate::report::{BuildReport, Outcome, Stage, StepKind};
use crate::shell::{ShellError, ShellRunner};
use crate::step::{HookRunner, StepFailure};

/// An abort in one of the first four states.
#[derive(Debug, thiserror::Error)]
pub enum JobFailure {
    #[error(transparent)]
    Validate(GitError),
    #[error(transparent)]
    Baseline(GitError),
    #[error("{source}")]
    Synchronize { baseline: Revision, source: GitError },
    #[error("{source}")]
    Hook {
        baseline: Revision,
        source: StepFailure,
    },
}

impl JobFailure {
    pub fn stage(&self) -> Stage {
        match self {
            JobFailure::Validate(_) => Stage::Validate,
            JobFailure::Baseline(_) => Stage::CaptureBaseline,
            JobFailure::Synchronize { .. } => Stage::Synchronize,
            JobFailure::Hook { .. } => Stage::RunHooks,
        }
    }

    /// Rollback target, known once the baseline state has passed.
    pub fn baseline(&self) -> Option<&Revision> {
        match self {
            JobFailure::Validate(_) | JobFailure::Baseline(_) => None,
            JobFailure::Synchronize { baseline, .. } | JobFailure::Hook { baseline, .. } => {
                Some(baseline)
            }
        }
    }
}

pub struct JobPipeline {
    git: GitAdapter,
    hooks: HookRunner,
    notifier: NotificationDispatcher,
}

impl JobPipeline {
    pub fn new(shell: Arc<dyn ShellRunner>, notifier: NotificationDispatcher) -> Self {
        Self {
            git: GitAdapter::new(shell.clone()),
            hooks: HookRunner::new(shell),
            notifier,
        }
    }

    /// Run one job to completion. Never fails: every error ends up in the report.
    pub async fn run(&self, repo: &RepositoryConfig) -> BuildReport {
        let mut report = BuildReport::start(&repo.name);
        let span = tracing::info_span!("job", repository = %repo.name, job_id = %report.job_id);

        async {
            tracing::info!(dir = %repo.dir.display(), "Job started");

            let result = self.execute(repo, &mut report).await;

            if let Err(failure) = &result {
                tracing::warn!(stage = %failure.stage(), "Job aborted: {failure}");
                if let Some(baseline) = failure.baseline() {
                    self.rollback(baseline, &repo.dir, &mut report).await;
                }
            }

            self.run_fail_hooks(repo, &mut report).await;

            let outcome = match result {
                Ok(()) => Outcome::Succeeded,
                Err(failure) => Outcome::Failed {
                    stage: failure.stage(),
                    error: failure.to_string(),
                },
            };
            report.finish(outcome);

            let status = if report.succeeded() { "success" } else { "failure" };
            crate::metrics::job_finished(&repo.name, status);
            crate::metrics::job_duration(report.duration_ms());
            tracing::info!(
                status,
                steps = report.steps.len(),
                duration_ms = report.duration_ms(),
                "Job finished"
            );

            self.notifier.dispatch(&repo.notifications, &report).await;
        }
        .instrument(span)
        .await;

        report
    }

    async fn execute(
        &self,
        repo: &RepositoryConfig,
        report: &mut BuildReport,
    ) -> Result<(), JobFailure> {
        let dir = repo.dir.as_path();

        self.git.check_valid(dir).await.map_err(JobFailure::Validate)?;

        let baseline = self
            .git
            .capture_revision(dir)
            .await
            .map_err(JobFailure::Baseline)?;
        tracing::info!(%baseline, "Baseline captured");

        match self.git.synchronize(dir).await {
            Ok(SyncOutcome::UpToDate) => {
                tracing::info!("Already up to date, skipping hooks");
                return Ok(());
            }
            Ok(SyncOutcome::Updated { output }) => {
                tracing::info!(pull = %output.trim(), "Pulled changes");
            }
            Err(source) => return Err(JobFailure::Synchronize { baseline, source }),
        }

        for (index, hook) in repo.hooks.iter().enumerate() {
            tracing::info!(step = index + 1, command = %hook.shell, "Running hook");

            match self.hooks.run_hook(hook, dir).await {
                Ok(output) => report.record(StepKind::Hook, &hook.shell, &output, true),
                Err(failure) => {
                    report.record(StepKind::Hook, &hook.shell, &failure.output, false);
                    if hook.assert_fail_continue {
                        tracing::warn!(step = index + 1, "Tolerated hook failure: {failure}");
                        continue;
                    }
                    return Err(JobFailure::Hook {
                        baseline,
                        source: failure,
                    });
                }
            }
        }

        Ok(())
    }

    /// Hard reset to the baseline. Recorded either way, never retried.
    async fn rollback(&self, baseline: &Revision, dir: &Path, report: &mut BuildReport) {
        let label = git::reset_command(baseline);

        match self.git.reset_to(baseline, dir).await {
            Ok(output) => {
                crate::metrics::rollback(true);
                tracing::info!(%baseline, "Rolled back");
                report.record(StepKind::Rollback, &label, &output, true);
            }
            Err(e) => {
                crate::metrics::rollback(false);
                tracing::error!(%baseline, "Rollback failed: {e}");
                let output = match &e {
                    GitError::Reset { source, .. } => describe(source),
                    other => other.to_string(),
                };
                report.record(StepKind::Rollback, &label, &output, false);
            }
        }
    }

    /// Every fail hook runs, in order. Errors are recorded and absorbed.
    async fn run_fail_hooks(&self, repo: &RepositoryConfig, report: &mut BuildReport) {
        for hook in &repo.fail_hooks {
            match self.hooks.run_fail_hook(hook, &repo.dir).await {
                Ok(output) => report.record(StepKind::FailHook, &hook.shell, &output, true),
                Err(e) => {
                    tracing::warn!(command = %hook.shell, "Fail hook errored: {e}");
                    report.record(StepKind::FailHook, &hook.shell, &describe(&e), false);
                }
            }
        }
    }
}

fn describe(err: &ShellError) -> String {
    match err.output() {
        Some(output) if !output.is_empty() => format!("{err}\n{output}"),
        _ => err.to_string(),
    }
}
