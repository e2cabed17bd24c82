//! Hookrunner pipeline — serialized deployment of git working trees.
//!
//! A trigger enqueues a repository name on the [`JobQueue`]; its single
//! worker runs the [`JobPipeline`] for that repository: validate the working
//! tree, capture the baseline revision, pull, run hooks with their assertion
//! policy, roll back on abort, run fail hooks, and dispatch the
//! [`BuildReport`] to the repository's notification targets.

pub mod git;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod queue;
pub mod registry;
pub mod report;
pub mod shell;
pub mod step;

#[cfg(test)]
mod testing;

pub use git::{GitAdapter, GitError, Revision, SyncOutcome};
pub use notify::{DingTalkNotifier, Message, NotificationDispatcher, Notifier, NotifyError};
pub use pipeline::{JobFailure, JobPipeline};
pub use queue::{JobQueue, QueueError};
pub use registry::{
    FailHook, FilterKind, Hook, HookFilter, Notification, NotificationKind, Registry,
    RegistryError, RepositoryConfig,
};
pub use report::{BuildReport, Outcome, ReportStep, Stage, StepKind};
pub use shell::{ShellError, ShellRunner, SystemShell};
pub use step::{HookRunner, StepFailure, Violation};
