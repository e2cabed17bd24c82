//! Git adapter — the four revision-control operations the pipeline needs.
//!
//! Everything goes through [`ShellRunner`], so the adapter sees the same
//! interpreter and timeout policy as the hooks do.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::shell::{ShellError, ShellRunner};

static REVISION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("static regex"));

/// A full 40-character hex commit id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    /// Accepts raw command output: surrounding whitespace and quotes are ignored.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().trim_matches('"');
        REVISION_REGEX
            .is_match(trimmed)
            .then(|| Self(trimmed.to_string()))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    UpToDate,
    Updated { output: String },
}

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("{dir} is not a git repository: {reason}")]
    NotWorkTree { dir: String, reason: String },
    #[error("cannot read current revision: {0}")]
    RevisionUnreadable(#[source] ShellError),
    #[error("current revision has unexpected shape: {0:?}")]
    RevisionShape(String),
    #[error("git pull failed: {0}")]
    Pull(#[source] ShellError),
    #[error("git reset to {revision} failed: {source}")]
    Reset {
        revision: Revision,
        source: ShellError,
    },
}

const VALIDATE_CMD: &str = "git rev-parse --is-inside-work-tree";
const REVISION_CMD: &str = "git rev-parse HEAD";
const PULL_CMD: &str = "git pull";

/// The command string used for a hard reset, also used as its report label.
pub fn reset_command(revision: &Revision) -> String {
    format!("git reset --hard {revision}")
}

#[derive(Clone)]
pub struct GitAdapter {
    shell: Arc<dyn ShellRunner>,
}

impl GitAdapter {
    pub fn new(shell: Arc<dyn ShellRunner>) -> Self {
        Self { shell }
    }

    pub async fn check_valid(&self, dir: &Path) -> Result<(), GitError> {
        let not_work_tree = |reason: String| GitError::NotWorkTree {
            dir: dir.display().to_string(),
            reason,
        };

        let output = self
            .shell
            .run(VALIDATE_CMD, dir, None)
            .await
            .map_err(|e| match e.output().map(str::trim) {
                Some(printed) if !printed.is_empty() => not_work_tree(printed.to_string()),
                _ => not_work_tree(e.to_string()),
            })?;

        if !output.contains("true") {
            return Err(not_work_tree(format!("check {}", output.trim())));
        }
        Ok(())
    }

    pub async fn capture_revision(&self, dir: &Path) -> Result<Revision, GitError> {
        let output = self
            .shell
            .run(REVISION_CMD, dir, None)
            .await
            .map_err(GitError::RevisionUnreadable)?;

        Revision::parse(&output).ok_or_else(|| GitError::RevisionShape(output.trim().to_string()))
    }

    /// Pull from the remote. Whether anything changed is decided by comparing
    /// HEAD before and after, never by parsing git's (localized) messages.
    pub async fn synchronize(&self, dir: &Path) -> Result<SyncOutcome, GitError> {
        let before = self.capture_revision(dir).await?;

        let output = self
            .shell
            .run(PULL_CMD, dir, None)
            .await
            .map_err(GitError::Pull)?;

        let after = self.capture_revision(dir).await?;
        if after == before {
            Ok(SyncOutcome::UpToDate)
        } else {
            Ok(SyncOutcome::Updated { output })
        }
    }

    /// Destructive: discards local changes and moves HEAD to `revision`.
    pub async fn reset_to(&self, revision: &Revision, dir: &Path) -> Result<String, GitError> {
        self.shell
            .run(&reset_command(revision), dir, None)
            .await
            .map_err(|source| GitError::Reset {
                revision: revision.clone(),
                source,
            })
    }
}
