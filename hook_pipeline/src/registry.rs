//! Repository registry — the static set of deployable working trees.
//!
//! Loaded once at startup from a JSON array and never mutated afterwards.
//! The trigger boundary and the queue worker share it read-only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One deployable repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub name: String,
    pub dir: PathBuf,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    pub hook_filters: Vec<HookFilter>,
    #[serde(default)]
    pub hooks: Vec<Hook>,
    #[serde(default)]
    pub fail_hooks: Vec<FailHook>,
}

/// A post-sync command gated by an assertion policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hook {
    pub shell: String,
    /// Working directory override; empty means the repository dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    /// Output must contain this substring (ignored when empty).
    #[serde(default)]
    pub assert: String,
    /// Output must not contain this substring (ignored when empty).
    #[serde(default)]
    pub assert_no: String,
    #[serde(default)]
    pub assert_fail_continue: bool,
    /// Overrides the process-wide command timeout for this hook.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// A cleanup command run after the hook sequence on every exit path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailHook {
    pub shell: String,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    #[serde(rename = "dingtalk")]
    DingTalk,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::DingTalk => f.write_str("dingtalk"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub web_hook: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Header,
    #[serde(alias = "parameters")]
    Parameter,
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterKind::Header => f.write_str("header"),
            FilterKind::Parameter => f.write_str("parameter"),
        }
    }
}

/// Trigger-side precondition; evaluated before a job is enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookFilter {
    #[serde(rename = "type")]
    pub kind: FilterKind,
    pub key: String,
    pub value: String,
}

fn effective_dir<'a>(over: &'a Option<PathBuf>, repo_dir: &'a Path) -> &'a Path {
    match over {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => repo_dir,
    }
}

impl Hook {
    /// Directory the command runs in: the override, or the repository dir.
    pub fn effective_dir<'a>(&'a self, repo_dir: &'a Path) -> &'a Path {
        effective_dir(&self.dir, repo_dir)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl FailHook {
    pub fn effective_dir<'a>(&'a self, repo_dir: &'a Path) -> &'a Path {
        effective_dir(&self.dir, repo_dir)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("cannot read registry {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed registry document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("registry contains no repositories")]
    Empty,
    #[error("repository #{index} has an empty name")]
    MissingName { index: usize },
    #[error("repository [{0}] is declared more than once")]
    DuplicateName(String),
    #[error("repository [{0}] has an empty dir")]
    MissingDir(String),
    #[error("repository [{name}] hook #{index} has an empty shell command")]
    EmptyShell { name: String, index: usize },
}

/// Immutable name → config map.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    repositories: HashMap<String, Arc<RepositoryConfig>>,
}

impl Registry {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            repositories = registry.len(),
            "Repository registry loaded"
        );
        Ok(registry)
    }

    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let list: Vec<RepositoryConfig> = serde_json::from_str(raw)?;
        Self::from_configs(list)
    }

    pub fn from_configs(list: Vec<RepositoryConfig>) -> Result<Self, RegistryError> {
        if list.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut repositories = HashMap::with_capacity(list.len());
        for (index, repo) in list.into_iter().enumerate() {
            validate(index, &repo)?;
            if repositories.contains_key(&repo.name) {
                return Err(RegistryError::DuplicateName(repo.name));
            }
            repositories.insert(repo.name.clone(), Arc::new(repo));
        }

        Ok(Self { repositories })
    }

    pub fn get(&self, name: &str) -> Option<Arc<RepositoryConfig>> {
        self.repositories.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.repositories.keys().map(String::as_str)
    }
}

fn validate(index: usize, repo: &RepositoryConfig) -> Result<(), RegistryError> {
    if repo.name.trim().is_empty() {
        return Err(RegistryError::MissingName { index });
    }
    if repo.dir.as_os_str().is_empty() {
        return Err(RegistryError::MissingDir(repo.name.clone()));
    }
    let hook_shells = repo.hooks.iter().map(|h| h.shell.as_str());
    let fail_shells = repo.fail_hooks.iter().map(|h| h.shell.as_str());
    for (i, shell) in hook_shells.chain(fail_shells).enumerate() {
        if shell.trim().is_empty() {
            return Err(RegistryError::EmptyShell {
                name: repo.name.clone(),
                index: i + 1,
            });
        }
    }
    Ok(())
}
