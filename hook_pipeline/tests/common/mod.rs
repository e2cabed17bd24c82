//! Real git repositories for pipeline tests: a bare remote, a seed clone
//! that publishes changes, and the working tree under deployment.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hook_pipeline::{
    FailHook, Hook, Message, Notification, NotificationKind, Notifier, NotifyError,
    RepositoryConfig,
};
use tempfile::TempDir;

pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_AUTHOR_NAME", "hookrunner")
        .env("GIT_AUTHOR_EMAIL", "hookrunner@example.com")
        .env("GIT_COMMITTER_NAME", "hookrunner")
        .env("GIT_COMMITTER_EMAIL", "hookrunner@example.com")
        .output()
        .expect("git is installed");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

pub struct GitFixture {
    root: TempDir,
    pub remote: PathBuf,
    pub seed: PathBuf,
    pub work: PathBuf,
}

impl GitFixture {
    /// Remote, seed and work tree all at one commit with `app.txt = v1`.
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let remote = root.path().join("remote.git");
        let seed = root.path().join("seed");
        let work = root.path().join("work");

        git(root.path(), &["init", "--bare", "remote.git"]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        git(root.path(), &["init", "seed"]);
        git(&seed, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        git(&seed, &["remote", "add", "origin", remote.to_str().unwrap()]);

        let fixture = Self {
            root,
            remote,
            seed,
            work,
        };
        fixture.commit("app.txt", "v1\n");
        git(&fixture.seed, &["push", "origin", "main"]);

        git(
            fixture.root.path(),
            &["clone", fixture.remote.to_str().unwrap(), "work"],
        );
        git(&fixture.work, &["config", "pull.ff", "only"]);
        fixture
    }

    fn commit(&self, file: &str, content: &str) {
        std::fs::write(self.seed.join(file), content).unwrap();
        git(&self.seed, &["add", file]);
        git(&self.seed, &["commit", "-m", &format!("update {file}")]);
    }

    /// Publish a new commit to the remote; the work tree is now behind.
    pub fn push_change(&self, file: &str, content: &str) -> String {
        self.commit(file, content);
        git(&self.seed, &["push", "origin", "main"]);
        git(&self.seed, &["rev-parse", "HEAD"])
    }

    pub fn work_head(&self) -> String {
        git(&self.work, &["rev-parse", "HEAD"])
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn repo(&self, name: &str, hooks: Vec<Hook>, fail_hooks: Vec<FailHook>) -> RepositoryConfig {
        RepositoryConfig {
            name: name.to_string(),
            dir: self.work.clone(),
            notifications: Vec::new(),
            hook_filters: Vec::new(),
            hooks,
            fail_hooks,
        }
    }
}

pub fn hook(shell: &str, assert: &str) -> Hook {
    Hook {
        shell: shell.to_string(),
        assert: assert.to_string(),
        ..Hook::default()
    }
}

pub fn fail_hook(shell: &str) -> FailHook {
    FailHook {
        shell: shell.to_string(),
        dir: None,
    }
}

pub fn dingtalk_target(url: &str) -> Notification {
    Notification {
        kind: NotificationKind::DingTalk,
        web_hook: url.to_string(),
    }
}

/// Captures every message instead of posting it.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, Message)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<(String, Message)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, target: &Notification, message: &Message) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((target.web_hook.clone(), message.clone()));
        Ok(())
    }
}
