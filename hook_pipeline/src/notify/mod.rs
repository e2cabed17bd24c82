//! Notification dispatch — renders a build report and posts it to every
//! target configured on the repository.
//!
//! Delivery failures are logged and counted, never propagated: the job's
//! outcome is already final by the time anything is sent.

pub mod dingtalk;

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::registry::{Notification, NotificationKind};
use crate::report::BuildReport;

pub use dingtalk::DingTalkNotifier;

/// Channel-neutral rendering of a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub title: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("endpoint rejected message: {0}")]
    Rejected(String),
    #[error("no channel registered for `{0}`")]
    NoChannel(NotificationKind),
}

/// One channel kind's delivery mechanism.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, target: &Notification, message: &Message) -> Result<(), NotifyError>;
}

pub fn render(report: &BuildReport) -> Message {
    let title = if report.succeeded() {
        "build success"
    } else {
        "build fail"
    };

    let mut text = format!("### [{}] {title}\n", report.repository);
    text.push_str("- build steps\n");
    for step in &report.steps {
        let mark = if step.ok { "" } else { " (failed)" };
        let _ = writeln!(text, "- `{}`{mark}", step.label);
        let output = step.output.trim_end();
        if !output.is_empty() {
            let _ = writeln!(text, "{output}");
        }
    }
    if let Some(error) = report.error() {
        let _ = write!(text, "### err: {error}");
    }

    Message {
        title: title.to_string(),
        text,
    }
}

#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    channels: HashMap<NotificationKind, Arc<dyn Notifier>>,
}

impl NotificationDispatcher {
    /// Dispatcher with every built-in channel.
    pub fn new(http: reqwest::Client) -> Self {
        Self::default().register(NotificationKind::DingTalk, Arc::new(DingTalkNotifier::new(http)))
    }

    /// Built-in channels sharing one HTTP client with a request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::new(http))
    }

    pub fn register(mut self, kind: NotificationKind, notifier: Arc<dyn Notifier>) -> Self {
        self.channels.insert(kind, notifier);
        self
    }

    pub async fn dispatch(&self, targets: &[Notification], report: &BuildReport) {
        if targets.is_empty() {
            return;
        }
        let message = render(report);

        for target in targets {
            let result = match self.channels.get(&target.kind) {
                Some(channel) => channel.send(target, &message).await,
                None => Err(NotifyError::NoChannel(target.kind)),
            };

            match result {
                Ok(()) => tracing::info!(
                    job_id = %report.job_id,
                    kind = %target.kind,
                    "Notification sent"
                ),
                Err(e) => {
                    crate::metrics::notification_failed(&target.kind.to_string());
                    tracing::error!(
                        job_id = %report.job_id,
                        kind = %target.kind,
                        "Notification failed: {e}"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Outcome, Stage, StepKind};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        sent: Mutex<Vec<(String, Message)>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn send(&self, target: &Notification, message: &Message) -> Result<(), NotifyError> {
            self.sent
                .lock()
                .unwrap()
                .push((target.web_hook.clone(), message.clone()));
            if self.fail {
                Err(NotifyError::Rejected("nope".into()))
            } else {
                Ok(())
            }
        }
    }

    fn failed_report() -> BuildReport {
        let mut report = BuildReport::start("site");
        report.record(StepKind::Hook, "make", "built\n", true);
        report.record(StepKind::Hook, "make test", "FAIL\n", false);
        report.finish(Outcome::Failed {
            stage: Stage::RunHooks,
            error: "hook `make test` failed".into(),
        });
        report
    }

    #[test]
    fn render_lists_steps_in_order_and_error() {
        let message = render(&failed_report());
        assert_eq!(message.title, "build fail");

        let make = message.text.find("- `make`").unwrap();
        let test = message.text.find("- `make test` (failed)").unwrap();
        assert!(make < test);
        assert!(message.text.ends_with("### err: hook `make test` failed"));
    }

    #[test]
    fn render_success_has_no_error_section() {
        let mut report = BuildReport::start("site");
        report.finish(Outcome::Succeeded);
        let message = render(&report);
        assert_eq!(message.title, "build success");
        assert!(!message.text.contains("err:"));
    }

    #[tokio::test]
    async fn dispatch_reaches_every_target_even_after_failure() {
        let channel = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let dispatcher =
            NotificationDispatcher::default().register(NotificationKind::DingTalk, channel.clone());
        let targets = vec![
            Notification {
                kind: NotificationKind::DingTalk,
                web_hook: "https://a".into(),
            },
            Notification {
                kind: NotificationKind::DingTalk,
                web_hook: "https://b".into(),
            },
        ];

        dispatcher.dispatch(&targets, &failed_report()).await;

        let sent = channel.sent.lock().unwrap();
        let hooks: Vec<_> = sent.iter().map(|(h, _)| h.as_str()).collect();
        assert_eq!(hooks, ["https://a", "https://b"]);
    }
}
