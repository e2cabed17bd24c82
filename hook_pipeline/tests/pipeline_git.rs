//! End-to-end pipeline runs against real git working trees.

#![cfg(unix)]

mod common;

use std::sync::Arc;

use common::{dingtalk_target, fail_hook, hook, GitFixture, RecordingNotifier};
use hook_pipeline::{
    JobPipeline, NotificationDispatcher, NotificationKind, Outcome, Stage, StepKind, SystemShell,
};

fn pipeline() -> JobPipeline {
    JobPipeline::new(Arc::new(SystemShell::default()), NotificationDispatcher::default())
}

fn kinds(report: &hook_pipeline::BuildReport) -> Vec<StepKind> {
    report.steps.iter().map(|s| s.kind).collect()
}

#[tokio::test]
async fn pulled_change_with_passing_hooks_succeeds() {
    let fx = GitFixture::new();
    let pushed = fx.push_change("app.txt", "v2\n");
    let repo = fx.repo(
        "site",
        vec![hook("cat app.txt", "v2"), hook("echo built", "built")],
        vec![fail_hook("echo cleanup")],
    );

    let report = pipeline().run(&repo).await;

    assert!(report.succeeded(), "{:?}", report.outcome);
    assert_eq!(
        kinds(&report),
        vec![StepKind::Hook, StepKind::Hook, StepKind::FailHook]
    );
    assert_eq!(report.steps[0].output, "v2\n");
    assert_eq!(fx.work_head(), pushed);
}

#[tokio::test]
async fn missing_assert_rolls_back_to_baseline() {
    let fx = GitFixture::new();
    let baseline = fx.work_head();
    let pushed = fx.push_change("app.txt", "v2\n");

    let notifier = RecordingNotifier::new();
    let dispatcher =
        NotificationDispatcher::default().register(NotificationKind::DingTalk, notifier.clone());
    let pipeline = JobPipeline::new(Arc::new(SystemShell::default()), dispatcher);

    let mut repo = fx.repo(
        "site",
        vec![
            hook("echo one", "one"),
            hook("cat app.txt", "v3"),
            hook("touch third-ran", ""),
        ],
        vec![fail_hook("echo cleanup")],
    );
    repo.notifications = vec![dingtalk_target("https://robot.example/a")];

    let report = pipeline.run(&repo).await;

    assert!(matches!(
        report.outcome,
        Outcome::Failed {
            stage: Stage::RunHooks,
            ..
        }
    ));
    assert_eq!(
        kinds(&report),
        vec![
            StepKind::Hook,
            StepKind::Hook,
            StepKind::Rollback,
            StepKind::FailHook
        ]
    );
    assert_eq!(report.steps[2].label, format!("git reset --hard {baseline}"));
    assert!(report.steps[2].ok);
    assert_ne!(fx.work_head(), pushed);
    assert_eq!(fx.work_head(), baseline);
    assert_eq!(std::fs::read_to_string(fx.work.join("app.txt")).unwrap(), "v1\n");
    assert!(!fx.work.join("third-ran").exists());

    let messages = notifier.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].0, "https://robot.example/a");
    assert_eq!(messages[0].1.title, "build fail");
    assert!(messages[0].1.text.contains("### err: hook `cat app.txt` failed"));
}

#[tokio::test]
async fn tolerant_hook_does_not_stop_the_job() {
    let fx = GitFixture::new();
    let pushed = fx.push_change("app.txt", "v2\n");

    let mut tolerant = hook("cat app.txt", "v3");
    tolerant.assert_fail_continue = true;
    let repo = fx.repo(
        "site",
        vec![hook("echo one", "one"), tolerant, hook("touch third-ran", "")],
        vec![],
    );

    let report = pipeline().run(&repo).await;

    assert!(report.succeeded());
    assert!(fx.work.join("third-ran").exists());
    assert_eq!(fx.work_head(), pushed);
}

#[tokio::test]
async fn directory_outside_git_fails_validation() {
    let fx = GitFixture::new();
    let plain = fx.path().join("plain");
    std::fs::create_dir(&plain).unwrap();

    let mut repo = fx.repo("site", vec![hook("echo never", "")], vec![]);
    repo.dir = plain;

    let report = pipeline().run(&repo).await;

    assert!(matches!(
        report.outcome,
        Outcome::Failed {
            stage: Stage::Validate,
            ..
        }
    ));
    assert!(report.steps.is_empty());
    assert!(report.error().unwrap().contains("is not a git repository"));
}

#[tokio::test]
async fn nothing_new_skips_hooks_every_time() {
    let fx = GitFixture::new();
    let before = fx.work_head();
    let repo = fx.repo(
        "site",
        vec![hook("touch hook-ran", "")],
        vec![fail_hook("echo cleanup")],
    );
    let pipeline = pipeline();

    for _ in 0..2 {
        let report = pipeline.run(&repo).await;
        assert!(report.succeeded());
        assert_eq!(kinds(&report), vec![StepKind::FailHook]);
    }
    assert!(!fx.work.join("hook-ran").exists());
    assert_eq!(fx.work_head(), before);
}

#[tokio::test]
async fn fail_hooks_run_once_each_in_order_despite_errors() {
    let fx = GitFixture::new();
    fx.push_change("app.txt", "v2\n");
    let log = fx.path().join("fail.log");
    let log = log.display();

    let repo = fx.repo(
        "site",
        vec![hook("exit 1", "")],
        vec![
            fail_hook(&format!("echo first >> {log}; exit 7")),
            fail_hook(&format!("echo second >> {log}")),
            fail_hook(&format!("echo third >> {log}")),
        ],
    );

    let report = pipeline().run(&repo).await;

    assert!(!report.succeeded());
    let fail_steps: Vec<_> = report.steps_of(StepKind::FailHook).collect();
    assert_eq!(fail_steps.len(), 3);
    assert!(!fail_steps[0].ok);
    assert!(fail_steps[1].ok && fail_steps[2].ok);
    assert_eq!(
        std::fs::read_to_string(fx.path().join("fail.log")).unwrap(),
        "first\nsecond\nthird\n"
    );
}

#[tokio::test]
async fn hook_timeout_aborts_and_rolls_back() {
    let fx = GitFixture::new();
    let baseline = fx.work_head();
    fx.push_change("app.txt", "v2\n");

    let mut slow = hook("sleep 10", "");
    slow.timeout_secs = Some(1);
    let repo = fx.repo("site", vec![slow], vec![]);

    let report = pipeline().run(&repo).await;

    assert!(report.error().unwrap().contains("timed out"));
    assert_eq!(kinds(&report), vec![StepKind::Hook, StepKind::Rollback]);
    assert_eq!(fx.work_head(), baseline);
}

#[tokio::test]
async fn timed_out_hook_leaves_nothing_running_after_rollback() {
    let fx = GitFixture::new();
    let baseline = fx.work_head();
    fx.push_change("app.txt", "v2\n");

    let mut slow = hook("sh -c 'sleep 2; echo late > late.txt'; true", "");
    slow.timeout_secs = Some(1);
    let repo = fx.repo("site", vec![slow], vec![]);

    let report = pipeline().run(&repo).await;
    assert!(report.error().unwrap().contains("timed out after 1s"));
    assert_eq!(fx.work_head(), baseline);

    tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
    assert!(!fx.work.join("late.txt").exists());
}
