//! Build report — the ordered record of one pipeline run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Per-step output kept in the report (tail end wins).
pub const MAX_STEP_OUTPUT: usize = 64 * 1024;

/// Pipeline states that can abort a job, in execution order. Rollback, fail
/// hooks and notification never abort, so they never appear in an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validate,
    CaptureBaseline,
    Synchronize,
    RunHooks,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::CaptureBaseline => "capture_baseline",
            Stage::Synchronize => "synchronize",
            Stage::RunHooks => "run_hooks",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Hook,
    Rollback,
    FailHook,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportStep {
    pub kind: StepKind,
    pub label: String,
    pub output: String,
    /// False when the command failed or its assertion was violated.
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Running,
    Succeeded,
    Failed { stage: Stage, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub job_id: Uuid,
    pub repository: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub steps: Vec<ReportStep>,
    pub outcome: Outcome,
}

impl BuildReport {
    pub fn start(repository: &str) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            repository: repository.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            steps: Vec::new(),
            outcome: Outcome::Running,
        }
    }

    pub fn record(&mut self, kind: StepKind, label: &str, output: &str, ok: bool) {
        self.steps.push(ReportStep {
            kind,
            label: label.to_string(),
            output: truncate_tail(output, MAX_STEP_OUTPUT),
            ok,
        });
    }

    pub fn finish(&mut self, outcome: Outcome) {
        self.outcome = outcome;
        self.finished_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn steps_of(&self, kind: StepKind) -> impl Iterator<Item = &ReportStep> {
        self.steps.iter().filter(move |s| s.kind == kind)
    }

    pub fn duration_ms(&self) -> u64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds().max(0) as u64
    }
}

/// Keep the last `max` bytes, cut on a char boundary.
fn truncate_tail(output: &str, max: usize) -> String {
    if output.len() <= max {
        return output.to_string();
    }
    let mut start = output.len() - max;
    while !output.is_char_boundary(start) {
        start += 1;
    }
    format!("...truncated...\n{}", &output[start..])
}
