//! Scatter-gather execution of independent, read-only artifact checks.
//!
//! Tasks are claimed by a bounded pool of scoped worker threads. Each outcome
//! lands in the slot reserved for its submission index, so the report order
//! never depends on which worker finished first. A failing or panicking check
//! is recorded and the batch carries on; cancellation stops new claims and
//! marks whatever was never started as `cancelled`.

use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

pub const DEFAULT_MAX_WORKERS: usize = 4;

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
}

/// A read-only predicate over one artifact. `Err` means the check itself
/// could not run, as opposed to the artifact failing it.
pub trait Check: Send + Sync {
    fn name(&self) -> &str;
    fn run(&self, target: &Path) -> anyhow::Result<Verdict>;
}

struct FnCheck<F> {
    name: String,
    f: F,
}

impl<F> Check for FnCheck<F>
where
    F: Fn(&Path) -> anyhow::Result<Verdict> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, target: &Path) -> anyhow::Result<Verdict> {
        (self.f)(target)
    }
}

/// Wrap a closure as a [`Check`].
pub fn check_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Check>
where
    F: Fn(&Path) -> anyhow::Result<Verdict> + Send + Sync + 'static,
{
    Arc::new(FnCheck {
        name: name.into(),
        f,
    })
}

#[derive(Clone)]
pub struct ValidationTask {
    pub target: PathBuf,
    pub check: Arc<dyn Check>,
}

impl ValidationTask {
    pub fn new(target: impl Into<PathBuf>, check: Arc<dyn Check>) -> Self {
        Self {
            target: target.into(),
            check,
        }
    }
}

impl std::fmt::Debug for ValidationTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationTask")
            .field("target", &self.target)
            .field("check", &self.check.name())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pass,
    Fail,
    Error,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pass => "pass",
            TaskStatus::Fail => "fail",
            TaskStatus::Error => "error",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub index: usize,
    pub check: String,
    pub target: PathBuf,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportCounts {
    pub pass: usize,
    pub fail: usize,
    pub error: usize,
    pub cancelled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub outcomes: Vec<TaskOutcome>,
    pub counts: ReportCounts,
}

impl ValidationReport {
    fn from_outcomes(outcomes: Vec<TaskOutcome>) -> Self {
        let mut counts = ReportCounts::default();
        for o in &outcomes {
            match o.status {
                TaskStatus::Pass => counts.pass += 1,
                TaskStatus::Fail => counts.fail += 1,
                TaskStatus::Error => counts.error += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
            }
        }
        Self { outcomes, counts }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True when every task ran and passed.
    pub fn is_clean(&self) -> bool {
        self.counts.pass == self.outcomes.len()
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative abort signal, checked before each task is claimed.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub max_workers: usize,
    /// Cancel the batch after the first `fail` or `error`.
    pub fail_fast: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationEngine {
    options: EngineOptions,
}

impl ValidationEngine {
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    pub fn run(&self, tasks: &[ValidationTask], cancel: &CancelToken) -> ValidationReport {
        let total = tasks.len();
        let workers = self.options.max_workers.clamp(1, total.max(1));
        let slots: Vec<OnceLock<TaskOutcome>> = (0..total).map(|_| OnceLock::new()).collect();
        let next = AtomicUsize::new(0);

        tracing::debug!(tasks = total, workers, "starting validation batch");

        std::thread::scope(|s| {
            for worker in 0..workers {
                let (slots, next) = (&slots, &next);
                let fail_fast = self.options.fail_fast;
                s.spawn(move || loop {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(task) = tasks.get(index) else {
                        break;
                    };
                    let outcome = execute(index, task);
                    tracing::trace!(worker, index, status = %outcome.status, "task finished");
                    if fail_fast && matches!(outcome.status, TaskStatus::Fail | TaskStatus::Error) {
                        cancel.cancel();
                    }
                    // Each index is claimed exactly once, so the slot is empty.
                    let _ = slots[index].set(outcome);
                });
            }
        });

        let outcomes = slots
            .into_iter()
            .zip(tasks)
            .enumerate()
            .map(|(index, (slot, task))| {
                slot.into_inner()
                    .unwrap_or_else(|| outcome(index, task, TaskStatus::Cancelled, None))
            })
            .collect();
        let report = ValidationReport::from_outcomes(outcomes);
        tracing::debug!(counts = ?report.counts, "validation batch finished");
        report
    }
}

/// Run `tasks` on at most `max_workers` threads without outside cancellation.
pub fn run(tasks: &[ValidationTask], max_workers: usize) -> ValidationReport {
    ValidationEngine::new(EngineOptions {
        max_workers,
        fail_fast: false,
    })
    .run(tasks, &CancelToken::new())
}

fn outcome(index: usize, task: &ValidationTask, status: TaskStatus, detail: Option<String>) -> TaskOutcome {
    TaskOutcome {
        index,
        check: task.check.name().to_string(),
        target: task.target.clone(),
        status,
        detail,
    }
}

fn execute(index: usize, task: &ValidationTask) -> TaskOutcome {
    match catch_unwind(AssertUnwindSafe(|| task.check.run(&task.target))) {
        Ok(Ok(Verdict::Pass)) => outcome(index, task, TaskStatus::Pass, None),
        Ok(Ok(Verdict::Fail(detail))) => outcome(index, task, TaskStatus::Fail, Some(detail)),
        Ok(Err(e)) => outcome(index, task, TaskStatus::Error, Some(format!("{e:#}"))),
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            outcome(index, task, TaskStatus::Error, Some(format!("check panicked: {msg}")))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
