//! Job domain types for tracked analysis runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::request::AnalysisRequest;

/// Unique identifier for a job, using ULID for chronological sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Submitted, not yet claimed by a runner.
    Pending,
    /// A runner owns the job and is driving the agent.
    Running,
    /// The agent finished and a report is available.
    Completed,
    /// Execution failed before a final report could be produced.
    Failed,
    /// The deadline elapsed before the agent finished.
    TimedOut,
}

impl JobState {
    /// Check if no further transitions can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }

    /// Get a simple status string for display.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a job ended without a successful report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The agent raised or returned an error mid-run.
    ExecutionFailure,
    /// The configured deadline elapsed before completion.
    DeadlineExceeded,
}

/// Final artifact of an analysis run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Rendered report body (markdown).
    pub content: String,
    /// True when the report was synthesized from partial telemetry
    /// instead of returned by the agent.
    #[serde(default)]
    pub best_effort: bool,
    /// When the report was produced.
    pub generated_at: DateTime<Utc>,
}

impl Report {
    /// A report returned by the agent itself.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            best_effort: false,
            generated_at: Utc::now(),
        }
    }

    /// A best-effort report synthesized from partial telemetry.
    pub fn synthesized(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            best_effort: true,
            generated_at: Utc::now(),
        }
    }
}

/// Terminal outcome of a job: a report or an error description, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobResult {
    /// The run produced a report.
    Report { artifact: Report },
    /// The run ended in failure or timeout.
    Error {
        kind: FailureKind,
        message: String,
        /// Best-effort report rendered from partial telemetry, when any
        /// was collected before the run ended.
        #[serde(skip_serializing_if = "Option::is_none")]
        report: Option<Report>,
    },
}

/// A tracked analysis run.
///
/// The whole struct is published to the status store as one snapshot, so a
/// reader never observes a terminal state with the result still unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier, allocated at submission.
    pub id: JobId,
    /// The caller-supplied request this job executes.
    pub input: AnalysisRequest,
    /// Current lifecycle state.
    pub state: JobState,
    /// Human-readable description of what is happening now.
    pub message: String,
    /// Set exactly once, by the transition into a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    /// Secondary diagnostic (e.g. a report sink write failure). Never
    /// affects state or result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When a runner claimed the job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job for the given request.
    pub fn new(input: AnalysisRequest) -> Self {
        Self {
            id: JobId::new(),
            input,
            state: JobState::Pending,
            message: "queued for execution".to_string(),
            result: None,
            note: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Transition to `Running`. Ignored unless the job is still pending.
    pub fn mark_running(&mut self) {
        if self.state != JobState::Pending {
            return;
        }
        self.state = JobState::Running;
        self.started_at = Some(Utc::now());
        self.message = format!("analyzing {}", self.input.target);
    }

    /// Transition to `Completed` with the final artifact. Ignored once
    /// terminal.
    pub fn mark_completed(&mut self, artifact: Report) {
        if self.is_terminal() {
            return;
        }
        self.message = if artifact.best_effort {
            "analysis finished; report synthesized from collected telemetry".to_string()
        } else {
            "analysis completed".to_string()
        };
        self.finish(JobState::Completed, JobResult::Report { artifact });
    }

    /// Transition to `Failed`, capturing the error description. Ignored
    /// once terminal.
    pub fn mark_failed(&mut self, error: impl Into<String>, report: Option<Report>) {
        if self.is_terminal() {
            return;
        }
        let message = error.into();
        self.message = format!("analysis failed: {message}");
        self.finish(
            JobState::Failed,
            JobResult::Error {
                kind: FailureKind::ExecutionFailure,
                message,
                report,
            },
        );
    }

    /// Transition to `TimedOut` after the deadline elapsed. Ignored once
    /// terminal.
    pub fn mark_timed_out(&mut self, deadline_secs: u64, report: Option<Report>) {
        if self.is_terminal() {
            return;
        }
        let message = format!("analysis did not finish within {deadline_secs}s");
        self.message = message.clone();
        self.finish(
            JobState::TimedOut,
            JobResult::Error {
                kind: FailureKind::DeadlineExceeded,
                message,
                report,
            },
        );
    }

    fn finish(&mut self, state: JobState, result: JobResult) {
        self.state = state;
        self.result = Some(result);
        self.finished_at = Some(Utc::now());
    }
}
