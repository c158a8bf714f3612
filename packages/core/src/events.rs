//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Job, JobId};

/// Events emitted by the job engine for real-time observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    /// A new job was accepted for execution.
    JobSubmitted { job: Job, timestamp: DateTime<Utc> },
    /// A runner claimed the job and started the agent.
    JobStarted {
        job_id: JobId,
        timestamp: DateTime<Utc>,
    },
    /// The agent reported progress.
    JobProgress {
        job_id: JobId,
        step: u32,
        note: String,
        timestamp: DateTime<Utc>,
    },
    /// The job completed with a report.
    JobCompleted {
        job_id: JobId,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// The job failed.
    JobFailed {
        job_id: JobId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// The job hit its deadline.
    JobTimedOut {
        job_id: JobId,
        deadline_secs: u64,
        timestamp: DateTime<Utc>,
    },
    /// The final report was persisted.
    ReportPersisted {
        job_id: JobId,
        location: String,
        timestamp: DateTime<Utc>,
    },
    /// Persisting the final report failed; the job outcome is unchanged.
    SinkWriteFailed {
        job_id: JobId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            JobEvent::JobSubmitted { timestamp, .. } => *timestamp,
            JobEvent::JobStarted { timestamp, .. } => *timestamp,
            JobEvent::JobProgress { timestamp, .. } => *timestamp,
            JobEvent::JobCompleted { timestamp, .. } => *timestamp,
            JobEvent::JobFailed { timestamp, .. } => *timestamp,
            JobEvent::JobTimedOut { timestamp, .. } => *timestamp,
            JobEvent::ReportPersisted { timestamp, .. } => *timestamp,
            JobEvent::SinkWriteFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job this event belongs to.
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::JobSubmitted { job, .. } => job.id,
            JobEvent::JobStarted { job_id, .. } => *job_id,
            JobEvent::JobProgress { job_id, .. } => *job_id,
            JobEvent::JobCompleted { job_id, .. } => *job_id,
            JobEvent::JobFailed { job_id, .. } => *job_id,
            JobEvent::JobTimedOut { job_id, .. } => *job_id,
            JobEvent::ReportPersisted { job_id, .. } => *job_id,
            JobEvent::SinkWriteFailed { job_id, .. } => *job_id,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            JobEvent::JobSubmitted { job, .. } => {
                format!("Job {} submitted for {}", job.id, job.input.target)
            }
            JobEvent::JobStarted { job_id, .. } => format!("Job {} started", job_id),
            JobEvent::JobProgress {
                job_id, step, note, ..
            } => format!("Job {} step {}: {}", job_id, step, note),
            JobEvent::JobCompleted {
                job_id,
                duration_ms,
                ..
            } => format!("Job {} completed in {}ms", job_id, duration_ms),
            JobEvent::JobFailed { job_id, error, .. } => {
                format!("Job {} failed: {}", job_id, error)
            }
            JobEvent::JobTimedOut {
                job_id,
                deadline_secs,
                ..
            } => format!("Job {} timed out after {}s", job_id, deadline_secs),
            JobEvent::ReportPersisted {
                job_id, location, ..
            } => format!("Job {} report persisted at {}", job_id, location),
            JobEvent::SinkWriteFailed { job_id, error, .. } => {
                format!("Job {} report persistence failed: {}", job_id, error)
            }
        }
    }
}
