//! Report repository linking terminal jobs to persisted artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitecheck_core::{Job, JobId, JobResult};

use crate::{DbError, get_db};

/// A report row written when a job reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRecord {
    /// The job this report belongs to.
    pub job_id: String,
    /// Final state of the job ("completed", "failed", "timed_out").
    pub state: String,
    /// Blob store key of the full report body, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    /// Short human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Error description for failed or timed-out jobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the report body was synthesized from partial telemetry.
    #[serde(default)]
    pub best_effort: bool,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}

impl ReportRecord {
    /// Build a report row from a terminal job snapshot.
    pub fn for_job(job: &Job, storage_key: Option<String>) -> Self {
        let (error, best_effort) = match &job.result {
            Some(JobResult::Report { artifact }) => (None, artifact.best_effort),
            Some(JobResult::Error {
                message, report, ..
            }) => (
                Some(message.clone()),
                report.as_ref().is_some_and(|r| r.best_effort),
            ),
            None => (None, false),
        };

        Self {
            job_id: job.id.to_string(),
            state: job.state.as_str().to_string(),
            storage_key,
            summary: Some(job.message.clone()),
            error,
            best_effort,
            created_at: Utc::now(),
        }
    }
}

/// Repository for report persistence operations.
pub struct ReportRepository;

impl ReportRepository {
    /// Insert a report row.
    pub async fn create(record: &ReportRecord) -> Result<(), DbError> {
        let db = get_db()?;

        let _: Option<serde_json::Value> = db.create("report").content(record.clone()).await?;

        Ok(())
    }

    /// Get the report rows for a job, newest first.
    pub async fn get_for_job(job_id: JobId) -> Result<Vec<ReportRecord>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT * FROM report WHERE job_id = $job_id ORDER BY created_at DESC")
            .bind(("job_id", job_id.to_string()))
            .await?;

        let records: Vec<ReportRecord> = result.take(0)?;

        Ok(records)
    }
}
