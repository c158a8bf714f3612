//! Job repository for durable job records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sitecheck_core::{AnalysisRequest, Job, JobId, JobResult, JobState};
use surrealdb::sql::Thing;

use crate::{DbError, get_db};

/// Repository for job record persistence.
///
/// The in-memory status store stays authoritative while the engine runs;
/// these records back status queries for jobs the store no longer holds.
pub struct JobRepository;

/// Internal record type for SurrealDB reads and writes. The job id lives
/// in the record key, not in the row.
#[derive(Debug, Serialize, Deserialize)]
struct JobRecord {
    #[serde(default, skip_serializing)]
    id: Option<Thing>,
    input: AnalysisRequest,
    state: JobState,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    finished_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    fn from_job(job: &Job) -> Self {
        Self {
            id: None,
            input: job.input.clone(),
            state: job.state,
            message: job.message.clone(),
            result: job.result.clone(),
            note: job.note.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }

    fn into_job(self, job_id: JobId) -> Job {
        Job {
            id: job_id,
            input: self.input,
            state: self.state,
            message: self.message,
            result: self.result,
            note: self.note,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }

    fn record_job_id(&self) -> Option<JobId> {
        let raw = self.id.as_ref()?.id.to_raw();
        JobId::parse(&raw).ok()
    }
}

impl JobRepository {
    /// Create a new job record.
    pub async fn create(job: &Job) -> Result<Job, DbError> {
        let db = get_db()?;
        let job_id = job.id;

        let record: Option<JobRecord> = db
            .create(("job", job_id.to_string()))
            .content(JobRecord::from_job(job))
            .await?;

        record
            .map(|r| r.into_job(job_id))
            .ok_or_else(|| DbError::Query("Failed to create job record".into()))
    }

    /// Replace a job record with the given snapshot.
    pub async fn update(job: &Job) -> Result<Job, DbError> {
        let db = get_db()?;
        let job_id = job.id;

        let record: Option<JobRecord> = db
            .update(("job", job_id.to_string()))
            .content(JobRecord::from_job(job))
            .await?;

        record
            .map(|r| r.into_job(job_id))
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", job_id)))
    }

    /// Get a job record by ID.
    pub async fn get(id: JobId) -> Result<Job, DbError> {
        let db = get_db()?;

        let record: Option<JobRecord> = db.select(("job", id.to_string())).await?;

        record
            .map(|r| r.into_job(id))
            .ok_or_else(|| DbError::NotFound(format!("Job not found: {}", id)))
    }

    /// List the most recently created job records.
    pub async fn list_recent(limit: usize) -> Result<Vec<Job>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query("SELECT * FROM job ORDER BY created_at DESC LIMIT $limit")
            .bind(("limit", limit as i64))
            .await?;

        let records: Vec<JobRecord> = result.take(0)?;

        Ok(records
            .into_iter()
            .filter_map(|r| {
                let job_id = r.record_job_id()?;
                Some(r.into_job(job_id))
            })
            .collect())
    }

    /// List job records in a given state.
    pub async fn list_by_state(state: JobState, limit: usize) -> Result<Vec<Job>, DbError> {
        let db = get_db()?;

        let mut result = db
            .query(
                "SELECT * FROM job WHERE state = $state ORDER BY created_at DESC LIMIT $limit",
            )
            .bind(("state", state.as_str()))
            .bind(("limit", limit as i64))
            .await?;

        let records: Vec<JobRecord> = result.take(0)?;

        Ok(records
            .into_iter()
            .filter_map(|r| {
                let job_id = r.record_job_id()?;
                Some(r.into_job(job_id))
            })
            .collect())
    }

    /// Delete a job record.
    pub async fn delete(id: JobId) -> Result<(), DbError> {
        let db = get_db()?;

        let _: Option<JobRecord> = db.delete(("job", id.to_string())).await?;

        Ok(())
    }
}
