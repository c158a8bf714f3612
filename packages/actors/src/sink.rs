//! Report sink: persists final artifacts for terminal jobs.

use std::future::Future;
use std::pin::Pin;

use db::DbError;
use db::repositories::{ReportRecord, ReportRepository};
use sitecheck_core::{Job, JobResult};
use storage::{ReportStore, StorageError};
use thiserror::Error;

/// Future type returned by sink operations.
pub type SinkFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Errors from persisting a final report.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Destination for final artifacts.
///
/// A persist failure never reverts the job's terminal state; the runner
/// logs it and surfaces it as a secondary status note.
pub trait ReportSink: Send + Sync + 'static {
    /// Persist the terminal job's artifact (or error report) and return
    /// its location.
    fn persist(&self, job: &Job) -> SinkFuture<Result<String, SinkError>>;
}

/// Sink that writes report bodies to the blob store and links them to the
/// job through a report row in the record store.
pub struct DbReportSink {
    store: ReportStore,
}

impl DbReportSink {
    pub fn new(store: ReportStore) -> Self {
        Self { store }
    }
}

impl ReportSink for DbReportSink {
    fn persist(&self, job: &Job) -> SinkFuture<Result<String, SinkError>> {
        let store = self.store.clone();
        let job = job.clone();
        Box::pin(async move {
            // Every terminal job gets a body: the artifact, the attached
            // best-effort report, or the error message itself.
            let body = match &job.result {
                Some(JobResult::Report { artifact }) => artifact.content.clone(),
                Some(JobResult::Error {
                    message, report, ..
                }) => report
                    .as_ref()
                    .map(|r| r.content.clone())
                    .unwrap_or_else(|| format!("ERROR: {message}")),
                None => job.message.clone(),
            };

            let key = store.put_report(job.id, &body).await?;
            ReportRepository::create(&ReportRecord::for_job(&job, Some(key.clone()))).await?;
            Ok(key)
        })
    }
}
