//! Caller-facing submission and query API.

use ractor::ActorRef;
use sitecheck_core::{AnalysisRequest, Job, JobEvent, JobId, StatusError, SubmitError};
use tokio::sync::broadcast;

use crate::messages::SupervisorMessage;
use crate::status_store::StatusStore;

/// Handle for submitting jobs and polling their status.
///
/// Cheap to clone; every clone talks to the same engine. Authorization of
/// "does this id belong to this caller" is a concern of the layers around
/// the record store; the service itself is identity-agnostic.
#[derive(Clone)]
pub struct JobService {
    supervisor: ActorRef<SupervisorMessage>,
    store: StatusStore,
}

impl JobService {
    pub(crate) fn new(supervisor: ActorRef<SupervisorMessage>, store: StatusStore) -> Self {
        Self { supervisor, store }
    }

    /// Submit a job. Returns immediately with the allocated id; execution
    /// proceeds in the background.
    pub async fn submit(&self, request: AnalysisRequest) -> Result<JobId, SubmitError> {
        let (tx, rx) = ractor::concurrency::oneshot();
        self.supervisor
            .send_message(SupervisorMessage::Submit {
                request,
                reply: tx.into(),
            })
            .map_err(|e| SubmitError::Unavailable(format!("failed to reach supervisor: {e}")))?;

        let job = rx
            .await
            .map_err(|_| SubmitError::Unavailable("supervisor dropped the request".into()))??;
        Ok(job.id)
    }

    /// Get the current status snapshot for a job.
    ///
    /// Served straight from the status store, so queries never wait on job
    /// execution. Falls back to the durable record store for jobs the
    /// store no longer holds.
    pub async fn status(&self, id: JobId) -> Result<Job, StatusError> {
        if let Some(job) = self.store.get(&id) {
            return Ok(job);
        }

        match db::repositories::JobRepository::get(id).await {
            Ok(job) => Ok(job),
            Err(db::DbError::NotFound(_)) | Err(db::DbError::NotInitialized) => {
                Err(StatusError::NotFound(id))
            }
            Err(e) => Err(StatusError::Unavailable(format!("record store error: {e}"))),
        }
    }

    /// Evict a terminal job from the in-memory store; later status queries
    /// are served from the durable record. No-op for non-terminal or
    /// unknown jobs.
    pub fn evict(&self, id: JobId) -> bool {
        self.store.remove(&id).is_some()
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        let (tx, rx) = broadcast::channel(1024);
        let _ = self
            .supervisor
            .send_message(SupervisorMessage::Subscribe { sender: tx });
        rx
    }

    /// Stop the supervisor. In-flight runners finish on their own.
    pub fn shutdown(&self) {
        let _ = self.supervisor.send_message(SupervisorMessage::Shutdown);
    }
}
