//! Concurrency-safe store of job status snapshots.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use sitecheck_core::{Job, JobId, JobState};

/// Shared map from job id to the latest published snapshot.
///
/// This is the single source of truth for "what is happening now". Runners
/// publish whole snapshots, so a reader never observes a record in the
/// middle of a multi-field update. Reads never await: the lock is a std
/// `RwLock` whose critical sections never span I/O.
#[derive(Clone, Default)]
pub struct StatusStore {
    inner: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl StatusStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a snapshot, replacing any previous one for the same id.
    pub fn put(&self, job: Job) {
        self.inner.write().unwrap().insert(job.id, job);
    }

    /// Get the current snapshot for a job.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.inner.read().unwrap().get(id).cloned()
    }

    /// Evict a terminal job's snapshot, e.g. once a durable record exists.
    /// Refused for non-terminal jobs: their runner still owns them.
    pub fn remove(&self, id: &JobId) -> Option<Job> {
        let mut map = self.inner.write().unwrap();
        match map.get(id) {
            Some(job) if job.is_terminal() => map.remove(id),
            Some(job) => {
                tracing::warn!(
                    job_id = %id,
                    state = %job.state,
                    "Refusing to evict a non-terminal job"
                );
                None
            }
            None => None,
        }
    }

    /// Number of tracked jobs.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// True when no jobs are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of jobs currently running.
    pub fn running_count(&self) -> usize {
        self.inner
            .read()
            .unwrap()
            .values()
            .filter(|j| j.state == JobState::Running)
            .count()
    }
}
